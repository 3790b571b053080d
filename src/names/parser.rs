//! Sequential subfield parsers for name headings.

use super::{extract_relator_terms, person_name};
use crate::record::Field;
use crate::text::{normalize_punctuation, strip_ends, End};
use indexmap::IndexSet;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref FULLER_FORM: Regex =
        Regex::new(r"^(?:.*\()?([^()]+)(?:\).*)?$").expect("valid regex");
}

/// A parser that visits a field's subfields in order.
///
/// Leading `$3` values are collected as materials specified before any
/// other handling. [`SequentialFieldParser::parse_subfield`] returning
/// `true` stops the walk; [`SequentialFieldParser::do_post_parse`] then
/// runs once and [`SequentialFieldParser::compile_results`] builds the
/// output.
pub trait SequentialFieldParser {
    /// What the parser produces.
    type Output;

    /// The field being parsed.
    fn field(&self) -> &Field;

    /// Storage for `$3` values.
    fn materials_specified_mut(&mut self) -> &mut Vec<String>;

    /// Handle one subfield; return `true` to stop parsing.
    fn parse_subfield(&mut self, code: char, value: &str) -> bool;

    /// Called after the last subfield is handled.
    fn do_post_parse(&mut self) {}

    /// Build the parse result.
    fn compile_results(self) -> Self::Output;

    /// Normalize a `$3` value.
    fn parse_materials_specified(&self, value: &str) -> String {
        strip_ends(value, false, End::Both)
    }

    /// Run the parser over every subfield of the field.
    fn parse(mut self) -> Self::Output
    where
        Self: Sized,
    {
        let subfields: Vec<(char, String)> = self
            .field()
            .subfields()
            .iter()
            .map(|sf| (sf.code, sf.value.clone()))
            .collect();
        let mut leading_materials = true;
        for (code, value) in subfields {
            if leading_materials {
                if code == '3' {
                    let materials = self.parse_materials_specified(&value);
                    self.materials_specified_mut().push(materials);
                } else {
                    leading_materials = false;
                }
            }
            if self.parse_subfield(code, &value) {
                break;
            }
        }
        self.do_post_parse();
        self.compile_results()
    }
}

/// Structured personal name from an X00 field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPersonalName {
    /// The name portion of the heading, punctuation normalized.
    pub heading: Option<String>,
    /// Relator terms from `$e` and `$4`, in order, without duplicates.
    pub relations: Vec<String>,
    /// Given name(s).
    pub forename: Option<String>,
    /// Surname.
    pub surname: Option<String>,
    /// Family name, for family headings.
    pub family_name: Option<String>,
    /// `$b` numeration (`II`).
    pub numeration: Option<String>,
    /// `$c` titles, one per comma-separated entry.
    pub person_titles: Vec<String>,
    /// `$q` fuller form, without parentheses.
    pub fuller_form_of_name: Option<String>,
    /// Leading `$3` values.
    pub materials_specified: Vec<String>,
}

/// Parses X00 personal name fields.
#[derive(Debug)]
pub struct PersonalNameParser<'a> {
    field: &'a Field,
    materials_specified: Vec<String>,
    heading_parts: Vec<String>,
    relator_terms: IndexSet<String>,
    main_name: String,
    titles: Vec<String>,
    numeration: String,
    fuller_form_of_name: String,
}

impl<'a> PersonalNameParser<'a> {
    const RELATOR_CODES: &'static str = "e4";
    const DONE_CODES: &'static str = "fhklmoprstvxz";
    const IGNORE_CODES: &'static str = "iw012356789";

    /// Create a parser for the given field.
    #[must_use]
    pub fn new(field: &'a Field) -> Self {
        PersonalNameParser {
            field,
            materials_specified: Vec::new(),
            heading_parts: Vec::new(),
            relator_terms: IndexSet::new(),
            main_name: String::new(),
            titles: Vec::new(),
            numeration: String::new(),
            fuller_form_of_name: String::new(),
        }
    }
}

impl SequentialFieldParser for PersonalNameParser<'_> {
    type Output = ParsedPersonalName;

    fn field(&self) -> &Field {
        self.field
    }

    fn materials_specified_mut(&mut self) -> &mut Vec<String> {
        &mut self.materials_specified
    }

    fn parse_subfield(&mut self, code: char, value: &str) -> bool {
        if Self::DONE_CODES.contains(code) {
            return true;
        }
        if Self::RELATOR_CODES.contains(code) {
            self.relator_terms
                .extend(extract_relator_terms(value, code == '4'));
        } else if !Self::IGNORE_CODES.contains(code) {
            self.heading_parts.push(value.to_string());
            match code {
                'a' => self.main_name = value.to_string(),
                'b' => self.numeration = strip_ends(value, false, End::Both),
                'c' => self.titles.extend(
                    strip_ends(value, false, End::Both)
                        .split(", ")
                        .map(String::from),
                ),
                'q' => {
                    let fuller = FULLER_FORM.replace(value, "$1");
                    self.fuller_form_of_name = strip_ends(&fuller, false, End::Both);
                },
                _ => {},
            }
        }
        false
    }

    fn compile_results(self) -> ParsedPersonalName {
        let heading = normalize_punctuation(&self.heading_parts.join(" "), false);
        let heading = strip_ends(&heading, false, End::Both);
        let name = person_name(&self.main_name, [self.field.indicator1(), self.field.indicator2()]);
        ParsedPersonalName {
            heading: (!heading.is_empty()).then_some(heading),
            relations: self.relator_terms.into_iter().collect(),
            forename: name.forename,
            surname: name.surname,
            family_name: name.family_name,
            numeration: (!self.numeration.is_empty()).then_some(self.numeration),
            person_titles: self.titles,
            fuller_form_of_name: (!self.fuller_form_of_name.is_empty())
                .then_some(self.fuller_form_of_name),
            materials_specified: self.materials_specified,
        }
    }
}

/// One level of an organization or event heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingPart {
    /// Name of this level.
    pub name: String,
    /// Event qualifier (number, date, place) when present.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub qualifier: Option<String>,
}

impl HeadingPart {
    fn named(name: impl Into<String>) -> Self {
        HeadingPart {
            name: name.into(),
            qualifier: None,
        }
    }
}

/// Kind of heading produced by [`OrgEventNameParser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingType {
    /// Corporate body hierarchy.
    Organization,
    /// Meeting or event hierarchy.
    Event,
    /// Organization and event levels together.
    Combined,
}

/// One heading from an X10/X11 field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgEventHeading {
    /// Relator terms; only the first heading of a field carries them.
    pub relations: Vec<String>,
    /// Levels of the hierarchy, broadest first.
    pub heading_parts: Vec<HeadingPart>,
    /// Organization, event, or combined.
    #[serde(rename = "type")]
    pub heading_type: HeadingType,
    /// First indicator `1`: the name is a jurisdiction.
    pub is_jurisdiction: bool,
    /// Leading `$3` values.
    pub materials_specified: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartKind {
    Org,
    Event,
}

/// Parses X10 (organization) and X11 (meeting) name fields.
///
/// Subunits (`$b` in X10, `$e` in X11) start new hierarchy levels; event
/// information (`$c$d$g$n`) qualifies the level it follows. An X10 field
/// with event information yields organization, event and combined
/// headings.
#[derive(Debug)]
pub struct OrgEventNameParser<'a> {
    field: &'a Field,
    materials_specified: Vec<String>,
    relator_terms: IndexSet<String>,
    subunit_code: char,
    relator_codes: &'static str,
    is_x10: bool,
    is_jurisdiction: bool,
    org_parts: Vec<HeadingPart>,
    event_parts: Vec<HeadingPart>,
    combined_parts: Vec<HeadingPart>,
    org_stack: Vec<String>,
    event_stack: Vec<String>,
    event_info: Vec<String>,
    prev_part_name: String,
    prev_code: Option<char>,
}

impl<'a> OrgEventNameParser<'a> {
    const EVENT_INFO_CODES: &'static str = "cdgn";
    const DONE_CODES: &'static str = "fhklmoprstvxz";

    /// Create a parser for the given field. Tags ending in `10` are parsed
    /// as organizations; others as meetings.
    #[must_use]
    pub fn new(field: &'a Field) -> Self {
        let is_x10 = field.tag().ends_with("10");
        OrgEventNameParser {
            field,
            materials_specified: Vec::new(),
            relator_terms: IndexSet::new(),
            subunit_code: if is_x10 { 'b' } else { 'e' },
            relator_codes: if is_x10 { "e4" } else { "j4" },
            is_x10,
            is_jurisdiction: field.indicator1() == '1',
            org_parts: Vec::new(),
            event_parts: Vec::new(),
            combined_parts: Vec::new(),
            org_stack: Vec::new(),
            event_stack: Vec::new(),
            event_info: Vec::new(),
            prev_part_name: String::new(),
            prev_code: None,
        }
    }

    fn is_first_subunit_of_jurisdiction(&self, code: char) -> bool {
        let jurisdiction_subunit = code == self.subunit_code && self.is_jurisdiction;
        (code == 'q' || jurisdiction_subunit) && self.prev_code == Some('a')
    }

    fn build_unit_name(&mut self, kind: PartKind) -> String {
        let prev = self.prev_part_name.clone();
        let stack = match kind {
            PartKind::Org => &self.org_stack,
            PartKind::Event => &self.event_stack,
        };
        let unit_name = if stack.is_empty() {
            prev.clone()
        } else {
            let context = stack.join(" ");
            self.org_stack.clear();
            self.event_stack.clear();
            format!("{context}, {prev}")
        };
        match kind {
            PartKind::Org => self.event_stack.push(prev),
            PartKind::Event => self.org_stack.push(prev),
        }
        unit_name
    }

    fn do_unit(&mut self) {
        let mut qualifier = None;
        if self.event_info.is_empty() {
            if !self.is_x10 && self.event_parts.is_empty() {
                let name = self.build_unit_name(PartKind::Event);
                self.event_parts.push(HeadingPart::named(name));
            } else {
                let name = self.build_unit_name(PartKind::Org);
                self.org_parts.push(HeadingPart::named(name));
            }
        } else {
            let info = strip_ends(&self.event_info.join(" "), false, End::Both);
            let name = self.build_unit_name(PartKind::Event);
            self.event_parts.push(HeadingPart {
                name,
                qualifier: Some(info.clone()),
            });
            // First unit of an X10 field is an organization even when it has event info.
            if self.is_x10 && self.org_parts.is_empty() {
                self.org_parts.push(HeadingPart::named(self.prev_part_name.clone()));
                self.org_stack.pop();
            }
            qualifier = Some(info).filter(|q| !q.is_empty());
        }
        self.combined_parts.push(HeadingPart {
            name: self.prev_part_name.clone(),
            qualifier,
        });
    }
}

impl SequentialFieldParser for OrgEventNameParser<'_> {
    type Output = Vec<OrgEventHeading>;

    fn field(&self) -> &Field {
        self.field
    }

    fn materials_specified_mut(&mut self) -> &mut Vec<String> {
        &mut self.materials_specified
    }

    fn parse_subfield(&mut self, code: char, value: &str) -> bool {
        if Self::DONE_CODES.contains(code) {
            return true;
        }
        if self.relator_codes.contains(code) {
            self.relator_terms
                .extend(extract_relator_terms(value, code == '4'));
        } else if Self::EVENT_INFO_CODES.contains(code) {
            self.event_info.push(value.to_string());
        } else if code == 'a' {
            self.prev_part_name = strip_ends(value, false, End::Both);
        } else if self.is_first_subunit_of_jurisdiction(code) {
            let subunit = strip_ends(value, false, End::Both);
            self.prev_part_name = format!("{} {subunit}", self.prev_part_name);
        } else if code == self.subunit_code {
            self.do_unit();
            self.event_info.clear();
            self.prev_part_name = strip_ends(value, false, End::Both);
        }
        self.prev_code = Some(code);
        false
    }

    fn do_post_parse(&mut self) {
        self.do_unit();
    }

    fn compile_results(self) -> Vec<OrgEventHeading> {
        let needs_combined = !self.org_parts.is_empty() && !self.event_parts.is_empty();
        let mut relations: Vec<String> = self.relator_terms.into_iter().collect();
        let candidates = [
            (HeadingType::Organization, self.org_parts),
            (HeadingType::Event, self.event_parts),
            (HeadingType::Combined, if needs_combined { self.combined_parts } else { Vec::new() }),
        ];
        candidates
            .into_iter()
            .filter(|(_, parts)| !parts.is_empty())
            .map(|(heading_type, heading_parts)| OrgEventHeading {
                relations: std::mem::take(&mut relations),
                heading_parts,
                heading_type,
                is_jurisdiction: self.is_jurisdiction,
                materials_specified: self.materials_specified.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_string::parse_from_string;

    fn parse_person(s: &str) -> ParsedPersonalName {
        PersonalNameParser::new(&parse_from_string(s).unwrap()).parse()
    }

    fn parse_org(s: &str) -> Vec<OrgEventHeading> {
        OrgEventNameParser::new(&parse_from_string(s).unwrap()).parse()
    }

    fn names(heading: &OrgEventHeading) -> Vec<&str> {
        heading.heading_parts.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_personal_name_full_structure() {
        let parsed = parse_person(
            "600 10 |3v. 1|aSmith, Elizabeth,|cDame,|q(Ann Elizabeth),|d1900-1990,|eauthor,|eeditor.|4aut|tCollected works.",
        );
        assert_eq!(parsed.materials_specified, vec!["v. 1"]);
        assert_eq!(parsed.surname.as_deref(), Some("Smith"));
        assert_eq!(parsed.forename.as_deref(), Some("Elizabeth"));
        assert_eq!(parsed.person_titles, vec!["Dame"]);
        assert_eq!(parsed.fuller_form_of_name.as_deref(), Some("Ann Elizabeth"));
        assert_eq!(parsed.relations, vec!["author", "editor"]);
        assert_eq!(
            parsed.heading.as_deref(),
            Some("Smith, Elizabeth, Dame, (Ann Elizabeth), 1900-1990")
        );
    }

    #[test]
    fn test_personal_name_numeration_and_forename_only() {
        let parsed = parse_person("100 0  John Paul|bII,|cPope,|d1920-2005.");
        assert_eq!(parsed.forename.as_deref(), Some("John Paul"));
        assert_eq!(parsed.surname, None);
        assert_eq!(parsed.numeration.as_deref(), Some("II"));
        assert_eq!(parsed.person_titles, vec!["Pope"]);
        assert!(parsed.relations.is_empty());
    }

    #[test]
    fn test_personal_name_family() {
        let parsed = parse_person("100 3  Morton family.");
        assert_eq!(parsed.surname.as_deref(), Some("Morton"));
        assert_eq!(parsed.family_name.as_deref(), Some("Morton family"));
    }

    #[test]
    fn test_org_hierarchy() {
        let headings = parse_org("110 2  United States.|bArmy.|bInfantry Regiment, 1st.|eauthor.");
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].heading_type, HeadingType::Organization);
        assert_eq!(
            names(&headings[0]),
            vec!["United States", "Army", "Infantry Regiment, 1st"]
        );
        assert_eq!(headings[0].relations, vec!["author"]);
        assert!(!headings[0].is_jurisdiction);
    }

    #[test]
    fn test_meeting_with_event_info() {
        let headings = parse_org("111 2  Symposium on Hydrology|d(1972 :|cKyoto, Japan)");
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].heading_type, HeadingType::Event);
        assert_eq!(
            headings[0].heading_parts,
            vec![HeadingPart {
                name: "Symposium on Hydrology".to_string(),
                qualifier: Some("1972 : Kyoto, Japan".to_string()),
            }]
        );
    }

    #[test]
    fn test_org_with_event_yields_combined() {
        let headings = parse_org(
            "110 1  United States.|bCongress|n(97th :|d1981-1982).|bHouse.|4aut",
        );
        let types: Vec<HeadingType> = headings.iter().map(|h| h.heading_type).collect();
        assert_eq!(
            types,
            vec![HeadingType::Organization, HeadingType::Event, HeadingType::Combined]
        );
        assert_eq!(names(&headings[0]), vec!["United States Congress", "House"]);
        assert_eq!(headings[0].relations, vec!["author"]);
        assert!(headings[1].relations.is_empty());
        assert!(headings[0].is_jurisdiction);
        assert_eq!(
            headings[1].heading_parts,
            vec![HeadingPart {
                name: "United States Congress".to_string(),
                qualifier: Some("97th : 1981-1982".to_string()),
            }]
        );
        assert_eq!(names(&headings[2]), vec!["United States Congress", "House"]);
    }

    #[test]
    fn test_org_x10_event_context() {
        let headings = parse_org("110 2  United States.|bCongress|n(97th :|d1981-1982).|bHouse.");
        assert_eq!(
            names(&headings[0]),
            vec!["United States", "Congress, House"]
        );
        assert_eq!(names(&headings[1]), vec!["United States, Congress"]);
        assert_eq!(
            names(&headings[2]),
            vec!["United States", "Congress", "House"]
        );
    }
}
