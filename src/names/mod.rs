//! Personal, organization and event name headings.
//!
//! - [`person_name`] splits a personal name into forename, surname and
//!   family name.
//! - [`person_title`] recognizes honorifics and nobiliary particles in a
//!   `$c` title.
//! - [`PersonalNameParser`] and [`OrgEventNameParser`] walk the subfields of
//!   X00 and X10/X11 fields.
//! - [`PersonalNamePermutator`] generates search forms of a parsed personal
//!   name; [`shorten_name`] renders a compact form of any parsed name.
//!
//! # Examples
//!
//! ```
//! use sierra_marc::names::{shorten_name, ParsedName, PersonalNameParser, SequentialFieldParser};
//! use sierra_marc::parse_from_string;
//!
//! let field = parse_from_string("100 1  Adams, Henry,|d1838-1918.").unwrap();
//! let parsed = PersonalNameParser::new(&field).parse();
//! assert_eq!(parsed.surname.as_deref(), Some("Adams"));
//! assert_eq!(shorten_name(&ParsedName::Person(parsed)), "Adams, H.");
//! ```

mod parser;
mod permutator;

pub use parser::{
    HeadingPart, HeadingType, OrgEventHeading, OrgEventNameParser, ParsedPersonalName,
    PersonalNameParser, SequentialFieldParser,
};
pub use permutator::{NameTokens, PersonalNamePermutator};

use crate::marcdata::{NAME_PARTICLES, PERSON_PRETITLES, RELATOR_CODES};
use crate::text::{has_comma_in_middle, strip_all_punctuation, strip_ends, strip_wemi, End};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref COMMA_SPACE: Regex = Regex::new(r",\s*").expect("valid regex");
    static ref FAMILY: Regex = Regex::new(r"(?i)\s*family\b").expect("valid regex");
    static ref INITIALS_SPLIT: Regex = Regex::new(r#"[.\-,;'"\s]"#).expect("valid regex");
    static ref COMMA_BEFORE_NON_WORD: Regex = Regex::new(r", (\W)").expect("valid regex");
}

/// Forename, surname and family name of a personal name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    /// Given name(s).
    pub forename: Option<String>,
    /// Surname, without any "family" qualifier.
    pub surname: Option<String>,
    /// Full family name when the heading names a family.
    pub family_name: Option<String>,
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

/// Split a personal name (X00 `$a`) using its field indicators.
///
/// A comma between two words separates surname from forename. Without one,
/// first indicator `0` means a forename; anything else a surname, which is
/// also a family name when the indicator is `3` or the word "family"
/// appears in it.
#[must_use]
pub fn person_name(data: &str, indicators: [char; 2]) -> PersonName {
    let (mut forename, mut surname, mut family_name) =
        (String::new(), String::new(), String::new());
    if has_comma_in_middle(data) {
        let mut parts = COMMA_SPACE.splitn(data, 2);
        surname = parts.next().unwrap_or_default().to_string();
        forename = parts.next().unwrap_or_default().to_string();
    } else if indicators[0] == '0' {
        forename = data.to_string();
    } else {
        surname = data.to_string();
        if indicators[0] == '3' || FAMILY.is_match(&surname) {
            family_name.clone_from(&surname);
            surname = FAMILY.replace_all(&surname, "").into_owned();
        }
    }
    PersonName {
        forename: non_empty(strip_ends(&forename, false, End::Both)),
        surname: non_empty(strip_ends(&surname, false, End::Both)),
        family_name: non_empty(strip_ends(&family_name, false, End::Both)),
    }
}

/// Structure of a personal title such as `King of the English`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonTitle {
    /// Leading honorific that can precede a name (`King`).
    pub prefix: Option<String>,
    /// Nobiliary particle run (`of the`, `van der`).
    pub particle: Option<String>,
    /// The whole title, when it was recognized as one.
    pub full_title: Option<String>,
}

impl PersonTitle {
    /// True when anything about the title was recognized.
    #[must_use]
    pub fn is_recognized(&self) -> bool {
        self.full_title.is_some()
    }
}

fn normalized_title(words: &[&str]) -> String {
    strip_all_punctuation(&words.join(" "), true, true).to_lowercase()
}

fn particle_run(tokens: &[&str]) -> Option<String> {
    let mut run: Vec<&str> = Vec::new();
    for &token in tokens {
        let lower = token.to_lowercase();
        let is_particle = NAME_PARTICLES.contains(lower.as_str());
        if is_particle || (lower == "the" && !run.is_empty()) {
            run.push(token);
        } else {
            break;
        }
    }
    (!run.is_empty()).then(|| run.join(" "))
}

/// Parse a personal title (X00 `$c` value).
///
/// Titles starting in lowercase are checked for a leading particle
/// (`d'Abbeville` gives the particle `d`). Capitalized titles are checked
/// for a known pretitle, either the whole title (`Sir`) or a leading part
/// followed by an optional particle (`King of the English` gives `King`
/// and `of the`). Anything else (`Esquire`, `Ph.D`) is unrecognized.
#[must_use]
pub fn person_title(title: &str) -> PersonTitle {
    let title = title.trim();
    let Some(first) = title.chars().next() else {
        return PersonTitle::default();
    };
    let tokens: Vec<&str> = title
        .split(|c: char| c.is_whitespace() || c == '\'')
        .filter(|t| !t.is_empty())
        .collect();

    if first.is_lowercase() {
        return PersonTitle {
            prefix: None,
            particle: particle_run(&tokens),
            full_title: Some(title.to_string()),
        };
    }

    let words: Vec<&str> = title.split_whitespace().collect();
    if PERSON_PRETITLES.contains(normalized_title(&words).as_str()) {
        return PersonTitle {
            prefix: Some(title.to_string()),
            particle: None,
            full_title: Some(title.to_string()),
        };
    }

    for k in (1..words.len()).rev() {
        let candidate = normalized_title(&words[..k]);
        if PERSON_PRETITLES.contains(candidate.as_str())
            && !NAME_PARTICLES.contains(candidate.as_str())
        {
            let rest: Vec<&str> = words[k..]
                .iter()
                .flat_map(|w| w.split('\'').filter(|t| !t.is_empty()))
                .collect();
            return PersonTitle {
                prefix: Some(words[..k].join(" ")),
                particle: particle_run(&rest),
                full_title: Some(title.to_string()),
            };
        }
    }
    PersonTitle::default()
}

/// Extract relator terms from a relator subfield.
///
/// From `$4` (`from_code`), the whole value is looked up as a relator code.
/// From `$e`/`$j`, the value is split on commas and each term cleaned.
#[must_use]
pub fn extract_relator_terms(data: &str, from_code: bool) -> Vec<String> {
    if from_code {
        return RELATOR_CODES
            .get(data.trim())
            .map(|term| vec![(*term).to_string()])
            .unwrap_or_default();
    }
    data.split(',')
        .map(|term| strip_ends(&strip_wemi(term), false, End::Both))
        .filter(|term| !term.is_empty())
        .collect()
}

/// Append each relator to the base name (`Joe Smith author`).
#[must_use]
pub fn make_relator_search_variations(base_name: &str, relators: &[String]) -> Vec<String> {
    relators.iter().map(|r| format!("{base_name} {r}")).collect()
}

/// Render `$3` materials specified values: `(v. 1, v. 2)`.
#[must_use]
pub fn format_materials_specified(materials_specified: &[String]) -> String {
    format!("({})", materials_specified.join(", "))
}

/// A parsed personal, organization or event name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParsedName {
    /// Result of [`PersonalNameParser`].
    Person(ParsedPersonalName),
    /// One heading from [`OrgEventNameParser`].
    OrgEvent(OrgEventHeading),
}

/// Render a short name, as used in title slugs (`Beethoven, L.v.`).
///
/// Persons give the surname (or forename) plus numeration, followed by
/// forename initials when both name parts exist, or else by the titles.
/// Organizations and events give their only part, both of two parts, or
/// the first and last of three or more joined by ` ... `.
#[must_use]
pub fn shorten_name(parsed: &ParsedName) -> String {
    match parsed {
        ParsedName::Person(name) => {
            let mut first = name
                .surname
                .clone()
                .or_else(|| name.forename.clone())
                .unwrap_or_default();
            if let Some(numeration) = &name.numeration {
                first = format!("{first} {numeration}");
            }
            let mut second = String::new();
            if let (Some(_), Some(forename)) = (&name.surname, &name.forename) {
                let initials: Vec<String> = INITIALS_SPLIT
                    .split(forename)
                    .filter_map(|part| part.chars().next())
                    .map(String::from)
                    .collect();
                if !initials.is_empty() {
                    second = format!("{}.", initials.join("."));
                }
            } else if !name.person_titles.is_empty() {
                second = COMMA_BEFORE_NON_WORD
                    .replace_all(&name.person_titles.join(", "), " $1")
                    .into_owned();
            }
            [first, second]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        },
        ParsedName::OrgEvent(heading) => {
            let parts: Vec<&str> = heading.heading_parts.iter().map(|p| p.name.as_str()).collect();
            match parts.as_slice() {
                [] => String::new(),
                [only] => (*only).to_string(),
                [a, b] => format!("{a}, {b}"),
                [first, .., last] => format!("{first} ... {last}"),
            }
        },
    }
}
