//! MARC record structures and operations.
//!
//! This module provides the core record types:
//! - [`Record`] - Leader plus an ordered list of fields
//! - [`Field`] - A control field (001-009) or a data field (010+), carrying
//!   an optional Sierra field group tag
//! - [`Subfield`] - Named data elements within data fields
//!
//! Fields can be addressed by MARC tag (`"100"`), by group tag (`"a"`), or
//! by both at once (`"a100"`).
//!
//! # Examples
//!
//! ```
//! use sierra_marc::{Field, Leader, Record, Subfield};
//!
//! let mut record = Record::new(Leader::default());
//! record.add_field(Field::control("001", "ocm012345678").unwrap());
//! record.add_field(
//!     Field::data("245", [' ', '0'], vec![Subfield::new('a', "A title")])
//!         .unwrap()
//!         .with_group_tag('t'),
//! );
//!
//! assert_eq!(record.get_fields(&["t"]).len(), 1);
//! assert_eq!(record.get_fields(&["t245"]).len(), 1);
//! assert_eq!(record.get_fields(&["a245"]).len(), 0);
//! ```

use crate::error::{MarcError, Result};
use crate::leader::Leader;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Blank group tag used for fields that carry no Sierra classification.
pub const BLANK_GROUP_TAG: char = ' ';

/// Returns true for tags that denote control fields (`"001"`-`"009"`).
#[must_use]
pub fn is_control_tag(tag: &str) -> bool {
    tag.len() == 3 && tag.bytes().all(|b| b.is_ascii_digit()) && tag < "010"
}

/// A subfield in a data field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Subfield value
    pub value: String,
}

impl Subfield {
    /// Create a subfield.
    pub fn new(code: char, value: impl Into<String>) -> Self {
        Subfield {
            code,
            value: value.into(),
        }
    }
}

/// Content of a field: control data or indicators plus subfields, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldContent {
    /// Raw data of a control field.
    Control(String),
    /// Indicators and ordered subfields of a data field.
    Data {
        /// The two indicator values (blank is a space).
        indicators: [char; 2],
        /// Subfields in field order.
        subfields: SmallVec<[Subfield; 4]>,
    },
}

/// A MARC field with an optional Sierra group tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    tag: String,
    group_tag: char,
    content: FieldContent,
}

fn check_tag(tag: &str) -> Result<()> {
    if tag.chars().count() == 3 && tag.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(MarcError::InvalidField(format!(
            "Tag must be 3 alphanumeric characters, got {tag:?}"
        )))
    }
}

impl Field {
    /// Create a control field.
    ///
    /// # Errors
    ///
    /// Returns an error if `tag` is not a control tag (`001`-`009`).
    pub fn control(tag: impl Into<String>, data: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        check_tag(&tag)?;
        if !is_control_tag(&tag) {
            return Err(MarcError::InvalidField(format!(
                "Tag {tag} cannot hold control data"
            )));
        }
        Ok(Field {
            tag,
            group_tag: BLANK_GROUP_TAG,
            content: FieldContent::Control(data.into()),
        })
    }

    /// Create a data field from indicators and subfields.
    ///
    /// # Errors
    ///
    /// Returns an error if `tag` is malformed or is a control tag.
    pub fn data(
        tag: impl Into<String>,
        indicators: [char; 2],
        subfields: impl IntoIterator<Item = Subfield>,
    ) -> Result<Self> {
        let tag = tag.into();
        check_tag(&tag)?;
        if is_control_tag(&tag) {
            return Err(MarcError::InvalidField(format!(
                "Control tag {tag} cannot hold indicators or subfields"
            )));
        }
        Ok(Field {
            tag,
            group_tag: BLANK_GROUP_TAG,
            content: FieldContent::Data {
                indicators,
                subfields: subfields.into_iter().collect(),
            },
        })
    }

    /// Set the group tag, returning the field.
    #[must_use]
    pub fn with_group_tag(mut self, group_tag: char) -> Self {
        self.group_tag = group_tag;
        self
    }

    /// MARC tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Sierra field group tag (a space when blank).
    #[must_use]
    pub fn group_tag(&self) -> char {
        self.group_tag
    }

    /// Group tag followed by MARC tag, e.g. `"a100"` or `" 245"`.
    #[must_use]
    pub fn full_tag(&self) -> String {
        format!("{}{}", self.group_tag, self.tag)
    }

    /// Field content.
    #[must_use]
    pub fn content(&self) -> &FieldContent {
        &self.content
    }

    /// True for control fields.
    #[must_use]
    pub fn is_control(&self) -> bool {
        matches!(self.content, FieldContent::Control(_))
    }

    /// Control field data, if this is a control field.
    #[must_use]
    pub fn control_data(&self) -> Option<&str> {
        match &self.content {
            FieldContent::Control(data) => Some(data),
            FieldContent::Data { .. } => None,
        }
    }

    /// Indicators, if this is a data field.
    #[must_use]
    pub fn indicators(&self) -> Option<[char; 2]> {
        match &self.content {
            FieldContent::Data { indicators, .. } => Some(*indicators),
            FieldContent::Control(_) => None,
        }
    }

    /// First indicator, or a space for control fields.
    #[must_use]
    pub fn indicator1(&self) -> char {
        self.indicators().map_or(' ', |i| i[0])
    }

    /// Second indicator, or a space for control fields.
    #[must_use]
    pub fn indicator2(&self) -> char {
        self.indicators().map_or(' ', |i| i[1])
    }

    /// Subfields in order; empty for control fields.
    #[must_use]
    pub fn subfields(&self) -> &[Subfield] {
        match &self.content {
            FieldContent::Data { subfields, .. } => subfields,
            FieldContent::Control(_) => &[],
        }
    }

    /// Append a subfield.
    ///
    /// # Errors
    ///
    /// Returns an error when called on a control field.
    pub fn add_subfield(&mut self, code: char, value: impl Into<String>) -> Result<()> {
        match &mut self.content {
            FieldContent::Data { subfields, .. } => {
                subfields.push(Subfield::new(code, value));
                Ok(())
            },
            FieldContent::Control(_) => Err(MarcError::InvalidField(format!(
                "Control field {} has no subfields",
                self.tag
            ))),
        }
    }

    /// Does this field match `candidate`?
    ///
    /// The candidate may be the MARC tag (`"100"`), the group tag (`"a"`),
    /// or both (`"a100"`).
    #[must_use]
    pub fn matches_tag(&self, candidate: &str) -> bool {
        if candidate == self.tag {
            return true;
        }
        let mut chars = candidate.chars();
        match chars.next() {
            Some(first) if first == self.group_tag => {
                let rest = chars.as_str();
                rest.is_empty() || rest == self.tag
            },
            _ => false,
        }
    }

    /// Yield `(code, value)` pairs in field order, keeping a pair when its
    /// code is in `include` (or `include` is empty) and not in `exclude`.
    pub fn filter_subfields<'a>(
        &'a self,
        include: &'a str,
        exclude: &'a str,
    ) -> impl Iterator<Item = (char, &'a str)> + 'a {
        self.subfields()
            .iter()
            .filter(move |sf| {
                (include.is_empty() || include.contains(sf.code)) && !exclude.contains(sf.code)
            })
            .map(|sf| (sf.code, sf.value.as_str()))
    }

    /// Values of all subfields with the given code, in order.
    pub fn subfields_by_code(&self, code: char) -> impl Iterator<Item = &str> {
        self.subfields()
            .iter()
            .filter(move |sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// First value for a subfield code.
    #[must_use]
    pub fn get_subfield(&self, code: char) -> Option<&str> {
        self.subfields_by_code(code).next()
    }

    /// Field value as plain text: control data, or subfield values joined
    /// by a space.
    #[must_use]
    pub fn value(&self) -> String {
        match &self.content {
            FieldContent::Control(data) => data.clone(),
            FieldContent::Data { subfields, .. } => subfields
                .iter()
                .map(|sf| sf.value.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

fn marcedit_blank(c: char) -> char {
    if c == ' ' {
        '\\'
    } else {
        c
    }
}

impl fmt::Display for Field {
    /// MARCEdit-style line, e.g. `=245  10$aTitle :$bsubtitle`. Blanks in
    /// indicators and control data render as `\`. A non-blank group tag is
    /// written in front of the tag.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("=")?;
        if self.group_tag != BLANK_GROUP_TAG {
            write!(f, "{}", self.group_tag)?;
        }
        write!(f, "{}  ", self.tag)?;
        match &self.content {
            FieldContent::Control(data) => {
                for c in data.chars() {
                    write!(f, "{}", marcedit_blank(c))?;
                }
            },
            FieldContent::Data {
                indicators,
                subfields,
            } => {
                write!(
                    f,
                    "{}{}",
                    marcedit_blank(indicators[0]),
                    marcedit_blank(indicators[1])
                )?;
                for sf in subfields {
                    write!(f, "${}{}", sf.code, sf.value)?;
                }
            },
        }
        Ok(())
    }
}

/// A MARC record: leader plus fields in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record leader (24 bytes)
    pub leader: Leader,
    /// Fields in record order
    pub fields: Vec<Field>,
    /// Identifier of the source record this was compiled from
    pub record_num: Option<String>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            leader,
            fields: Vec::new(),
            record_num: None,
        }
    }

    /// Set the source record number, returning the record.
    #[must_use]
    pub fn with_record_num(mut self, record_num: impl Into<String>) -> Self {
        self.record_num = Some(record_num.into());
        self
    }

    /// Append a field.
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Append several fields in order.
    pub fn add_fields(&mut self, fields: impl IntoIterator<Item = Field>) {
        self.fields.extend(fields);
    }

    /// Fields matching any of `tags` (see [`Field::matches_tag`]), in record
    /// order. An empty slice returns every field.
    #[must_use]
    pub fn get_fields(&self, tags: &[&str]) -> Vec<&Field> {
        self.fields
            .iter()
            .filter(|f| tags.is_empty() || tags.iter().any(|t| f.matches_tag(t)))
            .collect()
    }

    /// Lazy form of [`Record::get_fields`].
    pub fn fields_matching<'a>(&'a self, tags: &'a [&'a str]) -> impl Iterator<Item = &'a Field> {
        self.fields
            .iter()
            .filter(move |f| tags.is_empty() || tags.iter().any(|t| f.matches_tag(t)))
    }

    /// Fields matching any `include` specifier (all fields if empty) and
    /// none of the `exclude` specifiers.
    pub fn filter_fields<'a>(
        &'a self,
        include: &'a [&'a str],
        exclude: &'a [&'a str],
    ) -> impl Iterator<Item = &'a Field> {
        self.fields_matching(include)
            .filter(move |f| !exclude.iter().any(|ex| f.matches_tag(ex)))
    }

    /// First field matching `tag`.
    #[must_use]
    pub fn get_field(&self, tag: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.matches_tag(tag))
    }

    /// Data of the first control field with `tag`.
    #[must_use]
    pub fn get_control_field(&self, tag: &str) -> Option<&str> {
        self.get_field(tag).and_then(Field::control_data)
    }

    /// Remove every field matching `tag`, returning them.
    pub fn remove_fields(&mut self, tag: &str) -> Vec<Field> {
        let (removed, kept) = std::mem::take(&mut self.fields)
            .into_iter()
            .partition(|f| f.matches_tag(tag));
        self.fields = kept;
        removed
    }
}

impl fmt::Display for Record {
    /// MARCEdit-style listing: `=LDR  ` line followed by one line per field.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "=LDR  {}", self.leader.to_string().replace(' ', "\\"))?;
        for field in &self.fields {
            write!(f, "\n{field}")?;
        }
        Ok(())
    }
}
