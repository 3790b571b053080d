//! Parsing human-authored MARC field strings.
//!
//! [`parse_from_string`] accepts the transcription conventions catalogers
//! copy and paste between tools:
//!
//! - LC documentation style: `100   1#$aBullett, Gerald William,$d1894-1958.`
//! - OCLC documentation style: `100  1  Bullett ǂd 1894-1958.`
//! - MARCEdit style: `=100  1\$aBullett, Gerald William,$d1894-1958.`
//! - Sierra style with a group tag: `a100 1  Bullett, Gerald William,|d1894-1958.`
//! - Control fields: `001 ocn012345678`
//! - Control fields with a character-position range: `008/18-21 b###`
//!
//! # Examples
//!
//! ```
//! use sierra_marc::parse_from_string;
//!
//! let field = parse_from_string("a100 1  Bullett, Gerald William,|d1894-1958.").unwrap();
//! assert_eq!(field.tag(), "100");
//! assert_eq!(field.group_tag(), 'a');
//! assert_eq!(field.indicators(), Some(['1', ' ']));
//! assert_eq!(field.get_subfield('d'), Some("1894-1958."));
//! ```

use crate::error::{MarcError, Result};
use crate::record::{is_control_tag, Field, Subfield};
use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;

lazy_static! {
    static ref NEWLINE: Regex = Regex::new(r"\n\s*").expect("valid regex");
    static ref TAG: Regex =
        Regex::new(r"^[\s=]*([a-z])?(\d{3})(/[\d\-]+)?(.*)$").expect("valid regex");
    static ref INDICATORS: Regex =
        Regex::new(r"^\s*([\s\d#\\])\s*([\s\d#\\])\s*(\S.*)$").expect("valid regex");
    static ref DOUBLE_DAGGER: Regex = Regex::new(r"\s?ǂ(.)\s").expect("valid regex");
}

fn blank(c: char) -> char {
    match c {
        '#' | '\\' => ' ',
        c if c.is_whitespace() => ' ',
        c => c,
    }
}

/// Parse a formatted MARC field string into a [`Field`].
///
/// For control fields, spaces between the tag and the first data character
/// are dropped; `#` and `\` stand for blanks. A `/start-end` range after the
/// tag left-pads the data with `start` spaces.
///
/// For data fields the first two indicator-like characters (digit, space,
/// `#`, `\`) become indicators. When spaces both separate and stand for
/// blanks, a character against the subfield data is the second indicator:
/// `100  1 $a` gives `1` and blank; `100  1$a` gives blank and `1`.
/// Subfields are delimited by `$` or `|`; text without a leading delimiter
/// is an implicit `$a`.
///
/// # Errors
///
/// Returns [`MarcError::ParseError`] when no tag or no indicators can be
/// found.
pub fn parse_from_string(field_string: &str) -> Result<Field> {
    let fstring = NEWLINE.replace_all(field_string, " ");
    let caps = TAG
        .captures(&fstring)
        .ok_or_else(|| MarcError::ParseError(format!("No field tag in {field_string:?}")))?;
    let group_tag = caps
        .get(1)
        .and_then(|m| m.as_str().chars().next())
        .unwrap_or(' ');
    let tag = &caps[2];
    let remainder = caps.get(4).map_or("", |m| m.as_str());

    let field = if is_control_tag(tag) {
        let mut data: String = remainder.trim_start().chars().map(|c| match c {
            '#' | '\\' => ' ',
            c => c,
        })
        .collect();
        if let Some(range) = caps.get(3) {
            let start = range.as_str()[1..]
                .split('-')
                .next()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(0);
            data.insert_str(0, &" ".repeat(start));
        }
        Field::control(tag, data)?
    } else {
        let ind = INDICATORS.captures(remainder).ok_or_else(|| {
            MarcError::ParseError(format!("No indicators or data in {field_string:?}"))
        })?;
        let ind1 = ind[1].chars().next().map_or(' ', blank);
        let ind2 = ind[2].chars().next().map_or(' ', blank);
        let mut sf_str = DOUBLE_DAGGER.replace_all(&ind[3], "$$$1").into_owned();
        if !sf_str.starts_with(['$', '|']) {
            sf_str.insert_str(0, "$a");
        }
        Field::data(tag, [ind1, ind2], split_subfields(&sf_str))?
    };
    Ok(field.with_group_tag(group_tag))
}

/// Split `$aValue|bValue` style text on `$` or `|` delimiters. Text before
/// the first delimiter is dropped.
pub(crate) fn split_subfields(text: &str) -> Vec<Subfield> {
    let mut subfields: Vec<Subfield> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut in_subfield = false;
    while let Some(c) = chars.next() {
        if c == '$' || c == '|' {
            if let Some(code) = chars.next_if(|n| *n != '\n') {
                subfields.push(Subfield::new(code, String::new()));
                in_subfield = true;
                continue;
            }
        }
        if in_subfield {
            if let Some(last) = subfields.last_mut() {
                last.value.push(c);
            }
        }
    }
    subfields
}

impl FromStr for Field {
    type Err = MarcError;

    fn from_str(s: &str) -> Result<Self> {
        parse_from_string(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sf(field: &Field) -> Vec<(char, &str)> {
        field.filter_subfields("", "").collect()
    }

    #[test]
    fn test_lc_docs_style() {
        let f = parse_from_string("100   1#$aBullett, Gerald William,$d1894-1958.").unwrap();
        assert_eq!(f.tag(), "100");
        assert_eq!(f.group_tag(), ' ');
        assert_eq!(f.indicators(), Some(['1', ' ']));
        assert_eq!(
            sf(&f),
            vec![('a', "Bullett, Gerald William,"), ('d', "1894-1958.")]
        );
    }

    #[test]
    fn test_oclc_docs_style() {
        let f = parse_from_string("100  1  Bullett ǂd 1894-1958.").unwrap();
        assert_eq!(f.indicators(), Some(['1', ' ']));
        assert_eq!(sf(&f), vec![('a', "Bullett"), ('d', "1894-1958.")]);
    }

    #[test]
    fn test_marcedit_style() {
        let f = parse_from_string("=100  1\\$aBullett, Gerald William,$d1894-1958.").unwrap();
        assert_eq!(f.indicators(), Some(['1', ' ']));
        assert_eq!(f.get_subfield('a'), Some("Bullett, Gerald William,"));
    }

    #[test]
    fn test_sierra_style_with_group_tag() {
        let f = parse_from_string("a100 1  Bullett, Gerald William,|d1894-1958.").unwrap();
        assert_eq!(f.group_tag(), 'a');
        assert_eq!(f.indicators(), Some(['1', ' ']));
        assert_eq!(
            sf(&f),
            vec![('a', "Bullett, Gerald William,"), ('d', "1894-1958.")]
        );
    }

    #[test]
    fn test_indicator_ambiguity() {
        let f = parse_from_string("100  1 $aName").unwrap();
        assert_eq!(f.indicators(), Some(['1', ' ']));
        let f = parse_from_string("100  1$aName").unwrap();
        assert_eq!(f.indicators(), Some([' ', '1']));
    }

    #[test]
    fn test_control_fields() {
        let f = parse_from_string("001 ocn012345678").unwrap();
        assert_eq!(f.control_data(), Some("ocn012345678"));

        let f = parse_from_string("008/18-21 b###").unwrap();
        assert_eq!(f.control_data(), Some(format!("{}b   ", " ".repeat(18)).as_str()));

        let f = parse_from_string("=008  830419m1\\8").unwrap();
        assert_eq!(f.control_data(), Some("830419m1 8"));
    }

    #[test]
    fn test_display_output_parses_back() {
        let original = parse_from_string("t245 10 Title :|bsubtitle /|cby me.").unwrap();
        let reparsed: Field = original.to_string().parse().unwrap();
        assert_eq!(original, reparsed);
    }

    #[test]
    fn test_unparseable_strings() {
        assert!(parse_from_string("no tag here").is_err());
        assert!(parse_from_string("245").is_err());
    }
}
