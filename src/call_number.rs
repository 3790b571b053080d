//! Sortable and searchable keys for call numbers.
//!
//! [`normalize`] turns a call number into a string that sorts correctly as
//! plain text: numeric runs become zero-padded tokens and spaces become
//! `!`, which sorts before every digit and letter.
//!
//! # Examples
//!
//! ```
//! use sierra_marc::call_number::{normalize, CallNumberKind};
//!
//! assert_eq!(normalize("M12.B12 B3 1921", CallNumberKind::Lc), "M!0000000012!B12!B3!0000001921");
//! assert_eq!(normalize("M12.B12 B3 1921", CallNumberKind::Search), "M12B12B31921");
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Replaces spaces in normalized output.
pub const SPACE_CHAR: char = '!';

lazy_static! {
    static ref MULTI_SPACE: Regex = Regex::new(r"\s{2,}").expect("valid regex");
    static ref LOWER_PERIOD: Regex = Regex::new(r"([a-z])\.\s*").expect("valid regex");
    static ref THOUSANDS: Regex = Regex::new(r"(\d{1,3}),(\d)").expect("valid regex");
    static ref RANGE: Regex = Regex::new(r"(\d)\s*-+\s*\d+").expect("valid regex");
    static ref LABEL: Regex = Regex::new(r"(^|\s+)[A-Za-z]+[. ]*(\d)").expect("valid regex");
    static ref PERIOD_AFTER_NON_DIGIT: Regex = Regex::new(r"([^ \d])\.").expect("valid regex");
    static ref PERIOD_BEFORE_NON_DIGIT: Regex = Regex::new(r"\.([^ \d])").expect("valid regex");
    static ref NON_DIGIT_THEN_DIGIT: Regex = Regex::new(r"([^ .\d])(\d)").expect("valid regex");
    static ref DIGIT_THEN_NON_DIGIT: Regex = Regex::new(r"(\d)([^ .\d])").expect("valid regex");
    static ref LC_CLASS_DIGIT: Regex = Regex::new(r"^([A-Z]+)(\d)").expect("valid regex");
    static ref DECIMAL_NUMBER: Regex = Regex::new(r"^\d*\.?\d+$").expect("valid regex");
    static ref INTEGER: Regex = Regex::new(r"^\d+$").expect("valid regex");
    static ref PERIOD_DIGIT: Regex = Regex::new(r"\.(\d)").expect("valid regex");
    static ref OLD_YEAR: Regex = Regex::new(r"(^|\D)(9\d\d)($|\D)").expect("valid regex");
    static ref NEW_YEAR: Regex = Regex::new(r"(^|\D)(2\d\d\d)($|\D)").expect("valid regex");
    static ref LETTER_RUN: Regex = Regex::new(r"([^A-Z .])([A-Z]+)").expect("valid regex");
    static ref SPACED_PERIOD: Regex = Regex::new(r"([^.])(\.)").expect("valid regex");
    static ref SUDOC_SEPARATORS: Regex = Regex::new(r"[/\-:]").expect("valid regex");
    static ref SEARCH_STRIP: Regex = Regex::new(r"[\s./,?\-]").expect("valid regex");
    static ref DIGIT_COMMA_DIGIT: Regex = Regex::new(r"(\d),(\d)").expect("valid regex");
    static ref SPACE_BEFORE_DIGIT: Regex = Regex::new(r"(\D)\s+(\d)").expect("valid regex");
    static ref SPACE_AFTER_DIGIT: Regex = Regex::new(r"(\d)\s+(\D)").expect("valid regex");
}

/// Call number scheme, selecting a normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallNumberKind {
    /// Library of Congress.
    Lc,
    /// Dewey Decimal.
    Dewey,
    /// US government documents (SuDoc).
    Sudoc,
    /// Local call numbers (`LPCD 100,000`). Only spacing, number padding
    /// and case are normalized; labels and decimals are kept as entered.
    Other,
    /// Search key: everything but letters and digits stripped.
    Search,
    /// Volume and copy numbers, where only the numbers matter.
    #[default]
    Default,
}

impl From<&str> for CallNumberKind {
    /// Unknown names fall back to [`CallNumberKind::Default`].
    fn from(kind: &str) -> Self {
        match kind.trim().to_ascii_lowercase().as_str() {
            "lc" => CallNumberKind::Lc,
            "dewey" => CallNumberKind::Dewey,
            "sudoc" => CallNumberKind::Sudoc,
            "other" => CallNumberKind::Other,
            "search" => CallNumberKind::Search,
            _ => CallNumberKind::Default,
        }
    }
}

impl fmt::Display for CallNumberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallNumberKind::Lc => "lc",
            CallNumberKind::Dewey => "dewey",
            CallNumberKind::Sudoc => "sudoc",
            CallNumberKind::Other => "other",
            CallNumberKind::Search => "search",
            CallNumberKind::Default => "default",
        };
        f.write_str(name)
    }
}

/// A call number paired with its scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallNumber {
    /// The call number as cataloged.
    pub call: String,
    /// Its scheme.
    pub kind: CallNumberKind,
}

impl CallNumber {
    /// Pair a call number with a scheme.
    pub fn new(call: impl Into<String>, kind: CallNumberKind) -> Self {
        CallNumber {
            call: call.into(),
            kind,
        }
    }

    /// The normalized sort key.
    #[must_use]
    pub fn normalize(&self) -> String {
        normalize(&self.call, self.kind)
    }
}

/// Normalize a call number for sorting (or, with
/// [`CallNumberKind::Search`], for searching).
#[must_use]
pub fn normalize(call: &str, kind: CallNumberKind) -> String {
    let processed = match kind {
        CallNumberKind::Lc => process_lc(call),
        CallNumberKind::Dewey => process_dewey(call),
        CallNumberKind::Sudoc => process_sudoc(call),
        CallNumberKind::Other => process_other(call),
        CallNumberKind::Search => process_search(call),
        CallNumberKind::Default => process_default(call),
    };
    processed.replace(' ', &SPACE_CHAR.to_string())
}

fn process_lc(call: &str) -> String {
    let call = normalize_spaces(call);
    let call = LOWER_PERIOD.replace_all(&call, "$1 ").to_uppercase();
    let call = normalize_numbers(&call);
    let call = normalize_decimals(&call);
    let call = LC_CLASS_DIGIT.replace(&call, "$1 $2");
    let call = DIGIT_THEN_NON_DIGIT.replace_all(&call, "$1 $2");
    numbers_to_sortable_strings(&call, true)
}

fn process_dewey(call: &str) -> String {
    let call = normalize_spaces(&call.to_uppercase());
    numbers_to_sortable_strings(&separate_numbers(&call), true)
}

fn process_sudoc(call: &str) -> String {
    let call = normalize_spaces(&call.to_uppercase());

    // Stem and suffix sort independently.
    let (stem, suffix) = match call.split_once(':') {
        Some((stem, suffix)) if !suffix.contains(':') => (stem.to_string(), suffix.to_string()),
        _ => (call.clone(), String::new()),
    };

    let mut stem = stem.replace('.', " ");
    if !stem.contains('/') {
        stem.push_str("/0");
    }
    if !stem.contains('-') {
        stem.push_str("-0");
    }

    // Years sort before letters and letters before other numbers; a
    // leading period marks a year (pre-2000 years drop the leading 1).
    let suffix = PERIOD_DIGIT.replace_all(&suffix, " $1");
    let suffix = OLD_YEAR.replace_all(&suffix, "$1.$2$3");
    let suffix = NEW_YEAR.replace_all(&suffix, "$1.$2$3");

    let joined = separate_numbers(&format!("{stem}:{suffix}"));
    let joined = numbers_to_sortable_strings(&joined, false);
    let joined = LETTER_RUN.replace_all(&joined, "$1.$2");
    let joined = SPACED_PERIOD.replace_all(&joined, "$1 $2");
    let joined = SUDOC_SEPARATORS.replace_all(&joined, " ");
    normalize_spaces(&joined)
}

fn process_other(call: &str) -> String {
    let call = normalize_numbers(&normalize_spaces(call));
    numbers_to_sortable_strings(&separate_numbers(&call), true).to_uppercase()
}

fn process_search(call: &str) -> String {
    SEARCH_STRIP.replace_all(&call.to_uppercase(), "").into_owned()
}

fn process_default(call: &str) -> String {
    let call = normalize_spaces(call);
    let call = LABEL.replace_all(&call, "$1$2");
    let call = normalize_decimals(&normalize_numbers(&call));
    numbers_to_sortable_strings(&separate_numbers(&call), true).to_uppercase()
}

fn normalize_spaces(data: &str) -> String {
    MULTI_SPACE.replace_all(data.trim(), " ").into_owned()
}

/// Drop thousands separators and the upper bound of numeric ranges.
fn normalize_numbers(data: &str) -> String {
    let data = THOUSANDS.replace_all(data, "$1$2");
    RANGE.replace_all(&data, "$1").into_owned()
}

/// Space out periods that follow non-digits; drop periods before
/// non-digits.
fn normalize_decimals(data: &str) -> String {
    let data = PERIOD_AFTER_NON_DIGIT.replace_all(data, "$1 .");
    PERIOD_BEFORE_NON_DIGIT.replace_all(&data, "$1").into_owned()
}

fn separate_numbers(data: &str) -> String {
    let data = NON_DIGIT_THEN_DIGIT.replace_all(data, "$1 $2");
    DIGIT_THEN_NON_DIGIT.replace_all(&data, "$1 $2").into_owned()
}

fn numbers_to_sortable_strings(data: &str, decimals: bool) -> String {
    data.split(' ')
        .map(|token| {
            let numeric = if decimals {
                DECIMAL_NUMBER.is_match(token)
            } else {
                INTEGER.is_match(token)
            };
            if numeric {
                sortable_number(token)
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `12` gives `0000000012`; `12.50` gives `0000000012.5`; `12.0` gives
/// `0000000012`.
fn sortable_number(token: &str) -> String {
    let (integer, fraction) = token.split_once('.').unwrap_or((token, ""));
    let integer = integer.trim_start_matches('0');
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{integer:0>10}")
    } else {
        format!("{integer:0>10}.{fraction}")
    }
}

/// Left-anchored prefixes of a call number ending at each letter or
/// digit run, for prefix searching.
#[must_use]
pub fn shingle_call_number(call: &str) -> Vec<String> {
    #[derive(PartialEq)]
    enum Class {
        Letter,
        Digit,
        Other,
    }
    let class = |c: char| {
        if c.is_ascii_digit() {
            Class::Digit
        } else if c.is_alphabetic() {
            Class::Letter
        } else {
            Class::Other
        }
    };

    let mut shingles = Vec::new();
    let mut chars = call.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let current = class(c);
        if current == Class::Other {
            continue;
        }
        let run_ends = chars.peek().map_or(true, |&(_, next)| class(next) != current);
        if run_ends {
            shingles.push(call[..i + c.len_utf8()].to_string());
        }
    }
    shingles
}

/// Shingles of a call number after closing up spaces next to digits and
/// commas inside numbers, so `MT 100` and `MT100` index alike.
#[must_use]
pub fn searchable_call_number(call: &str) -> Vec<String> {
    let call = DIGIT_COMMA_DIGIT.replace_all(call.trim(), "$1$2");
    let call = SPACE_BEFORE_DIGIT.replace_all(&call, "$1$2");
    let call = SPACE_AFTER_DIGIT.replace_all(&call, "$1$2");
    shingle_call_number(&call)
}
