//! Normalization of free-text catalog data.
//!
//! MARC field content carries ISBD punctuation that is structural (a `/`
//! before a statement of responsibility, a `.` closing a name) alongside
//! punctuation that belongs to the data itself (`Dr.`, `J.R.R.`, `3.`).
//! The functions here clean the former while preserving the latter:
//!
//! - Whitespace and punctuation compression ([`normalize_whitespace`],
//!   [`compress_punctuation`], [`normalize_punctuation`], [`strip_ends`])
//! - Bracket handling ([`strip_brackets`], [`BracketStripper`],
//!   [`deconstruct_bracketed`], [`strip_outer_parentheses`])
//! - Period protection ([`protect_periods`], [`PeriodProtector`])
//! - The composed display pipeline [`clean`]
//! - Date helpers ([`extract_years`], [`split_pdate_and_cdate`],
//!   [`normalize_cr_symbol`])
//!
//! Every function is total: malformed input yields, at worst, unchanged
//! output.
//!
//! # Examples
//!
//! ```
//! use sierra_marc::text::{clean, extract_years};
//!
//! assert_eq!(
//!     clean("A title : subtitle / ed. by John Doe."),
//!     "A title : subtitle / ed. by John Doe"
//! );
//! assert_eq!(extract_years("19th century"), vec!["18uu".to_string()]);
//! ```

use crate::marcdata::ABBREVIATIONS;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

/// Punctuation that typically ends a MARC subfield.
pub const ENDING_PUNCTUATION: &str = "./;:,";

/// Punctuation that should not have whitespace to its immediate left.
pub const NO_LEFT_WHITESPACE_PUNCTUATION: &str = ".;:,";

/// Every character [`strip_all_punctuation`] removes.
pub const ALL_PUNCTUATION: &str = r#"[]{}|\'":;<,>.?/~`!@#$%^&*()-_+="#;

/// Stand-in for a protected period. A private-use code point that is not a
/// word character; stray copies in the input are dropped when protecting.
pub const PERIOD_SENTINEL: char = '\u{E000}';

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
    static ref ROMAN_NUMERAL: Regex =
        Regex::new(r"^M*(C[MD]|D?C{0,3})(X[CL]|L?X{0,3})(I[XV]|V?I{0,3})$").expect("valid regex");
    static ref ORDINAL: Regex = Regex::new(r"^(\d{1,3}|\d+[A-Za-z]+)$").expect("valid regex");

    static ref BRACKET_FRONT_PUNCT: Regex =
        Regex::new(r"([\[{(])(\s*[./;:,]\s*)+").expect("valid regex");
    static ref BRACKET_END_PUNCT: Regex =
        Regex::new(r"(\s*[./;:,]\s*)+([\]})])").expect("valid regex");
    static ref EMPTY_BRACKETS: Regex =
        Regex::new(r"\[\s*\]|\(\s*\)|\{\s*\}").expect("valid regex");
    static ref MULTIPLE_PUNCT: Regex =
        Regex::new(r"(\s?)(\s*[./;:,])+\s*([./;:,])(\s|$)").expect("valid regex");
    static ref PERIOD_AFTER_PROTECTED: Regex =
        Regex::new(r"\x{E000}(\s*\.)(\s*[^.]|$)").expect("valid regex");
    static ref FRONT_PUNCT: Regex = Regex::new(r"^(\s*[./;:,]\s*)+").expect("valid regex");

    static ref DEFAULT_BRACKET_PROTECT: Regex =
        Regex::new(r"\[(i\.\s*e\.[^\]]*|sic\.?)\]").expect("valid regex");
    static ref DEFAULT_BRACKET_REMOVE: Regex =
        Regex::new(r"(^|\s*)\[(et al\.)\]").expect("valid regex");
    static ref BRACKETS_ONLY: Regex = Regex::new(r"[\[\]]").expect("valid regex");
    static ref BRACKETS_AND_CONTENT: Regex =
        Regex::new(r"(^|\s*)\[[^\]]*\]").expect("valid regex");
    static ref CURLY: Regex = Regex::new(r"\{([^}]*)\}").expect("valid regex");

    static ref WEMI: Regex =
        Regex::new(r"(?i)\s*\((work|expression|manifestation|item)\)").expect("valid regex");
    static ref UNKNOWN_PUB: Regex =
        Regex::new(r"[A-Za-z\s]+ not identified|\b[Ss]\.?\s*[LlNn]\b\.?\s*").expect("valid regex");
    static ref COPYRIGHT_DATE: Regex = Regex::new(
        r"(^|\s+)((\(c\)|c|C|©|copyright|cop\.?|\(p\)|p|P|℗|phonogram)\s*\d{4}.*)$"
    )
    .expect("valid regex");
    static ref COPYRIGHT_LABEL: Regex =
        Regex::new(r"(^|\s+)(\(c\)|c|C|©|copyright|cop\.?)\s*(\d{4})").expect("valid regex");
    static ref PHONOGRAM_LABEL: Regex =
        Regex::new(r"(^|\s+)(\(p\)|p|P|℗|phonogram)\s*(\d{4})").expect("valid regex");

    static ref DEFAULT_PROTECTOR: PeriodProtector = PeriodProtector::default();
    static ref DEFAULT_BRACKET_STRIPPER: BracketStripper = BracketStripper::default();
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True if the string has a comma between two non-blank parts.
#[must_use]
pub fn has_comma_in_middle(data: &str) -> bool {
    data.split(',').filter(|p| !p.trim().is_empty()).count() > 1
}

/// Collapse every whitespace run to one space and trim both ends.
#[must_use]
pub fn normalize_whitespace(data: &str) -> String {
    WHITESPACE.replace_all(data, " ").trim().to_string()
}

/// Remove whitespace immediately to the left of any character in
/// `punctuation`.
#[must_use]
pub fn compress_punctuation(data: &str, punctuation: &str) -> String {
    compress_before(data, |c, _| punctuation.contains(c))
}

/// Drop whitespace runs whose following character satisfies `keep_tight`,
/// which also sees the text after that character.
fn compress_before(data: &str, keep_tight: impl Fn(char, &str) -> bool) -> String {
    let mut out = String::with_capacity(data.len());
    let mut pending = String::new();
    for (i, c) in data.char_indices() {
        if c.is_whitespace() {
            pending.push(c);
            continue;
        }
        if !pending.is_empty() {
            if !keep_tight(c, &data[i + c.len_utf8()..]) {
                out.push_str(&pending);
            }
            pending.clear();
        }
        out.push(c);
    }
    out.push_str(&pending);
    out
}

/// Remove (or replace with a space) every character in [`ALL_PUNCTUATION`].
///
/// With `normalize_space`, whitespace is collapsed and trimmed afterward.
#[must_use]
pub fn strip_all_punctuation(
    data: &str,
    replace_with_space: bool,
    normalize_space: bool,
) -> String {
    let stripped: String = data
        .chars()
        .filter_map(|c| {
            if !ALL_PUNCTUATION.contains(c) {
                Some(c)
            } else if replace_with_space {
                Some(' ')
            } else {
                None
            }
        })
        .collect();
    if normalize_space {
        normalize_whitespace(&stripped)
    } else {
        stripped
    }
}

/// Replaces non-structural periods with [`PERIOD_SENTINEL`].
///
/// A period is non-structural when it sits inside a word (`U.S`), is part
/// of an ellipsis, or ends an initial (`J.`), an abbreviation (`ed.`), an
/// ordinal or short number (`3.`, `2nd.`), a roman numeral (`II.`), or a
/// long number followed by lowercase text (`1984. edition`).
#[derive(Debug, Clone)]
pub struct PeriodProtector {
    abbreviations: HashSet<String>,
}

impl Default for PeriodProtector {
    fn default() -> Self {
        PeriodProtector::new(ABBREVIATIONS.iter().copied())
    }
}

impl PeriodProtector {
    /// Create a protector recognizing the given abbreviations (without
    /// their trailing period, case-sensitive).
    pub fn new<I, S>(abbreviations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PeriodProtector {
            abbreviations: abbreviations.into_iter().map(Into::into).collect(),
        }
    }

    /// Replace every non-structural period with [`PERIOD_SENTINEL`].
    ///
    /// Any sentinel already present in `data` is dropped first, so
    /// restoring never invents a period.
    #[must_use]
    pub fn protect(&self, data: &str) -> String {
        let mut chars: Vec<char> = data.chars().filter(|c| *c != PERIOD_SENTINEL).collect();

        for i in 0..chars.len() {
            if chars[i] == '.' && chars.get(i + 1).is_some_and(|c| is_word_char(*c)) {
                chars[i] = PERIOD_SENTINEL;
            }
        }

        let mut i = 0;
        while i < chars.len() {
            if chars[i] != '.' {
                i += 1;
                continue;
            }
            let run_end = chars[i..]
                .iter()
                .position(|c| *c != '.')
                .map_or(chars.len(), |p| i + p);
            let ellipsis_len = (run_end - i) / 3 * 3;
            for c in &mut chars[i..i + ellipsis_len] {
                *c = PERIOD_SENTINEL;
            }
            i = run_end;
        }

        let periods: Vec<usize> = (0..chars.len()).filter(|&i| chars[i] == '.').collect();
        for i in periods {
            let word_start = chars[..i]
                .iter()
                .rposition(|c| !is_word_char(*c))
                .map_or(0, |p| p + 1);
            if word_start == i {
                continue;
            }
            let word: String = chars[word_start..i].iter().collect();
            if self.is_protected_word(&word, &chars[i + 1..]) {
                chars[i] = PERIOD_SENTINEL;
            }
        }

        chars.into_iter().collect()
    }

    fn is_protected_word(&self, word: &str, after: &[char]) -> bool {
        let followed_by_non_word = after.first().is_some_and(|c| !is_word_char(*c));
        if followed_by_non_word && (ORDINAL.is_match(word) || ROMAN_NUMERAL.is_match(word)) {
            return true;
        }
        if word.chars().all(|c| c.is_ascii_digit()) {
            let next_word_char = after.iter().find(|c| is_word_char(**c));
            if next_word_char.is_some_and(char::is_ascii_lowercase) {
                return true;
            }
        }
        let mut letters = word.chars();
        let single_capital = matches!(
            (letters.next(), letters.next()),
            (Some(c), None) if c.is_ascii_uppercase()
        );
        single_capital || self.abbreviations.contains(word)
    }

    /// Turn every [`PERIOD_SENTINEL`] back into a period.
    #[must_use]
    pub fn restore(&self, data: &str) -> String {
        restore_periods(data)
    }

    /// Protect periods, run `transform`, then restore periods.
    pub fn apply(&self, data: &str, transform: impl FnOnce(&str) -> String) -> String {
        restore_periods(&transform(&self.protect(data)))
    }
}

/// Protect non-structural periods using the default abbreviation list.
#[must_use]
pub fn protect_periods(data: &str) -> String {
    DEFAULT_PROTECTOR.protect(data)
}

/// Undo [`protect_periods`].
#[must_use]
pub fn restore_periods(data: &str) -> String {
    data.replace(PERIOD_SENTINEL, ".")
}

/// Run `transform` with non-structural periods protected.
pub fn protect_periods_and_do(data: &str, transform: impl FnOnce(&str) -> String) -> String {
    DEFAULT_PROTECTOR.apply(data, transform)
}

/// Collapse repeated ending punctuation, drop punctuation just inside
/// brackets and at the front of the string, and remove empty brackets.
///
/// Pass `periods_protected` when the input already went through
/// [`protect_periods`] (the sentinel is then left in place).
#[must_use]
pub fn normalize_punctuation(data: &str, periods_protected: bool) -> String {
    let trimmed = data.trim();
    let normalized = if periods_protected {
        normalize_protected_punctuation(trimmed)
    } else {
        protect_periods_and_do(trimmed, normalize_protected_punctuation)
    };
    compress_before(&normalized, |c, rest| {
        c == ',' || (c == '.' && !rest.starts_with(".."))
    })
}

fn normalize_protected_punctuation(data: &str) -> String {
    let s = BRACKET_FRONT_PUNCT.replace_all(data, "$1");
    let s = BRACKET_END_PUNCT.replace_all(&s, "$2");
    let s = EMPTY_BRACKETS.replace_all(&s, "");
    let s = MULTIPLE_PUNCT.replace_all(&s, "$1$3$4");
    let s = PERIOD_AFTER_PROTECTED.replace_all(&s, "\u{E000}$2");
    FRONT_PUNCT.replace(&s, "").into_owned()
}

/// Which end(s) of a string [`strip_ends`] works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum End {
    /// Both ends; parentheses enclosing the whole string are removed too.
    #[default]
    Both,
    /// Leading characters only.
    Left,
    /// Trailing characters only.
    Right,
}

/// Strip ending punctuation and whitespace from one or both ends,
/// retaining periods that belong to abbreviations.
///
/// At least one character always survives, so a string made only of
/// punctuation keeps its first (or last) mark.
#[must_use]
pub fn strip_ends(data: &str, periods_protected: bool, end: End) -> String {
    if periods_protected {
        strip_protected_ends(data, end)
    } else {
        protect_periods_and_do(data, |s| strip_protected_ends(s, end))
    }
}

fn is_ending_or_space(c: char) -> bool {
    c.is_whitespace() || ENDING_PUNCTUATION.contains(c)
}

fn trim_start_keep_one(s: &str) -> &str {
    let mut rest = s;
    while let Some(c) = rest.chars().next() {
        if !is_ending_or_space(c) || rest.len() == c.len_utf8() {
            break;
        }
        rest = &rest[c.len_utf8()..];
    }
    rest
}

fn trim_end_keep_one(s: &str) -> &str {
    let mut rest = s;
    while let Some(c) = rest.chars().next_back() {
        if !is_ending_or_space(c) || rest.len() == c.len_utf8() {
            break;
        }
        rest = &rest[..rest.len() - c.len_utf8()];
    }
    rest
}

fn strip_protected_ends(data: &str, end: End) -> String {
    let mut current = data.to_string();
    loop {
        let mut s = current.as_str();
        if matches!(end, End::Both | End::Left) {
            s = trim_start_keep_one(s);
        }
        if matches!(end, End::Both | End::Right) {
            s = trim_end_keep_one(s);
        }
        let next = if end == End::Both && s.starts_with('(') && s.ends_with(')') {
            strip_outer_parentheses(s, false)
        } else {
            s.to_string()
        };
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Strips square brackets, with control over bracketed content.
///
/// With `keep_inner` the brackets go and their content stays, except
/// content matching the remove pattern, which goes too. Without it both go,
/// except content matching the keep pattern, which stays. Content matching
/// the protect pattern keeps its brackets either way.
#[derive(Debug, Clone)]
pub struct BracketStripper {
    keep_inner: bool,
    protect: Option<Regex>,
    remove: Option<Regex>,
    keep: Option<Regex>,
}

impl Default for BracketStripper {
    fn default() -> Self {
        BracketStripper {
            keep_inner: true,
            protect: Some(DEFAULT_BRACKET_PROTECT.clone()),
            remove: Some(DEFAULT_BRACKET_REMOVE.clone()),
            keep: None,
        }
    }
}

impl BracketStripper {
    /// Create a stripper from optional content patterns (regex syntax,
    /// matched against the whole bracketed content).
    ///
    /// # Errors
    ///
    /// Returns the regex error if a pattern doesn't compile.
    pub fn new(
        keep_inner: bool,
        protect: Option<&str>,
        remove: Option<&str>,
        keep: Option<&str>,
    ) -> Result<Self, regex::Error> {
        Ok(BracketStripper {
            keep_inner,
            protect: protect.map(|p| Regex::new(&format!(r"\[({p})\]"))).transpose()?,
            remove: remove
                .map(|p| Regex::new(&format!(r"(^|\s*)\[({p})\]")))
                .transpose()?,
            keep: keep.map(|p| Regex::new(&format!(r"\[({p})\]"))).transpose()?,
        })
    }

    /// Apply the stripper to `data`.
    #[must_use]
    pub fn strip(&self, data: &str) -> String {
        let mut s = data.to_string();
        if let Some(re) = &self.protect {
            s = re.replace_all(&s, "{$1}").into_owned();
        }
        if self.keep_inner {
            if let Some(re) = &self.remove {
                s = re.replace_all(&s, "").into_owned();
            }
            s = BRACKETS_ONLY.replace_all(&s, "").into_owned();
        } else {
            if let Some(re) = &self.keep {
                s = re.replace_all(&s, "${1}").into_owned();
            }
            s = BRACKETS_AND_CONTENT.replace_all(&s, "").into_owned();
        }
        CURLY.replace_all(&s, "[$1]").trim_start().to_string()
    }
}

/// Strip square brackets, keeping their content (`[sic]` and `[i.e. ...]`
/// keep their brackets; `[et al.]` is removed).
#[must_use]
pub fn strip_brackets(data: &str) -> String {
    DEFAULT_BRACKET_STRIPPER.strip(data)
}

/// A string deconstructed into characters and nested bracket groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bracketed {
    /// A literal character.
    Char(char),
    /// The content between a matched open and close bracket.
    Group(Vec<Bracketed>),
}

/// Split `data` into characters and nested groups delimited by `open` and
/// `close`.
///
/// With `group_on_mismatch`, an unmatched bracket adds a group at the start
/// or end of the data, as if the missing partner were there. Without it,
/// unmatched outermost brackets stay as literal characters.
#[must_use]
pub fn deconstruct_bracketed(
    data: &str,
    group_on_mismatch: bool,
    open: char,
    close: char,
) -> Vec<Bracketed> {
    let mut stack: Vec<Vec<Bracketed>> = Vec::new();
    let mut working: Vec<Bracketed> = Vec::new();
    for c in data.chars() {
        if c == open {
            stack.push(std::mem::take(&mut working));
        } else if c == close {
            if let Some(mut parent) = stack.pop() {
                parent.push(Bracketed::Group(std::mem::take(&mut working)));
                working = parent;
            } else if group_on_mismatch {
                working = vec![Bracketed::Group(std::mem::take(&mut working))];
            } else {
                working.push(Bracketed::Char(c));
            }
        } else {
            working.push(Bracketed::Char(c));
        }
    }
    while let Some(mut parent) = stack.pop() {
        if group_on_mismatch {
            parent.push(Bracketed::Group(working));
        } else {
            parent.push(Bracketed::Char(open));
            parent.extend(working);
        }
        working = parent;
    }
    working
}

/// Rebuild a string from [`deconstruct_bracketed`] output, dropping literal
/// characters found in `strip_chars`.
#[must_use]
pub fn reconstruct_bracketed(
    nodes: &[Bracketed],
    open: char,
    close: char,
    strip_chars: &str,
) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Bracketed::Group(inner) => {
                out.push(open);
                out.push_str(&reconstruct_bracketed(inner, open, close, strip_chars));
                out.push(close);
            },
            Bracketed::Char(c) if !strip_chars.contains(*c) => out.push(*c),
            Bracketed::Char(_) => {},
        }
    }
    out
}

/// Remove parentheses that enclose the whole string: `((a (b)))` gives
/// `a (b)`, while `(a) (b)` is unchanged.
///
/// With `strip_mismatched`, unmatched parentheses at either end are dropped
/// as well (`((a)` gives `a`); otherwise they are kept (`((a)` gives `(a`).
#[must_use]
pub fn strip_outer_parentheses(data: &str, strip_mismatched: bool) -> String {
    let is_paren = |node: Option<&Bracketed>| matches!(node, Some(Bracketed::Char('(' | ')')));
    let mut nodes = deconstruct_bracketed(data, false, '(', ')');

    let mut left = Vec::new();
    while is_paren(nodes.first()) {
        left.push(nodes.remove(0));
    }
    let mut right = Vec::new();
    while is_paren(nodes.last()) {
        right.extend(nodes.pop());
    }

    while nodes.len() == 1 && matches!(nodes[0], Bracketed::Group(_)) {
        if let Some(Bracketed::Group(inner)) = nodes.pop() {
            nodes = inner;
        }
    }

    if !strip_mismatched {
        while let Some(node) = left.pop() {
            nodes.insert(0, node);
        }
        while let Some(node) = right.pop() {
            nodes.push(node);
        }
    }
    reconstruct_bracketed(&nodes, '(', ')', "")
}

/// Remove ellipses (`...`), keeping a fourth period if one follows.
#[must_use]
pub fn strip_ellipses(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    let is_ellipsis = |at: usize| chars.len() >= at + 3 && chars[at..at + 3] == ['.', '.', '.'];
    let mut out = String::with_capacity(data.len());
    let mut i = 0;
    while i < chars.len() {
        let dots = chars[i..]
            .iter()
            .position(|c| !c.is_whitespace())
            .map_or(chars.len(), |p| i + p);
        let after_non_period = dots > i || (i > 0 && chars[i - 1] != '.');
        let at_start = i == 0 && dots == 0;
        if is_ellipsis(dots) && (at_start || after_non_period) {
            let mut j = dots + 3;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if chars.get(j) == Some(&'.') {
                out.push('.');
                j += 1;
            }
            out.push(' ');
            i = j;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out.trim().to_string()
}

/// Remove FRBR entity qualifiers such as `(work)` or `(Expression)`.
#[must_use]
pub fn strip_wemi(data: &str) -> String {
    WEMI.replace_all(data, "").into_owned()
}

fn clean_once(data: &str) -> String {
    let s = normalize_whitespace(data);
    let s = strip_ends(&s, false, End::Both);
    let s = strip_brackets(&s);
    let s = strip_ellipses(&s);
    normalize_punctuation(&s, false)
}

/// The standard display cleanup: normalize whitespace, strip ends, strip
/// brackets, strip ellipses, normalize punctuation.
///
/// The pipeline repeats until the output stops changing, so
/// `clean(&clean(s)) == clean(s)`.
#[must_use]
pub fn clean(data: &str) -> String {
    let mut current = clean_once(data);
    for _ in 0..data.len() * 2 + 4 {
        let next = clean_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn digit_run(chars: &[char], start: usize) -> usize {
    chars[start..].iter().take_while(|c| c.is_ascii_digit()).count()
}

fn match_century(chars: &[char], start: usize) -> Option<(usize, String)> {
    let digits = digit_run(chars, start);
    if !(1..=2).contains(&digits) {
        return None;
    }
    let suffix: String = chars.get(start + digits..start + digits + 2)?.iter().collect();
    if !matches!(suffix.to_lowercase().as_str(), "st" | "nd" | "rd" | "th") {
        return None;
    }
    let end = start + digits + 2;
    let tail: String = chars[end..]
        .iter()
        .take_while(|c| **c != '\n')
        .collect::<String>()
        .to_lowercase();
    let mentions_century = tail
        .char_indices()
        .any(|(i, _)| i > 0 && tail[i..].starts_with("centur"));
    if !mentions_century {
        return None;
    }
    let number: u32 = chars[start..start + digits].iter().collect::<String>().parse().ok()?;
    Some((digits + 2, format!("{}uu", number.saturating_sub(1))))
}

fn match_decade(chars: &[char], start: usize) -> Option<(usize, String)> {
    let digits = digit_run(chars, start);
    [3, 2].into_iter().find_map(|k| {
        let fits = digits >= k
            && chars.get(start + k) == Some(&'0')
            && matches!(chars.get(start + k + 1), Some('s' | 'S'));
        fits.then(|| {
            let prefix: String = chars[start..start + k].iter().collect();
            (k + 2, format!("{prefix}u"))
        })
    })
}

fn match_year(chars: &[char], start: usize) -> Option<(usize, String)> {
    let digits = digit_run(chars, start);
    let dashes = |from: usize| {
        chars[from.min(chars.len())..]
            .iter()
            .take_while(|c| **c == '-')
            .count()
    };
    for (d, dash_count) in [(1, 3), (2, 2), (3, 1)] {
        if digits >= d && dashes(start + d) >= dash_count {
            let len = d + dash_count;
            let year: String = chars[start..start + len].iter().collect();
            return Some((len, year.replace('-', "u")));
        }
    }
    [4, 3].into_iter().find_map(|k| {
        let next = chars.get(start + k);
        let ok = digits >= k && !next.is_some_and(|c| c.is_ascii_digit() || matches!(c, 's' | 'S'));
        ok.then(|| (k, chars[start..start + k].iter().collect()))
    })
}

/// Extract years, decades and centuries, each as a four-character
/// MARC 008 style date (`u` for an unknown digit).
///
/// `1920s` gives `192u`, `19th century` gives `18uu`, `195-` gives `195u`
/// and `930` gives `0930`. Square brackets are ignored.
#[must_use]
pub fn extract_years(data: &str) -> Vec<String> {
    let chars: Vec<char> = data.chars().filter(|c| *c != '[' && *c != ']').collect();
    let mut years = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let at_run_start = chars[i].is_ascii_digit() && (i == 0 || !chars[i - 1].is_ascii_digit());
        if at_run_start {
            let found = match_century(&chars, i)
                .or_else(|| match_decade(&chars, i))
                .or_else(|| match_year(&chars, i));
            if let Some((len, year)) = found {
                years.push(format!("{year:0>4}"));
                i += len;
                continue;
            }
        }
        i += 1;
    }
    years
}

/// Remove "place/publisher unknown" markers (`S.l.`, `s.n.`,
/// `... not identified`). Leftover punctuation is not cleaned up.
#[must_use]
pub fn strip_unknown_pub(data: &str) -> String {
    UNKNOWN_PUB.replace_all(data, "").into_owned()
}

/// Split a 260/264 `$c` value into the publication date and the copyright
/// date. The copyright date needs a label (`c1964`, `copyright 1964`,
/// `©1964`, `p1964`); it and everything after it form the second value.
///
/// Punctuation left behind in the publication date is not stripped.
#[must_use]
pub fn split_pdate_and_cdate(data: &str) -> (String, String) {
    match COPYRIGHT_DATE.captures(data) {
        Some(caps) => {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let pub_date = format!("{}{}", &data[..whole.start], &data[whole.end..]);
            (pub_date, caps[2].to_string())
        },
        None => (data.to_string(), String::new()),
    }
}

/// Replace copyright and phonogram labels before a year with `©` and `℗`.
#[must_use]
pub fn normalize_cr_symbol(statement: &str) -> String {
    let s = COPYRIGHT_LABEL.replace_all(statement, "$1©$3");
    PHONOGRAM_LABEL.replace_all(&s, "$1℗$3").into_owned()
}
