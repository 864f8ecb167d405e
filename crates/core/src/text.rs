//! Text cleanup shared by the question loader and the terminal renderer.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Invisible or exotic space characters that spreadsheet exports like to leave behind.
const INVISIBLES: [char; 10] = [
    '\u{00a0}', // no-break space
    '\u{202f}', // narrow no-break space
    '\u{2009}', // thin space
    '\u{2007}', // figure space
    '\u{200a}', // hair space
    '\u{200b}', // zero-width space
    '\u{200c}', // zero-width non-joiner
    '\u{200d}', // zero-width joiner
    '\u{2060}', // word joiner
    '\u{feff}', // byte order mark
];

static RUN_OF_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("static regex"));
static DIGIT_THEN_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)([A-Za-z])").expect("static regex"));
static LETTER_THEN_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z])(\d)").expect("static regex"));
static STUCK_SIGNED_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\S)([-–—])(\$?\d)").expect("static regex"));

/// NFKC-normalizes `s` and maps invisible spaces to a plain space.
#[must_use]
pub fn normalize_text(s: &str) -> String {
    s.nfkc()
        .map(|c| if INVISIBLES.contains(&c) { ' ' } else { c })
        .collect()
}

/// Cleans a choice label for display.
///
/// Collapses runs of spaces, separates digit/letter run-ons (`200and` becomes
/// `200 and`) and detaches a sign that is glued to the previous token.
#[must_use]
pub fn clean_label(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let s = normalize_text(s);
    let s = RUN_OF_SPACES.replace_all(&s, " ");
    let s = DIGIT_THEN_LETTER.replace_all(&s, "$1 $2");
    let s = LETTER_THEN_DIGIT.replace_all(&s, "$1 $2");
    let s = STUCK_SIGNED_NUMBER.replace_all(&s, "$1 $2$3");
    s.trim().to_string()
}

/// Returns the first run of ASCII digits in `s`, parsed as an unsigned integer.
///
/// Returns `None` if there is no digit or the run does not fit in a `u64`.
#[must_use]
pub fn first_number(s: &str) -> Option<u64> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let rest = &s[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}
