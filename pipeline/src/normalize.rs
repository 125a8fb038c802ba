//! Text normalisation for duplicate detection (Persian-aware).
//!
//! Canonical form: NFKD-decompose (presentation forms become base letters, precomposed
//! letters split off their marks), fold Arabic-script variants to their Persian forms, drop
//! diacritics, map Persian/Arabic-Indic digits to ASCII, turn everything that is not a letter
//! or digit into a space, lower-case, tokenise on whitespace, drop stopwords, rejoin with
//! single spaces.

use unicode_normalization::UnicodeNormalization;

/// Stopwords in normalized form (no Arabic Yeh/Kaf, no Alef-madda, no ZWNJ).
const STOPWORDS: &[&str] = &[
    // Persian
    "و", "در", "به", "از", "که", "این", "ان", "را", "با", "است", "برای", "یک", "تا", "هم",
    "می", "بر", "شد", "شده", "ها", "های", "او", "ما", "هر", "یا", "نیز", "اما", "پس", "اگر",
    "همه", "باید", "بود", "خود", "ای", "نه", "کرد", "کند", "شود", "دارد", "هست", "چه",
    "اینکه", "روی", "وی",
    // English
    "a", "an", "the", "and", "or", "of", "to", "in", "on", "for", "is", "are", "was", "were",
    "at", "by", "with", "from", "this", "that", "it",
];

/// Harakat, superscript alef, tatweel and Latin combining marks.
fn is_diacritic(c: char) -> bool {
    matches!(
        c,
        '\u{064B}'..='\u{065F}' | '\u{0670}' | '\u{0640}' | '\u{0300}'..='\u{036F}'
    )
}

/// Runs after decomposition: hamza and madda carriers arrive as base letter + mark.
fn fold_char(c: char) -> char {
    match c {
        // Arabic Yeh, Alef Maksura -> Farsi Yeh
        '\u{064A}' | '\u{0649}' => '\u{06CC}',
        // Arabic Kaf -> Keheh
        '\u{0643}' => '\u{06A9}',
        // Teh Marbuta, Ae (base of Heh with Yeh above) -> Heh
        '\u{0629}' | '\u{06D5}' => '\u{0647}',
        // Alef Wasla -> Alef
        '\u{0671}' => '\u{0627}',
        '\u{06F0}'..='\u{06F9}' => shift_digit(c, 0x06F0),
        '\u{0660}'..='\u{0669}' => shift_digit(c, 0x0660),
        other => other,
    }
}

fn shift_digit(c: char, zero: u32) -> char {
    char::from_u32(c as u32 - zero + '0' as u32).unwrap_or(c)
}

/// Character-level normalisation. Word boundaries are preserved as spaces (ZWNJ included).
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.nfkd() {
        if is_diacritic(c) {
            continue;
        }
        let c = fold_char(c);
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else {
            out.push(' ');
        }
    }
    out
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Normalized, stopword-free, single-space-joined form used for similarity scoring.
pub fn canonical_form(text: &str) -> String {
    normalize(text)
        .split_whitespace()
        .filter(|token| !is_stopword(token))
        .collect::<Vec<_>>()
        .join(" ")
}
