//! Canonical cross-bookmaker match key.
//!
//! Pure, deterministic function of (home, away, kickoff) used to merge
//! the same real-world fixture as reported by unrelated bookmaker feeds.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

/// Fixed Cyrillic -> Latin transliteration table (ISO 9-ish, ASCII output).
/// Multi-character Cyrillic letters (е.g. "ц" -> "ts") map from a single
/// `char` to a `&'static str`.
static CYRILLIC_TABLE: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    use std::iter::FromIterator;
    HashMap::from_iter([
        ('а', "a"), ('б', "b"), ('в', "v"), ('г', "g"), ('д', "d"),
        ('е', "e"), ('ё', "e"), ('ж', "zh"), ('з', "z"), ('и', "i"),
        ('й', "i"), ('к', "k"), ('л', "l"), ('м', "m"), ('н', "n"),
        ('о', "o"), ('п', "p"), ('р', "r"), ('с', "s"), ('т', "t"),
        ('у', "u"), ('ф', "f"), ('х', "h"), ('ц', "ts"), ('ч', "ch"),
        ('ш', "sh"), ('щ', "sch"), ('ъ', ""), ('ы', "y"), ('ь', ""),
        ('э', "e"), ('ю', "yu"), ('я', "ya"),
        // Ukrainian-specific letters not already covered above.
        ('є', "ye"), ('і', "i"), ('ї', "yi"), ('ґ', "g"),
    ])
});

fn transliterate(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        let lower = c.to_lowercase().next().unwrap_or(c);
        if let Some(latin) = CYRILLIC_TABLE.get(&lower) {
            out.push_str(latin);
        } else {
            out.push(c);
        }
    }
    out
}

/// Normalize one team name: NFKD fold + strip combining marks, transliterate
/// Cyrillic, lowercase, then collapse whitespace and strip non-alphanumeric runs.
pub fn normalize_team_name(name: &str) -> String {
    let folded: String = name.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let translit = transliterate(&folded);
    let lower = translit.to_lowercase();

    let mut words = Vec::new();
    let mut current = String::new();
    for c in lower.chars() {
        if c.is_alphanumeric() {
            current.push(c);
        } else if !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words.join(" ")
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32,
        0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F)
}

/// Kickoff bucketed to the minute, fixed textual UTC format.
fn bucket_kickoff(kickoff: DateTime<Utc>) -> String {
    kickoff.format("%Y-%m-%dT%H:%M").to_string()
}

/// Deterministic, commutative cross-bookmaker match key.
pub fn canonical_key(team_a: &str, team_b: &str, kickoff: DateTime<Utc>) -> String {
    let mut a = normalize_team_name(team_a);
    let mut b = normalize_team_name(team_b);
    if b < a {
        std::mem::swap(&mut a, &mut b);
    }
    format!("{}|{}|{}", a, b, bucket_kickoff(kickoff))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn commutative_in_team_order() {
        let kickoff = t(2025, 11, 12, 20, 0);
        assert_eq!(
            canonical_key("Bayern Munich", "Borussia Dortmund", kickoff),
            canonical_key("Borussia Dortmund", "Bayern Munich", kickoff)
        );
    }

    #[test]
    fn transliteration_matches_latin_spelling() {
        let kickoff = t(2025, 11, 12, 20, 0);
        let cyrillic = canonical_key("Бавария", "Union Saint-Gilloise", kickoff);
        let latin = canonical_key("Bayern", "Union Saint-Gilloise", kickoff);
        assert_eq!(cyrillic, latin);
    }

    #[test]
    fn kickoff_bucketed_to_minute() {
        let a = t(2025, 11, 12, 20, 0);
        let b = Utc.with_ymd_and_hms(2025, 11, 12, 20, 0, 45).unwrap();
        assert_eq!(canonical_key("Home", "Away", a), canonical_key("Home", "Away", b));
    }

    #[test]
    fn punctuation_and_case_are_ignored() {
        let kickoff = t(2025, 11, 12, 20, 0);
        assert_eq!(
            canonical_key("Saint-Gilloise!", "FC Bayern", kickoff),
            canonical_key("saint gilloise", "fc bayern", kickoff)
        );
    }
}
