use serde::{Deserialize, Serialize};

/// Closed set of priced-selection types. Unknown upstream market-type ids
/// must be mapped to one of these at normalization time or dropped — see
/// `crate::adapters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeType {
    HomeWin,
    Draw,
    AwayWin,
    TotalOver,
    TotalUnder,
    HandicapHome,
    HandicapAway,
    DoubleChance1X,
    DoubleChance12,
    DoubleChanceX2,
    ExactCount,
}

/// A single priced selection inside an `Event`.
///
/// Identity is derived from `(event_id, outcome_type, parameter)`, never
/// assigned externally — two adapters producing the same outcome-type and
/// parameter for the same event collide on identity by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub event_id: String,
    pub outcome_type: OutcomeType,
    /// The line: "2.5", "+1.5", "-0.5", an exact-count label, or empty for
    /// moneyline selections.
    pub parameter: String,
    pub odds: f64,
    pub bookmaker: String,
}

impl Outcome {
    pub fn new(
        event_id: impl Into<String>,
        outcome_type: OutcomeType,
        parameter: impl Into<String>,
        odds: f64,
        bookmaker: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            outcome_type,
            parameter: parameter.into(),
            odds,
            bookmaker: bookmaker.into(),
        }
    }

    /// Derived identity string: two outcomes with the same id are the same
    /// selection regardless of which adapter produced them.
    pub fn id(&self) -> String {
        format!("{}:{:?}:{}", self.event_id, self.outcome_type, self.parameter)
    }

    /// Priced and valid per spec.md §3 (odds strictly > 1.0).
    pub fn is_priced(&self) -> bool {
        self.odds > 1.0
    }
}

/// Mirror a handicap/total line parameter string: "-1.5" <-> "+1.5".
/// Returns `None` if `parameter` doesn't parse as a signed float, in which
/// case the caller should drop the line (spec.md §8 item 3).
pub fn mirror_parameter(parameter: &str) -> Option<String> {
    let value: f64 = parameter.trim_start_matches('+').parse().ok()?;
    let mirrored = -value;
    Some(format_signed(mirrored))
}

/// String-normalized signed line representation used throughout the
/// handicap/total normalization code: always carries an explicit sign.
pub fn format_signed(value: f64) -> String {
    if value > 0.0 {
        format!("+{}", trim_trailing_zero(value))
    } else if value < 0.0 {
        format!("-{}", trim_trailing_zero(-value))
    } else {
        "0".to_string()
    }
}

fn trim_trailing_zero(value: f64) -> String {
    let s = format!("{value}");
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_are_additive_inverses() {
        assert_eq!(mirror_parameter("-1.5"), Some("+1.5".to_string()));
        assert_eq!(mirror_parameter("+1.5"), Some("-1.5".to_string()));
        assert_eq!(mirror_parameter("-1"), Some("+1".to_string()));
    }

    #[test]
    fn identity_collides_across_adapters() {
        let a = Outcome::new("evt1", OutcomeType::TotalOver, "2.5", 1.9, "BookA");
        let b = Outcome::new("evt1", OutcomeType::TotalOver, "2.5", 1.95, "BookB");
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn non_positive_odds_not_priced() {
        let o = Outcome::new("evt1", OutcomeType::HomeWin, "", 0.0, "BookA");
        assert!(!o.is_priced());
    }
}
