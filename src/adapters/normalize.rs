//! Normalization helpers shared by every adapter (spec.md §4.3 table,
//! §8 items 2–3). Kept separate from any one bookmaker's module so the
//! pairing/rejection policy is identical everywhere it applies.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::RejectReason;
use crate::model::event::Event;
use crate::model::football::Match;
use crate::model::outcome::{mirror_parameter, Outcome, OutcomeType};

/// spec.md §3/§8 item 2: kickoff strictly in the future, non-empty teams,
/// at least one outcome somewhere in the match.
pub fn reject_reason(m: &Match, now: DateTime<Utc>) -> Option<RejectReason> {
    if m.home_team.trim().is_empty() || m.away_team.trim().is_empty() {
        return Some(RejectReason::MissingTeams);
    }
    if m.kickoff <= now {
        return Some(RejectReason::KickoffInPast);
    }
    if !m.has_any_outcomes() {
        return Some(RejectReason::NoValidOutcomes);
    }
    None
}

/// Drop unpriced outcomes, then enforce the Over/Under and handicap
/// pairing invariants (spec.md §3, §8 items 2–3): for a total line, keep
/// the first-seen Over/Under pair only; for a handicap line, keep home
/// and away only when both sides are present with mirrored parameters.
/// Moneyline/double-chance/exact-count outcomes pass through unpaired.
pub fn finalize_event(event: &mut Event) {
    let mut over: HashMap<String, Outcome> = HashMap::new();
    let mut under: HashMap<String, Outcome> = HashMap::new();
    let mut handicap_home: HashMap<String, Outcome> = HashMap::new();
    let mut handicap_away: HashMap<String, Outcome> = HashMap::new();
    let mut passthrough = Vec::new();

    for outcome in event.outcomes.drain(..) {
        if !outcome.is_priced() {
            continue;
        }
        match outcome.outcome_type {
            OutcomeType::TotalOver => {
                over.entry(outcome.parameter.clone()).or_insert(outcome);
            }
            OutcomeType::TotalUnder => {
                under.entry(outcome.parameter.clone()).or_insert(outcome);
            }
            OutcomeType::HandicapHome => {
                handicap_home.entry(outcome.parameter.clone()).or_insert(outcome);
            }
            OutcomeType::HandicapAway => {
                handicap_away.entry(outcome.parameter.clone()).or_insert(outcome);
            }
            _ => passthrough.push(outcome),
        }
    }

    let mut retained = Vec::with_capacity(passthrough.len());

    for (line, o) in over {
        if let Some(u) = under.remove(&line) {
            retained.push(o);
            retained.push(u);
        }
    }

    for (line, home) in handicap_home {
        let Some(mirror) = mirror_parameter(&line) else { continue };
        if let Some(away) = handicap_away.remove(&mirror) {
            retained.push(home);
            retained.push(away);
        }
    }

    retained.extend(passthrough);
    event.outcomes = retained;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::EventType;

    fn event_with(outcomes: Vec<Outcome>) -> Event {
        let mut e = Event::new("key", "BookA", EventType::MainMatch);
        e.outcomes = outcomes;
        e
    }

    #[test]
    fn total_pair_survives_only_when_both_sides_present() {
        let mut event = event_with(vec![
            Outcome::new("evt", OutcomeType::TotalOver, "2.5", 1.9, "BookA"),
            Outcome::new("evt", OutcomeType::TotalUnder, "2.5", 1.95, "BookA"),
            Outcome::new("evt", OutcomeType::TotalOver, "3.5", 2.1, "BookA"), // no matching Under
        ]);
        finalize_event(&mut event);
        assert_eq!(event.outcomes.len(), 2);
        assert!(event.outcomes.iter().all(|o| o.parameter == "2.5"));
    }

    #[test]
    fn duplicate_total_line_keeps_first_seen() {
        let mut event = event_with(vec![
            Outcome::new("evt", OutcomeType::TotalOver, "2.5", 1.9, "BookA"),
            Outcome::new("evt", OutcomeType::TotalUnder, "2.5", 1.95, "BookA"),
            Outcome::new("evt", OutcomeType::TotalOver, "2.5", 2.5, "BookA"), // alt block duplicate
        ]);
        finalize_event(&mut event);
        let over = event.outcomes.iter().find(|o| o.outcome_type == OutcomeType::TotalOver).unwrap();
        assert_eq!(over.odds, 1.9);
    }

    #[test]
    fn handicap_pair_requires_mirrored_parameters() {
        let mut event = event_with(vec![
            Outcome::new("evt", OutcomeType::HandicapHome, "-1", 2.0, "BookA"),
            Outcome::new("evt", OutcomeType::HandicapAway, "+1", 1.8, "BookA"),
            Outcome::new("evt", OutcomeType::HandicapHome, "-2", 3.0, "BookA"), // no mirror
        ]);
        finalize_event(&mut event);
        assert_eq!(event.outcomes.len(), 2);
    }

    #[test]
    fn non_positive_odds_are_dropped() {
        let mut event = event_with(vec![Outcome::new("evt", OutcomeType::HomeWin, "", 0.0, "BookA")]);
        finalize_event(&mut event);
        assert!(event.outcomes.is_empty());
    }
}
