use super::outcome::Outcome;
use serde::{Deserialize, Serialize};

/// Closed set of market groupings under a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    MainMatch,
    Corners,
    YellowCards,
    Fouls,
    ShotsOnTarget,
    Offsides,
    ThrowIns,
}

/// A market grouping under a `Match`.
///
/// Identity is `(match_key, bookmaker, event_type)`. Invariant: an `Event`
/// with zero `Outcome`s must never be emitted — see `Event::is_emittable`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub match_key: String,
    pub bookmaker: String,
    pub event_type: EventType,
    pub market_name: String,
    pub outcomes: Vec<Outcome>,
}

impl Event {
    pub fn new(
        match_key: impl Into<String>,
        bookmaker: impl Into<String>,
        event_type: EventType,
    ) -> Self {
        let match_key = match_key.into();
        let bookmaker = bookmaker.into();
        Self {
            market_name: super::market_name::display_name(event_type).to_string(),
            match_key,
            bookmaker,
            event_type,
            outcomes: Vec::new(),
        }
    }

    pub fn id(&self) -> String {
        format!("{}:{}:{:?}", self.match_key, self.bookmaker, self.event_type)
    }

    /// Spec.md §3 invariant: an Event with zero Outcomes is not emitted.
    pub fn is_emittable(&self) -> bool {
        !self.outcomes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::outcome::OutcomeType;

    #[test]
    fn empty_event_is_not_emittable() {
        let event = Event::new("key", "BookA", EventType::Corners);
        assert!(!event.is_emittable());
    }

    #[test]
    fn event_with_outcome_is_emittable() {
        let mut event = Event::new("key", "BookA", EventType::MainMatch);
        event
            .outcomes
            .push(Outcome::new(event.id(), OutcomeType::HomeWin, "", 1.9, "BookA"));
        assert!(event.is_emittable());
    }
}
