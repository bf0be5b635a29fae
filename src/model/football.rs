use super::event::Event;
use super::key::canonical_key;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One bookmaker's view of a single football match.
///
/// Identity is `(match_key, bookmaker)`. A `Match` is never mutated in
/// place after publication into the aggregation index — an update is a
/// full replacement for that pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub match_key: String,
    pub display_name: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    pub sport: String,
    pub tournament: String,
    pub bookmaker: String,
    pub events: Vec<Event>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        home_team: impl Into<String>,
        away_team: impl Into<String>,
        kickoff: DateTime<Utc>,
        sport: impl Into<String>,
        tournament: impl Into<String>,
        bookmaker: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let home_team = home_team.into();
        let away_team = away_team.into();
        let match_key = canonical_key(&home_team, &away_team, kickoff);
        Self {
            display_name: format!("{} vs {}", home_team, away_team),
            match_key,
            home_team,
            away_team,
            kickoff,
            sport: sport.into(),
            tournament: tournament.into(),
            bookmaker: bookmaker.into(),
            events: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn identity(&self) -> (String, String) {
        (self.match_key.clone(), self.bookmaker.clone())
    }

    pub fn has_any_outcomes(&self) -> bool {
        self.events.iter().any(|e| e.is_emittable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_key_and_bookmaker() {
        let now = Utc::now();
        let kickoff = now + chrono::Duration::hours(2);
        let m = Match::new("Home FC", "Away FC", kickoff, "football", "Test League", "BookA", now);
        assert_eq!(m.identity(), (m.match_key.clone(), "BookA".to_string()));
    }
}
