//! Esports parallel family. Same shape as the football model (`Match` /
//! `Event` / `Outcome`) but with its own closed market-type set and kept
//! out of the football aggregation index entirely (spec.md §3, §4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::canonical_key;

/// Closed set of esports outcome types. Deliberately small: the extension
/// covers match-level and map-level moneyline/handicap/total markets, not
/// football's statistical sub-markets (corners, cards, fouls have no
/// esports equivalent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EsportsOutcomeType {
    MatchWinnerHome,
    MatchWinnerAway,
    MapHandicapHome,
    MapHandicapAway,
    TotalMapsOver,
    TotalMapsUnder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsportsOutcome {
    pub market_id: String,
    pub outcome_type: EsportsOutcomeType,
    pub parameter: String,
    pub odds: f64,
    pub bookmaker: String,
}

impl EsportsOutcome {
    pub fn is_priced(&self) -> bool {
        self.odds > 1.0
    }
}

/// Closed set of esports market groupings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EsportsMarketType {
    MatchWinner,
    MapHandicap,
    TotalMaps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub match_key: String,
    pub bookmaker: String,
    pub market_type: EsportsMarketType,
    pub name: String,
    pub outcomes: Vec<EsportsOutcome>,
}

impl Market {
    pub fn new(match_key: impl Into<String>, bookmaker: impl Into<String>, market_type: EsportsMarketType, name: impl Into<String>) -> Self {
        Self {
            match_key: match_key.into(),
            bookmaker: bookmaker.into(),
            market_type,
            name: name.into(),
            outcomes: Vec::new(),
        }
    }

    pub fn is_emittable(&self) -> bool {
        !self.outcomes.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsportsMatch {
    pub match_key: String,
    pub display_name: String,
    pub team_a: String,
    pub team_b: String,
    pub kickoff: DateTime<Utc>,
    pub game: String,
    pub tournament: String,
    pub bookmaker: String,
    pub markets: Vec<Market>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EsportsMatch {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        team_a: impl Into<String>,
        team_b: impl Into<String>,
        kickoff: DateTime<Utc>,
        game: impl Into<String>,
        tournament: impl Into<String>,
        bookmaker: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let team_a = team_a.into();
        let team_b = team_b.into();
        let match_key = canonical_key(&team_a, &team_b, kickoff);
        Self {
            display_name: format!("{} vs {}", team_a, team_b),
            match_key,
            team_a,
            team_b,
            kickoff,
            game: game.into(),
            tournament: tournament.into(),
            bookmaker: bookmaker.into(),
            markets: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn identity(&self) -> (String, String) {
        (self.match_key.clone(), self.bookmaker.clone())
    }
}
