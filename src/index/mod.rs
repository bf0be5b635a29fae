//! Process-wide in-memory aggregation index (C4). A `DashMap` keyed by
//! `(match_key, bookmaker)` — the same "concurrent in-memory state"
//! pattern the teacher uses for `market_mapping`/`event_to_fixture` in
//! `main.rs`, generalized from single-source maps to a genuinely
//! multi-writer store.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::model::{EsportsMatch, Match};

/// Kickoff-window filter for `snapshot` (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KickoffFilter {
    Live,
    Upcoming,
    All,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotFilter {
    pub kickoff: Option<KickoffFilter>,
    pub sport: Option<String>,
}

/// One real-world fixture as seen by every bookmaker that reported on it.
#[derive(Debug, Clone, Serialize)]
pub struct MergedMatch {
    pub match_key: String,
    pub display_name: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    pub sport: String,
    pub tournament: String,
    pub bookmakers: Vec<Match>,
}

/// Grace window past kickoff before a match is evicted (spec.md §4.4).
pub fn eviction_grace() -> ChronoDuration {
    ChronoDuration::hours(3)
}

pub struct AggregationIndex {
    matches: DashMap<(String, String), Match>,
    esports_matches: DashMap<(String, String), EsportsMatch>,
}

impl Default for AggregationIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregationIndex {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
            esports_matches: DashMap::new(),
        }
    }

    /// Upsert by `(match_key, bookmaker)`. Replaces the entire prior entry
    /// for that pair atomically — `DashMap::insert` takes the shard's
    /// write lock for the duration of the write, so concurrent
    /// `add_match` calls from different adapters never observe a partial
    /// write of another (spec.md §4.4, §8 item 4).
    pub fn add_match(&self, m: Match) {
        self.matches.insert(m.identity(), m);
    }

    pub fn add_esports_match(&self, m: EsportsMatch) {
        self.esports_matches.insert(m.identity(), m);
    }

    /// Consistent point-in-time copy, grouped by match key and optionally
    /// filtered by kickoff window / sport.
    pub fn snapshot(&self, filter: &SnapshotFilter) -> Vec<MergedMatch> {
        let now = Utc::now();
        let mut grouped: std::collections::HashMap<String, Vec<Match>> = std::collections::HashMap::new();

        for entry in self.matches.iter() {
            let m = entry.value().clone();
            if !passes_filter(&m, filter, now) {
                continue;
            }
            grouped.entry(m.match_key.clone()).or_default().push(m);
        }

        grouped
            .into_values()
            .filter_map(|bookmakers| merge_group(bookmakers))
            .collect()
    }

    pub fn snapshot_esports(&self) -> Vec<EsportsMatch> {
        self.esports_matches.iter().map(|e| e.value().clone()).collect()
    }

    /// Removes every `(match_key, bookmaker)` whose kickoff is older than
    /// `eviction_grace()`. Monotonic: evicted entries only return if a new
    /// adapter cycle republishes them.
    pub fn evict_expired(&self, now: DateTime<Utc>) {
        self.matches.retain(|_, m| now - m.kickoff < eviction_grace());
        self.esports_matches.retain(|_, m| now - m.kickoff < eviction_grace());
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

fn passes_filter(m: &Match, filter: &SnapshotFilter, now: DateTime<Utc>) -> bool {
    if let Some(sport) = &filter.sport {
        if &m.sport != sport {
            return false;
        }
    }
    match filter.kickoff {
        Some(KickoffFilter::Live) => m.kickoff <= now,
        Some(KickoffFilter::Upcoming) => m.kickoff > now,
        Some(KickoffFilter::All) | None => true,
    }
}

fn merge_group(bookmakers: Vec<Match>) -> Option<MergedMatch> {
    let first = bookmakers.first()?;
    Some(MergedMatch {
        match_key: first.match_key.clone(),
        display_name: first.display_name.clone(),
        home_team: first.home_team.clone(),
        away_team: first.away_team.clone(),
        kickoff: first.kickoff,
        sport: first.sport.clone(),
        tournament: first.tournament.clone(),
        bookmakers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn sample_match(bookmaker: &str, kickoff: DateTime<Utc>) -> Match {
        Match::new("Home FC", "Away FC", kickoff, "football", "Test League", bookmaker, Utc::now())
    }

    #[test]
    fn concurrent_writers_all_land_for_the_same_key() {
        let index = Arc::new(AggregationIndex::new());
        let kickoff = Utc::now() + ChronoDuration::hours(1);
        let bookmakers = ["BookA", "BookB", "BookC", "BookD"];

        let handles: Vec<_> = bookmakers
            .iter()
            .map(|&b| {
                let index = index.clone();
                thread::spawn(move || {
                    index.add_match(sample_match(b, kickoff));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snapshot = index.snapshot(&SnapshotFilter::default());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].bookmakers.len(), 4);
    }

    #[test]
    fn upsert_replaces_prior_entry_for_same_pair() {
        let index = AggregationIndex::new();
        let kickoff = Utc::now() + ChronoDuration::hours(1);
        let mut first = sample_match("BookA", kickoff);
        first.tournament = "Old League".to_string();
        index.add_match(first);

        let mut second = sample_match("BookA", kickoff);
        second.tournament = "New League".to_string();
        index.add_match(second);

        let snapshot = index.snapshot(&SnapshotFilter::default());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].bookmakers.len(), 1);
        assert_eq!(snapshot[0].tournament, "New League");
    }

    #[test]
    fn live_vs_upcoming_filter() {
        let index = AggregationIndex::new();
        let now = Utc::now();
        index.add_match(sample_match("BookA", now - ChronoDuration::hours(1)));
        index.add_match(sample_match("BookB", now + ChronoDuration::minutes(30)));
        index.add_match(sample_match("BookC", now + ChronoDuration::hours(25)));

        let upcoming = index.snapshot(&SnapshotFilter {
            kickoff: Some(KickoffFilter::Upcoming),
            sport: None,
        });
        let total_upcoming: usize = upcoming.iter().map(|g| g.bookmakers.len()).sum();
        assert_eq!(total_upcoming, 2);
    }

    #[test]
    fn eviction_is_monotonic() {
        let index = AggregationIndex::new();
        let now = Utc::now();
        index.add_match(sample_match("BookA", now - ChronoDuration::hours(5)));
        assert_eq!(index.len(), 1);

        index.evict_expired(now);
        assert_eq!(index.len(), 0);

        index.evict_expired(now);
        assert_eq!(index.len(), 0);
    }
}
