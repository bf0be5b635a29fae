//! Esports extension adapter (spec.md §3): a GraphQL discovery query
//! against a subgraph-style endpoint, grounded on the teacher pack's
//! Azuro CS2 poller — structured query, participants ordered by sort
//! index, conditions/outcomes nested under each game.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Adapter;
use crate::config::SourceConfig;
use crate::error::ParseError;
use crate::http::{ContentShape, FetchClient};
use crate::index::AggregationIndex;
use crate::model::esports::{EsportsMatch, EsportsMarketType, EsportsOutcome, EsportsOutcomeType, Market};

const NAME: &str = "esports_feed";

const MATCHES_QUERY: &str = r#"{"query":"{ games(first:50,where:{status:\"Created\"}){ id title startsAt participants{ name sortOrder } conditions{ conditionId outcomes{ outcomeId currentOdds sortOrder } } } }"}"#;

#[derive(Debug, Deserialize)]
struct GqlResponse {
    data: Option<GqlData>,
}

#[derive(Debug, Deserialize)]
struct GqlData {
    games: Vec<RawGame>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGame {
    title: Option<String>,
    starts_at: Option<String>,
    participants: Vec<RawParticipant>,
    conditions: Vec<RawCondition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawParticipant {
    name: String,
    sort_order: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCondition {
    outcomes: Vec<RawOutcome>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOutcome {
    current_odds: String,
    sort_order: i64,
}

/// Odds are fixed-point, scaled by 10^12 (spec.md's generic "integer-encoded
/// price" note, same convention the teacher's Azuro poller reverses).
fn decode_fixed_point_odds(raw: &str) -> Option<f64> {
    let value: f64 = raw.parse().ok()?;
    let decimal = value / 1_000_000_000_000.0;
    (1.01..=100.0).contains(&decimal).then_some(decimal)
}

fn extract_teams(game: &RawGame) -> Option<(String, String)> {
    if game.participants.len() >= 2 {
        let mut sorted = game.participants.iter().collect::<Vec<_>>();
        sorted.sort_by_key(|p| p.sort_order);
        return Some((sorted[0].name.trim().to_string(), sorted[1].name.trim().to_string()));
    }
    let title = game.title.as_ref()?;
    let (a, b) = title.split_once(" vs ")?;
    Some((a.trim().to_string(), b.trim().to_string()))
}

pub struct EsportsFeedAdapter {
    index: Arc<AggregationIndex>,
    fetch: FetchClient,
    base_url: String,
    game: String,
}

impl EsportsFeedAdapter {
    pub fn new(source: &SourceConfig, index: Arc<AggregationIndex>) -> Self {
        let base_url = source.base_url.clone().unwrap_or_else(|| "https://esports-subgraph.example".to_string());
        let timeout = source.timeout.unwrap_or(Duration::from_secs(10));
        let fetch = FetchClient::new(
            NAME,
            timeout,
            source.min_request_interval.or(Some(Duration::from_secs(30))),
            Duration::from_secs(10),
            source.proxy_list.clone(),
            source.user_agent.clone(),
            source.insecure_tls,
        );
        Self {
            index,
            fetch,
            base_url,
            game: source.custom("game").unwrap_or("cs2").to_string(),
        }
    }
}

#[async_trait]
impl Adapter for EsportsFeedAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn parse_once(
        &self,
        now: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let body: serde_json::Value = serde_json::from_str(MATCHES_QUERY).expect("query literal is valid JSON");
        let response = self.fetch.fetch_json_post(&self.base_url, &body, &cancel).await?;

        if !ContentShape::Json.matches(&response.bytes) {
            return Err(Box::new(ParseError::new(NAME, "response body is not JSON")));
        }

        let parsed: GqlResponse = serde_json::from_slice(&response.bytes)
            .map_err(|e| ParseError::new(NAME, format!("graphql response: {e}")))?;
        let Some(data) = parsed.data else {
            return Ok(());
        };

        for game in data.games {
            let Some((team_a, team_b)) = extract_teams(&game) else {
                debug!(adapter = NAME, "could not extract two participants, skipping game");
                continue;
            };
            let Some(starts_at) = game.starts_at.as_deref().and_then(|s| s.parse::<i64>().ok()) else {
                continue;
            };
            let Some(kickoff) = DateTime::from_timestamp(starts_at, 0) else {
                continue;
            };

            let mut m = EsportsMatch::new(team_a, team_b, kickoff, self.game.clone(), "", NAME, now);
            let mut winner_market = Market::new(m.match_key.clone(), NAME, EsportsMarketType::MatchWinner, "Match Winner");

            for condition in &game.conditions {
                let mut sorted = condition.outcomes.iter().collect::<Vec<_>>();
                sorted.sort_by_key(|o| o.sort_order);
                for (position, outcome) in sorted.iter().enumerate() {
                    let Some(odds) = decode_fixed_point_odds(&outcome.current_odds) else { continue };
                    let outcome_type = if position == 0 { EsportsOutcomeType::MatchWinnerHome } else { EsportsOutcomeType::MatchWinnerAway };
                    winner_market.outcomes.push(EsportsOutcome {
                        market_id: m.match_key.clone(),
                        outcome_type,
                        parameter: String::new(),
                        odds,
                        bookmaker: NAME.to_string(),
                    });
                }
            }

            if winner_market.is_emittable() {
                m.markets.push(winner_market);
            }

            if kickoff <= now || m.markets.is_empty() {
                continue;
            }

            self.index.add_esports_match(m);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_point_odds_decode_within_sane_bounds() {
        assert_eq!(decode_fixed_point_odds("1950000000000"), Some(1.95));
        assert_eq!(decode_fixed_point_odds("100"), None);
    }

    #[test]
    fn teams_prefer_sorted_participants_over_title() {
        let game = RawGame {
            title: Some("FURIA vs M80".to_string()),
            starts_at: None,
            participants: vec![
                RawParticipant { name: "M80".to_string(), sort_order: 2 },
                RawParticipant { name: "FURIA".to_string(), sort_order: 1 },
            ],
            conditions: vec![],
        };
        assert_eq!(extract_teams(&game), Some(("FURIA".to_string(), "M80".to_string())));
    }

    #[test]
    fn falls_back_to_title_split_without_participants() {
        let game = RawGame { title: Some("Navi vs G2".to_string()), starts_at: None, participants: vec![], conditions: vec![] };
        assert_eq!(extract_teams(&game), Some(("Navi".to_string(), "G2".to_string())));
    }
}
