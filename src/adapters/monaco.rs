//! Monaco adapter: JSON REST polling against a session-authenticated API.
//! Grounded on the session-refresh and market/event pairing logic the
//! teacher's `monaco` module used for its WebSocket feed, redesigned
//! around `parse_once`'s single-pass discover/fetch/normalize/publish
//! cycle instead of a persistent push connection (spec.md §4.3 Non-goals
//! rule out live in-play streaming).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::normalize::{finalize_event, reject_reason};
use super::Adapter;
use crate::config::SourceConfig;
use crate::error::ParseError;
use crate::http::{ContentShape, FetchClient};
use crate::index::AggregationIndex;
use crate::model::event::{Event, EventType};
use crate::model::football::Match;
use crate::model::outcome::{Outcome, OutcomeType};

const NAME: &str = "monaco";

#[derive(Debug, Deserialize)]
struct SessionResponse {
    sessions: Vec<Session>,
}

#[derive(Debug, Deserialize)]
struct Session {
    #[serde(rename = "accessToken")]
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct MarketsResponse {
    #[serde(default)]
    markets: Vec<RawMarket>,
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize, Clone)]
struct RawMarket {
    id: String,
    name: String,
    #[serde(rename = "marketValue")]
    market_value: Option<String>,
    #[serde(rename = "marketType")]
    market_type: RefList,
    event: RefList,
    outcomes: Vec<RawOutcome>,
}

#[derive(Debug, Deserialize, Clone)]
struct RefList {
    ids: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
struct RawOutcome {
    id: String,
    #[serde(rename = "odds")]
    price: f64,
    #[serde(rename = "type")]
    side: String,
}

#[derive(Debug, Deserialize, Clone)]
struct RawEvent {
    id: String,
    #[serde(rename = "homeTeam")]
    home_team: String,
    #[serde(rename = "awayTeam")]
    away_team: String,
    #[serde(rename = "startTime")]
    start_time: String,
    tournament: Option<String>,
}

/// Maps an upstream market-type id to `(OutcomeType, side)`, or `None` to
/// skip a market type this adapter does not understand.
fn map_market_type(market_type_id: &str) -> Option<EventType> {
    match market_type_id {
        "FOOTBALL_FULL_TIME_RESULT" | "FOOTBALL_FULL_TIME_RESULT_HANDICAP" | "FOOTBALL_OVER_UNDER_TOTAL_GOALS" => {
            Some(EventType::MainMatch)
        }
        "FOOTBALL_CORNERS_TOTAL" => Some(EventType::Corners),
        "FOOTBALL_CARDS_TOTAL" => Some(EventType::YellowCards),
        "FOOTBALL_FOULS_TOTAL" => Some(EventType::Fouls),
        _ => None,
    }
}

fn handicap_value(market: &RawMarket) -> Option<String> {
    let re = regex::Regex::new(r"Goal Handicap ([+\-\d.]+)").ok()?;
    Some(re.captures(&market.name)?.get(1)?.as_str().to_string())
}

fn total_value(market: &RawMarket) -> Option<String> {
    if let Some(v) = &market.market_value {
        return Some(v.clone());
    }
    let re = regex::Regex::new(r"Total Goals Over/Under ([\d.]+)").ok()?;
    Some(re.captures(&market.name)?.get(1)?.as_str().to_string())
}

fn outcome_type_for(market: &RawMarket, side: &str, home_team: &str, away_team: &str) -> Option<(OutcomeType, String)> {
    let name = market.name.to_lowercase();
    if name.contains("handicap") {
        let param = handicap_value(market)?;
        return match side {
            s if s.eq_ignore_ascii_case(home_team) || s == "home" => Some((OutcomeType::HandicapHome, param)),
            _ => {
                let mirrored = crate::model::outcome::mirror_parameter(&param)?;
                Some((OutcomeType::HandicapAway, mirrored))
            }
        };
    }
    if name.contains("over/under") || name.contains("total") {
        let param = total_value(market)?;
        return match side.to_lowercase().as_str() {
            "over" => Some((OutcomeType::TotalOver, param)),
            "under" => Some((OutcomeType::TotalUnder, param)),
            _ => None,
        };
    }
    match side {
        s if s.eq_ignore_ascii_case(home_team) => Some((OutcomeType::HomeWin, String::new())),
        s if s.eq_ignore_ascii_case(away_team) => Some((OutcomeType::AwayWin, String::new())),
        "draw" | "Draw" => Some((OutcomeType::Draw, String::new())),
        _ => None,
    }
}

struct Session2 {
    access_token: Option<String>,
}

pub struct MonacoAdapter {
    index: Arc<AggregationIndex>,
    fetch: FetchClient,
    base_url: String,
    app_id: String,
    api_key: String,
    session: Mutex<Session2>,
}

impl MonacoAdapter {
    pub fn new(source: &SourceConfig, index: Arc<AggregationIndex>) -> Self {
        let base_url = source.base_url.clone().unwrap_or_else(|| "https://api.monaco.example".to_string());
        let timeout = source.timeout.unwrap_or(Duration::from_secs(10));
        let fetch = FetchClient::new(
            NAME,
            timeout,
            source.min_request_interval,
            Duration::from_secs(5),
            source.proxy_list.clone(),
            source.user_agent.clone(),
            source.insecure_tls,
        );
        Self {
            index,
            fetch,
            base_url,
            app_id: source.custom("app-id").unwrap_or_default().to_string(),
            api_key: source.custom("api-key").unwrap_or_default().to_string(),
            session: Mutex::new(Session2 { access_token: None }),
        }
    }

    async fn authenticate(&self, cancel: &CancellationToken) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let url = format!("{}/sessions", self.base_url);
        let body = serde_json::json!({ "appId": self.app_id, "apiKey": self.api_key });
        let response = self
            .fetch
            .fetch_json_post(&url, &body, cancel)
            .await?;
        let parsed: SessionResponse = serde_json::from_slice(&response.bytes)
            .map_err(|e| ParseError::new(NAME, format!("session response: {e}")))?;
        let token = parsed
            .sessions
            .into_iter()
            .next()
            .ok_or_else(|| ParseError::new(NAME, "no session returned"))?
            .access_token;
        self.session.lock().unwrap().access_token = Some(token.clone());
        Ok(token)
    }

    fn current_token(&self) -> Option<String> {
        self.session.lock().unwrap().access_token.clone()
    }
}

#[async_trait]
impl Adapter for MonacoAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn parse_once(
        &self,
        now: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let token = match self.current_token() {
            Some(t) => t,
            None => self.authenticate(&cancel).await?,
        };

        let url = format!("{}/markets", self.base_url);
        let response = match self
            .fetch
            .fetch_authorized(Method::GET, &url, &token, ContentShape::Json, &cancel)
            .await
        {
            Ok(r) => r,
            Err(_) => {
                // Token may have expired; re-authenticate once and retry.
                let token = self.authenticate(&cancel).await?;
                self.fetch.fetch_authorized(Method::GET, &url, &token, ContentShape::Json, &cancel).await?
            }
        };

        let parsed: MarketsResponse = serde_json::from_slice(&response.bytes)
            .map_err(|e| ParseError::new(NAME, format!("markets response: {e}")))?;

        let events_by_id: HashMap<String, RawEvent> = parsed.events.into_iter().map(|e| (e.id.clone(), e)).collect();

        let mut markets_by_event: HashMap<String, Vec<RawMarket>> = HashMap::new();
        for market in parsed.markets {
            let Some(event_id) = market.event.ids.first().cloned() else { continue };
            markets_by_event.entry(event_id).or_default().push(market);
        }

        for (event_id, markets) in markets_by_event {
            let Some(raw_event) = events_by_id.get(&event_id) else { continue };
            let Ok(kickoff) = DateTime::parse_from_rfc3339(&raw_event.start_time) else {
                debug!(adapter = NAME, event_id, "unparsable kickoff, skipping");
                continue;
            };
            let kickoff = kickoff.with_timezone(&Utc);

            let mut m = Match::new(
                raw_event.home_team.clone(),
                raw_event.away_team.clone(),
                kickoff,
                "football",
                raw_event.tournament.clone().unwrap_or_default(),
                NAME,
                now,
            );

            let mut events_by_type: HashMap<EventType, Event> = HashMap::new();
            for market in &markets {
                let Some(type_id) = market.market_type.ids.first() else { continue };
                let Some(event_type) = map_market_type(type_id) else { continue };
                let entry = events_by_type
                    .entry(event_type)
                    .or_insert_with(|| Event::new(m.match_key.clone(), NAME, event_type));
                for outcome in &market.outcomes {
                    let Some((outcome_type, parameter)) =
                        outcome_type_for(market, &outcome.side, &m.home_team, &m.away_team)
                    else {
                        continue;
                    };
                    entry.outcomes.push(Outcome::new(entry.id(), outcome_type, parameter, outcome.price, NAME));
                }
            }

            for event in events_by_type.values_mut() {
                finalize_event(event);
            }
            m.events = events_by_type.into_values().filter(|e| e.is_emittable()).collect();

            if let Some(reason) = reject_reason(&m, now) {
                debug!(adapter = NAME, match_key = %m.match_key, %reason, "rejected");
                continue;
            }

            self.index.add_match(m);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_market_type_maps_to_event_type() {
        assert_eq!(map_market_type("FOOTBALL_FULL_TIME_RESULT"), Some(EventType::MainMatch));
        assert_eq!(map_market_type("FOOTBALL_FOULS_TOTAL"), Some(EventType::Fouls));
        assert_eq!(map_market_type("UNKNOWN_MARKET"), None);
    }

    #[test]
    fn fouls_total_line_is_extracted_like_any_other_total() {
        let market = RawMarket {
            id: "m1".into(),
            name: "Total Fouls Over/Under 21.5".into(),
            market_value: None,
            market_type: RefList { ids: vec!["FOOTBALL_FOULS_TOTAL".into()] },
            event: RefList { ids: vec!["e1".into()] },
            outcomes: vec![],
        };
        assert_eq!(total_value(&market), Some("21.5".to_string()));
        assert_eq!(
            outcome_type_for(&market, "Over", "Home", "Away"),
            Some((OutcomeType::TotalOver, "21.5".to_string()))
        );
    }

    #[test]
    fn handicap_line_extracted_from_market_name() {
        let market = RawMarket {
            id: "m1".into(),
            name: "Goal Handicap +1.5".into(),
            market_value: None,
            market_type: RefList { ids: vec!["FOOTBALL_FULL_TIME_RESULT_HANDICAP".into()] },
            event: RefList { ids: vec!["e1".into()] },
            outcomes: vec![],
        };
        assert_eq!(handicap_value(&market), Some("+1.5".to_string()));
    }

    #[test]
    fn handicap_away_side_mirrors_the_named_sign() {
        let market = RawMarket {
            id: "m1".into(),
            name: "Goal Handicap +1.5".into(),
            market_value: None,
            market_type: RefList { ids: vec!["FOOTBALL_FULL_TIME_RESULT_HANDICAP".into()] },
            event: RefList { ids: vec!["e1".into()] },
            outcomes: vec![],
        };
        assert_eq!(
            outcome_type_for(&market, "Home", "Home", "Away"),
            Some((OutcomeType::HandicapHome, "+1.5".to_string()))
        );
        assert_eq!(
            outcome_type_for(&market, "Away", "Home", "Away"),
            Some((OutcomeType::HandicapAway, "-1.5".to_string()))
        );
    }

    #[test]
    fn total_value_prefers_market_value_field() {
        let market = RawMarket {
            id: "m1".into(),
            name: "Total Goals Over/Under 2.5".into(),
            market_value: Some("3.5".into()),
            market_type: RefList { ids: vec!["FOOTBALL_OVER_UNDER_TOTAL_GOALS".into()] },
            event: RefList { ids: vec!["e1".into()] },
            outcomes: vec![],
        };
        assert_eq!(total_value(&market), Some("3.5".to_string()));
    }
}
