//! Pinnacle adapter: JSON REST polling with an API-key header, grounded on
//! the teacher's `pinnacle::client`/`pinnacle::types` wire format and the
//! market-open gating in the old `pinnacle::mod::process_cycle` — kept and
//! generalized to emit the canonical model instead of database writes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::Method;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
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
use crate::model::outcome::{format_signed, Outcome, OutcomeType};

const NAME: &str = "pinnacle";

/// Upper bound on concurrent per-league fetches in a single cycle (spec.md
/// §4.5's "configurable fan-out bound"). Pinnacle's upstream supports a
/// per-league `league_id` query param, so when `known_leagues` names a
/// specific set this adapter fetches each league independently instead of
/// one all-leagues call, isolating a single league's failure from the rest.
const MAX_CONCURRENT_LEAGUE_FETCHES: usize = 4;

#[derive(Debug, Deserialize)]
struct MarketsResponse {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    event_id: i64,
    league_id: i32,
    home: String,
    away: String,
    /// Set once a prematch event has gone live and upstream spun up a
    /// separate live matchup id for it. The two ids' period payloads can
    /// disagree about which markets are open; see `resolve_period`.
    #[serde(default)]
    parent_id: Option<i64>,
    periods: Option<Periods>,
}

#[derive(Debug, Deserialize, Clone)]
struct Periods {
    #[serde(rename = "num_0")]
    main: Option<Period>,
}

#[derive(Debug, Deserialize, Clone)]
struct Period {
    cutoff: String,
    period_status: i32,
    money_line: Option<MoneyLine>,
    spreads: Option<HashMap<String, Spread>>,
    totals: Option<HashMap<String, Total>>,
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize, Clone)]
struct MoneyLine {
    home: f64,
    draw: f64,
    away: f64,
}

#[derive(Debug, Deserialize, Clone)]
struct Spread {
    hdp: f64,
    home: f64,
    away: f64,
}

#[derive(Debug, Deserialize, Clone)]
struct Total {
    points: f64,
    over: f64,
    under: f64,
}

#[derive(Debug, Deserialize, Clone)]
struct Meta {
    open_money_line: Option<bool>,
    open_spreads: Option<bool>,
    open_totals: Option<bool>,
}

fn parse_cutoff(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok()?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

fn markets_url(base_url: &str, league_id: Option<i32>) -> String {
    match league_id {
        Some(id) => format!("{base_url}/kit/v1/markets?event_type=prematch&sport_id=1&league_id={id}"),
        None => format!("{base_url}/kit/v1/markets?event_type=prematch&sport_id=1"),
    }
}

fn event_markets_url(base_url: &str, event_id: i64) -> String {
    format!("{base_url}/kit/v1/markets?event_id={event_id}")
}

/// Rough measure of how much this period payload actually offers: one point
/// per priced line plus one per meta flag reporting that line open. Used to
/// pick between a live matchup's own id and its parent id when both exist.
fn open_market_score(period: &Period) -> usize {
    let lines = period.money_line.is_some() as usize
        + period.spreads.as_ref().map_or(0, |s| s.len())
        + period.totals.as_ref().map_or(0, |t| t.len());
    let open_flags = period.meta.as_ref().map_or(0, |m| {
        m.open_money_line.unwrap_or(false) as usize + m.open_spreads.unwrap_or(false) as usize + m.open_totals.unwrap_or(false) as usize
    });
    lines + open_flags
}

fn is_market_open(period: &Period) -> bool {
    let has_odds = period.money_line.is_some() || period.spreads.is_some() || period.totals.is_some();
    let meta_open = period
        .meta
        .as_ref()
        .map(|m| m.open_money_line.unwrap_or(false) || m.open_spreads.unwrap_or(false) || m.open_totals.unwrap_or(false))
        .unwrap_or(false);
    period.period_status == 1 && has_odds && meta_open
}

pub struct PinnacleAdapter {
    index: Arc<AggregationIndex>,
    fetch: FetchClient,
    base_url: String,
    api_key: String,
    known_leagues: Vec<i32>,
}

impl PinnacleAdapter {
    pub fn new(source: &SourceConfig, index: Arc<AggregationIndex>) -> Self {
        let base_url = source.base_url.clone().unwrap_or_else(|| "https://pinnacle-odds.example".to_string());
        let timeout = source.timeout.unwrap_or(Duration::from_secs(10));
        let fetch = FetchClient::new(
            NAME,
            timeout,
            source.min_request_interval.or(Some(Duration::from_secs(1))),
            Duration::from_secs(5),
            source.proxy_list.clone(),
            source.user_agent.clone(),
            source.insecure_tls,
        );
        let known_leagues = source
            .custom("known-leagues")
            .map(|v| v.split(',').filter_map(|s| s.trim().parse().ok()).collect())
            .unwrap_or_default();
        Self {
            index,
            fetch,
            base_url,
            api_key: source.custom("api-key").unwrap_or_default().to_string(),
            known_leagues,
        }
    }

    fn league_known(&self, league_id: i32) -> bool {
        self.known_leagues.is_empty() || self.known_leagues.contains(&league_id)
    }

    async fn fetch_period_for_event(&self, event_id: i64, cancel: &CancellationToken) -> Option<Period> {
        let url = event_markets_url(&self.base_url, event_id);
        let response = self.fetch.fetch_authorized(Method::GET, &url, &self.api_key, ContentShape::Json, cancel).await.ok()?;
        let parsed: MarketsResponse = serde_json::from_slice(&response.bytes).ok()?;
        parsed.events.into_iter().find(|e| e.event_id == event_id)?.periods?.main
    }

    /// A live event can carry both its own id and a separate parent id, each
    /// with a different view of which markets are open (spec.md §9). Rather
    /// than guess which one is authoritative, fetch both and keep whichever
    /// reports more open markets. Events with no `parent_id` skip the extra
    /// round trips and just use the period already in the league response.
    async fn resolve_period(&self, event: &RawEvent, cancel: &CancellationToken) -> Option<Period> {
        let Some(parent_id) = event.parent_id else {
            return event.periods.as_ref().and_then(|p| p.main.clone());
        };

        let (own, parent) =
            tokio::join!(self.fetch_period_for_event(event.event_id, cancel), self.fetch_period_for_event(parent_id, cancel));

        match (own, parent) {
            (Some(o), Some(p)) => Some(if open_market_score(&p) > open_market_score(&o) { p } else { o }),
            (Some(o), None) => Some(o),
            (None, Some(p)) => Some(p),
            (None, None) => None,
        }
    }

    async fn fetch_league(
        &self,
        league_id: Option<i32>,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let url = markets_url(&self.base_url, league_id);
        let response = self.fetch.fetch_authorized(Method::GET, &url, &self.api_key, ContentShape::Json, cancel).await?;

        let parsed: MarketsResponse = serde_json::from_slice(&response.bytes)
            .map_err(|e| ParseError::new(NAME, format!("markets response: {e}")))?;

        for event in parsed.events {
            if !self.league_known(event.league_id) {
                continue;
            }
            let Some(period) = self.resolve_period(&event, cancel).await else {
                continue;
            };
            if !is_market_open(&period) {
                continue;
            }
            let Some(kickoff) = parse_cutoff(&period.cutoff) else {
                debug!(adapter = NAME, cutoff = %period.cutoff, "unparsable cutoff, skipping");
                continue;
            };

            let mut m = Match::new(event.home.clone(), event.away.clone(), kickoff, "football", "", NAME, now);
            let mut main = Event::new(m.match_key.clone(), NAME, EventType::MainMatch);

            if let Some(ml) = &period.money_line {
                main.outcomes.push(Outcome::new(main.id(), OutcomeType::HomeWin, "", ml.home, NAME));
                main.outcomes.push(Outcome::new(main.id(), OutcomeType::Draw, "", ml.draw, NAME));
                main.outcomes.push(Outcome::new(main.id(), OutcomeType::AwayWin, "", ml.away, NAME));
            }
            if let Some(spreads) = &period.spreads {
                for spread in spreads.values() {
                    let home_line = format_signed(spread.hdp);
                    let Some(away_line) = crate::model::outcome::mirror_parameter(&home_line) else { continue };
                    main.outcomes.push(Outcome::new(main.id(), OutcomeType::HandicapHome, &home_line, spread.home, NAME));
                    main.outcomes.push(Outcome::new(main.id(), OutcomeType::HandicapAway, &away_line, spread.away, NAME));
                }
            }
            if let Some(totals) = &period.totals {
                for total in totals.values() {
                    let line = format!("{}", total.points);
                    main.outcomes.push(Outcome::new(main.id(), OutcomeType::TotalOver, &line, total.over, NAME));
                    main.outcomes.push(Outcome::new(main.id(), OutcomeType::TotalUnder, &line, total.under, NAME));
                }
            }

            finalize_event(&mut main);
            if main.is_emittable() {
                m.events.push(main);
            }

            if let Some(reason) = reject_reason(&m, now) {
                debug!(adapter = NAME, match_key = %m.match_key, %reason, "rejected");
                continue;
            }

            self.index.add_match(m);
        }

        Ok(())
    }
}

#[async_trait]
impl Adapter for PinnacleAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn parse_once(
        &self,
        now: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.api_key.is_empty() {
            return Err(Box::new(ParseError::new(NAME, "api key not configured")));
        }

        if self.known_leagues.is_empty() {
            return self.fetch_league(None, now, &cancel).await;
        }

        let outcomes = stream::iter(self.known_leagues.clone())
            .map(|league_id| {
                let cancel = cancel.clone();
                async move { (league_id, self.fetch_league(Some(league_id), now, &cancel).await) }
            })
            .buffer_unordered(MAX_CONCURRENT_LEAGUE_FETCHES)
            .collect::<Vec<_>>()
            .await;

        // A single league's failure never aborts the others (spec.md §4.3):
        // log and move on, the cycle as a whole still succeeds.
        for (league_id, result) in outcomes {
            if let Err(e) = result {
                warn!(adapter = NAME, league_id, error = %e, "league fetch failed, skipping");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period_with(status: i32, has_ml: bool, meta_open: bool) -> Period {
        Period {
            cutoff: "2026-01-01T00:00:00".to_string(),
            period_status: status,
            money_line: has_ml.then_some(MoneyLine { home: 1.9, draw: 3.4, away: 4.2 }),
            spreads: None,
            totals: None,
            meta: Some(Meta { open_money_line: Some(meta_open), open_spreads: None, open_totals: None }),
        }
    }

    #[test]
    fn market_open_requires_status_odds_and_meta_flag() {
        assert!(is_market_open(&period_with(1, true, true)));
        assert!(!is_market_open(&period_with(0, true, true)));
        assert!(!is_market_open(&period_with(1, false, true)));
        assert!(!is_market_open(&period_with(1, true, false)));
    }

    #[test]
    fn cutoff_parses_naive_utc_format() {
        let parsed = parse_cutoff("2026-03-05T18:30:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-03-05T18:30:00+00:00");
    }

    #[test]
    fn league_known_with_empty_allowlist_accepts_everything() {
        let index = Arc::new(AggregationIndex::new());
        let adapter = PinnacleAdapter::new(&SourceConfig::default(), index);
        assert!(adapter.league_known(42));
    }

    #[test]
    fn open_market_score_counts_lines_and_flags() {
        let thin = period_with(1, true, false);
        let rich = Period {
            meta: Some(Meta { open_money_line: Some(true), open_spreads: Some(true), open_totals: Some(false) }),
            ..period_with(1, true, true)
        };
        assert!(open_market_score(&rich) > open_market_score(&thin));
    }

    #[test]
    fn event_markets_url_scopes_to_one_event() {
        assert_eq!(
            event_markets_url("https://pinnacle-odds.example", 555),
            "https://pinnacle-odds.example/kit/v1/markets?event_id=555"
        );
    }

    #[test]
    fn markets_url_adds_league_id_only_when_given() {
        assert_eq!(
            markets_url("https://pinnacle-odds.example", None),
            "https://pinnacle-odds.example/kit/v1/markets?event_type=prematch&sport_id=1"
        );
        assert_eq!(
            markets_url("https://pinnacle-odds.example", Some(7)),
            "https://pinnacle-odds.example/kit/v1/markets?event_type=prematch&sport_id=1&league_id=7"
        );
    }
}
