//! HTML-scraped adapter: no JSON API, just a venue page with an embedded
//! fixture list and localized date strings. Extraction stays regex-based,
//! the same tool the teacher reaches for in `monaco::market_init` to pull
//! a line out of a market name — there is no structured schema to
//! deserialize against here, so a DOM parser would add a dependency for a
//! handful of capture groups.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::normalize::{finalize_event, reject_reason};
use super::Adapter;
use crate::config::SourceConfig;
use crate::http::{ContentShape, FetchClient};
use crate::index::AggregationIndex;
use crate::model::event::{Event, EventType};
use crate::model::football::Match;
use crate::model::outcome::{Outcome, OutcomeType};

const NAME: &str = "scraped";

/// One `<div class="fixture">...home...away...date...odds...</div>` block.
static FIXTURE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)<div class="fixture"[^>]*>.*?data-home="(?P<home>[^"]+)".*?data-away="(?P<away>[^"]+)".*?data-kickoff="(?P<kickoff>[^"]+)".*?data-home-odds="(?P<home_odds>[\d.]+)".*?data-draw-odds="(?P<draw_odds>[\d.]+)".*?data-away-odds="(?P<away_odds>[\d.]+)".*?</div>"#,
    )
    .expect("fixture regex is valid")
});

const MONTHS_FR: [&str; 12] = [
    "janvier", "février", "mars", "avril", "mai", "juin", "juillet", "août", "septembre", "octobre", "novembre", "décembre",
];

/// Parses `"5 mars 2026 20:00"` style localized dates. Falls back to
/// RFC3339 for sources that embed a machine-readable `data-kickoff`
/// instead (the common case — locale parsing only kicks in when the page
/// has no structured attribute).
fn parse_localized_kickoff(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let parts: Vec<&str> = raw.split_whitespace().collect();
    if parts.len() != 4 {
        return None;
    }
    let day: u32 = parts[0].parse().ok()?;
    let month = MONTHS_FR.iter().position(|m| m.eq_ignore_ascii_case(parts[1]))? as u32 + 1;
    let year: i32 = parts[2].parse().ok()?;
    let (hour, minute) = parts[3].split_once(':')?;
    let time = NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(Utc.from_utc_datetime(&NaiveDateTime::new(date, time)))
}

pub struct ScrapedAdapter {
    index: Arc<AggregationIndex>,
    fetch: FetchClient,
    base_url: String,
    sport: String,
}

impl ScrapedAdapter {
    pub fn new(source: &SourceConfig, index: Arc<AggregationIndex>) -> Self {
        let base_url = source.base_url.clone().unwrap_or_else(|| "https://scores.example/fixtures".to_string());
        let timeout = source.timeout.unwrap_or(Duration::from_secs(10));
        let fetch = FetchClient::new(
            NAME,
            timeout,
            source.min_request_interval,
            Duration::from_secs(10),
            source.proxy_list.clone(),
            source.user_agent.clone(),
            source.insecure_tls,
        );
        Self {
            index,
            fetch,
            base_url,
            sport: source.custom("sport").unwrap_or("football").to_string(),
        }
    }
}

#[async_trait]
impl Adapter for ScrapedAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn parse_once(
        &self,
        now: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let response = self
            .fetch
            .fetch(reqwest::Method::GET, &self.base_url, ContentShape::Html, &cancel)
            .await?;
        let html = String::from_utf8_lossy(&response.bytes);

        let mut found = 0usize;
        for caps in FIXTURE_BLOCK.captures_iter(&html) {
            found += 1;
            let home = caps["home"].trim();
            let away = caps["away"].trim();
            let Some(kickoff) = parse_localized_kickoff(&caps["kickoff"]) else {
                debug!(adapter = NAME, raw = &caps["kickoff"], "unparsable kickoff, skipping fixture");
                continue;
            };
            let home_odds: f64 = caps["home_odds"].parse().unwrap_or(0.0);
            let draw_odds: f64 = caps["draw_odds"].parse().unwrap_or(0.0);
            let away_odds: f64 = caps["away_odds"].parse().unwrap_or(0.0);

            let mut m = Match::new(home, away, kickoff, self.sport.clone(), "", NAME, now);
            let mut main = Event::new(m.match_key.clone(), NAME, EventType::MainMatch);
            main.outcomes.push(Outcome::new(main.id(), OutcomeType::HomeWin, "", home_odds, NAME));
            main.outcomes.push(Outcome::new(main.id(), OutcomeType::Draw, "", draw_odds, NAME));
            main.outcomes.push(Outcome::new(main.id(), OutcomeType::AwayWin, "", away_odds, NAME));
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

        if found == 0 {
            debug!(adapter = NAME, "no fixture blocks matched, page shape may have changed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_kickoff_parses_directly() {
        let parsed = parse_localized_kickoff("2026-03-05T20:00:00Z").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-03-05T20:00:00+00:00");
    }

    #[test]
    fn french_locale_date_parses() {
        let parsed = parse_localized_kickoff("5 mars 2026 20:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-03-05T20:00:00+00:00");
    }

    #[test]
    fn malformed_date_yields_none() {
        assert!(parse_localized_kickoff("not a date").is_none());
    }

    #[test]
    fn fixture_block_extracts_teams_and_odds() {
        let html = r#"<div class="fixture" id="1" data-home="Lyon" data-away="Marseille" data-kickoff="2026-03-05T20:00:00Z" data-home-odds="2.10" data-draw-odds="3.40" data-away-odds="3.20">...</div>"#;
        let caps = FIXTURE_BLOCK.captures(html).unwrap();
        assert_eq!(&caps["home"], "Lyon");
        assert_eq!(&caps["away"], "Marseille");
    }
}
