//! HTTP surface (C6): read-only snapshot endpoints plus the liveness and
//! manual start/stop controls spec.md §6 describes. Built on `axum`, the
//! same framework the teacher uses for its WebSocket server in the old
//! `main.rs` — only the handlers change, not the serving stack.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::index::{AggregationIndex, KickoffFilter, MergedMatch, SnapshotFilter};
use crate::model::EsportsMatch;
use crate::runtime::{ParserRuntime, StartOutcome, StopOutcome};

pub struct ApiState {
    pub index: Arc<AggregationIndex>,
    pub runtime: Arc<ParserRuntime>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/matches", get(list_matches))
        .route("/esports-matches", get(list_esports_matches))
        .route("/health", get(health))
        .route("/async/start", post(async_start))
        .route("/async/stop", post(async_stop))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct MatchesQuery {
    status: Option<String>,
    sport: Option<String>,
}

#[derive(Debug, Serialize)]
struct MatchesResponse {
    count: usize,
    matches: Vec<MergedMatch>,
}

fn parse_kickoff_filter(status: Option<&str>) -> Option<KickoffFilter> {
    match status {
        Some("live") => Some(KickoffFilter::Live),
        Some("upcoming") => Some(KickoffFilter::Upcoming),
        Some("all") | None => None,
        Some(_) => None,
    }
}

async fn list_matches(State(state): State<Arc<ApiState>>, Query(params): Query<MatchesQuery>) -> impl IntoResponse {
    let filter = SnapshotFilter {
        kickoff: parse_kickoff_filter(params.status.as_deref()),
        sport: params.sport,
    };
    let matches = state.index.snapshot(&filter);
    Json(MatchesResponse { count: matches.len(), matches })
}

async fn list_esports_matches(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let matches: Vec<EsportsMatch> = state.index.snapshot_esports();
    Json(serde_json::json!({ "count": matches.len(), "matches": matches }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    running: bool,
    index_size: usize,
    adapters: Vec<AdapterHealthResponse>,
}

#[derive(Debug, Serialize)]
struct AdapterHealthResponse {
    name: &'static str,
    last_successful_cycle: Option<chrono::DateTime<chrono::Utc>>,
    last_error: Option<String>,
}

async fn health(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let adapters = state
        .runtime
        .health()
        .into_iter()
        .map(|h| AdapterHealthResponse {
            name: h.name,
            last_successful_cycle: h.last_successful_cycle,
            last_error: h.last_error,
        })
        .collect();

    Json(HealthResponse {
        status: "ok",
        running: state.runtime.is_running(),
        index_size: state.index.len(),
        adapters,
    })
}

#[derive(Debug, Serialize)]
struct AsyncControlResponse {
    status: &'static str,
}

async fn async_start(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let status = match state.runtime.start().await {
        StartOutcome::Started => "started",
        StartOutcome::AlreadyRunning => "already_running",
    };
    Json(AsyncControlResponse { status })
}

async fn async_stop(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let status = match state.runtime.stop().await {
        StopOutcome::Stopped => "stopped",
        StopOutcome::AlreadyStopped => "already_stopped",
    };
    Json(AsyncControlResponse { status })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_query_param_maps_to_kickoff_filter() {
        assert_eq!(parse_kickoff_filter(Some("live")), Some(KickoffFilter::Live));
        assert_eq!(parse_kickoff_filter(Some("upcoming")), Some(KickoffFilter::Upcoming));
        assert_eq!(parse_kickoff_filter(Some("all")), None);
        assert_eq!(parse_kickoff_filter(None), None);
        assert_eq!(parse_kickoff_filter(Some("bogus")), None);
    }
}
