//! Error taxonomy from spec.md §7, expressed as concrete types instead of
//! prose "kinds". `ConfigError` is the only variant that ever reaches
//! `main` and causes a non-zero exit; everything else is handled as close
//! to the offending league/event as possible and logged, not propagated.

use thiserror::Error;

/// Fatal at startup: malformed config, unknown parser name, missing
/// required field.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unknown parser name in enabled_parsers: {0}")]
    UnknownParser(String),
    #[error("enabled parser {0} is not registered in the adapter registry")]
    UnregisteredParser(String),
}

/// Transport/throttle/shape errors raised by the HTTP fetch layer (C2).
/// Per-request; the caller logs and skips the offending league/event.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("throttled (HTTP 429), cooldown applied")]
    Throttled,
    #[error("http error: status {0}")]
    HttpError(u16),
    #[error("blocked: response body failed content-shape sniff")]
    Blocked,
    #[error("request canceled")]
    Canceled,
}

/// Upstream schema changed or response was truncated/unparseable.
/// Logged at warn level; the offending league/event is skipped.
#[derive(Debug, Error)]
#[error("parse error in {source_name}: {message}")]
pub struct ParseError {
    pub source_name: String,
    pub message: String,
}

impl ParseError {
    pub fn new(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Not an error — normalization rejected a candidate match. Filtered
/// silently at debug level by the adapter that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    MissingTeams,
    MissingKickoff,
    KickoffInPast,
    NoValidOutcomes,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectReason::MissingTeams => "missing team names",
            RejectReason::MissingKickoff => "missing kickoff time",
            RejectReason::KickoffInPast => "kickoff is not strictly in the future",
            RejectReason::NoValidOutcomes => "zero valid outcomes after normalization",
        };
        write!(f, "{s}")
    }
}

/// Not an error — the cycle's deadline fired or the parent context was
/// canceled. Partial publication to the index stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleAborted;

impl std::fmt::Display for CycleAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cycle aborted: deadline fired or context canceled")
    }
}
