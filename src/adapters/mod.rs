//! Source adapters (C3). Each adapter owns one external feed: it knows how
//! to discover fixtures, fetch odds, normalize them into the canonical
//! model and publish into the shared `AggregationIndex`. The trait surface
//! is deliberately narrow — everything adapter-specific lives behind it,
//! everything shared (scheduling, rate limiting, the pairing rules) lives
//! outside it.

pub mod compact_feed;
pub mod esports_feed;
pub mod monaco;
pub mod normalize;
pub mod pinnacle;
pub mod scraped;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::SourceConfig;
use crate::index::AggregationIndex;

/// One full discover → fetch → normalize → publish pass for a single
/// source. Cycle scheduling, deadlines and cancellation are the runtime's
/// job (C5); an adapter only has to respect the `CancellationToken` it is
/// handed and return before its deadline where it reasonably can.
///
/// Recoverable failures (a league fetch failing, a fixture rejected by
/// normalization) are logged by the adapter and do not end the cycle —
/// only a condition that makes the entire source unusable for this cycle
/// (bad base URL, auth failure) should return `Err`.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn parse_once(
        &self,
        now: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Builds one adapter instance from its `SourceConfig` slice of the parsed
/// config and a handle to the shared index.
pub type AdapterFactory =
    Box<dyn Fn(&SourceConfig, Arc<AggregationIndex>) -> Arc<dyn Adapter> + Send + Sync>;

/// Maps a configured parser name (spec.md §6 `enabled_parsers`) to the
/// factory that builds it. Populated once at startup by
/// `crate::registry::build_registry` — see spec.md §9's "wire the registry
/// explicitly" guidance; there is no compile-time registration mechanism
/// in Rust, so composition is explicit instead of implicit.
#[derive(Default)]
pub struct AdapterRegistry {
    factories: std::collections::HashMap<&'static str, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &'static str, factory: AdapterFactory) {
        self.factories.insert(name, factory);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn build(
        &self,
        name: &str,
        source: &SourceConfig,
        index: Arc<AggregationIndex>,
    ) -> Option<Arc<dyn Adapter>> {
        self.factories.get(name).map(|factory| factory(source, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopAdapter;

    #[async_trait]
    impl Adapter for NoopAdapter {
        fn name(&self) -> &'static str {
            "noop"
        }
        async fn parse_once(
            &self,
            _now: DateTime<Utc>,
            _cancel: CancellationToken,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
    }

    #[test]
    fn unregistered_name_builds_nothing() {
        let registry = AdapterRegistry::new();
        let index = Arc::new(AggregationIndex::new());
        assert!(registry.build("ghost", &SourceConfig::default(), index).is_none());
    }

    #[test]
    fn registered_factory_builds_an_adapter() {
        let mut registry = AdapterRegistry::new();
        registry.register("noop", Box::new(|_source, _index| Arc::new(NoopAdapter) as Arc<dyn Adapter>));
        let index = Arc::new(AggregationIndex::new());
        let adapter = registry.build("noop", &SourceConfig::default(), index).unwrap();
        assert_eq!(adapter.name(), "noop");
    }
}
