//! Composition root (spec.md §9): wires each `enabled_parsers` name to the
//! adapter constructor it names. There is no attribute-driven registration
//! in Rust the way a dynamic-language plugin system might do it, so the
//! mapping is written out explicitly, once, here.

use std::sync::Arc;

use crate::adapters::{
    compact_feed::CompactFeedAdapter, esports_feed::EsportsFeedAdapter, monaco::MonacoAdapter,
    pinnacle::PinnacleAdapter, scraped::ScrapedAdapter, Adapter, AdapterRegistry,
};

pub fn build_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();

    registry.register(
        "monaco",
        Box::new(|source, index| Arc::new(MonacoAdapter::new(source, index)) as Arc<dyn Adapter>),
    );
    registry.register(
        "pinnacle",
        Box::new(|source, index| Arc::new(PinnacleAdapter::new(source, index)) as Arc<dyn Adapter>),
    );
    registry.register(
        "scraped",
        Box::new(|source, index| Arc::new(ScrapedAdapter::new(source, index)) as Arc<dyn Adapter>),
    );
    registry.register(
        "compact_feed",
        Box::new(|source, index| Arc::new(CompactFeedAdapter::new(source, index)) as Arc<dyn Adapter>),
    );
    registry.register(
        "esports_feed",
        Box::new(|source, index| Arc::new(EsportsFeedAdapter::new(source, index)) as Arc<dyn Adapter>),
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_shipped_adapter_is_registered() {
        let registry = build_registry();
        let names = registry.names();
        for expected in ["monaco", "pinnacle", "scraped", "compact_feed", "esports_feed"] {
            assert!(names.contains(&expected), "missing {expected} in registry");
        }
    }
}
