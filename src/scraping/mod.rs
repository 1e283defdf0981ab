pub mod agenda_cultural;
pub mod base;
pub mod fixture;
pub mod porto_api;

use std::collections::BTreeMap;

use reqwest::Url;

use crate::models::{Event, Source};

/// Fetches and parses the events published by one source.
///
/// Implementations never fail past this boundary: fetch and parse problems
/// are logged and the offending item (or the whole source) is left out.
pub trait SourceAdapter: Send + Sync {
    fn load_events(&self, url: &Url) -> Vec<Event>;
}

pub type AdapterFactory = fn(&Source) -> Box<dyn SourceAdapter>;

/// Maps source names to adapter constructors.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: BTreeMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every adapter shipped in this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(porto_api::SOURCE_NAME, porto_api::create);
        registry.register(agenda_cultural::SOURCE_NAME, agenda_cultural::create);
        registry.register(fixture::SOURCE_NAME, fixture::create);
        registry
    }

    /// Adds or replaces the constructor for `name`.
    pub fn register(&mut self, name: &str, factory: AdapterFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn create(&self, source: &Source) -> Option<Box<dyn SourceAdapter>> {
        self.factories.get(&source.name).map(|factory| factory(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    impl SourceAdapter for Nothing {
        fn load_events(&self, _url: &Url) -> Vec<Event> {
            Vec::new()
        }
    }

    fn nothing(_: &Source) -> Box<dyn SourceAdapter> {
        Box::new(Nothing)
    }

    #[test]
    fn builtin_registry_knows_every_adapter() {
        let registry = AdapterRegistry::builtin();
        for name in ["agendaculturalporto", "porto", "testing"] {
            assert!(
                registry.create(&Source::new(name, "https://example.org")).is_some(),
                "{name} has an adapter"
            );
        }
    }

    #[test]
    fn unknown_name_has_no_adapter() {
        let registry = AdapterRegistry::builtin();
        assert!(registry
            .create(&Source::new("teatromunicipaldoporto", "https://example.org"))
            .is_none());
    }

    #[test]
    fn registering_a_variant_extends_dispatch() {
        let mut registry = AdapterRegistry::empty();
        registry.register("nothing", nothing);
        let adapter = registry
            .create(&Source::new("nothing", "https://example.org"))
            .expect("registered adapter");
        let url = Url::parse("https://example.org").unwrap();
        assert!(adapter.load_events(&url).is_empty());
    }
}
