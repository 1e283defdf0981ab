use reqwest::Url;
use tracing::{debug, error, info, warn};

use crate::models::{Event, Source};
use crate::scraping::AdapterRegistry;

/// Runs every configured source through its adapter and merges the results.
pub struct Collector {
    registry: AdapterRegistry,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new(AdapterRegistry::builtin())
    }
}

impl Collector {
    pub fn new(registry: AdapterRegistry) -> Self {
        Self { registry }
    }

    /// Events from all sources, ascending by timestamp. Ties keep source
    /// order. A failing source only shrinks the result.
    pub fn collect(&self, sources: &[Source]) -> Vec<Event> {
        let mut collected = Vec::new();

        for source in sources {
            debug!(source = %source.name, url = %source.url, "collecting events");

            let url = match Url::parse(&source.url) {
                Ok(url) => url,
                Err(err) => {
                    error!(source = %source.name, url = %source.url, error_kind = "validation", "wrong source url: {err}");
                    continue;
                }
            };

            let Some(adapter) = self.registry.create(source) else {
                error!(source = %source.name, error_kind = "validation", "undefined source name");
                continue;
            };

            let events = adapter.load_events(&url);
            if events.is_empty() {
                warn!(source = %source.name, "no events from source");
                continue;
            }

            debug!(source = %source.name, count = events.len(), "collected events");
            collected.extend(events);
        }

        collected.sort_by_key(|event| event.timestamp);
        info!(count = collected.len(), "collection finished");
        collected
    }
}
