pub mod collector;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod publisher;
pub mod scraping;
pub mod store;
pub mod telegram;
pub mod utils;

use serde::Serialize;
use tracing::info;

use collector::Collector;
use config::AppConfig;
use db::SqliteBackend;
use error::Result;
use models::Source;
use publisher::{PublishReport, Publisher};
use store::EventStore;
use telegram::{ChannelError, TelegramChannel};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectReport {
    pub collected: usize,
    pub added: usize,
}

/// SQLite-backed store at the configured (or platform default) location.
pub fn open_store(config: &AppConfig) -> EventStore {
    let path = config.database_path();
    utils::ensure_parent(&path);
    EventStore::new(SqliteBackend::new(path))
}

/// Collects every source and adds the results to the store. Known ids are
/// left untouched.
pub fn collect_and_store(collector: &Collector, sources: &[Source], store: &EventStore) -> CollectReport {
    let events = collector.collect(sources);
    let collected = events.len();
    let added = events
        .into_iter()
        .map(|event| store.add(event))
        .filter(|added| *added)
        .count();

    info!(collected, added, "events stored");
    CollectReport { collected, added }
}

/// Loads the configured source list, then runs [`collect_and_store`].
pub fn collect_from_config(config: &AppConfig, store: &EventStore) -> Result<CollectReport> {
    let sources = config::load_sources(&config.sources_list_path)?;
    Ok(collect_and_store(&Collector::default(), &sources, store))
}

/// Publishes the queue through the configured Telegram channel.
pub fn publish_from_config(
    config: &AppConfig,
    store: &EventStore,
) -> std::result::Result<PublishReport, ChannelError> {
    let channel = TelegramChannel::from_config(&config.telegram)?;
    Ok(Publisher::new(store, &channel)
        .with_limit(config.publish.caption_limit)
        .publish_pending())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryBackend;
    use crate::models::{Category, Event};
    use crate::scraping::{fixture, AdapterRegistry};
    use chrono::{TimeZone, Utc};
    use httpmock::prelude::*;
    use reqwest::Url;
    use std::io::Write;

    fn fixture_file(events: &[Event]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(serde_json::to_string(events).unwrap().as_bytes())
            .expect("write fixture");
        file
    }

    fn event(id: &str, title: &str, hour: u32) -> Event {
        Event {
            id: id.to_string(),
            title: title.to_string(),
            image: format!("https://img.example.org/{id}.jpg"),
            timestamp: Utc.with_ymd_and_hms(2030, 1, 1, hour, 0, 0).unwrap(),
            ..Event::default()
        }
    }

    #[test]
    fn collecting_twice_keeps_first_version() {
        let first = fixture_file(&[event("a", "Original", 10), event("b", "B", 9)]);
        let second = fixture_file(&[event("a", "Changed", 10), event("c", "C", 11)]);
        let sources = [
            Source::new(
                fixture::SOURCE_NAME,
                Url::from_file_path(first.path()).unwrap().as_str(),
            ),
            Source::new(
                fixture::SOURCE_NAME,
                Url::from_file_path(second.path()).unwrap().as_str(),
            ),
        ];
        let store = EventStore::new(MemoryBackend::new());
        let collector = Collector::new(AdapterRegistry::builtin());

        let report = collect_and_store(&collector, &sources, &store);

        assert_eq!(report, CollectReport { collected: 4, added: 3 });
        assert_eq!(store.get_by_id("a").unwrap().title, "Original");
        assert_eq!(store.get().len(), 3);

        let again = collect_and_store(&collector, &sources, &store);
        assert_eq!(again, CollectReport { collected: 4, added: 0 });
    }

    #[test]
    fn curated_events_are_published_end_to_end() {
        let file = fixture_file(&[event("a", "Fado", 10), event("b", "Jazz", 12)]);
        let dir = tempfile::tempdir().expect("temp dir");
        let server = MockServer::start();
        let send = server.mock(|when, then| {
            when.method(POST).path("/bot123:abc/sendPhoto");
            then.status(200).body(r#"{"ok": true, "result": {}}"#);
        });

        let mut config = AppConfig {
            database_path: Some(dir.path().join("events.sqlite")),
            ..AppConfig::default()
        };
        config.telegram.bot_api_token = "123:abc".to_string();
        config.telegram.channel_id = "@porto_events".to_string();
        config.telegram.api_base = Some(server.base_url());

        let store = open_store(&config);
        let sources = [Source::new(
            fixture::SOURCE_NAME,
            Url::from_file_path(file.path()).unwrap().as_str(),
        )];
        collect_and_store(&Collector::default(), &sources, &store);
        assert!(store.change_category("b", Category::Publish.into()));

        let report = publish_from_config(&config, &store).expect("publish");

        send.assert_hits(1);
        assert_eq!(report, PublishReport { sent: 1, failed: 0 });
        let reopened = open_store(&config);
        assert_eq!(reopened.get_by_id("b").unwrap().category, Category::Published);
        assert_eq!(reopened.get_by_id("a").unwrap().category, Category::New);
    }

    #[test]
    fn publishing_without_channel_config_fails() {
        let store = EventStore::new(MemoryBackend::new());
        assert!(matches!(
            publish_from_config(&AppConfig::default(), &store),
            Err(ChannelError::MissingToken)
        ));
    }
}
