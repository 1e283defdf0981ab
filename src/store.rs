use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, warn};

use crate::db::KvBackend;
use crate::error::{Error, Result};
use crate::models::{Category, Event};
use crate::normalize;

const BUCKET: &str = "Event";

type Cache = HashMap<String, Event>;

/// Events keyed by id, persisted in a [`KvBackend`] and mirrored in memory.
///
/// The mirror is cold after construction: the first read loads it from the
/// backend, and until that load succeeds every read goes back to the backend.
/// Mutations hold the mirror lock for the whole durable write and touch the
/// mirror only once the write went through.
///
/// The boolean results follow the curation workflow: `false` means the call
/// had no effect, and the reason is logged.
pub struct EventStore {
    backend: Box<dyn KvBackend>,
    cache: Mutex<Option<Cache>>,
}

impl EventStore {
    pub fn new(backend: impl KvBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            cache: Mutex::new(None),
        }
    }

    fn load(&self) -> Result<Cache> {
        self.backend.create_bucket(BUCKET)?;
        let mut events = Cache::new();
        for (key, value) in self.backend.get_all(BUCKET)? {
            match serde_json::from_str::<Event>(&value) {
                Ok(event) => {
                    events.insert(key, event);
                }
                Err(err) => {
                    warn!(event_id = %key, error_kind = "json", "undecodable stored event: {err}");
                }
            }
        }
        debug!(count = events.len(), "event cache loaded");
        Ok(events)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Cache>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the warm mirror. When the backend cannot be read, `f`
    /// sees an empty, throwaway map and the mirror stays cold.
    fn with_cache<T>(&self, f: impl FnOnce(&mut Cache) -> T) -> T {
        let mut guard = self.lock();
        if guard.is_none() {
            match self.load() {
                Ok(events) => *guard = Some(events),
                Err(err) => {
                    error!(error_kind = err.kind(), "db access: {err}");
                    return f(&mut Cache::new());
                }
            }
        }
        match guard.as_mut() {
            Some(cache) => f(cache),
            None => f(&mut Cache::new()),
        }
    }

    fn persist(&self, event: &Event) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        self.backend.put(BUCKET, &event.id, &payload)
    }

    /// Every stored event by id.
    pub fn get(&self) -> HashMap<String, Event> {
        self.with_cache(|cache| cache.clone())
    }

    pub fn get_by_id(&self, id: &str) -> Option<Event> {
        self.with_cache(|cache| cache.get(id).cloned())
    }

    /// Events queued for publishing, oldest timestamp first.
    pub fn get_category_publish(&self) -> Vec<Event> {
        self.list(Some(Category::Publish))
    }

    /// Stored events, optionally restricted to one category, ordered by
    /// timestamp then id.
    pub fn list(&self, category: Option<Category>) -> Vec<Event> {
        let mut events: Vec<Event> = self.with_cache(|cache| {
            cache
                .values()
                .filter(|event| category.map_or(true, |wanted| event.category == wanted))
                .cloned()
                .collect()
        });
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        events
    }

    /// Stores a new event. An event whose id is already known is skipped:
    /// the first write wins. Returns whether the event was stored.
    pub fn add(&self, mut event: Event) -> bool {
        if event.id.is_empty() {
            event.id = event.key().to_string();
        }

        let result = self.with_cache(|cache| {
            if event.id.is_empty() {
                return Err(Error::Validation("event without id or title".to_string()));
            }
            if cache.contains_key(&event.id) {
                debug!(event_id = %event.id, title = %event.title, "add event, already exists, will be skipped");
                return Ok(false);
            }
            self.persist(&event)?;
            cache.insert(event.id.clone(), event.clone());
            Ok(true)
        });

        result.unwrap_or_else(|err| {
            error!(event_id = %event.id, error_kind = err.kind(), "add event: {err}");
            false
        })
    }

    /// Replaces an existing event. Never creates one.
    pub fn save(&self, event: &Event) -> bool {
        let result = self.with_cache(|cache| {
            if !cache.contains_key(&event.id) {
                return Err(Error::NotFound(format!("event to save {:?}", event.id)));
            }
            self.persist(event)?;
            cache.insert(event.id.clone(), event.clone());
            Ok(())
        });

        match result {
            Ok(()) => true,
            Err(err) => {
                error!(event_id = %event.id, error_kind = err.kind(), "save event: {err}");
                false
            }
        }
    }

    pub fn delete(&self, id: &str) -> bool {
        let result = self.with_cache(|cache| {
            if !cache.contains_key(id) {
                return Err(Error::NotFound(format!("event to delete {id:?}")));
            }
            self.backend.delete(BUCKET, id)?;
            cache.remove(id);
            Ok(())
        });

        match result {
            Ok(()) => true,
            Err(err) => {
                error!(event_id = %id, error_kind = err.kind(), "delete event: {err}");
                false
            }
        }
    }

    /// Moves an event to another curation state. `category` is the raw value
    /// received from the curator and must name one of the four states.
    pub fn change_category(&self, id: &str, category: u8) -> bool {
        let id = normalize::sanitize(id);
        match Category::try_from(category) {
            Ok(category) => self.set_category(&id, category),
            Err(err) => {
                error!(event_id = %id, category, error_kind = err.kind(), "change category: {err}");
                false
            }
        }
    }

    /// Same as [`EventStore::change_category`] for an id taken from a stored
    /// event, used as is.
    pub(crate) fn set_category(&self, id: &str, category: Category) -> bool {
        let result: Result<()> = self.with_cache(|cache| {
            let mut event = cache
                .get(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("event {id:?}")))?;
            event.category = category;
            self.persist(&event)?;
            cache.insert(id.to_string(), event);
            Ok(())
        });

        match result {
            Ok(()) => true,
            Err(err) => {
                error!(event_id = %id, category = %category, error_kind = err.kind(), "change category: {err}");
                false
            }
        }
    }
}
