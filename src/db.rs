use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};

/// Durable key-value storage grouped in buckets. Every call is
/// self-contained: no handle outlives it.
pub trait KvBackend: Send + Sync {
    fn create_bucket(&self, bucket: &str) -> Result<()>;
    fn get_all(&self, bucket: &str) -> Result<Vec<(String, String)>>;
    fn get(&self, bucket: &str, key: &str) -> Result<Option<String>>;
    fn put(&self, bucket: &str, key: &str, value: &str) -> Result<()>;
    /// Returns whether the key existed.
    fn delete(&self, bucket: &str, key: &str) -> Result<bool>;
}

/// One SQLite table per bucket; a connection is opened for each call.
pub struct SqliteBackend {
    path: PathBuf,
}

impl SqliteBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection> {
        Ok(Connection::open(&self.path)?)
    }
}

fn table_name(bucket: &str) -> Result<String> {
    if bucket.is_empty()
        || !bucket
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        return Err(Error::Validation(format!("invalid bucket name {bucket:?}")));
    }
    Ok(format!("bucket_{bucket}"))
}

impl KvBackend for SqliteBackend {
    fn create_bucket(&self, bucket: &str) -> Result<()> {
        let table = table_name(bucket)?;
        self.open()?.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table}(
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );"
        ))?;
        Ok(())
    }

    fn get_all(&self, bucket: &str) -> Result<Vec<(String, String)>> {
        let table = table_name(bucket)?;
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!("SELECT key, value FROM {table} ORDER BY key"))?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<String>> {
        let table = table_name(bucket)?;
        let value = self
            .open()?
            .query_row(
                &format!("SELECT value FROM {table} WHERE key = ?1"),
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, bucket: &str, key: &str, value: &str) -> Result<()> {
        let table = table_name(bucket)?;
        self.open()?.execute(
            &format!(
                "INSERT INTO {table} (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value"
            ),
            params![key, value],
        )?;
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<bool> {
        let table = table_name(bucket)?;
        let removed = self.open()?.execute(
            &format!("DELETE FROM {table} WHERE key = ?1"),
            params![key],
        )?;
        Ok(removed > 0)
    }
}

/// Process-local backend for tests and demos.
#[derive(Default)]
pub struct MemoryBackend {
    buckets: Mutex<HashMap<String, BTreeMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_buckets<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, BTreeMap<String, String>>) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self
            .buckets
            .lock()
            .map_err(|_| Error::Validation("memory backend mutex poisoned".to_string()))?;
        f(&mut guard)
    }
}

fn missing_bucket(bucket: &str) -> Error {
    Error::NotFound(format!("bucket {bucket}"))
}

impl KvBackend for MemoryBackend {
    fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.with_buckets(|buckets| {
            buckets.entry(bucket.to_string()).or_default();
            Ok(())
        })
    }

    fn get_all(&self, bucket: &str) -> Result<Vec<(String, String)>> {
        self.with_buckets(|buckets| {
            let entries = buckets.get(bucket).ok_or_else(|| missing_bucket(bucket))?;
            Ok(entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect())
        })
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<String>> {
        self.with_buckets(|buckets| {
            let entries = buckets.get(bucket).ok_or_else(|| missing_bucket(bucket))?;
            Ok(entries.get(key).cloned())
        })
    }

    fn put(&self, bucket: &str, key: &str, value: &str) -> Result<()> {
        self.with_buckets(|buckets| {
            let entries = buckets
                .get_mut(bucket)
                .ok_or_else(|| missing_bucket(bucket))?;
            entries.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<bool> {
        self.with_buckets(|buckets| {
            let entries = buckets
                .get_mut(bucket)
                .ok_or_else(|| missing_bucket(bucket))?;
            Ok(entries.remove(key).is_some())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(backend: &dyn KvBackend) {
        backend.create_bucket("Event").expect("create bucket");
        backend.create_bucket("Event").expect("create twice");

        backend.put("Event", "b", "two").expect("put b");
        backend.put("Event", "a", "one").expect("put a");
        backend.put("Event", "a", "uno").expect("overwrite a");

        assert_eq!(backend.get("Event", "a").unwrap().as_deref(), Some("uno"));
        assert_eq!(backend.get("Event", "zzz").unwrap(), None);
        assert_eq!(
            backend.get_all("Event").unwrap(),
            vec![
                ("a".to_string(), "uno".to_string()),
                ("b".to_string(), "two".to_string())
            ]
        );

        assert!(backend.delete("Event", "a").unwrap());
        assert!(!backend.delete("Event", "a").unwrap());
        assert_eq!(backend.get_all("Event").unwrap().len(), 1);
    }

    #[test]
    fn sqlite_backend_round_trips() {
        let dir = tempfile::tempdir().expect("temp dir");
        let backend = SqliteBackend::new(dir.path().join("events.sqlite"));
        exercise(&backend);

        // a fresh handle sees the same data
        let reopened = SqliteBackend::new(backend.path());
        assert_eq!(reopened.get("Event", "b").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn memory_backend_round_trips() {
        exercise(&MemoryBackend::new());
    }

    #[test]
    fn sqlite_rejects_odd_bucket_names() {
        let dir = tempfile::tempdir().expect("temp dir");
        let backend = SqliteBackend::new(dir.path().join("events.sqlite"));
        let err = backend
            .create_bucket("Event; DROP TABLE x")
            .expect_err("invalid name");
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn unreachable_database_is_a_storage_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let backend = SqliteBackend::new(dir.path().join("missing").join("events.sqlite"));
        let err = backend.get_all("Event").expect_err("cannot open");
        assert_eq!(err.kind(), "storage");
    }

    #[test]
    fn memory_backend_requires_bucket() {
        let backend = MemoryBackend::new();
        assert_eq!(
            backend.put("Event", "a", "1").expect_err("no bucket").kind(),
            "not_found"
        );
    }
}
