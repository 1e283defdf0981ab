use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Url;
use tracing::warn;

use super::SourceAdapter;
use crate::error::Result;
use crate::models::{Event, Source};

pub const SOURCE_NAME: &str = "testing";

const DEFAULT_PATH: &str = "fixtures/events.json";

/// Serves pre-built events from a local JSON file, for demos and tests
/// without network access. A `file://` source URL picks the file.
pub struct Fixture {
    name: String,
    default_path: PathBuf,
}

pub fn create(source: &Source) -> Box<dyn SourceAdapter> {
    Box::new(Fixture::new(source))
}

impl Fixture {
    pub fn new(source: &Source) -> Self {
        Self {
            name: source.name.clone(),
            default_path: PathBuf::from(DEFAULT_PATH),
        }
    }

    fn path_for(&self, url: &Url) -> PathBuf {
        if url.scheme() == "file" {
            if let Ok(path) = url.to_file_path() {
                return path;
            }
        }
        self.default_path.clone()
    }
}

pub fn read_events(path: &Path) -> Result<Vec<Event>> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

impl SourceAdapter for Fixture {
    fn load_events(&self, url: &Url) -> Vec<Event> {
        let path = self.path_for(url);
        match read_events(&path) {
            Ok(events) => events,
            Err(err) => {
                warn!(source = %self.name, path = %path.display(), error_kind = err.kind(), "{err}");
                Vec::new()
            }
        }
    }
}
