use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A named, URL-addressed origin of event listings. The name selects the
/// adapter used to read it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub url: String,
}

impl Source {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Curation state of an event.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum Category {
    #[default]
    New = 0,
    Publish = 1,
    Published = 2,
    Blocked = 3,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::New => "new",
            Category::Publish => "publish",
            Category::Published => "published",
            Category::Blocked => "blocked",
        }
    }
}

impl TryFrom<u8> for Category {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Category::New),
            1 => Ok(Category::Publish),
            2 => Ok(Category::Published),
            3 => Ok(Category::Blocked),
            other => Err(Error::Validation(format!("no such category: {other}"))),
        }
    }
}

impl From<Category> for u8 {
    fn from(category: Category) -> Self {
        category as u8
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Event {
    #[serde(rename = "ID")]
    pub id: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub image: String,
    pub place: String,
    pub location: String,
    pub location_map: String,
    /// e.g. "May 12th, 2022 - December 31st, 2022"
    pub date_text: String,
    /// recurring weekdays, e.g. "mon, tue, wed"
    pub days: String,
    /// "10:00 - 18:00"
    pub time: String,
    /// Sort key. Past starts are clamped to the current hour when collected.
    pub timestamp: DateTime<Utc>,
    pub category: Category,
}

impl Event {
    /// Storage key: the external id, or the title when the source gave none.
    pub fn key(&self) -> &str {
        if self.id.is_empty() {
            &self.title
        } else {
            &self.id
        }
    }
}
