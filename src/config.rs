use std::{fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Source;
use crate::normalize::CAPTION_LIMIT;
use crate::utils;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_api_token: String,
    pub channel_id: String,
    pub channel_name: String,
    /// Overrides https://api.telegram.org
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PublishConfig {
    pub caption_limit: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            caption_limit: CAPTION_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub production_mode: bool,
    /// 0 (panic) .. 6 (trace)
    pub log_level: u8,
    pub sources_list_path: PathBuf,
    pub database_path: Option<PathBuf>,
    pub telegram: TelegramConfig,
    pub publish: PublishConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            production_mode: false,
            log_level: 4,
            sources_list_path: PathBuf::from("configs/event-sources.toml"),
            database_path: None,
            telegram: TelegramConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads a TOML config; a missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(utils::database_path)
    }
}

#[derive(Debug, Deserialize)]
struct SourceList {
    #[serde(default)]
    source: Vec<Source>,
}

/// Reads the ordered `[[source]]` tables of a source list file.
pub fn load_sources(path: &Path) -> Result<Vec<Source>> {
    let contents = fs::read_to_string(path)?;
    let list: SourceList = toml::from_str(&contents)?;
    Ok(list.source)
}
