use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("date parse error: {input:?} does not match {layout:?}")]
    DateParse { input: String, layout: String },
    #[error("image not found: no {0} candidate in srcset")]
    ImageNotFound(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    pub fn fetch(url: impl Into<String>, err: impl ToString) -> Self {
        Error::Fetch {
            url: url.into(),
            message: err.to_string(),
        }
    }

    /// Short label for structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Fetch { .. } => "fetch",
            Error::Parse(_) => "parse",
            Error::DateParse { .. } => "date_parse",
            Error::ImageNotFound(_) => "image_not_found",
            Error::Validation(_) => "validation",
            Error::NotFound(_) => "not_found",
            Error::Storage(_) => "storage",
            Error::Json(_) => "json",
            Error::Io(_) => "io",
            Error::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
