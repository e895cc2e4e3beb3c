//! Error types for the extraction engine.
//!
//! Only [`HarvestError`] aborts a run. The other types are recovered locally
//! and end up as diagnostics in the completeness report.

/// A raw value that could not be read as a number.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot normalize {raw:?} to a number")]
pub struct NormalizationError {
    pub raw: String,
}

impl NormalizationError {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

/// A response body that could not be decoded into columns.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("payload is empty")]
    Empty,

    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload has unexpected shape: {0}")]
    Shape(String),
}

/// Invalid static configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("no sections configured")]
    NoSections,

    #[error("duplicate section name: {0}")]
    DuplicateSection(String),

    #[error("no metrics configured")]
    NoMetrics,

    #[error("duplicate metric key: {0}")]
    DuplicateMetric(String),

    #[error("column {column} maps to unknown metric {metric}")]
    UnknownMetric { column: String, metric: String },

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The single top-level failure surfaced to callers.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("browser failure: {0}")]
    BrowserFatal(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, HarvestError>;
