//! Error type for the fallible edges of the crate (config and persisted cache).
//!
//! Detection itself never fails: unresolvable specifiers, unreadable files and
//! depth cut-offs all degrade to "no cycle found".

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoopcheckError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid cache file {path}: {source}")]
    CacheFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache file {path} is stale: {reason}")]
    StaleCache { path: PathBuf, reason: String },
}

impl LoopcheckError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoopcheckError>;
