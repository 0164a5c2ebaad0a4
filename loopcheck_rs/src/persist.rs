//! Cross-run persistence of the import cache.
//!
//! The cache file is a convenience: when it is missing, corrupt, written by
//! another schema, resolved under other settings, or too old, the run simply
//! starts cold. Entries that survive are still fingerprint-checked on first use.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cache::{FileNode, FileSystemCache, ImportEdge};
use crate::config::Staleness;
use crate::error::{LoopcheckError, Result};
use crate::fingerprint::{FileIdentity, FileStat, Fingerprint};

/// Bump when the on-disk layout changes.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub fingerprint: Fingerprint,
    pub stat: FileStat,
    pub edges: Vec<ImportEdge>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedCache {
    pub schema_version: u32,
    pub staleness: Staleness,
    /// See [`ResolverConfig::resolution_key`](crate::resolver::ResolverConfig::resolution_key).
    pub resolution_key: String,
    pub saved_at_secs: u64,
    /// Keyed by absolute file path.
    pub entries: BTreeMap<String, PersistedEntry>,
}

/// What a loaded cache file must match to be trusted.
#[derive(Clone, Debug)]
pub struct LoadPolicy<'a> {
    pub staleness: Staleness,
    pub resolution_key: &'a str,
    pub max_age_secs: Option<u64>,
}

impl PersistedCache {
    pub fn from_cache(cache: &FileSystemCache, resolution_key: &str) -> Self {
        let entries = cache
            .nodes()
            .map(|node| {
                (
                    node.identity.path.to_string_lossy().to_string(),
                    PersistedEntry {
                        fingerprint: node.identity.fingerprint.clone(),
                        stat: node.stat,
                        edges: node.edges.clone(),
                    },
                )
            })
            .collect();
        Self {
            schema_version: CACHE_SCHEMA_VERSION,
            staleness: cache.staleness(),
            resolution_key: resolution_key.to_string(),
            saved_at_secs: now_secs(),
            entries,
        }
    }

    pub fn into_nodes(self) -> impl Iterator<Item = FileNode> {
        self.entries.into_iter().map(|(path, entry)| FileNode {
            identity: FileIdentity {
                path: PathBuf::from(path),
                fingerprint: entry.fingerprint,
            },
            stat: entry.stat,
            edges: entry.edges,
        })
    }

    /// Write atomically: temp file in the target directory, then rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| LoopcheckError::io(dir, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| LoopcheckError::io(dir, e))?;
        serde_json::to_writer(&mut tmp, self).map_err(|source| LoopcheckError::CacheFormat {
            path: path.to_path_buf(),
            source,
        })?;
        tmp.flush().map_err(|e| LoopcheckError::io(path, e))?;
        tmp.persist(path)
            .map_err(|e| LoopcheckError::io(path, e.error))?;
        tracing::debug!("saved {} cache entries to {}", self.entries.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path, policy: &LoadPolicy<'_>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LoopcheckError::io(path, e))?;
        let cache: Self =
            serde_json::from_str(&content).map_err(|source| LoopcheckError::CacheFormat {
                path: path.to_path_buf(),
                source,
            })?;

        let stale = |reason: String| LoopcheckError::StaleCache {
            path: path.to_path_buf(),
            reason,
        };
        if cache.schema_version != CACHE_SCHEMA_VERSION {
            return Err(stale(format!(
                "schema {} != {}",
                cache.schema_version, CACHE_SCHEMA_VERSION
            )));
        }
        if cache.staleness != policy.staleness {
            return Err(stale("written under another staleness policy".to_string()));
        }
        if cache.resolution_key != policy.resolution_key {
            return Err(stale("resolver settings changed".to_string()));
        }
        if let Some(max_age) = policy.max_age_secs {
            let age = now_secs().saturating_sub(cache.saved_at_secs);
            if age > max_age {
                return Err(stale(format!("{}s old, limit {}s", age, max_age)));
            }
        }
        Ok(cache)
    }

    /// `None` means start cold. Never fails the run.
    pub fn load_or_cold(path: &Path, policy: &LoadPolicy<'_>) -> Option<Self> {
        if !path.exists() {
            tracing::debug!("no cache file at {}, starting cold", path.display());
            return None;
        }
        match Self::load(path, policy) {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!("{}; starting cold", e);
                None
            }
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
