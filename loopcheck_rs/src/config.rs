//! Configuration file support for loopcheck.
//!
//! Loads optional `.loopcheck/config.toml` from project root.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{LoopcheckError, Result};

/// Directory holding config and the persisted cache
pub const CONFIG_DIR: &str = ".loopcheck";

/// Config file name inside [`CONFIG_DIR`]
pub const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_MAX_DEPTH: usize = 10;

/// One week
pub const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

pub const DEFAULT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

pub const DEFAULT_BARREL_FILES: &[&str] = &[
    "index.ts",
    "index.tsx",
    "index.js",
    "index.jsx",
    "index.mjs",
    "index.cjs",
];

/// Root configuration structure
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct LoopcheckConfig {
    pub resolver: ResolverSettings,
    pub detection: DetectionSettings,
    pub fix: FixSettings,
    pub cache: CacheSettings,
}

/// How specifiers turn into files
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Alias patterns (`@app/*`) mapped to target patterns (`src/*`), relative to `base_dir`.
    pub aliases: BTreeMap<String, Vec<String>>,
    /// Base directory for alias targets, relative to the project root.
    pub base_dir: Option<PathBuf>,
    /// Candidate extensions probed in order, without the leading dot.
    pub extensions: Vec<String>,
    /// File names that make a directory importable, probed in order.
    pub barrel_files: Vec<String>,
    /// Globs for files that never take part in the graph.
    pub ignore: Vec<String>,
    /// Pull `paths`/`baseUrl` from the nearest tsconfig.json.
    pub use_tsconfig: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            aliases: BTreeMap::new(),
            base_dir: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            barrel_files: DEFAULT_BARREL_FILES.iter().map(|s| s.to_string()).collect(),
            ignore: Vec::new(),
            use_tsconfig: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Maximum number of import edges followed from the analyzed file.
    pub max_depth: usize,
    /// Collect every loop reachable within `max_depth` instead of stopping at the first.
    pub report_all_cycles: bool,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            report_all_cycles: false,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct FixSettings {
    pub strategy: StrategyChoice,
    pub naming: NamingConvention,
}

/// Fix strategy requested by the user. `Auto` defers to the heuristics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyChoice {
    #[default]
    Auto,
    ModuleSplit,
    DirectImport,
    ExtractShared,
    DependencyInjection,
}

impl std::str::FromStr for StrategyChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "module-split" => Ok(Self::ModuleSplit),
            "direct-import" => Ok(Self::DirectImport),
            "extract-shared" => Ok(Self::ExtractShared),
            "dependency-injection" => Ok(Self::DependencyInjection),
            other => Err(format!("unknown fix strategy '{}'", other)),
        }
    }
}

/// Suffix style for suggested split files
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingConvention {
    /// `user.core.ts` / `user.extended.ts`
    #[default]
    Semantic,
    /// `user.1.ts` / `user.2.ts`
    Numeric,
}

impl std::str::FromStr for NamingConvention {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "semantic" => Ok(Self::Semantic),
            "numeric" => Ok(Self::Numeric),
            other => Err(format!("unknown naming convention '{}'", other)),
        }
    }
}

/// How cached file entries are validated
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Staleness {
    /// File size + modification time.
    #[default]
    Mtime,
    /// SHA-256 of the file content.
    Content,
}

impl std::str::FromStr for Staleness {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "mtime" => Ok(Self::Mtime),
            "content" => Ok(Self::Content),
            other => Err(format!("unknown staleness policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Keep the import cache on disk between runs.
    pub persist: bool,
    /// Cache file location, relative to the project root. Defaults to `.loopcheck/cache.json`.
    pub path: Option<PathBuf>,
    pub staleness: Staleness,
    /// Whole cache file is discarded when older than this.
    pub max_age_secs: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            persist: false,
            path: None,
            staleness: Staleness::default(),
            max_age_secs: Some(DEFAULT_CACHE_MAX_AGE_SECS),
        }
    }
}

impl CacheSettings {
    pub fn cache_path(&self, root: &Path) -> PathBuf {
        match &self.path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => root.join(p),
            None => root.join(CONFIG_DIR).join("cache.json"),
        }
    }
}

impl LoopcheckConfig {
    /// Load config from `.loopcheck/config.toml` in the given root directory.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_DIR).join(CONFIG_FILE);
        Self::load_from_path(&config_path)
    }

    /// Load config from a specific path, falling back to defaults.
    pub fn load_from_path(path: &Path) -> Self {
        match Self::try_load_from_path(path) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    /// `Ok(None)` when the file does not exist.
    pub fn try_load_from_path(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| LoopcheckError::io(path, e))?;
        toml::from_str(&content)
            .map(Some)
            .map_err(|source| LoopcheckError::Config {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Whether the user pinned a strategy instead of relying on heuristics.
    pub fn has_strategy_override(&self) -> bool {
        self.fix.strategy != StrategyChoice::Auto
    }
}
