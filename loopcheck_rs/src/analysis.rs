//! Per-file analysis: the entry point a host calls once per source file.
//!
//! [`CycleAnalyzer`] owns the run's config, resolver and cache. Each call
//! seeds the cache with the file's imports, walks the graph, and turns every
//! newly seen loop into a [`CycleReport`].

use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cache::{FileSystemCache, ImportEdge};
use crate::canonical::{Cycle, minimal_cycle};
use crate::config::LoopcheckConfig;
use crate::detector::{self, DetectOptions, RawCycle};
use crate::error::Result;
use crate::extract::RawImport;
use crate::persist::{LoadPolicy, PersistedCache};
use crate::resolver::{ModuleResolver, ResolverConfig, normalize_lexically};
use crate::strategy::{self, FixStrategy, StrategyData};

/// What the host hands over for one file.
#[derive(Clone, Debug, Default)]
pub struct FileInvocation {
    pub file_path: PathBuf,
    pub raw_imports: Vec<RawImport>,
}

impl FileInvocation {
    pub fn new(file_path: impl Into<PathBuf>, raw_imports: Vec<RawImport>) -> Self {
        Self {
            file_path: file_path.into(),
            raw_imports,
        }
    }
}

/// One loop the analyzed file takes part in.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    /// File that was analyzed when the loop was found.
    pub file: PathBuf,
    /// Listed from `file`.
    pub cycle: Cycle,
    /// Import statement of `file` that opens the loop.
    pub triggering_edge: ImportEdge,
    pub strategy: FixStrategy,
    pub strategy_data: StrategyData,
}

pub struct CycleAnalyzer {
    config: LoopcheckConfig,
    resolver: ModuleResolver,
    cache: FileSystemCache,
}

impl CycleAnalyzer {
    pub fn new(root: &Path, config: LoopcheckConfig) -> Self {
        let cache = FileSystemCache::new(config.cache.staleness);
        Self::with_cache(root, config, cache)
    }

    /// Use a caller-built cache, e.g. one with an injected reader.
    pub fn with_cache(root: &Path, config: LoopcheckConfig, cache: FileSystemCache) -> Self {
        let root = root
            .canonicalize()
            .unwrap_or_else(|_| normalize_lexically(root));
        let resolver = ModuleResolver::new(ResolverConfig::from_settings(&root, &config.resolver));
        Self {
            config,
            resolver,
            cache,
        }
    }

    /// Analyzer for `root` with its `.loopcheck/config.toml`, warmed from the
    /// persisted cache when persistence is enabled.
    pub fn for_root(root: &Path) -> Self {
        let config = LoopcheckConfig::load(root);
        let mut analyzer = Self::new(root, config);
        if analyzer.config.cache.persist {
            analyzer.warm_from_disk();
        }
        analyzer
    }

    pub fn config(&self) -> &LoopcheckConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &FileSystemCache {
        &self.cache
    }

    pub fn root(&self) -> &Path {
        &self.resolver.config().root
    }

    /// Analyze a file whose imports were extracted by the host.
    pub fn analyze_file(&mut self, invocation: &FileInvocation) -> Vec<CycleReport> {
        let file = self.canonical(&invocation.file_path);
        if self.resolver.config().is_ignored(&file) {
            return Vec::new();
        }
        let edges = self
            .cache
            .seed(&file, &invocation.raw_imports, &self.resolver);
        self.report(&file, edges)
    }

    /// Analyze a file on disk, extracting its imports through the cache.
    pub fn analyze_path(&mut self, path: &Path) -> Vec<CycleReport> {
        let file = self.canonical(path);
        if self.resolver.config().is_ignored(&file) {
            return Vec::new();
        }
        let edges = self.cache.get_edges(&file, &self.resolver);
        self.report(&file, edges)
    }

    /// Every analyzable file under the root, in sorted order.
    pub fn analyze_project(&mut self) -> Vec<CycleReport> {
        let files = source_files(self.resolver.config());
        tracing::debug!("analyzing {} files", files.len());
        files
            .iter()
            .flat_map(|file| self.analyze_path(file))
            .collect()
    }

    /// Reset fingerprints, edges and reported cycles.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Allow already reported cycles to be reported again, keeping file data.
    pub fn start_new_run(&mut self) {
        self.cache.start_new_run();
    }

    /// Adopt entries from the persisted cache file. Returns how many were loaded.
    pub fn warm_from_disk(&mut self) -> usize {
        let path = self.config.cache.cache_path(self.root());
        let key = self.resolver.config().resolution_key();
        let policy = LoadPolicy {
            staleness: self.config.cache.staleness,
            resolution_key: &key,
            max_age_secs: self.config.cache.max_age_secs,
        };
        let Some(persisted) = PersistedCache::load_or_cold(&path, &policy) else {
            return 0;
        };
        let before = self.cache.len();
        self.cache.load_nodes(persisted.into_nodes());
        let loaded = self.cache.len().saturating_sub(before);
        tracing::debug!("warmed {} entries from {}", loaded, path.display());
        loaded
    }

    pub fn save_cache(&self) -> Result<()> {
        let path = self.config.cache.cache_path(self.root());
        let key = self.resolver.config().resolution_key();
        PersistedCache::from_cache(&self.cache, &key).save(&path)
    }

    fn canonical(&self, path: &Path) -> PathBuf {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root().join(path)
        };
        absolute
            .canonicalize()
            .unwrap_or_else(|_| normalize_lexically(&absolute))
    }

    fn report(&mut self, file: &Path, edges: Vec<ImportEdge>) -> Vec<CycleReport> {
        // a file only hears about loops it belongs to and that are new this run
        let options = DetectOptions {
            max_depth: self.config.detection.max_depth,
            report_all: self.config.detection.report_all_cycles,
            through_start_only: true,
            skip_reported: true,
        };
        let detection = detector::detect_with_edges(
            file,
            edges.clone(),
            options,
            &mut self.cache,
            &self.resolver,
        );
        if detection.cycles.is_empty() && detection.depth_limit_hit {
            tracing::debug!(
                "no cycle from {} within {} edges; deeper imports were not followed",
                self.resolver.config().relative(file),
                options.max_depth
            );
        }

        let mut reports = Vec::new();
        for raw in detection.cycles {
            let Some(cycle) = minimal_cycle(&raw) else {
                debug_assert!(false, "detector produced a path without a loop");
                continue;
            };
            // left unmarked so a member file still reports it
            if !cycle.contains(file) {
                continue;
            }
            if !self.cache.mark_reported(&cycle.hash) {
                continue;
            }
            let Some(triggering_edge) = triggering_edge(&raw, &edges) else {
                debug_assert!(false, "loop path does not start with an edge of the analyzed file");
                continue;
            };

            let config = self.resolver.config();
            let strategy = strategy::select(&cycle, self.config.fix.strategy, config);
            let strategy_data =
                strategy::strategy_data(&cycle, strategy, file, self.config.fix.naming, config);
            tracing::debug!("cycle {} -> {}", cycle.describe(config), strategy);

            reports.push(CycleReport {
                file: file.to_path_buf(),
                cycle: cycle.rotated_to(file),
                triggering_edge,
                strategy,
                strategy_data,
            });
        }
        reports
    }
}

/// The analyzed file's import of `raw.path[1]`, matching the step's
/// type-only flag when several imports target the same file.
fn triggering_edge(raw: &RawCycle, edges: &[ImportEdge]) -> Option<ImportEdge> {
    let next = raw.path.get(1)?;
    let step_type_only = raw.type_only.first().copied().unwrap_or(false);
    let leads_to_next = |edge: &&ImportEdge| edge.resolved_path.as_ref() == Some(next);
    edges
        .iter()
        .filter(leads_to_next)
        .find(|edge| edge.is_type_only == step_type_only)
        .or_else(|| edges.iter().find(leads_to_next))
        .cloned()
}

/// Files under the root that the resolver could ever return, sorted.
///
/// Hidden directories and `node_modules` are skipped.
pub fn source_files(config: &ResolverConfig) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(&config.root)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !name.starts_with('.') && name != "node_modules"
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| config.has_candidate_extension(path) && !config.is_ignored(path))
        .collect();
    files.sort();
    files
}
