//! Process-lifetime file-system cache.
//!
//! Holds per-file fingerprints and resolved import edges, plus the set of
//! cycle hashes already reported in the current run. The cache is a plain
//! owned value passed by `&mut` into every call: a single writer, no locks.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::config::Staleness;
use crate::extract::{RawImport, extract_imports};
use crate::fingerprint::{DiskReader, FileIdentity, FileStat, Fingerprint, SourceReader};
use crate::resolver::ModuleResolver;

/// One import statement after resolution.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportEdge {
    pub raw_specifier: String,
    /// `None`: the edge leaves the analyzable graph and is never traversed.
    pub resolved_path: Option<PathBuf>,
    pub is_type_only: bool,
}

/// Cached imports of one file at one fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub identity: FileIdentity,
    /// Stat at the time the node was validated; a matching stat skips re-validation.
    pub stat: FileStat,
    pub edges: Vec<ImportEdge>,
}

/// Cycle hashes already handed to the host in this run.
#[derive(Debug, Default, Clone)]
pub struct ReportedCycleSet {
    hashes: HashSet<String>,
}

impl ReportedCycleSet {
    /// `true` when newly inserted, `false` when the cycle was already reported.
    pub fn mark_reported(&mut self, hash: &str) -> bool {
        if self.hashes.contains(hash) {
            return false;
        }
        self.hashes.insert(hash.to_string())
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn clear(&mut self) {
        self.hashes.clear();
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub refreshes: usize,
    pub reads: usize,
}

pub struct FileSystemCache {
    reader: Box<dyn SourceReader>,
    staleness: Staleness,
    nodes: HashMap<PathBuf, FileNode>,
    reported: ReportedCycleSet,
    stats: CacheStats,
}

impl std::fmt::Debug for FileSystemCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemCache")
            .field("staleness", &self.staleness)
            .field("nodes", &self.nodes.len())
            .field("reported", &self.reported.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Default for FileSystemCache {
    fn default() -> Self {
        Self::new(Staleness::default())
    }
}

impl FileSystemCache {
    pub fn new(staleness: Staleness) -> Self {
        Self::with_reader(DiskReader, staleness)
    }

    pub fn with_reader(reader: impl SourceReader + 'static, staleness: Staleness) -> Self {
        Self {
            reader: Box::new(reader),
            staleness,
            nodes: HashMap::new(),
            reported: ReportedCycleSet::default(),
            stats: CacheStats::default(),
        }
    }

    pub fn staleness(&self) -> Staleness {
        self.staleness
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, path: &Path) -> Option<&FileNode> {
        self.nodes.get(path)
    }

    /// Resolved import edges of `path`, re-reading the file only when its fingerprint moved.
    ///
    /// A file that cannot be stat'ed or read is a leaf with zero edges.
    pub fn get_edges(&mut self, path: &Path, resolver: &ModuleResolver) -> Vec<ImportEdge> {
        let stat = match self.reader.stat(path) {
            Ok(stat) => stat,
            Err(e) => {
                tracing::debug!("treating {} as a leaf: {}", path.display(), e);
                self.nodes.remove(path);
                return Vec::new();
            }
        };

        let mut content: Option<Vec<u8>> = None;
        if let Some(node) = self.nodes.get_mut(path) {
            if node.stat == stat {
                self.stats.hits += 1;
                refresh_targets(&mut node.edges, path, resolver);
                return node.edges.clone();
            }
            if let Fingerprint::Content { .. } = node.identity.fingerprint {
                // stat moved, content may not have
                let Some(bytes) = read_counted(self.reader.as_ref(), &mut self.stats, path)
                else {
                    self.nodes.remove(path);
                    return Vec::new();
                };
                if Fingerprint::from_content(&bytes) == node.identity.fingerprint {
                    self.stats.hits += 1;
                    node.stat = stat;
                    refresh_targets(&mut node.edges, path, resolver);
                    return node.edges.clone();
                }
                content = Some(bytes);
            }
        }

        let bytes = match content {
            Some(bytes) => bytes,
            None => match read_counted(self.reader.as_ref(), &mut self.stats, path) {
                Some(bytes) => bytes,
                None => {
                    self.nodes.remove(path);
                    return Vec::new();
                }
            },
        };

        self.stats.refreshes += 1;
        let imports = extract_imports(&String::from_utf8_lossy(&bytes));
        let edges = resolve_all(&imports, path, resolver);
        let fingerprint = match self.staleness {
            Staleness::Mtime => Fingerprint::from_stat(stat),
            Staleness::Content => Fingerprint::from_content(&bytes),
        };
        tracing::debug!(
            "indexed {} ({} import(s))",
            path.display(),
            edges.len()
        );
        self.store(path, fingerprint, stat, edges.clone());
        edges
    }

    /// Store imports supplied by the host for `path` instead of reading the file.
    pub fn seed(
        &mut self,
        path: &Path,
        imports: &[RawImport],
        resolver: &ModuleResolver,
    ) -> Vec<ImportEdge> {
        let edges = resolve_all(imports, path, resolver);
        let stat = self.reader.stat(path).unwrap_or(FileStat {
            size: 0,
            mtime_nanos: 0,
        });
        let fingerprint = match self.staleness {
            Staleness::Mtime => Fingerprint::from_stat(stat),
            Staleness::Content => {
                match read_counted(self.reader.as_ref(), &mut self.stats, path) {
                    Some(bytes) => Fingerprint::from_content(&bytes),
                    None => Fingerprint::from_stat(stat),
                }
            }
        };
        self.store(path, fingerprint, stat, edges.clone());
        edges
    }

    fn store(&mut self, path: &Path, fingerprint: Fingerprint, stat: FileStat, edges: Vec<ImportEdge>) {
        let node = FileNode {
            identity: FileIdentity {
                path: path.to_path_buf(),
                fingerprint,
            },
            stat,
            edges,
        };
        // replaces any older epoch of the same path
        self.nodes.insert(path.to_path_buf(), node);
    }

    /// Adopt nodes loaded from a previous run. Nodes recorded under another
    /// staleness policy are dropped.
    pub fn load_nodes(&mut self, nodes: impl IntoIterator<Item = FileNode>) {
        for node in nodes {
            if node.identity.fingerprint.policy() == self.staleness {
                self.nodes.insert(node.identity.path.clone(), node);
            }
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FileNode> {
        self.nodes.values()
    }

    /// `true` when `hash` had not been reported yet in this run.
    pub fn mark_reported(&mut self, hash: &str) -> bool {
        self.reported.mark_reported(hash)
    }

    pub fn reported(&self) -> &ReportedCycleSet {
        &self.reported
    }

    /// Forget the reported-cycle set only, keeping file data (watch-mode re-runs).
    pub fn start_new_run(&mut self) {
        self.reported.clear();
    }

    /// Drop fingerprints, edges and reported cycles.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.reported.clear();
        self.stats = CacheStats::default();
    }
}

fn read_counted(reader: &dyn SourceReader, stats: &mut CacheStats, path: &Path) -> Option<Vec<u8>> {
    stats.reads += 1;
    match reader.read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::debug!("treating {} as a leaf: {}", path.display(), e);
            None
        }
    }
}

/// Cached edges outlive their targets: a missing file may have been created
/// and a resolved one deleted since the importer was read. Only those edges
/// are resolved again; the importer itself is not re-read.
fn refresh_targets(edges: &mut [ImportEdge], from: &Path, resolver: &ModuleResolver) {
    for edge in edges.iter_mut() {
        let gone = edge.resolved_path.as_ref().is_none_or(|p| !p.is_file());
        if gone {
            edge.resolved_path = resolver.resolve(&edge.raw_specifier, from);
        }
    }
}

fn resolve_all(imports: &[RawImport], from: &Path, resolver: &ModuleResolver) -> Vec<ImportEdge> {
    imports
        .iter()
        .map(|import| ImportEdge {
            raw_specifier: import.specifier.clone(),
            resolved_path: resolver.resolve(&import.specifier, from),
            is_type_only: import.is_type_only,
        })
        .collect()
}
