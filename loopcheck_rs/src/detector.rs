//! Bounded depth-first cycle detection from a single start file.
//!
//! The graph is never materialized: edges come from the [`FileSystemCache`]
//! on demand, and the traversal state is a plain path stack.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::cache::{FileSystemCache, ImportEdge};
use crate::canonical::cycle_hash;
use crate::resolver::ModuleResolver;

/// Traversal path that closes a loop: `path.last()` also appears earlier.
///
/// `path` starts at the analyzed file, so it may carry a non-cyclic prefix.
/// `type_only[i]` describes the step `path[i] -> path[i + 1]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawCycle {
    pub path: Vec<PathBuf>,
    pub type_only: Vec<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectOptions {
    /// Maximum number of edges between the start file and the edge that closes a loop.
    pub max_depth: usize,
    /// Keep exploring after the first loop.
    pub report_all: bool,
    /// Only loops that run through the start file count.
    pub through_start_only: bool,
    /// Loops whose hash the cache already reported are passed over, and the
    /// walk keeps looking for a new one.
    pub skip_reported: bool,
}

impl DetectOptions {
    /// Every loop reachable from the start, reported or not.
    pub fn new(max_depth: usize, report_all: bool) -> Self {
        Self {
            max_depth,
            report_all,
            through_start_only: false,
            skip_reported: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Detection {
    pub cycles: Vec<RawCycle>,
    /// Some edge was not followed because of `max_depth`; loops behind it went unseen.
    pub depth_limit_hit: bool,
}

/// All (or the first) loops reachable from `start` within `max_depth` edges.
pub fn find_cycles(
    start: &Path,
    options: DetectOptions,
    cache: &mut FileSystemCache,
    resolver: &ModuleResolver,
) -> Vec<RawCycle> {
    detect(start, options, cache, resolver).cycles
}

pub fn detect(
    start: &Path,
    options: DetectOptions,
    cache: &mut FileSystemCache,
    resolver: &ModuleResolver,
) -> Detection {
    run_walk(start, None, options, cache, resolver)
}

/// Like [`detect`], but the start file's edges are given by the caller
/// (host-supplied imports for a file that may only exist in an editor buffer).
pub fn detect_with_edges(
    start: &Path,
    start_edges: Vec<ImportEdge>,
    options: DetectOptions,
    cache: &mut FileSystemCache,
    resolver: &ModuleResolver,
) -> Detection {
    run_walk(start, Some(start_edges), options, cache, resolver)
}

fn run_walk(
    start: &Path,
    start_edges: Option<Vec<ImportEdge>>,
    options: DetectOptions,
    cache: &mut FileSystemCache,
    resolver: &ModuleResolver,
) -> Detection {
    let mut walk = Walk {
        cache,
        resolver,
        options,
        start_edges,
        stack: vec![start.to_path_buf()],
        stack_types: Vec::new(),
        on_stack: HashSet::from([start.to_path_buf()]),
        exhausted: HashMap::new(),
        seen_loops: HashSet::new(),
        detection: Detection::default(),
        done: false,
    };
    walk.visit(start, 0);
    walk.detection
}

struct Walk<'a> {
    cache: &'a mut FileSystemCache,
    resolver: &'a ModuleResolver,
    options: DetectOptions,
    start_edges: Option<Vec<ImportEdge>>,
    stack: Vec<PathBuf>,
    stack_types: Vec<bool>,
    on_stack: HashSet<PathBuf>,
    /// Nodes explored without reaching any file on the stack, with the edge
    /// budget they had left.
    exhausted: HashMap<PathBuf, usize>,
    seen_loops: HashSet<String>,
    detection: Detection,
    done: bool,
}

/// Outcome of reaching a file that is already on the stack.
enum Closed {
    New,
    /// Seen earlier in this call, or already reported in this run.
    Known,
    /// Does not run through the start file.
    Skipped,
}

impl Walk<'_> {
    /// Returns whether the walk below `node` reached any file on the stack.
    /// Only subtrees that never did are memoized, since their outcome does
    /// not depend on the stack.
    fn visit(&mut self, node: &Path, depth: usize) -> bool {
        let edges = match self.start_edges.take() {
            Some(edges) if depth == 0 => edges,
            _ => self.cache.get_edges(node, self.resolver),
        };
        let targets = distinct_targets(&edges);
        let mut found_any = false;

        for (target, type_only) in targets {
            if self.done {
                break;
            }
            if depth + 1 > self.options.max_depth {
                tracing::debug!(
                    "max depth {} reached at {}",
                    self.options.max_depth,
                    node.display()
                );
                self.detection.depth_limit_hit = true;
                break;
            }

            self.stack_types.push(type_only);
            if self.on_stack.contains(&target) {
                found_any = true;
                if let Closed::New = self.close_loop(&target)
                    && !self.options.report_all
                {
                    self.done = true;
                }
            } else {
                let remaining = self.options.max_depth - (depth + 1);
                let explored = self
                    .exhausted
                    .get(&target)
                    .is_some_and(|&budget| remaining <= budget);
                if !explored {
                    self.stack.push(target.clone());
                    self.on_stack.insert(target.clone());
                    let below = self.visit(&target, depth + 1);
                    self.on_stack.remove(&target);
                    self.stack.pop();

                    if below {
                        found_any = true;
                    } else {
                        self.exhausted.insert(target, remaining);
                    }
                }
            }
            self.stack_types.pop();
        }

        found_any
    }

    fn close_loop(&mut self, target: &Path) -> Closed {
        let Some(pos) = self.stack.iter().position(|f| f == target) else {
            return Closed::Skipped;
        };
        if self.options.through_start_only && pos != 0 {
            return Closed::Skipped;
        }
        let key = cycle_hash(&self.stack[pos..]);
        if self.options.skip_reported && self.cache.reported().contains(&key) {
            return Closed::Known;
        }
        if !self.seen_loops.insert(key) {
            return Closed::Known;
        }
        let mut path = self.stack.clone();
        path.push(target.to_path_buf());
        self.detection.cycles.push(RawCycle {
            path,
            type_only: self.stack_types.clone(),
        });
        Closed::New
    }
}

/// Resolved targets in first-import order. A target counts as type-only only
/// when every import of it is type-only.
fn distinct_targets(edges: &[ImportEdge]) -> Vec<(PathBuf, bool)> {
    let mut targets: Vec<(PathBuf, bool)> = Vec::new();
    for edge in edges {
        let Some(resolved) = &edge.resolved_path else {
            continue;
        };
        match targets.iter_mut().find(|(path, _)| path == resolved) {
            Some((_, type_only)) => *type_only &= edge.is_type_only,
            None => targets.push((resolved.clone(), edge.is_type_only)),
        }
    }
    targets
}
