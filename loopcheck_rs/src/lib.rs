//! # loopcheck
//!
//! **Cross-file circular import detection** for TypeScript/JavaScript projects,
//! with a suggested way to break every cycle it reports.
//!
//! The host analyzes one file at a time. Each call walks the import graph
//! from that file within a depth bound, reduces every closed loop to its
//! minimal cycle, skips loops already reported in the current run, and picks
//! a fix strategy for the rest.
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use loopcheck::{CycleAnalyzer, FileInvocation, LoopcheckConfig, RawImport};
//! use std::path::Path;
//!
//! let mut analyzer = CycleAnalyzer::new(Path::new("."), LoopcheckConfig::default());
//! let invocation = FileInvocation::new("src/user.ts", vec![RawImport::new("./account", false)]);
//! for report in analyzer.analyze_file(&invocation) {
//!     println!("{} -> {}", report.cycle.describe(analyzer.resolver().config()), report.strategy);
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! loopcheck                       # Scan the current directory
//! loopcheck web --all --json      # Every cycle, machine-readable
//! loopcheck --persist-cache       # Reuse .loopcheck/cache.json between runs
//! ```

/// Per-file entry point: [`CycleAnalyzer`](analysis::CycleAnalyzer) and [`CycleReport`](analysis::CycleReport).
pub mod analysis;

/// Process-lifetime cache of fingerprints, resolved edges and reported cycles.
pub mod cache;

/// Minimal cycles and their rotation-invariant hash.
pub mod canonical;

/// Command-line front end.
pub mod cli;

/// `.loopcheck/config.toml` loading.
pub mod config;

/// Bounded depth-first cycle search.
pub mod detector;

pub mod error;

/// Import statement extraction from TS/JS source text.
pub mod extract;

/// File identity for cache validation, and the read seam.
pub mod fingerprint;

/// Cross-run cache file.
pub mod persist;

/// Specifier to project file resolution (relative paths, aliases, barrels).
pub mod resolver;

/// Fix-strategy heuristics and suggestion data.
pub mod strategy;

pub use analysis::{CycleAnalyzer, CycleReport, FileInvocation};
pub use cache::{FileSystemCache, ImportEdge};
pub use canonical::{Cycle, CycleLink};
pub use config::LoopcheckConfig;
pub use error::{LoopcheckError, Result};
pub use extract::RawImport;
pub use strategy::{FixStrategy, StrategyData};
