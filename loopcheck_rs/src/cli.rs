//! Command-line front end: scan a project root and print every cycle found.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use serde_json::json;

use crate::analysis::{CycleAnalyzer, CycleReport};
use crate::config::{LoopcheckConfig, NamingConvention, Staleness, StrategyChoice};
use crate::resolver::ResolverConfig;
use crate::strategy::StrategyData;

#[derive(Parser, Debug)]
#[command(name = "loopcheck")]
#[command(about = "Find circular imports in a TS/JS project and suggest how to break them")]
#[command(version)]
pub struct Args {
    /// Project root to scan
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Maximum number of import edges followed from each file
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Report every cycle reachable from a file, not just the first
    #[arg(long)]
    pub all: bool,

    /// Machine-readable output
    #[arg(long)]
    pub json: bool,

    /// Config file (default: <root>/.loopcheck/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Fix strategy: auto, module-split, direct-import, extract-shared, dependency-injection
    #[arg(long)]
    pub strategy: Option<StrategyChoice>,

    /// Suffix style for split suggestions: semantic or numeric
    #[arg(long)]
    pub naming: Option<NamingConvention>,

    /// Keep the import cache on disk between runs
    #[arg(long)]
    pub persist_cache: bool,

    /// Cache validation: mtime or content
    #[arg(long)]
    pub staleness: Option<Staleness>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Args {
    /// Config from disk with command-line overrides applied.
    pub fn resolve_config(&self, root: &std::path::Path) -> Result<LoopcheckConfig> {
        let mut config = match &self.config {
            Some(path) => LoopcheckConfig::try_load_from_path(path)?
                .with_context(|| format!("config file {} not found", path.display()))?,
            None => LoopcheckConfig::load(root),
        };
        if let Some(depth) = self.max_depth {
            config.detection.max_depth = depth;
        }
        if self.all {
            config.detection.report_all_cycles = true;
        }
        if let Some(strategy) = self.strategy {
            config.fix.strategy = strategy;
        }
        if let Some(naming) = self.naming {
            config.fix.naming = naming;
        }
        if self.persist_cache {
            config.cache.persist = true;
        }
        if let Some(staleness) = self.staleness {
            config.cache.staleness = staleness;
        }
        Ok(config)
    }
}

/// Scan and print. Returns whether any cycle was reported.
pub fn run(args: &Args) -> Result<bool> {
    if args.no_color {
        colored::control::set_override(false);
    }
    let root = args
        .root
        .canonicalize()
        .with_context(|| format!("cannot open project root {}", args.root.display()))?;
    let config = args.resolve_config(&root)?;
    let persist = config.cache.persist;

    let mut analyzer = CycleAnalyzer::new(&root, config);
    if persist {
        analyzer.warm_from_disk();
    }
    let reports = analyzer.analyze_project();
    let stats = analyzer.cache().stats();
    tracing::info!(
        "{} files cached, {} reads, {} hits",
        analyzer.cache().len(),
        stats.reads,
        stats.hits
    );
    if persist && let Err(e) = analyzer.save_cache() {
        tracing::warn!("could not save cache: {}", e);
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "cycles": reports }))
                .context("serialize cycle reports")?
        );
    } else {
        print_reports(&reports, analyzer.resolver().config());
    }
    Ok(!reports.is_empty())
}

pub fn print_reports(reports: &[CycleReport], config: &ResolverConfig) {
    if reports.is_empty() {
        println!("{}", "No circular imports detected.".green());
        return;
    }
    println!(
        "{}",
        format!("Circular imports detected ({} cycles):", reports.len())
            .red()
            .bold()
    );
    for (i, report) in reports.iter().enumerate() {
        println!("  Cycle {}: {}", i + 1, report.cycle.describe(config).yellow());
        println!(
            "    {}",
            format!(
                "import '{}' in {}",
                report.triggering_edge.raw_specifier,
                config.relative(&report.file)
            )
            .dimmed()
        );
        println!(
            "    fix: {} ({})",
            report.strategy.as_str().cyan(),
            hint(&report.strategy_data, config)
        );
    }
}

fn hint(data: &StrategyData, config: &ResolverConfig) -> String {
    match data {
        StrategyData::ModuleSplit {
            target_file,
            core_file,
            extended_file,
            ..
        } => format!(
            "split {} into {} and {}",
            config.relative(target_file),
            config.relative(core_file),
            config.relative(extended_file)
        ),
        StrategyData::DirectImport {
            barrel_file,
            consumer_file,
            ..
        } => format!(
            "import from {} directly instead of through {}",
            config.relative(consumer_file),
            config.relative(barrel_file)
        ),
        StrategyData::ExtractShared {
            shared_file,
            export_names,
            ..
        } => format!(
            "move {} into {}",
            export_names.join(", "),
            config.relative(shared_file)
        ),
        StrategyData::DependencyInjection {
            consumer_name,
            provider_name,
            interface_name,
            ..
        } => format!(
            "have {} receive {} through an {} interface",
            consumer_name, provider_name, interface_name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn flags_override_config_file() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let dir = temp.path().join(".loopcheck");
        std::fs::create_dir_all(&dir).expect("create dir");
        std::fs::write(
            dir.join("config.toml"),
            "[detection]\nmax_depth = 4\n\n[fix]\nnaming = \"numeric\"\n",
        )
        .expect("write config");

        let args = Args::parse_from(["loopcheck", "--max-depth", "7", "--strategy", "extract-shared"]);
        let config = args.resolve_config(temp.path()).expect("config");
        assert_eq!(config.detection.max_depth, 7);
        assert_eq!(config.fix.strategy, StrategyChoice::ExtractShared);
        assert_eq!(config.fix.naming, NamingConvention::Numeric);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let args = Args::parse_from(["loopcheck", "--config", "/definitely/not/here.toml"]);
        assert!(args.resolve_config(Path::new(".")).is_err());
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(Args::try_parse_from(["loopcheck", "--strategy", "rewrite"]).is_err());
    }

    #[test]
    fn hint_mentions_split_files() {
        let config = ResolverConfig::from_settings(Path::new("/p"), &Default::default());
        let data = StrategyData::ModuleSplit {
            target_file: PathBuf::from("/p/src/user.ts"),
            module_name: "user".to_string(),
            core_suffix: "core".to_string(),
            extended_suffix: "extended".to_string(),
            core_file: PathBuf::from("/p/src/user.core.ts"),
            extended_file: PathBuf::from("/p/src/user.extended.ts"),
        };
        assert_eq!(
            hint(&data, &config),
            "split src/user.ts into src/user.core.ts and src/user.extended.ts"
        );
    }
}
