//! Fix-strategy selection for a canonical cycle.
//!
//! Pure classification, no state. Precedence:
//! 1. two-file cycle through a barrel -> `direct-import`
//! 2. every link type-only -> `extract-shared`
//! 3. anything else -> `module-split`
//!
//! `dependency-injection` needs architectural judgment and is only used when
//! the user asks for it.

use heck::{ToKebabCase, ToUpperCamelCase};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::canonical::Cycle;
use crate::config::{NamingConvention, StrategyChoice};
use crate::resolver::ResolverConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixStrategy {
    ModuleSplit,
    DirectImport,
    ExtractShared,
    DependencyInjection,
}

impl FixStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModuleSplit => "module-split",
            Self::DirectImport => "direct-import",
            Self::ExtractShared => "extract-shared",
            Self::DependencyInjection => "dependency-injection",
        }
    }
}

impl std::fmt::Display for FixStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick a strategy: the user's choice when set, otherwise the heuristics.
pub fn select(cycle: &Cycle, choice: StrategyChoice, config: &ResolverConfig) -> FixStrategy {
    match choice {
        StrategyChoice::Auto => classify(cycle, config),
        StrategyChoice::ModuleSplit => FixStrategy::ModuleSplit,
        StrategyChoice::DirectImport => FixStrategy::DirectImport,
        StrategyChoice::ExtractShared => FixStrategy::ExtractShared,
        StrategyChoice::DependencyInjection => FixStrategy::DependencyInjection,
    }
}

/// Heuristic classification. Never yields `DependencyInjection`.
pub fn classify(cycle: &Cycle, config: &ResolverConfig) -> FixStrategy {
    if cycle.len() == 2 && cycle.files.iter().any(|f| config.is_barrel(f)) {
        return FixStrategy::DirectImport;
    }
    // a single file cannot share types with itself
    if cycle.len() >= 2 && cycle.all_type_only() {
        return FixStrategy::ExtractShared;
    }
    FixStrategy::ModuleSplit
}

/// Everything a host needs to word a remediation message. Descriptive only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum StrategyData {
    #[serde(rename_all = "camelCase")]
    ModuleSplit {
        target_file: PathBuf,
        module_name: String,
        core_suffix: String,
        extended_suffix: String,
        core_file: PathBuf,
        extended_file: PathBuf,
    },
    #[serde(rename_all = "camelCase")]
    DirectImport {
        barrel_file: PathBuf,
        barrel_name: String,
        consumer_file: PathBuf,
        consumer_name: String,
    },
    #[serde(rename_all = "camelCase")]
    ExtractShared {
        shared_file: PathBuf,
        shared_module: String,
        export_names: Vec<String>,
        participants: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    DependencyInjection {
        consumer_file: PathBuf,
        consumer_name: String,
        provider_file: PathBuf,
        provider_name: String,
        interface_name: String,
    },
}

/// Build the message data for `strategy`, centered on `focus` when it is part of the cycle.
pub fn strategy_data(
    cycle: &Cycle,
    strategy: FixStrategy,
    focus: &Path,
    naming: NamingConvention,
    config: &ResolverConfig,
) -> StrategyData {
    let cycle = cycle.rotated_to(focus);
    let first = cycle.files.first().cloned().unwrap_or_else(|| focus.to_path_buf());
    let ext = extension_of(&first);

    match strategy {
        FixStrategy::ModuleSplit => {
            let (core_suffix, extended_suffix) = match naming {
                NamingConvention::Semantic => ("core", "extended"),
                NamingConvention::Numeric => ("1", "2"),
            };
            let dir = first.parent().map(Path::to_path_buf).unwrap_or_default();
            let stem = file_stem(&first);
            StrategyData::ModuleSplit {
                core_file: dir.join(format!("{}.{}.{}", stem, core_suffix, ext)),
                extended_file: dir.join(format!("{}.{}.{}", stem, extended_suffix, ext)),
                module_name: module_name(&first, config),
                target_file: first,
                core_suffix: core_suffix.to_string(),
                extended_suffix: extended_suffix.to_string(),
            }
        }
        FixStrategy::DirectImport => {
            let barrel = cycle
                .files
                .iter()
                .find(|f| config.is_barrel(f))
                .cloned()
                .unwrap_or_else(|| first.clone());
            let consumer = cycle
                .files
                .iter()
                .find(|f| **f != barrel)
                .cloned()
                .unwrap_or_else(|| first.clone());
            StrategyData::DirectImport {
                barrel_name: module_name(&barrel, config),
                consumer_name: module_name(&consumer, config),
                barrel_file: barrel,
                consumer_file: consumer,
            }
        }
        FixStrategy::ExtractShared => {
            let names: Vec<String> = cycle
                .files
                .iter()
                .map(|f| module_name(f, config))
                .collect();
            let shared_module = if names.len() <= 3 {
                let joined: Vec<String> = names.iter().map(|n| n.to_kebab_case()).collect();
                format!("{}.shared", joined.join("-"))
            } else {
                "shared.types".to_string()
            };
            let dir = common_dir(&cycle.files);
            StrategyData::ExtractShared {
                shared_file: dir.join(format!("{}.{}", shared_module, ext)),
                export_names: names
                    .iter()
                    .map(|n| format!("{}Types", n.to_upper_camel_case()))
                    .collect(),
                shared_module,
                participants: names,
            }
        }
        FixStrategy::DependencyInjection => {
            let provider = cycle
                .links
                .first()
                .map(|l| l.to.clone())
                .unwrap_or_else(|| first.clone());
            let provider_name = module_name(&provider, config);
            StrategyData::DependencyInjection {
                consumer_name: module_name(&first, config),
                consumer_file: first,
                interface_name: format!("{}Provider", provider_name.to_upper_camel_case()),
                provider_file: provider,
                provider_name,
            }
        }
    }
}

/// File basename without extension; a barrel is named after its directory.
pub fn module_name(path: &Path, config: &ResolverConfig) -> String {
    if config.is_barrel(path)
        && let Some(dir) = path.parent().and_then(|p| p.file_name())
    {
        return dir.to_string_lossy().to_string();
    }
    file_stem(path)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "ts".to_string())
}

fn common_dir(files: &[PathBuf]) -> PathBuf {
    let mut dirs = files.iter().filter_map(|f| f.parent());
    let Some(first) = dirs.next() else {
        return PathBuf::new();
    };
    let mut common = first.to_path_buf();
    for dir in dirs {
        while !dir.starts_with(&common) {
            if !common.pop() {
                return PathBuf::new();
            }
        }
    }
    common
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::CycleLink;
    use crate::canonical::cycle_hash;
    use crate::config::ResolverSettings;

    fn config() -> ResolverConfig {
        let settings = ResolverSettings {
            use_tsconfig: false,
            ..ResolverSettings::default()
        };
        ResolverConfig::from_settings(Path::new("/project"), &settings)
    }

    fn cycle(files: &[&str], type_only: &[bool]) -> Cycle {
        let files: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();
        let links = (0..files.len())
            .map(|i| CycleLink {
                from: files[i].clone(),
                to: files[(i + 1) % files.len()].clone(),
                is_type_only: type_only[i],
            })
            .collect();
        Cycle {
            hash: cycle_hash(&files),
            files,
            links,
        }
    }

    #[test]
    fn barrel_pair_is_direct_import() {
        let c = cycle(&["/project/src/index.ts", "/project/src/module.ts"], &[false, false]);
        assert_eq!(classify(&c, &config()), FixStrategy::DirectImport);
    }

    #[test]
    fn barrel_rule_wins_over_type_only() {
        let c = cycle(&["/project/src/index.ts", "/project/src/module.ts"], &[true, true]);
        assert_eq!(classify(&c, &config()), FixStrategy::DirectImport);
    }

    #[test]
    fn barrel_in_longer_cycle_is_not_direct_import() {
        let c = cycle(
            &["/project/src/index.ts", "/project/src/a.ts", "/project/src/b.ts"],
            &[false, false, false],
        );
        assert_eq!(classify(&c, &config()), FixStrategy::ModuleSplit);
    }

    #[test]
    fn all_type_only_is_extract_shared() {
        let c = cycle(
            &["/project/a.ts", "/project/b.ts", "/project/c.ts"],
            &[true, true, true],
        );
        assert_eq!(classify(&c, &config()), FixStrategy::ExtractShared);
    }

    #[test]
    fn one_value_edge_falls_back_to_module_split() {
        let c = cycle(
            &["/project/a.ts", "/project/b.ts", "/project/c.ts"],
            &[true, false, true],
        );
        assert_eq!(classify(&c, &config()), FixStrategy::ModuleSplit);
    }

    #[test]
    fn self_import_is_module_split() {
        let c = cycle(&["/project/a.ts"], &[false]);
        assert_eq!(classify(&c, &config()), FixStrategy::ModuleSplit);
        let typed = cycle(&["/project/a.ts"], &[true]);
        assert_eq!(classify(&typed, &config()), FixStrategy::ModuleSplit);
    }

    #[test]
    fn override_bypasses_heuristics() {
        let c = cycle(&["/project/src/index.ts", "/project/src/module.ts"], &[false, false]);
        assert_eq!(
            select(&c, StrategyChoice::DependencyInjection, &config()),
            FixStrategy::DependencyInjection
        );
        assert_eq!(
            select(&c, StrategyChoice::Auto, &config()),
            FixStrategy::DirectImport
        );
    }

    #[test]
    fn heuristics_never_pick_dependency_injection() {
        let cfg = config();
        let cases = [
            cycle(&["/project/a.ts"], &[true]),
            cycle(&["/project/a.ts", "/project/b.ts"], &[true, true]),
            cycle(&["/project/a.ts", "/project/b.ts"], &[false, true]),
            cycle(&["/project/x/index.ts", "/project/b.ts"], &[false, false]),
        ];
        for c in &cases {
            assert_ne!(classify(c, &cfg), FixStrategy::DependencyInjection);
        }
    }

    #[test]
    fn module_split_data_uses_naming_convention() {
        let c = cycle(&["/project/src/user.service.ts", "/project/src/auth.ts"], &[false, false]);
        let focus = Path::new("/project/src/auth.ts");

        let semantic = strategy_data(&c, FixStrategy::ModuleSplit, focus, NamingConvention::Semantic, &config());
        assert_eq!(
            semantic,
            StrategyData::ModuleSplit {
                target_file: PathBuf::from("/project/src/auth.ts"),
                module_name: "auth".to_string(),
                core_suffix: "core".to_string(),
                extended_suffix: "extended".to_string(),
                core_file: PathBuf::from("/project/src/auth.core.ts"),
                extended_file: PathBuf::from("/project/src/auth.extended.ts"),
            }
        );

        let numeric = strategy_data(&c, FixStrategy::ModuleSplit, focus, NamingConvention::Numeric, &config());
        let StrategyData::ModuleSplit { core_file, extended_file, .. } = numeric else {
            panic!("expected module-split data");
        };
        assert_eq!(core_file, PathBuf::from("/project/src/auth.1.ts"));
        assert_eq!(extended_file, PathBuf::from("/project/src/auth.2.ts"));
    }

    #[test]
    fn direct_import_data_names_barrel_after_directory() {
        let c = cycle(&["/project/src/ui/index.ts", "/project/src/ui/button.tsx"], &[false, false]);
        let data = strategy_data(
            &c,
            FixStrategy::DirectImport,
            Path::new("/project/src/ui/button.tsx"),
            NamingConvention::Semantic,
            &config(),
        );
        assert_eq!(
            data,
            StrategyData::DirectImport {
                barrel_file: PathBuf::from("/project/src/ui/index.ts"),
                barrel_name: "ui".to_string(),
                consumer_file: PathBuf::from("/project/src/ui/button.tsx"),
                consumer_name: "button".to_string(),
            }
        );
    }

    #[test]
    fn extract_shared_data_suggests_module_and_exports() {
        let c = cycle(
            &["/project/src/user/user-model.ts", "/project/src/order/order.ts"],
            &[true, true],
        );
        let data = strategy_data(
            &c,
            FixStrategy::ExtractShared,
            Path::new("/project/src/user/user-model.ts"),
            NamingConvention::Semantic,
            &config(),
        );
        assert_eq!(
            data,
            StrategyData::ExtractShared {
                shared_file: PathBuf::from("/project/src/user-model-order.shared.ts"),
                shared_module: "user-model-order.shared".to_string(),
                export_names: vec!["UserModelTypes".to_string(), "OrderTypes".to_string()],
                participants: vec!["user-model".to_string(), "order".to_string()],
            }
        );
    }

    #[test]
    fn long_cycles_share_a_generic_module() {
        let c = cycle(
            &["/project/a.ts", "/project/b.ts", "/project/c.ts", "/project/d.ts"],
            &[true, true, true, true],
        );
        let StrategyData::ExtractShared { shared_module, .. } = strategy_data(
            &c,
            FixStrategy::ExtractShared,
            Path::new("/project/a.ts"),
            NamingConvention::Semantic,
            &config(),
        ) else {
            panic!("expected extract-shared data");
        };
        assert_eq!(shared_module, "shared.types");
    }

    #[test]
    fn dependency_injection_data_points_at_imported_module() {
        let c = cycle(&["/project/cart.ts", "/project/pricing-engine.ts"], &[false, false]);
        let data = strategy_data(
            &c,
            FixStrategy::DependencyInjection,
            Path::new("/project/cart.ts"),
            NamingConvention::Semantic,
            &config(),
        );
        assert_eq!(
            data,
            StrategyData::DependencyInjection {
                consumer_file: PathBuf::from("/project/cart.ts"),
                consumer_name: "cart".to_string(),
                provider_file: PathBuf::from("/project/pricing-engine.ts"),
                provider_name: "pricing-engine".to_string(),
                interface_name: "PricingEngineProvider".to_string(),
            }
        );
    }

    #[test]
    fn strategy_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&FixStrategy::ExtractShared).expect("json"),
            "\"extract-shared\""
        );
        assert_eq!(FixStrategy::DirectImport.to_string(), "direct-import");
    }
}
