//! Module resolution: import specifier + importing file -> canonical project file.
//!
//! Relative specifiers are probed against the configured extensions and barrel
//! files. Bare specifiers only resolve through alias rules (config or
//! tsconfig `paths`); everything else is an external package and a dead end.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::ResolverSettings;

/// Alias pattern such as `@app/*` -> [`src/*`].
#[derive(Debug, Clone)]
pub struct AliasRule {
    pub pattern: String,
    pub targets: Vec<String>,
    /// Directory the targets are relative to.
    pub base: PathBuf,
}

impl AliasRule {
    fn wildcard_count(&self) -> usize {
        self.pattern.matches('*').count()
    }

    /// Length of the literal text before the first `*`; longer prefixes are more specific.
    fn prefix_len(&self) -> usize {
        self.pattern.find('*').unwrap_or(self.pattern.len())
    }

    /// Match `spec` against the pattern, returning the wildcard captures.
    fn captures<'s>(&self, spec: &'s str) -> Option<Vec<&'s str>> {
        if self.wildcard_count() == 0 {
            return (spec == self.pattern).then(Vec::new);
        }

        let parts: Vec<&str> = self.pattern.split('*').collect();
        let mut rest = spec.strip_prefix(parts[0])?;
        let mut captures = Vec::new();

        for (i, part) in parts.iter().enumerate().skip(1) {
            if i == parts.len() - 1 {
                let captured = rest.strip_suffix(part)?;
                captures.push(captured);
            } else {
                let idx = rest.find(part)?;
                captures.push(&rest[..idx]);
                rest = &rest[idx + part.len()..];
            }
        }
        Some(captures)
    }

    fn expand(&self, target: &str, captures: &[&str]) -> String {
        let mut result = target.to_string();
        for capture in captures {
            if let Some(idx) = result.find('*') {
                result.replace_range(idx..=idx, capture);
            }
        }
        result
    }
}

/// Immutable resolver input for one run.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Canonical project root. Nothing outside it is ever resolved.
    pub root: PathBuf,
    pub aliases: Vec<AliasRule>,
    pub extensions: Vec<String>,
    pub barrel_files: Vec<String>,
    pub ignore_patterns: Vec<String>,
    ignore: Option<GlobSet>,
}

impl ResolverConfig {
    pub fn from_settings(root: &Path, settings: &ResolverSettings) -> Self {
        let root = root.canonicalize().unwrap_or_else(|_| normalize_lexically(root));
        let base_dir = settings
            .base_dir
            .as_ref()
            .map(|dir| root.join(dir))
            .unwrap_or_else(|| root.clone());

        let mut aliases: Vec<AliasRule> = Vec::new();
        if settings.use_tsconfig {
            aliases.extend(tsconfig_aliases(&root));
        }
        for (pattern, targets) in &settings.aliases {
            // explicit config wins over tsconfig for the same pattern
            aliases.retain(|rule| &rule.pattern != pattern);
            aliases.push(AliasRule {
                pattern: pattern.replace('\\', "/"),
                targets: targets.iter().map(|t| t.replace('\\', "/")).collect(),
                base: base_dir.clone(),
            });
        }
        // exact patterns first, then the longest literal prefix
        aliases.sort_by(|a, b| {
            (a.wildcard_count() > 0)
                .cmp(&(b.wildcard_count() > 0))
                .then_with(|| b.prefix_len().cmp(&a.prefix_len()))
                .then_with(|| a.pattern.cmp(&b.pattern))
        });

        Self {
            root,
            aliases,
            extensions: settings
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
            barrel_files: settings.barrel_files.clone(),
            ignore_patterns: settings.ignore.clone(),
            ignore: build_globset(&settings.ignore),
        }
    }

    /// Digest of everything that influences resolution. Persisted edges are
    /// only valid under the key they were resolved with.
    pub fn resolution_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.root.to_string_lossy().as_bytes());
        for list in [&self.extensions, &self.barrel_files, &self.ignore_patterns] {
            hasher.update([0u8]);
            for item in list {
                hasher.update(item.as_bytes());
                hasher.update([1u8]);
            }
        }
        for rule in &self.aliases {
            hasher.update([2u8]);
            hasher.update(rule.pattern.as_bytes());
            hasher.update(rule.base.to_string_lossy().as_bytes());
            for target in &rule.targets {
                hasher.update(target.as_bytes());
                hasher.update([1u8]);
            }
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// Path relative to the root, with forward slashes.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignore
            .as_ref()
            .is_some_and(|set| set.is_match(self.relative(path)))
    }

    pub fn is_barrel(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| self.barrel_files.iter().any(|b| b == name))
    }

    pub fn has_candidate_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }
}

#[derive(Debug, Clone)]
pub struct ModuleResolver {
    config: ResolverConfig,
}

impl ModuleResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `specifier` as written in `from_file`.
    ///
    /// `None` means external package, missing file, ignored file, or a
    /// directory without a barrel. Callers treat it as a leaf.
    pub fn resolve(&self, specifier: &str, from_file: &Path) -> Option<PathBuf> {
        let spec = specifier.trim().replace('\\', "/");
        if spec.is_empty() {
            return None;
        }

        if is_relative(&spec) {
            let candidate = from_file.parent()?.join(&spec);
            return self.probe(&candidate).and_then(|p| self.accept(p));
        }

        if let Some(rooted) = spec.strip_prefix('/') {
            let candidate = self.config.root.join(rooted);
            return self.probe(&candidate).and_then(|p| self.accept(p));
        }

        self.resolve_alias(&spec)
    }

    fn resolve_alias(&self, spec: &str) -> Option<PathBuf> {
        // First matching pattern decides, like tsc does.
        let (rule, captures) = self
            .config
            .aliases
            .iter()
            .find_map(|rule| rule.captures(spec).map(|caps| (rule, caps)))?;

        rule.targets.iter().find_map(|target| {
            let candidate = rule.base.join(rule.expand(target, &captures));
            self.probe(&candidate).and_then(|p| self.accept(p))
        })
    }

    /// Exact file, then `candidate.<ext>` per extension, then the `.js` -> `.ts`
    /// ESM convention, then barrel files inside a directory.
    fn probe(&self, candidate: &Path) -> Option<PathBuf> {
        if candidate.is_file() {
            return Some(candidate.to_path_buf());
        }

        for ext in &self.config.extensions {
            let with_ext = append_extension(candidate, ext);
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }

        if let Some(ext) = candidate.extension().and_then(|e| e.to_str())
            && matches!(ext, "js" | "jsx" | "mjs" | "cjs")
        {
            let stem = candidate.with_extension("");
            for ext in &self.config.extensions {
                let sibling = append_extension(&stem, ext);
                if sibling.is_file() {
                    return Some(sibling);
                }
            }
        }

        if candidate.is_dir() {
            for barrel in &self.config.barrel_files {
                let index = candidate.join(barrel);
                if index.is_file() {
                    return Some(index);
                }
            }
        }

        None
    }

    /// Canonicalize and enforce the project boundary.
    fn accept(&self, path: PathBuf) -> Option<PathBuf> {
        let canonical = path
            .canonicalize()
            .unwrap_or_else(|_| normalize_lexically(&path));
        let inside = canonical.strip_prefix(&self.config.root).ok()?;
        if inside.components().any(|c| c.as_os_str() == "node_modules") {
            return None;
        }
        if self.config.is_ignored(&canonical) {
            return None;
        }
        Some(canonical)
    }
}

fn is_relative(spec: &str) -> bool {
    spec == "." || spec == ".." || spec.starts_with("./") || spec.starts_with("../")
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

/// Resolve `.` and `..` without touching the file system.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut added = false;
    for pat in patterns {
        if pat.trim().is_empty() {
            continue;
        }
        match Glob::new(pat) {
            Ok(glob) => {
                builder.add(glob);
                added = true;
            }
            Err(err) => tracing::warn!("invalid ignore glob '{}': {}", pat, err),
        }
    }
    if !added { None } else { builder.build().ok() }
}

// ============================================================================
// tsconfig.json
// ============================================================================

fn tsconfig_aliases(root: &Path) -> Vec<AliasRule> {
    let Some(ts_path) = find_tsconfig(root) else {
        return Vec::new();
    };
    let Some(json) = load_tsconfig_recursive(&ts_path) else {
        tracing::warn!("could not parse {}", ts_path.display());
        return Vec::new();
    };
    let compiler = json
        .get("compilerOptions")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();

    let base_url = compiler
        .get("baseUrl")
        .and_then(|v| v.as_str())
        .unwrap_or(".");
    let base = ts_path.parent().unwrap_or(root).join(base_url);
    let base = base.canonicalize().unwrap_or(base);

    let mut rules = Vec::new();
    if let Some(paths) = compiler.get("paths").and_then(|p| p.as_object()) {
        for (alias, targets) in paths {
            let targets: Vec<String> = targets
                .as_array()
                .into_iter()
                .flat_map(|arr| arr.iter())
                .filter_map(|v| v.as_str())
                .map(|s| s.replace('\\', "/"))
                .collect();
            if targets.is_empty() {
                continue;
            }
            rules.push(AliasRule {
                pattern: alias.replace('\\', "/"),
                targets,
                base: base.clone(),
            });
        }
    }
    tracing::debug!(
        "loaded {} alias rule(s) from {}",
        rules.len(),
        ts_path.display()
    );
    rules
}

/// Nearest tsconfig.json at or above `start`.
fn find_tsconfig(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join("tsconfig.json"))
        .find(|candidate| candidate.is_file())
}

/// Deepest `extends` chain followed; also stops self-referencing configs.
const MAX_EXTENDS_DEPTH: usize = 16;

fn load_tsconfig_recursive(ts_path: &Path) -> Option<Value> {
    load_tsconfig_at_depth(ts_path, 0)
}

fn load_tsconfig_at_depth(ts_path: &Path, depth: usize) -> Option<Value> {
    let content = std::fs::read_to_string(ts_path).ok()?;
    let mut current = parse_tsconfig_value(&content)?;

    // `extends` is a string or, since TypeScript 5.0, an array applied in order.
    let parents: Vec<String> = match current.get("extends") {
        Some(Value::String(ext)) => vec![ext.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    if parents.is_empty() {
        return Some(current);
    }
    if depth >= MAX_EXTENDS_DEPTH {
        tracing::debug!("extends chain too deep at {}", ts_path.display());
        return Some(current);
    }

    let mut inherited = serde_json::Map::new();
    for ext in &parents {
        let Some(base_path) = extends_target(ts_path, ext) else {
            tracing::debug!("not following extends '{}' in {}", ext, ts_path.display());
            continue;
        };
        if let Some(parent) = load_tsconfig_at_depth(&base_path, depth + 1)
            && let Some(parent_co) = parent.get("compilerOptions").and_then(|v| v.as_object())
        {
            inherited = merge_compiler_options(&inherited, parent_co);
        }
    }

    // child overrides parents
    let child_co = current
        .get("compilerOptions")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();
    let merged = merge_compiler_options(&inherited, &child_co);
    if let Some(obj) = current.as_object_mut() {
        obj.insert("compilerOptions".to_string(), Value::Object(merged));
    }
    Some(current)
}

/// Relative `extends` entries, with or without the `.json` suffix. Package
/// configs (`@tsconfig/node20/tsconfig.json`) are not followed.
fn extends_target(ts_path: &Path, ext: &str) -> Option<PathBuf> {
    if !(ext.starts_with('.') || Path::new(ext).is_absolute()) {
        return None;
    }
    let base = ts_path.parent()?.join(ext);
    if base.is_file() {
        return Some(base);
    }
    let with_json = append_extension(&base, "json");
    with_json.is_file().then_some(with_json)
}

/// tsconfig files routinely carry comments and trailing commas.
fn parse_tsconfig_value(content: &str) -> Option<Value> {
    serde_json::from_str(content)
        .ok()
        .or_else(|| json_five::from_str::<Value>(content).ok())
}

fn merge_compiler_options(
    parent: &serde_json::Map<String, Value>,
    child: &serde_json::Map<String, Value>,
) -> serde_json::Map<String, Value> {
    let mut merged = parent.clone();
    for (k, v) in child {
        if k == "paths" {
            let mut combined = parent
                .get("paths")
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_default();
            if let Some(child_paths) = v.as_object() {
                for (alias, targets) in child_paths {
                    combined.insert(alias.clone(), targets.clone());
                }
            }
            merged.insert(k.clone(), Value::Object(combined));
        } else {
            merged.insert(k.clone(), v.clone());
        }
    }
    merged
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Temp project whose root is already canonical.
    pub(crate) struct Fixture {
        _temp: TempDir,
        pub(crate) root: PathBuf,
    }

    impl Fixture {
        pub(crate) fn new() -> Self {
            let temp = TempDir::new().expect("temp dir");
            let root = temp.path().canonicalize().expect("canonical temp dir");
            Self { _temp: temp, root }
        }

        pub(crate) fn write(&self, rel: &str, body: &str) -> PathBuf {
            let path = self.root.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("create dirs");
            }
            std::fs::write(&path, body).expect("write file");
            path
        }

        pub(crate) fn path(&self, rel: &str) -> PathBuf {
            self.root.join(rel)
        }

        pub(crate) fn resolver(&self) -> ModuleResolver {
            self.resolver_with(&ResolverSettings::default())
        }

        pub(crate) fn resolver_with(&self, settings: &ResolverSettings) -> ModuleResolver {
            ModuleResolver::new(ResolverConfig::from_settings(&self.root, settings))
        }
    }

    #[test]
    fn resolves_relative_with_extension_probing() {
        let fx = Fixture::new();
        let from = fx.write("src/app.ts", "");
        fx.write("src/user.ts", "");
        fx.write("lib/util.tsx", "");

        let resolver = fx.resolver();
        assert_eq!(resolver.resolve("./user", &from), Some(fx.path("src/user.ts")));
        assert_eq!(
            resolver.resolve("../lib/util", &from),
            Some(fx.path("lib/util.tsx"))
        );
        assert_eq!(resolver.resolve("./user.ts", &from), Some(fx.path("src/user.ts")));
    }

    #[test]
    fn extension_order_decides_between_siblings() {
        let fx = Fixture::new();
        let from = fx.write("a.ts", "");
        fx.write("b.js", "");
        fx.write("b.ts", "");
        assert_eq!(fx.resolver().resolve("./b", &from), Some(fx.path("b.ts")));
    }

    #[test]
    fn dotted_basenames_are_not_treated_as_extensions() {
        let fx = Fixture::new();
        let from = fx.write("a.ts", "");
        fx.write("user.service.ts", "");
        assert_eq!(
            fx.resolver().resolve("./user.service", &from),
            Some(fx.path("user.service.ts"))
        );
    }

    #[test]
    fn esm_js_specifier_maps_to_ts_source() {
        let fx = Fixture::new();
        let from = fx.write("a.ts", "");
        fx.write("b.ts", "");
        assert_eq!(fx.resolver().resolve("./b.js", &from), Some(fx.path("b.ts")));
    }

    #[test]
    fn directory_resolves_to_first_barrel() {
        let fx = Fixture::new();
        let from = fx.write("app.ts", "");
        fx.write("features/index.js", "");
        fx.write("features/index.ts", "");
        fx.write("empty/readme.md", "");

        let resolver = fx.resolver();
        assert_eq!(
            resolver.resolve("./features", &from),
            Some(fx.path("features/index.ts"))
        );
        assert_eq!(resolver.resolve("./empty", &from), None);
        assert!(resolver.config().is_barrel(&fx.path("features/index.ts")));
        assert!(!resolver.config().is_barrel(&fx.path("app.ts")));
    }

    #[test]
    fn textually_different_specifiers_compare_equal() {
        let fx = Fixture::new();
        let from = fx.write("src/a/a.ts", "");
        fx.write("src/b.ts", "");
        let resolver = fx.resolver();
        assert_eq!(
            resolver.resolve("../b", &from),
            resolver.resolve("./../../src/b.ts", &from)
        );
    }

    #[test]
    fn bare_specifiers_are_external() {
        let fx = Fixture::new();
        let from = fx.write("a.ts", "");
        fx.write("node_modules/react/index.js", "");
        fx.write("react.ts", "");
        let resolver = fx.resolver();
        assert_eq!(resolver.resolve("react", &from), None);
        assert_eq!(resolver.resolve("./node_modules/react", &from), None);
    }

    #[test]
    fn missing_files_and_outside_root_are_none() {
        let fx = Fixture::new();
        let from = fx.write("a.ts", "");
        let resolver = fx.resolver();
        assert_eq!(resolver.resolve("./missing", &from), None);
        assert_eq!(resolver.resolve("../../../etc/hosts", &from), None);
        assert_eq!(resolver.resolve("", &from), None);
    }

    #[test]
    fn config_aliases_with_wildcards() {
        let fx = Fixture::new();
        let from = fx.write("src/app.ts", "");
        fx.write("src/shared/user.ts", "");
        fx.write("src/config.ts", "");

        let mut settings = ResolverSettings {
            use_tsconfig: false,
            ..ResolverSettings::default()
        };
        settings
            .aliases
            .insert("@shared/*".to_string(), vec!["src/shared/*".to_string()]);
        settings
            .aliases
            .insert("#config".to_string(), vec!["src/config".to_string()]);

        let resolver = fx.resolver_with(&settings);
        assert_eq!(
            resolver.resolve("@shared/user", &from),
            Some(fx.path("src/shared/user.ts"))
        );
        assert_eq!(
            resolver.resolve("#config", &from),
            Some(fx.path("src/config.ts"))
        );
        assert_eq!(resolver.resolve("@other/user", &from), None);
    }

    #[test]
    fn tsconfig_paths_with_comments_and_extends() {
        let fx = Fixture::new();
        fx.write(
            "tsconfig.base.json",
            r#"{ "compilerOptions": { "paths": { "@lib/*": ["lib/*"] } } }"#,
        );
        fx.write(
            "tsconfig.json",
            r#"{
  // app config
  "extends": "./tsconfig.base.json",
  "compilerOptions": {
    "baseUrl": ".",
    "paths": { "@/*": ["src/*"], },
  },
}"#,
        );
        let from = fx.write("src/app.ts", "");
        fx.write("src/store.ts", "");
        fx.write("lib/format.ts", "");

        let resolver = fx.resolver();
        assert_eq!(
            resolver.resolve("@/store", &from),
            Some(fx.path("src/store.ts"))
        );
        assert_eq!(
            resolver.resolve("@lib/format", &from),
            Some(fx.path("lib/format.ts"))
        );
    }

    #[test]
    fn tsconfig_extends_array_applies_in_order() {
        let fx = Fixture::new();
        fx.write(
            "configs/paths.json",
            r#"{ "compilerOptions": { "paths": { "@ui/*": ["old-ui/*"], "@lib/*": ["lib/*"] } } }"#,
        );
        fx.write(
            "configs/ui.json",
            r#"{ "compilerOptions": { "paths": { "@ui/*": ["ui/*"] } } }"#,
        );
        fx.write(
            "tsconfig.json",
            r#"{ "extends": ["./configs/paths", "./configs/ui.json", "@tsconfig/node20/tsconfig.json"] }"#,
        );
        let from = fx.write("src/app.ts", "");
        fx.write("ui/button.ts", "");
        fx.write("old-ui/button.ts", "");
        fx.write("lib/format.ts", "");

        let resolver = fx.resolver();
        assert_eq!(
            resolver.resolve("@ui/button", &from),
            Some(fx.path("ui/button.ts"))
        );
        assert_eq!(
            resolver.resolve("@lib/format", &from),
            Some(fx.path("lib/format.ts"))
        );
    }

    #[test]
    fn self_extending_tsconfig_terminates() {
        let fx = Fixture::new();
        fx.write(
            "tsconfig.json",
            r#"{ "extends": "./tsconfig.json", "compilerOptions": { "paths": { "@/*": ["src/*"] } } }"#,
        );
        let from = fx.write("src/app.ts", "");
        fx.write("src/store.ts", "");
        assert_eq!(
            fx.resolver().resolve("@/store", &from),
            Some(fx.path("src/store.ts"))
        );
    }

    #[test]
    fn ignored_files_are_dead_ends() {
        let fx = Fixture::new();
        let from = fx.write("src/a.ts", "");
        fx.write("src/generated/api.ts", "");
        let settings = ResolverSettings {
            ignore: vec!["src/generated/**".to_string()],
            ..ResolverSettings::default()
        };
        let resolver = fx.resolver_with(&settings);
        assert_eq!(resolver.resolve("./generated/api", &from), None);
    }

    #[test]
    fn wildcard_captures_middle_segments() {
        let rule = AliasRule {
            pattern: "@pkg/*/src/*".to_string(),
            targets: vec!["packages/*/lib/*".to_string()],
            base: PathBuf::from("/"),
        };
        let caps = rule.captures("@pkg/ui/src/button").expect("match");
        assert_eq!(caps, vec!["ui", "button"]);
        assert_eq!(rule.expand(&rule.targets[0], &caps), "packages/ui/lib/button");
        assert!(rule.captures("@other/x").is_none());
    }

    #[test]
    fn resolution_key_tracks_settings() {
        let fx = Fixture::new();
        let default_key = fx.resolver().config().resolution_key();
        assert_eq!(default_key, fx.resolver().config().resolution_key());

        let settings = ResolverSettings {
            extensions: vec!["ts".to_string()],
            ..ResolverSettings::default()
        };
        assert_ne!(default_key, fx.resolver_with(&settings).config().resolution_key());
    }

    #[test]
    fn lexical_normalization() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/../c/./d.ts")),
            PathBuf::from("/a/c/d.ts")
        );
    }
}
