//! Lightweight import statement extraction for TS/JS sources.
//!
//! This is a regex scan, not a parser. It covers:
//! - Static imports: `import { foo } from './bar'`, `import Foo from './bar'`
//! - Type imports: `import type { Foo } from './bar'`, `import { type Foo } from './bar'`
//! - Side-effect imports: `import './styles.css'`
//! - Re-exports: `export * from './bar'`, `export { a } from './bar'`, `export type { T } from './bar'`
//! - `require('./bar')` and dynamic `import('./bar')`

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use regex::Regex;

/// One import statement as written in the source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImport {
    pub specifier: String,
    pub is_type_only: bool,
}

impl RawImport {
    pub fn new(specifier: impl Into<String>, is_type_only: bool) -> Self {
        Self {
            specifier: specifier.into(),
            is_type_only,
        }
    }
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex literal")
}

fn regex_import_from() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex(r#"(?m)^\s*import\s+(type\s+)?([^;'"]+?)\s+from\s*["']([^"']+)["']"#)
    })
}

fn regex_side_effect_import() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| regex(r#"(?m)^\s*import\s*["']([^"']+)["']"#))
}

fn regex_reexport() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex(
            r#"(?m)^\s*export\s+(type\s+)?(\*(?:\s+as\s+[A-Za-z0-9_$]+)?|\{[^}]*\})\s*from\s*["']([^"']+)["']"#,
        )
    })
}

fn regex_require() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| regex(r#"\brequire\s*\(\s*["']([^"']+)["']\s*\)"#))
}

fn regex_dynamic_import() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| regex(r#"\bimport\s*\(\s*["']([^"']+)["']\s*\)"#))
}

/// Extract imports in order of appearance.
pub fn extract_imports(source: &str) -> Vec<RawImport> {
    let code = strip_comments(source);
    let mut found: Vec<(usize, RawImport)> = Vec::new();

    for caps in regex_import_from().captures_iter(&code) {
        let (Some(whole), Some(spec)) = (caps.get(0), caps.get(3)) else {
            continue;
        };
        let clause = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let type_only = caps.get(1).is_some() || clause_is_type_only(clause);
        found.push((whole.start(), RawImport::new(spec.as_str(), type_only)));
    }

    for caps in regex_side_effect_import().captures_iter(&code) {
        if let (Some(whole), Some(spec)) = (caps.get(0), caps.get(1)) {
            found.push((whole.start(), RawImport::new(spec.as_str(), false)));
        }
    }

    for caps in regex_reexport().captures_iter(&code) {
        let (Some(whole), Some(spec)) = (caps.get(0), caps.get(3)) else {
            continue;
        };
        let clause = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let type_only = caps.get(1).is_some() || clause_is_type_only(clause);
        found.push((whole.start(), RawImport::new(spec.as_str(), type_only)));
    }

    for re in [regex_require(), regex_dynamic_import()] {
        for caps in re.captures_iter(&code) {
            if let (Some(whole), Some(spec)) = (caps.get(0), caps.get(1)) {
                found.push((whole.start(), RawImport::new(spec.as_str(), false)));
            }
        }
    }

    found.sort_by_key(|(offset, _)| *offset);
    found.into_iter().map(|(_, import)| import).collect()
}

/// `{ type A, type B }` is type-only; a default binding or any plain specifier is not.
fn clause_is_type_only(clause: &str) -> bool {
    let clause = clause.trim();
    let Some(inner) = clause
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
    else {
        return false;
    };
    let mut specifiers = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .peekable();
    if specifiers.peek().is_none() {
        return false;
    }
    specifiers.all(|s| s.starts_with("type ") || s.starts_with("type\t"))
}

/// Blank out `//` and `/* */` comments while leaving string, template and
/// regex literals intact. Newlines are kept so `^` anchors still line up with statements.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for rest in chars.by_ref() {
                    if rest == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for rest in chars.by_ref() {
                    if rest == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && rest == '/' {
                        break;
                    }
                    prev = rest;
                }
                out.push(' ');
            }
            '/' if regex_may_start(&out) => {
                out.push(c);
                let mut in_class = false;
                while let Some(r) = chars.next() {
                    out.push(r);
                    match r {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        }
                        '[' => in_class = true,
                        ']' => in_class = false,
                        '/' if !in_class => break,
                        '\n' => break,
                        _ => {}
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// A `/` opens a regex literal when it cannot be a division: after an
/// operator or opening punctuation, at the start, or after a keyword like `return`.
fn regex_may_start(before: &str) -> bool {
    const KEYWORDS: [&str; 9] = [
        "return", "typeof", "case", "yield", "await", "in", "of", "void", "delete",
    ];
    let trimmed = before.trim_end();
    let Some(last) = trimmed.chars().last() else {
        return true;
    };
    if "(,=:[!&|?{};+-*%<>~^".contains(last) {
        return true;
    }
    KEYWORDS.iter().any(|kw| {
        trimmed.strip_suffix(kw).is_some_and(|head| {
            head.chars()
                .last()
                .is_none_or(|c| !(c.is_alphanumeric() || c == '_' || c == '$'))
        })
    })
}
