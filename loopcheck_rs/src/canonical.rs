//! Cycle canonicalization.
//!
//! A traversal path may walk through a prefix before it closes a loop; only
//! the loop itself is kept. The loop's identity hash ignores which file was
//! first (rotation) but keeps direction, since import edges are directed.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::detector::RawCycle;
use crate::resolver::ResolverConfig;

/// Directed step inside a cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CycleLink {
    pub from: PathBuf,
    pub to: PathBuf,
    /// Every import from `from` to `to` is type-only.
    pub is_type_only: bool,
}

/// Minimal closed loop. `files[i]` imports `files[(i + 1) % len]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Cycle {
    pub files: Vec<PathBuf>,
    pub links: Vec<CycleLink>,
    pub hash: String,
}

impl Cycle {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn is_self_import(&self) -> bool {
        self.files.len() == 1
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.iter().any(|f| f == path)
    }

    pub fn all_type_only(&self) -> bool {
        !self.links.is_empty() && self.links.iter().all(|l| l.is_type_only)
    }

    /// Same loop, listed from `start` when it is a member.
    pub fn rotated_to(&self, start: &Path) -> Cycle {
        let Some(pos) = self.files.iter().position(|f| f == start) else {
            return self.clone();
        };
        let mut files = self.files.clone();
        files.rotate_left(pos);
        let mut links = self.links.clone();
        links.rotate_left(pos);
        Cycle {
            files,
            links,
            hash: self.hash.clone(),
        }
    }

    /// `a.ts -> b.ts -> a.ts`, relative to the project root.
    pub fn describe(&self, config: &ResolverConfig) -> String {
        let mut parts: Vec<String> = self.files.iter().map(|f| config.relative(f)).collect();
        if let Some(first) = parts.first().cloned() {
            parts.push(first);
        }
        parts.join(" -> ")
    }
}

/// Reduce a traversal path to the tight loop at its first repetition.
///
/// Returns `None` when the path never repeats a file, which the detector never produces.
pub fn minimal_cycle(raw: &RawCycle) -> Option<Cycle> {
    let mut first_seen: HashMap<&Path, usize> = HashMap::new();
    let mut bounds = None;
    for (idx, file) in raw.path.iter().enumerate() {
        if let Some(&start) = first_seen.get(file.as_path()) {
            bounds = Some((start, idx));
            break;
        }
        first_seen.insert(file.as_path(), idx);
    }
    let (start, end) = bounds?;

    let files: Vec<PathBuf> = raw.path[start..end].to_vec();
    let links = (start..end)
        .map(|i| CycleLink {
            from: raw.path[i].clone(),
            to: raw.path[i + 1].clone(),
            is_type_only: raw.type_only.get(i).copied().unwrap_or(false),
        })
        .collect();
    let hash = cycle_hash(&files);
    Some(Cycle { files, links, hash })
}

/// Identity of a cyclic sequence: hash of its lexicographically smallest rotation.
pub fn cycle_hash(files: &[PathBuf]) -> String {
    let rotation = smallest_rotation(files);
    let mut hasher = Sha256::new();
    for file in rotation {
        hasher.update(file.to_string_lossy().as_bytes());
        hasher.update([0u8]);
    }
    hasher.finalize()[..16]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn smallest_rotation(files: &[PathBuf]) -> Vec<&PathBuf> {
    let n = files.len();
    (0..n)
        .map(|offset| (0..n).map(|i| &files[(offset + i) % n]).collect::<Vec<_>>())
        .min()
        .unwrap_or_default()
}
