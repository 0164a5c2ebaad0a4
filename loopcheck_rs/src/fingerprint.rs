//! File identity used to decide whether cached import data is still valid.
//!
//! All file-system access of the cache goes through [`SourceReader`] so tests
//! can count reads and hosts can serve files from memory.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::config::Staleness;

/// Cheap stat data: size plus modification time.
///
/// Using both mtime + size avoids false hits on fast edits with coarse mtime granularity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileStat {
    pub size: u64,
    pub mtime_nanos: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Fingerprint {
    Stat { size: u64, mtime_nanos: u64 },
    Content { sha256: String },
}

impl Fingerprint {
    pub fn from_stat(stat: FileStat) -> Self {
        Self::Stat {
            size: stat.size,
            mtime_nanos: stat.mtime_nanos,
        }
    }

    pub fn from_content(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let sha256 = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Self::Content { sha256 }
    }

    pub fn policy(&self) -> Staleness {
        match self {
            Self::Stat { .. } => Staleness::Mtime,
            Self::Content { .. } => Staleness::Content,
        }
    }
}

/// A file at a particular cache epoch. Same path with a different fingerprint
/// means the older entry is stale.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileIdentity {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
}

/// Read access to source files.
pub trait SourceReader {
    fn stat(&self, path: &Path) -> io::Result<FileStat>;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads straight from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskReader;

impl SourceReader for DiskReader {
    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a file"));
        }
        let mtime_nanos = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Ok(FileStat {
            size: metadata.len(),
            mtime_nanos,
        })
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// Disk reader that counts `read` calls per path.
    #[derive(Clone, Default)]
    pub(crate) struct CountingReader {
        pub(crate) reads: Rc<RefCell<HashMap<PathBuf, usize>>>,
    }

    impl CountingReader {
        pub(crate) fn reads_of(&self, path: &Path) -> usize {
            self.reads.borrow().get(path).copied().unwrap_or(0)
        }

        pub(crate) fn total_reads(&self) -> usize {
            self.reads.borrow().values().sum()
        }
    }

    impl SourceReader for CountingReader {
        fn stat(&self, path: &Path) -> io::Result<FileStat> {
            DiskReader.stat(path)
        }

        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            *self.reads.borrow_mut().entry(path.to_path_buf()).or_default() += 1;
            DiskReader.read(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn content_fingerprint_is_sha256_hex() {
        let fp = Fingerprint::from_content(b"abc");
        assert_eq!(
            fp,
            Fingerprint::Content {
                sha256: "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
                    .to_string()
            }
        );
        assert_eq!(fp.policy(), Staleness::Content);
    }

    #[test]
    fn stat_tracks_size() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("a.ts");
        std::fs::write(&path, "export {}").expect("write");
        let before = DiskReader.stat(&path).expect("stat");
        std::fs::write(&path, "export const a = 1;").expect("write");
        let after = DiskReader.stat(&path).expect("stat");
        assert_eq!(before.size, 9);
        assert_ne!(before, after);
        assert_eq!(Fingerprint::from_stat(after).policy(), Staleness::Mtime);
    }

    #[test]
    fn stat_rejects_directories() {
        let temp = TempDir::new().expect("temp dir");
        assert!(DiskReader.stat(temp.path()).is_err());
    }
}
