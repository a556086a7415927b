use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// A candidate storage root and its free space in bytes.
///
/// Two items compare equal when they share either the size or the path, and
/// the hash covers the size only. Distinct storages that report the same free
/// space therefore collapse into one entry when deduplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageItem {
    pub path: PathBuf,
    pub size: u64,
}

impl StorageItem {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data directory this storage would hold
    pub fn full_path(&self) -> PathBuf {
        crate::env::mwm_dir_path(&self.path)
    }
}

impl PartialEq for StorageItem {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size || self.path == other.path
    }
}

impl Eq for StorageItem {}

impl Hash for StorageItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.size.hash(state);
    }
}

impl std::fmt::Display for StorageItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), format_size(self.size))
    }
}

/// Format a byte count with one decimal in Kb, Mb or Gb
pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 3] = ["Kb", "Mb", "Gb"];

    let mut current: u64 = 1024;
    let mut unit = 0;
    while unit < UNITS.len() - 1 {
        let bound = current * 1024;
        if size < bound {
            break;
        }
        current = bound;
        unit += 1;
    }

    format!("{:.1} {}", size as f64 / current as f64, UNITS[unit])
}
