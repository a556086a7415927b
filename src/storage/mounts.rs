//! Mount table parsing.
//!
//! Vold configuration files list removable storages as `dev_mount` entries;
//! the kernel mount table lists every mounted filesystem. Both are scanned
//! line by line for paths that may hold application data.

use crate::env::storage::{MOUNT_PREFIXES, VOLD_ENTRY_PREFIX};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    /// `dev_mount <label> <path> ...` entries
    Vold,
    /// `/proc/mounts` layout: `<device> <path> <fs> <options> ...`
    Mounts,
}

/// Extract storage paths from mount table content, in file order.
///
/// Lines with fewer than four tokens and comment lines are skipped.
pub fn parse_mount_table(content: &str, mode: MountMode) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    for line in content.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 4 || tokens[0].starts_with('#') {
            continue;
        }

        match mode {
            MountMode::Vold => {
                debug!(label = tokens[1], path = tokens[2], "Vold entry");
                if tokens[0].starts_with(VOLD_ENTRY_PREFIX) {
                    paths.push(PathBuf::from(tokens[2]));
                }
            }
            MountMode::Mounts => {
                debug!(device = tokens[0], path = tokens[1], "Mount entry");
                for prefix in MOUNT_PREFIXES {
                    if tokens[0].starts_with(prefix) {
                        paths.push(PathBuf::from(tokens[1]));
                    }
                }
            }
        }
    }

    paths
}

/// Parse a mount table file, appending its paths. Unreadable files are skipped.
pub fn parse_mount_file(file: &Path, mode: MountMode, paths: &mut Vec<PathBuf>) {
    debug!("Parsing {}", file.display());

    match std::fs::read_to_string(file) {
        Ok(content) => paths.extend(parse_mount_table(&content, mode)),
        Err(e) => warn!("Can't read file {}: {}", file.display(), e),
    }
}

/// Parse the vold files followed by the kernel mount table
pub fn parse_storages(vold_files: &[PathBuf], mounts_file: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for file in vold_files {
        parse_mount_file(file, MountMode::Vold, &mut paths);
    }
    if let Some(mounts_file) = mounts_file {
        parse_mount_file(mounts_file, MountMode::Mounts, &mut paths);
    }
    paths
}
