//! Environment constants and path utilities for pickerkit.
//!
//! This module centralizes the hardcoded paths, file names and tuning
//! constants used by the picker and storage components.

use std::path::{Path, PathBuf};

/// Application configuration directory name (hidden directory like .git)
pub const PICKERKIT_DIR_NAME: &str = ".pickerkit";

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name looked up in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "pickerkit.toml";

/// Graph object constants
pub mod graph {
    use std::time::Duration;

    /// Property holding the object identity
    pub const ID_FIELD: &str = "id";

    /// Property holding the display title
    pub const NAME_FIELD: &str = "name";

    /// Property holding the picture URL or `{ "data": { "url": ... } }`
    pub const PICTURE_FIELD: &str = "picture";

    /// Maximum number of prefetched pictures kept in memory
    pub const MAX_PREFETCHED_PICTURES: usize = 20;

    /// Rows above and below the viewport whose pictures are prefetched
    pub const PICTURE_PREFETCH_BUFFER: usize = 5;

    /// Delay before a non-empty cached result is refreshed from the network
    pub const CACHED_RESULT_REFRESH_DELAY: Duration = Duration::from_secs(2);

    /// Sections are displayed only with more objects than this
    pub const DISPLAY_SECTIONS_THRESHOLD: usize = 1;

    /// Concurrent image downloads
    pub const MAX_CONCURRENT_DOWNLOADS: usize = 8;
}

/// Storage discovery constants
pub mod storage {
    /// Data directory created under every storage root
    pub const MWM_DIR_NAME: &str = "MapsWithMe";

    /// Probe directory used to verify that a path is writable
    pub const WRITABLE_PROBE_DIR: &str = "testDir";

    /// Settings file that never leaves the settings directory
    pub const SETTINGS_FILE_NAME: &str = "settings.ini";

    /// Bookmark file extension
    pub const BOOKMARK_FILE_EXT: &str = ".kml";

    /// Safety margin added to the data size before a move
    pub const SIZE_SAFETY_MARGIN: u64 = 1024 * 1024;

    /// Vold configuration files, parsed in order
    pub const VOLD_FILES: &[&str] = &["/etc/vold.conf", "/etc/vold.fstab", "/system/etc/vold.fstab"];

    /// Kernel mount table
    pub const PROC_MOUNTS: &str = "/proc/mounts";

    /// Device prefixes of removable storage in the kernel mount table
    pub const MOUNT_PREFIXES: &[&str] = &["tmpfs", "/dev/block/vold", "/dev/fuse", "/mnt/media_rw"];

    /// Line prefix of storage entries in vold files
    pub const VOLD_ENTRY_PREFIX: &str = "dev_mount";
}

/// Build the data directory path under a storage root
pub fn mwm_dir_path(storage_root: &Path) -> PathBuf {
    storage_root.join(storage::MWM_DIR_NAME)
}

/// Strip the trailing data directory from a writable dir, yielding its storage root
pub fn storage_root_of(writable_dir: &Path) -> PathBuf {
    if writable_dir.file_name().is_some_and(|name| name == storage::MWM_DIR_NAME) {
        if let Some(parent) = writable_dir.parent() {
            return parent.to_path_buf();
        }
    }
    writable_dir.to_path_buf()
}

/// Build the writable probe directory path
pub fn writable_probe_path(dir: &Path) -> PathBuf {
    dir.join(storage::WRITABLE_PROBE_DIR)
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(PICKERKIT_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(PICKERKIT_DIR_NAME).join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_paths() {
        let root = Path::new("/storage/sdcard1");

        assert_eq!(mwm_dir_path(root), Path::new("/storage/sdcard1/MapsWithMe"));
        assert_eq!(
            storage_root_of(Path::new("/storage/sdcard1/MapsWithMe")),
            Path::new("/storage/sdcard1")
        );
        assert_eq!(
            storage_root_of(Path::new("/data/app/files")),
            Path::new("/data/app/files")
        );
        assert_eq!(
            writable_probe_path(root),
            Path::new("/storage/sdcard1/testDir")
        );
    }

    #[test]
    fn test_config_paths() {
        let home_dir = Path::new("/home/user");
        let current_dir = Path::new("/current/project");

        assert_eq!(
            user_config_file_path(home_dir),
            Path::new("/home/user/.pickerkit/config.toml")
        );

        assert_eq!(
            local_config_file_path(current_dir),
            Path::new("/current/project/.pickerkit/config.toml")
        );
    }
}
