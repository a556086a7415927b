use crate::env::storage::{MWM_DIR_NAME, PROC_MOUNTS, VOLD_FILES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// Locations used by the storage manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory currently in use
    pub writable_dir: PathBuf,
    /// Directory holding the settings file; its data never moves
    pub settings_dir: PathBuf,
    /// Directory bookmarks are gathered into
    pub bookmark_dir: PathBuf,
    /// Primary external storage root, always offered as a candidate
    pub primary_external_storage: Option<PathBuf>,
    /// Additional storage roots checked before the mount tables
    pub extra_storage_dirs: Vec<PathBuf>,
    pub vold_files: Vec<PathBuf>,
    pub mounts_file: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let data_dir = home.join(MWM_DIR_NAME);

        Self {
            writable_dir: data_dir.clone(),
            settings_dir: data_dir.clone(),
            bookmark_dir: data_dir,
            primary_external_storage: Some(home),
            extra_storage_dirs: Vec::new(),
            vold_files: VOLD_FILES.iter().map(PathBuf::from).collect(),
            mounts_file: Some(PathBuf::from(PROC_MOUNTS)),
        }
    }
}

impl StorageConfig {
    /// Config rooted at a single data directory, with no mount tables
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            writable_dir: data_dir.clone(),
            settings_dir: data_dir.clone(),
            bookmark_dir: data_dir,
            primary_external_storage: None,
            extra_storage_dirs: Vec::new(),
            vold_files: Vec::new(),
            mounts_file: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Directory is not writable: {0}")]
    NotWritable(PathBuf),

    #[error("Not enough free space: {needed} bytes needed, {available} available")]
    InsufficientSpace { needed: u64, available: u64 },

    #[error("Unknown storage index: {0}")]
    UnknownStorage(usize),

    #[error("No current storage to move data from")]
    NoCurrentStorage,

    #[error("Storage task failed: {0}")]
    Task(String),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| StorageError::Io { path, source }
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(error: tokio::task::JoinError) -> Self {
        StorageError::Task(error.to_string())
    }
}

/// Completion callbacks of a storage move
pub trait MoveFilesListener: Send + Sync {
    fn move_files_finished(&self, new_path: &Path);

    fn move_files_failed(&self, error: StorageError);
}

/// Free space lookup for a filesystem path
pub trait SpaceProbe: Send + Sync {
    fn free_bytes(&self, path: &Path) -> u64;
}

/// Reads free space from the disk mounted closest to the path
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpaceProbe;

impl SpaceProbe for SystemSpaceProbe {
    fn free_bytes(&self, path: &Path) -> u64 {
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let disks = Disks::new_with_refreshed_list();

        disks
            .list()
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space())
            .unwrap_or(0)
    }
}
