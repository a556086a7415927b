//! Storage path discovery.
//!
//! Finds writable storage roots from the mount tables, measures the data
//! directory and moves it between storages.

pub mod item;
pub mod manager;
pub mod mounts;
pub mod types;

pub use item::{StorageItem, format_size};
pub use manager::{StoragePathManager, is_dir_writable};
pub use mounts::{MountMode, parse_mount_file, parse_mount_table};
pub use types::{MoveFilesListener, SpaceProbe, StorageConfig, StorageError, SystemSpaceProbe};
