//! Storage path discovery and data migration.
//!
//! The manager enumerates writable storage roots, measures the data
//! directory and moves the data files between storages. Filesystem work
//! runs on the blocking pool; results come back through [`MoveFilesListener`].

use crate::env::storage::{BOOKMARK_FILE_EXT, SETTINGS_FILE_NAME, SIZE_SAFETY_MARGIN};
use crate::env::{mwm_dir_path, storage_root_of, writable_probe_path};
use crate::storage::item::StorageItem;
use crate::storage::mounts::parse_storages;
use crate::storage::types::{MoveFilesListener, SpaceProbe, StorageConfig, StorageError, SystemSpaceProbe};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

struct StorageState {
    writable_dir: PathBuf,
    items: Vec<StorageItem>,
    current_index: Option<usize>,
}

#[derive(Clone)]
pub struct StoragePathManager {
    config: Arc<StorageConfig>,
    probe: Arc<dyn SpaceProbe>,
    state: Arc<Mutex<StorageState>>,
}

impl StoragePathManager {
    pub fn new(config: StorageConfig) -> Self {
        Self::with_probe(config, Arc::new(SystemSpaceProbe))
    }

    pub fn with_probe(config: StorageConfig, probe: Arc<dyn SpaceProbe>) -> Self {
        let state = StorageState {
            writable_dir: config.writable_dir.clone(),
            items: Vec::new(),
            current_index: None,
        };
        Self {
            config: Arc::new(config),
            probe,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub async fn writable_dir(&self) -> PathBuf {
        self.state.lock().await.writable_dir.clone()
    }

    /// Storage root holding the current data directory
    pub async fn writable_dir_root(&self) -> PathBuf {
        storage_root_of(&self.writable_dir().await)
    }

    /// Rescan candidate storages and rebuild the item list
    pub async fn update_external_storages(&self) -> Result<Vec<StorageItem>, StorageError> {
        let config = self.config.clone();
        let probe = self.probe.clone();
        let current_root = self.writable_dir_root().await;

        let (items, current_index) = tokio::task::spawn_blocking(move || {
            let mut candidates = config.extra_storage_dirs.clone();
            candidates.extend(parse_storages(&config.vold_files, config.mounts_file.as_deref()));
            candidates.extend(config.primary_external_storage.clone());
            collect_storage_items(candidates, &current_root, probe.as_ref())
        })
        .await?;

        info!(storages = items.len(), current = ?current_index, "Updated external storages");

        let mut state = self.state.lock().await;
        state.items = items.clone();
        state.current_index = current_index;
        Ok(items)
    }

    pub async fn storage_items(&self) -> Vec<StorageItem> {
        self.state.lock().await.items.clone()
    }

    pub async fn current_storage_index(&self) -> Option<usize> {
        self.state.lock().await.current_index
    }

    pub async fn has_more_than_one_storage(&self) -> bool {
        self.state.lock().await.items.len() > 1
    }

    /// Flat sum of the file sizes in the data directory
    pub async fn mwm_dir_size(&self) -> Result<u64, StorageError> {
        let dir = self.writable_dir().await;
        Ok(tokio::task::spawn_blocking(move || dir_size(&dir)).await??)
    }

    /// Space a destination storage needs to receive the data directory
    pub async fn size_needed(&self) -> Result<u64, StorageError> {
        Ok(self.mwm_dir_size().await? + SIZE_SAFETY_MARGIN)
    }

    /// Whether data can be moved to the storage at `index`
    pub async fn is_available(&self, index: usize) -> Result<bool, StorageError> {
        let size_needed = self.size_needed().await?;
        let state = self.state.lock().await;
        let item = state.items.get(index).ok_or(StorageError::UnknownStorage(index))?;
        Ok(state.current_index != Some(index) && item.size >= size_needed)
    }

    /// Move the data directory to the storage at `index`
    pub async fn move_to_storage(
        &self,
        index: usize,
        listener: Arc<dyn MoveFilesListener>,
    ) -> Result<JoinHandle<()>, StorageError> {
        if !self.is_available(index).await? {
            let size_needed = self.size_needed().await?;
            let state = self.state.lock().await;
            let available = state.items.get(index).map_or(0, |item| item.size);
            return Err(StorageError::InsufficientSpace {
                needed: size_needed,
                available,
            });
        }

        let (new_storage, old_storage) = {
            let state = self.state.lock().await;
            let new_storage = state.items.get(index).cloned().ok_or(StorageError::UnknownStorage(index))?;
            let old_storage = state.current_index.and_then(|current| state.items.get(current).cloned());
            (new_storage, old_storage)
        };

        let target = new_storage.full_path();
        fs::create_dir_all(&target).map_err(StorageError::io(&target))?;

        Ok(self.set_storage_path(new_storage, old_storage, listener))
    }

    /// Move the data files from `old_storage` to `new_storage` in the background.
    ///
    /// The listener hears about the outcome, then the storage list is refreshed.
    pub fn set_storage_path(
        &self,
        new_storage: StorageItem,
        old_storage: Option<StorageItem>,
        listener: Arc<dyn MoveFilesListener>,
    ) -> JoinHandle<()> {
        let manager = self.clone();

        tokio::spawn(async move {
            info!(
                "Moving data to {} from {:?}",
                new_storage.path().display(),
                old_storage.as_ref().map(|item| item.path().display().to_string())
            );

            let state = manager.state.clone();
            let target = new_storage.clone();
            let result = tokio::task::spawn_blocking(move || change_storage(&target, old_storage.as_ref(), &state))
                .await
                .map_err(StorageError::from)
                .and_then(|result| result);

            match result {
                Ok(()) => {
                    info!("Data moved to {}", new_storage.path().display());
                    listener.move_files_finished(new_storage.path());
                }
                Err(e) => {
                    error!("Failed to move data: {}", e);
                    listener.move_files_failed(e);
                }
            }

            if let Err(e) = manager.update_external_storages().await {
                warn!("Failed to refresh storages after move: {}", e);
            }
        })
    }

    /// Relocate the data directory when it stopped being writable.
    ///
    /// Returns the move task when one was started. When no storage has room
    /// the listener is told about the failure right away.
    pub async fn check_writable_dir(&self, listener: Arc<dyn MoveFilesListener>) -> Option<JoinHandle<()>> {
        let writable_dir = self.writable_dir().await;
        if writable_dir == self.config.settings_dir || is_dir_writable(&writable_dir) {
            return None;
        }
        warn!("Data directory {} is not writable", writable_dir.display());

        let size = match self.mwm_dir_size().await {
            Ok(size) => size,
            Err(e) => {
                listener.move_files_failed(e);
                return None;
            }
        };

        let items = match self.update_external_storages().await {
            Ok(items) => items,
            Err(e) => {
                listener.move_files_failed(e);
                return None;
            }
        };

        match items.iter().find(|item| item.size > size) {
            Some(item) => {
                let old_storage = StorageItem::new(storage_root_of(&writable_dir), 0);
                Some(self.set_storage_path(item.clone(), Some(old_storage), listener))
            }
            None => {
                let available = items.iter().map(|item| item.size).max().unwrap_or(0);
                listener.move_files_failed(StorageError::InsufficientSpace {
                    needed: size,
                    available,
                });
                None
            }
        }
    }

    /// Gather bookmark files scattered over the storages into the bookmark dir.
    ///
    /// Returns `false` when the bookmark dir lacks room for them.
    pub async fn move_bookmarks_to_primary_storage(&self) -> Result<bool, StorageError> {
        let config = self.config.clone();
        let probe = self.probe.clone();
        let writable_dir = self.writable_dir().await;

        tokio::task::spawn_blocking(move || consolidate_bookmarks(&config, &writable_dir, probe.as_ref())).await?
    }
}

/// Check writability by creating and removing a probe directory
pub fn is_dir_writable(path: &Path) -> bool {
    let probe = writable_probe_path(path);
    let _ = fs::create_dir(&probe);
    if probe.is_dir() {
        let _ = fs::remove_dir(&probe);
        true
    } else {
        false
    }
}

fn storage_item_at(path: &Path, probe: &dyn SpaceProbe) -> Option<StorageItem> {
    debug!("Trying to add storage {}", path.display());
    if !path.is_dir() || !is_dir_writable(path) {
        return None;
    }

    let size = probe.free_bytes(path);
    if size == 0 {
        return None;
    }
    debug!("Storage added: {}, size = {}", path.display(), size);
    Some(StorageItem::new(path, size))
}

/// Build the storage list from candidate roots.
///
/// Candidates that are not writable directories with free space are
/// dropped, as are ones equal to an earlier item. The current root goes
/// first and replaces any item equal to it.
pub fn collect_storage_items(
    candidates: impl IntoIterator<Item = PathBuf>,
    current_root: &Path,
    probe: &dyn SpaceProbe,
) -> (Vec<StorageItem>, Option<usize>) {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for path in candidates {
        if let Some(item) = storage_item_at(&path, probe) {
            if seen.insert(item.clone()) {
                items.push(item);
            }
        }
    }

    match storage_item_at(current_root, probe) {
        Some(current) => {
            items.retain(|item| *item != current);
            items.insert(0, current);
            (items, Some(0))
        }
        None => {
            warn!("Unrecognized current path: {}", current_root.display());
            (items, None)
        }
    }
}

/// Flat, non-recursive sum of regular file sizes in `dir`
pub fn dir_size(dir: &Path) -> Result<u64, StorageError> {
    let mut size = 0;
    for entry in fs::read_dir(dir).map_err(StorageError::io(dir))? {
        let entry = entry.map_err(StorageError::io(dir))?;
        let metadata = entry.metadata().map_err(StorageError::io(entry.path()))?;
        if metadata.is_file() {
            size += metadata.len();
        }
    }
    Ok(size)
}

fn is_movable(name: &str) -> bool {
    name != SETTINGS_FILE_NAME && !name.ends_with(BOOKMARK_FILE_EXT)
}

/// Regular files of `dir` that follow the data when it moves
pub fn movable_files(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(StorageError::io(dir))? {
        let entry = entry.map_err(StorageError::io(dir))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if entry.file_name().to_str().is_some_and(is_movable) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Copy the movable files of `old_dir` into `new_dir`.
///
/// On failure every file copied so far is removed again. Returns the
/// source files, still in place.
pub fn copy_data_files(old_dir: &Path, new_dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    if !new_dir.exists() {
        fs::create_dir_all(new_dir).map_err(StorageError::io(new_dir))?;
    }
    if !new_dir.is_dir() {
        return Err(StorageError::NotADirectory(new_dir.to_path_buf()));
    }
    if !old_dir.is_dir() {
        return Err(StorageError::NotADirectory(old_dir.to_path_buf()));
    }
    if !is_dir_writable(new_dir) {
        return Err(StorageError::NotWritable(new_dir.to_path_buf()));
    }

    let sources = movable_files(old_dir)?;
    let mut copied: Vec<PathBuf> = Vec::with_capacity(sources.len());

    for source in &sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let destination = new_dir.join(name);
        if let Err(e) = fs::copy(source, &destination) {
            error!("Failed to copy {}: {}", source.display(), e);
            copied.push(destination);
            remove_files(&copied);
            return Err(StorageError::Io {
                path: source.clone(),
                source: e,
            });
        }
        copied.push(destination);
    }

    debug!(files = sources.len(), "Copied data files to {}", new_dir.display());
    Ok(sources)
}

fn remove_files(files: &[PathBuf]) {
    for file in files {
        if let Err(e) = fs::remove_file(file) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", file.display(), e);
            }
        }
    }
}

// Runs on the blocking pool.
fn change_storage(
    new_storage: &StorageItem,
    old_storage: Option<&StorageItem>,
    state: &Mutex<StorageState>,
) -> Result<(), StorageError> {
    let Some(old_storage) = old_storage else {
        warn!("Old storage is missing, new path is {}", new_storage.full_path().display());
        return Err(StorageError::NoCurrentStorage);
    };

    let writable_dir = state.blocking_lock().writable_dir.clone();
    let old_dir = if storage_root_of(&writable_dir) == old_storage.path() {
        writable_dir
    } else {
        old_storage.full_path()
    };
    let new_dir = new_storage.full_path();
    let sources = copy_data_files(&old_dir, &new_dir)?;

    state.blocking_lock().writable_dir = new_dir;
    remove_files(&sources);
    Ok(())
}

/// Unused bookmark file path in `dir`: `name.kml`, `name1.kml`, `name2.kml`, ...
pub fn unique_bookmark_path(dir: &Path, base_name: &str) -> PathBuf {
    let candidate = dir.join(format!("{}{}", base_name, BOOKMARK_FILE_EXT));
    if !candidate.exists() {
        return candidate;
    }

    (1u32..)
        .map(|n| dir.join(format!("{}{}{}", base_name, n, BOOKMARK_FILE_EXT)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

fn accumulate_bookmarks(dir: &Path, result: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Skipping {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_bookmark = path.is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(BOOKMARK_FILE_EXT));
        if is_bookmark && !result.contains(&path) {
            result.push(path);
        }
    }
}

fn consolidate_bookmarks(
    config: &StorageConfig,
    writable_dir: &Path,
    probe: &dyn SpaceProbe,
) -> Result<bool, StorageError> {
    let mut dirs: Vec<PathBuf> = config
        .extra_storage_dirs
        .iter()
        .cloned()
        .chain(parse_storages(&config.vold_files, config.mounts_file.as_deref()))
        .map(|root| mwm_dir_path(&root))
        .filter(|dir| dir.is_dir())
        .collect();
    if writable_dir != config.settings_dir {
        dirs.push(writable_dir.to_path_buf());
    }

    let mut bookmarks = Vec::new();
    for dir in dirs.iter().filter(|dir| **dir != config.settings_dir && **dir != config.bookmark_dir) {
        accumulate_bookmarks(dir, &mut bookmarks);
    }
    if bookmarks.is_empty() {
        return Ok(true);
    }

    let total: u64 = bookmarks
        .iter()
        .filter_map(|file| fs::metadata(file).ok())
        .map(|metadata| metadata.len())
        .sum();

    fs::create_dir_all(&config.bookmark_dir).map_err(StorageError::io(&config.bookmark_dir))?;
    let free = probe.free_bytes(&config.bookmark_dir);
    if free < total {
        warn!(needed = total, free, "Not enough space to gather bookmarks");
        return Ok(false);
    }

    for bookmark in &bookmarks {
        let base_name = bookmark
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.trim_end_matches(BOOKMARK_FILE_EXT))
            .unwrap_or_default();
        let destination = unique_bookmark_path(&config.bookmark_dir, base_name);

        fs::copy(bookmark, &destination).map_err(StorageError::io(bookmark))?;
        if let Err(e) = fs::remove_file(bookmark) {
            warn!("Failed to remove {}: {}", bookmark.display(), e);
        }
        debug!("Moved bookmark {} to {}", bookmark.display(), destination.display());
    }

    info!(count = bookmarks.len(), "Gathered bookmarks into {}", config.bookmark_dir.display());
    Ok(true)
}
