//! # pickerkit
//!
//! Building blocks for paged object pickers and storage path discovery.
//!
//! ## Architecture Overview
//!
//! - **[`graph`]**: Paged graph-object loading, cursor accumulation, the
//!   sectioned list adapter and picture prefetching
//! - **[`storage`]**: Mount table parsing, writable storage discovery and
//!   data directory migration
//! - **[`config`]**: TOML configuration for both components
//! - **[`cli`]**: Argument parsing and configuration discovery for the binary
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pickerkit::graph::{FileGraphSource, GraphRequest, PagerConfig, Picker, PickerEvent};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = FileGraphSource::from_file("friends.json").await?;
//!     let mut picker = Picker::new(Arc::new(source), None, PagerConfig::default()).await;
//!
//!     picker.load_data(GraphRequest::new("me/friends"), false).await?;
//!     while let Some(PickerEvent::LoadFinished(cursor)) = picker.next_event().await {
//!         if !cursor.are_more_objects_available() {
//!             break;
//!         }
//!     }
//!
//!     println!("{} rows", picker.adapter().count());
//!     Ok(())
//! }
//! ```

/// Paged graph objects and the list adapter built on them.
pub mod graph;

/// Storage path discovery and data migration.
pub mod storage;

/// Application configuration.
pub mod config;

/// Environment constants and path utilities.
///
/// Centralizes the hardcoded paths, file names and tuning constants used
/// throughout the crate.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use config::{AppConfig, ConfigError};

pub use graph::{
    GraphError, GraphObject, GraphObjectAdapter, GraphObjectCursor, GraphRequest, GraphResponse,
    PagerConfig, PagingLoader, Picker,
};

pub use storage::{StorageConfig, StorageError, StorageItem, StoragePathManager};
