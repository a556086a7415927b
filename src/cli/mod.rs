//! CLI-specific functionality for pickerkit
//!
//! This module contains the argument parsing and configuration discovery
//! used by the `pickerkit` binary.

pub mod args;
pub mod config;

pub use args::{Args, ExecutionMode, PageConfig, PageSource, StorageAction, StorageOptions};
pub use config::ConfigDiscovery;
