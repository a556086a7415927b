//! Command line argument parsing
//!
//! This module handles CLI argument parsing with subcommands:
//! - `page`: Load a paged object list and print its sectioned rows
//! - `storage list|size|parse|move|check|bookmarks`: Storage discovery and migration
//! - `show-config`: Show configuration discovery information
//! - `init-config`: Write a default user configuration file

use crate::graph::types::LoadingStrategy;
use crate::storage::mounts::MountMode;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use url::Url;

#[derive(Debug)]
pub enum ExecutionMode {
    Page(PageConfig),
    Storage(StorageAction, StorageOptions),
    ShowConfig,
    InitConfig,
}

/// Where pages come from
#[derive(Debug, Clone, PartialEq)]
pub enum PageSource {
    Fixture(PathBuf),
    Http { base_url: Url, access_token: Option<String> },
}

#[derive(Debug)]
pub struct PageConfig {
    pub source: PageSource,
    pub target: String,
    pub config_override: Option<PathBuf>,
    pub strategy: Option<LoadingStrategy>,
    pub group_by: Option<String>,
    pub sort_fields: Vec<String>,
    pub max_pages: Option<usize>,
    pub pictures: bool,
    pub accept_cached: bool,
    pub json: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageAction {
    List,
    Size,
    Parse { file: PathBuf, mode: MountMode },
    Move { index: usize },
    Check,
    Bookmarks,
}

#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    pub config_override: Option<PathBuf>,
    pub writable_dir: Option<PathBuf>,
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Follow every next link right away
    Immediate,
    /// Follow next links when the list end is reached
    AsNeeded,
}

impl From<StrategyArg> for LoadingStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Immediate => LoadingStrategy::Immediate,
            StrategyArg::AsNeeded => LoadingStrategy::AsNeeded,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "pickerkit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Paged graph-object picker and storage path discovery tools")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load a paged object list and print its rows
    Page {
        /// Graph path to request (e.g. me/friends)
        target: String,
        /// JSON fixture file with pre-recorded pages
        #[arg(long = "fixture", conflicts_with = "url")]
        fixture: Option<PathBuf>,
        /// Base URL of the graph API
        #[arg(long = "url")]
        url: Option<Url>,
        /// Access token sent with every request
        #[arg(long = "token", requires = "url")]
        token: Option<String>,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Paging strategy override
        #[arg(long = "strategy", value_enum)]
        strategy: Option<StrategyArg>,
        /// Field to group sections by
        #[arg(long = "group-by")]
        group_by: Option<String>,
        /// Sort field (can be used multiple times)
        #[arg(long = "sort", value_name = "FIELD")]
        sort_fields: Vec<String>,
        /// Stop after this many pages
        #[arg(long = "max-pages")]
        max_pages: Option<usize>,
        /// Download row pictures
        #[arg(long = "pictures")]
        pictures: bool,
        /// Accept a cached first page
        #[arg(long = "cached")]
        cached: bool,
        /// Print the loaded objects as JSON
        #[arg(long = "json")]
        json: bool,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Storage discovery and data migration
    Storage {
        #[command(subcommand)]
        command: StorageCommands,
        /// Configuration file path
        #[arg(short = 'c', long = "config", global = true)]
        config: Option<PathBuf>,
        /// Data directory override
        #[arg(short = 'd', long = "data-dir", global = true)]
        data_dir: Option<PathBuf>,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose", global = true)]
        verbose: bool,
    },
    /// Show configuration discovery information
    ShowConfig,
    /// Create a default configuration file in the home directory
    InitConfig,
}

#[derive(Debug, Subcommand)]
pub enum StorageCommands {
    /// List writable storages
    List,
    /// Show the data directory size
    Size,
    /// Parse a mount table file
    Parse {
        file: PathBuf,
        /// Parse as a vold configuration file
        #[arg(long = "vold")]
        vold: bool,
    },
    /// Move the data directory to the storage at INDEX
    Move { index: usize },
    /// Relocate the data directory if it is no longer writable
    Check,
    /// Gather bookmark files into the bookmark directory
    Bookmarks,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Page {
                target,
                fixture,
                url,
                token,
                config,
                strategy,
                group_by,
                sort_fields,
                max_pages,
                pictures,
                cached,
                json,
                verbose,
            }) => {
                let source = match (fixture, url) {
                    (Some(fixture), _) => PageSource::Fixture(fixture.clone()),
                    (None, Some(url)) => PageSource::Http {
                        base_url: url.clone(),
                        access_token: token.clone(),
                    },
                    (None, None) => {
                        return Err("Either --fixture or --url is required".to_string());
                    }
                };

                Ok(ExecutionMode::Page(PageConfig {
                    source,
                    target: target.clone(),
                    config_override: config.clone(),
                    strategy: strategy.map(LoadingStrategy::from),
                    group_by: group_by.clone(),
                    sort_fields: sort_fields.clone(),
                    max_pages: *max_pages,
                    pictures: *pictures,
                    accept_cached: *cached,
                    json: *json,
                    verbose: *verbose,
                }))
            }
            Some(Commands::Storage {
                command,
                config,
                data_dir,
                verbose,
            }) => {
                let action = match command {
                    StorageCommands::List => StorageAction::List,
                    StorageCommands::Size => StorageAction::Size,
                    StorageCommands::Parse { file, vold } => StorageAction::Parse {
                        file: file.clone(),
                        mode: if *vold { MountMode::Vold } else { MountMode::Mounts },
                    },
                    StorageCommands::Move { index } => StorageAction::Move { index: *index },
                    StorageCommands::Check => StorageAction::Check,
                    StorageCommands::Bookmarks => StorageAction::Bookmarks,
                };
                Ok(ExecutionMode::Storage(
                    action,
                    StorageOptions {
                        config_override: config.clone(),
                        writable_dir: data_dir.clone(),
                        verbose: *verbose,
                    },
                ))
            }
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            Some(Commands::InitConfig) => Ok(ExecutionMode::InitConfig),
            None => Err(
                "No command specified. Use 'pickerkit --help' to see available commands.".to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_command_with_fixture() {
        let args = Args::try_parse_from([
            "pickerkit",
            "page",
            "me/friends",
            "--fixture",
            "pages.json",
            "--strategy",
            "as-needed",
            "--sort",
            "last_name",
            "--sort",
            "first_name",
            "--max-pages",
            "2",
        ])
        .unwrap();

        if let ExecutionMode::Page(config) = args.mode().unwrap() {
            assert_eq!(config.source, PageSource::Fixture(PathBuf::from("pages.json")));
            assert_eq!(config.target, "me/friends");
            assert_eq!(config.strategy, Some(LoadingStrategy::AsNeeded));
            assert_eq!(config.sort_fields, vec!["last_name", "first_name"]);
            assert_eq!(config.max_pages, Some(2));
            assert!(!config.pictures);
        } else {
            panic!("Expected Page mode");
        }
    }

    #[test]
    fn test_page_command_with_url() {
        let args = Args::try_parse_from([
            "pickerkit",
            "page",
            "me/friends",
            "--url",
            "https://graph.example.com/",
            "--token",
            "secret",
        ])
        .unwrap();

        if let ExecutionMode::Page(config) = args.mode().unwrap() {
            assert_eq!(
                config.source,
                PageSource::Http {
                    base_url: Url::parse("https://graph.example.com/").unwrap(),
                    access_token: Some("secret".to_string()),
                }
            );
            assert_eq!(config.strategy, None);
        } else {
            panic!("Expected Page mode");
        }
    }

    #[test]
    fn test_page_command_requires_source() {
        let args = Args::try_parse_from(["pickerkit", "page", "me/friends"]).unwrap();
        assert!(args.mode().is_err());
    }

    #[test]
    fn test_storage_commands() {
        let args = Args::try_parse_from(["pickerkit", "storage", "parse", "/proc/mounts"]).unwrap();
        assert!(matches!(
            args.mode().unwrap(),
            ExecutionMode::Storage(StorageAction::Parse { mode: MountMode::Mounts, .. }, _)
        ));

        let args = Args::try_parse_from(["pickerkit", "storage", "parse", "--vold", "/etc/vold.fstab"]).unwrap();
        assert!(matches!(
            args.mode().unwrap(),
            ExecutionMode::Storage(StorageAction::Parse { mode: MountMode::Vold, .. }, _)
        ));

        let args =
            Args::try_parse_from(["pickerkit", "storage", "move", "2", "--data-dir", "/data/MapsWithMe"]).unwrap();
        if let ExecutionMode::Storage(action, options) = args.mode().unwrap() {
            assert_eq!(action, StorageAction::Move { index: 2 });
            assert_eq!(options.writable_dir, Some(PathBuf::from("/data/MapsWithMe")));
        } else {
            panic!("Expected Storage mode");
        }
    }

    #[test]
    fn test_config_commands() {
        let args = Args::try_parse_from(["pickerkit", "show-config"]).unwrap();
        assert!(matches!(args.mode().unwrap(), ExecutionMode::ShowConfig));

        let args = Args::try_parse_from(["pickerkit", "init-config"]).unwrap();
        assert!(matches!(args.mode().unwrap(), ExecutionMode::InitConfig));
    }

    #[test]
    fn test_no_command_error() {
        let args = Args { command: None };
        let result = args.mode();
        assert!(result.is_err());
    }
}
