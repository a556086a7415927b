use anyhow::{Context, Result, bail};
use pickerkit::cli::{
    Args, ConfigDiscovery, ExecutionMode, PageConfig, PageSource, StorageAction, StorageOptions,
};
use pickerkit::graph::{
    FileGraphSource, GraphRequest, GraphSource, HttpGraphSource, HttpImageFetcher, ImageDownloader,
    LoadingStrategy, Picker, PickerEvent, Row, SectionAndItem,
    adapter::PictureState,
};
use pickerkit::storage::{
    MoveFilesListener, StorageError, StoragePathManager, format_size, parse_mount_table,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let verbose = match &mode {
        ExecutionMode::Page(config) => config.verbose,
        ExecutionMode::Storage(_, options) => options.verbose,
        _ => false,
    };
    init_logging(verbose);

    match mode {
        ExecutionMode::Page(config) => run_page_mode(config).await,
        ExecutionMode::Storage(action, options) => run_storage_mode(action, options).await,
        ExecutionMode::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            Ok(())
        }
        ExecutionMode::InitConfig => {
            let path = ConfigDiscovery::create_default_user_config()?;
            println!("Configuration file: {}", path.display());
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "pickerkit=debug" } else { "pickerkit=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_page_mode(config: PageConfig) -> Result<()> {
    let mut app_config = ConfigDiscovery::load(config.config_override.as_deref())?;
    let pager = &mut app_config.pager;
    if let Some(strategy) = config.strategy {
        pager.loading_strategy = strategy;
    }
    if config.group_by.is_some() {
        pager.group_by_field = config.group_by.clone();
    }
    if !config.sort_fields.is_empty() {
        pager.sort_fields = config.sort_fields.clone();
    }
    pager.show_pictures = config.pictures;
    let pager = app_config.pager;

    let source: Arc<dyn GraphSource> = match &config.source {
        PageSource::Fixture(path) => Arc::new(
            FileGraphSource::from_file(path)
                .await
                .with_context(|| format!("Failed to load fixture {}", path.display()))?,
        ),
        PageSource::Http {
            base_url,
            access_token,
        } => Arc::new(HttpGraphSource::new(
            base_url.clone(),
            access_token.clone(),
            pager.request_timeout,
        )?),
    };
    info!("Loading {} from {} source", config.target, source.source_name());

    let downloader = if config.pictures {
        let fetcher = HttpImageFetcher::new(pager.request_timeout)?;
        Some(ImageDownloader::start(Arc::new(fetcher), pager.max_concurrent_downloads))
    } else {
        None
    };

    let request_timeout = pager.request_timeout;
    let strategy = pager.loading_strategy;
    let mut picker = Picker::new(source, downloader, pager).await;

    let request = GraphRequest::new(config.target.clone()).with_accept_cached(config.accept_cached);
    picker.load_data(request, true).await?;

    let mut pages = 0usize;
    loop {
        let event = tokio::time::timeout(request_timeout, picker.next_event())
            .await
            .context("Timed out waiting for a page")?;

        match event {
            Some(PickerEvent::LoadFinished(cursor)) => {
                pages += 1;
                info!(page = pages, objects = cursor.count(), "Page loaded");

                let limit_reached = config.max_pages.is_some_and(|max| pages >= max);
                if !cursor.are_more_objects_available() || limit_reached {
                    break;
                }
                if strategy == LoadingStrategy::AsNeeded {
                    // Rendering the last row asks for the next page.
                    let count = picker.adapter().count();
                    if count > 0 {
                        picker.row(count - 1).await;
                    }
                }
            }
            Some(PickerEvent::LoadFailed(e)) => bail!("Loading failed: {}", e),
            None => break,
        }
    }

    if config.pictures {
        let count = picker.adapter().count();
        picker.on_scroll(0, count.saturating_sub(1));
        for position in 0..count {
            picker.row(position).await;
        }
        let deadline = tokio::time::Instant::now() + request_timeout;
        while picker.adapter().pending_picture_count() > 0 {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, picker.adapter_mut().wait_for_image_response()).await {
                Ok(true) => {}
                _ => break,
            }
        }

        let mut ready = 0usize;
        for position in 0..count {
            if let Some(Row::GraphObject(row)) = picker.row(position).await {
                ready += usize::from(matches!(row.picture, PictureState::Ready(_)));
            }
        }
        info!("{} pictures ready", ready);
    }

    print_rows(&picker, config.json)?;
    picker.detach().await;
    Ok(())
}

fn print_rows(picker: &Picker, json: bool) -> Result<()> {
    let adapter = picker.adapter();

    if json {
        let objects: Vec<_> = (0..adapter.count()).filter_map(|position| adapter.item(position)).collect();
        println!("{}", serde_json::to_string_pretty(&objects)?);
        return Ok(());
    }

    for position in 0..adapter.count() {
        match adapter.section_and_item(position) {
            Some(SectionAndItem::SectionHeader(key)) => println!("[{}]", key),
            Some(SectionAndItem::GraphObject { graph_object, .. }) => {
                let id = graph_object.id().unwrap_or_default();
                let name = graph_object.name().unwrap_or("");
                println!("  {} ({})", name, id);
            }
            Some(SectionAndItem::ActivityCircle) => println!("  ..."),
            None => {}
        }
    }
    Ok(())
}

/// Prints move results and records failure
struct CliMoveListener {
    failed: AtomicBool,
}

impl MoveFilesListener for CliMoveListener {
    fn move_files_finished(&self, new_path: &Path) {
        println!("Data moved to {}", new_path.display());
    }

    fn move_files_failed(&self, error: StorageError) {
        error!("Move failed: {}", error);
        eprintln!("Move failed: {}", error);
        self.failed.store(true, Ordering::SeqCst);
    }
}

async fn run_storage_mode(action: StorageAction, options: StorageOptions) -> Result<()> {
    if let StorageAction::Parse { file, mode } = &action {
        let content = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        for path in parse_mount_table(&content, *mode) {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let mut storage_config = ConfigDiscovery::load(options.config_override.as_deref())?.storage;
    if let Some(writable_dir) = options.writable_dir {
        storage_config.writable_dir = writable_dir;
    }
    let manager = StoragePathManager::new(storage_config);
    manager.update_external_storages().await?;

    let listener = Arc::new(CliMoveListener {
        failed: AtomicBool::new(false),
    });

    match action {
        StorageAction::List => {
            let size_needed = manager.size_needed().await.unwrap_or(0);
            let current = manager.current_storage_index().await;
            println!("Maps: {}", format_size(size_needed));
            for (index, item) in manager.storage_items().await.iter().enumerate() {
                let marker = if current == Some(index) { "*" } else { " " };
                let available = manager.is_available(index).await.unwrap_or(false);
                println!(
                    "{} {}. {}{}",
                    marker,
                    index,
                    item,
                    if available { "" } else { " (unavailable)" }
                );
            }
            if !manager.has_more_than_one_storage().await {
                println!("No other storage found");
            }
        }
        StorageAction::Size => {
            let size = manager.mwm_dir_size().await?;
            println!("Data directory: {}", manager.writable_dir().await.display());
            println!("Size: {} ({} bytes)", format_size(size), size);
            println!("Needed on target: {}", format_size(manager.size_needed().await?));
        }
        StorageAction::Move { index } => {
            let task = manager.move_to_storage(index, listener.clone()).await?;
            task.await.context("Move task failed")?;
        }
        StorageAction::Check => match manager.check_writable_dir(listener.clone()).await {
            Some(task) => task.await.context("Move task failed")?,
            None if !listener.failed.load(Ordering::SeqCst) => println!("Data directory is writable"),
            None => {}
        },
        StorageAction::Bookmarks => {
            if manager.move_bookmarks_to_primary_storage().await? {
                println!("Bookmarks gathered into {}", manager.config().bookmark_dir.display());
            } else {
                bail!("Not enough space to gather bookmarks");
            }
        }
        StorageAction::Parse { .. } => {}
    }

    if listener.failed.load(Ordering::SeqCst) {
        bail!("Storage operation failed");
    }
    Ok(())
}
