mod db;
pub mod error;
pub mod models;
pub mod presenter;
pub mod scan;
pub mod settings;
pub mod storage;
pub mod texts;
mod utils;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use db::Database;
use scan::{CaptureProvider, CommandRecognizer, ScanController, StillImageCapture};
use settings::{AppSettings, SettingsStore};
use storage::{JsonFileStore, KeyValueStore, MemoryStore, StorageBackend};
use texts::RecognizedTextStore;

pub struct AppState {
    pub settings: SettingsStore,
    pub store: RecognizedTextStore,
    pub scanner: ScanController,
    pub capture: Arc<dyn CaptureProvider>,
}

/// Where the app keeps its files and which overrides apply to this launch.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub data_dir: PathBuf,
    pub capture_source: Option<PathBuf>,
    pub debug: bool,
}

impl LaunchOptions {
    pub fn from_env() -> Self {
        let data_dir = std::env::var_os("SNAPTEXT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("snaptext")
            });
        let capture_source = std::env::var_os("SNAPTEXT_CAPTURE_SOURCE").map(PathBuf::from);
        let debug = std::env::var("SNAPTEXT_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            data_dir,
            capture_source,
            debug,
        }
    }
}

fn open_storage(settings: &AppSettings, data_dir: &Path) -> Result<Arc<dyn KeyValueStore>> {
    let kv: Arc<dyn KeyValueStore> = match settings.storage.backend {
        StorageBackend::Sqlite => Arc::new(Database::new(data_dir.join("snaptext.sqlite3"))?),
        StorageBackend::JsonFile => Arc::new(JsonFileStore::open(data_dir.join("storage.json"))?),
        StorageBackend::Memory => {
            log::warn!("Using in-memory storage, recognized texts will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(kv)
}

pub fn build_app(options: &LaunchOptions) -> Result<AppState> {
    std::fs::create_dir_all(&options.data_dir).with_context(|| {
        format!(
            "failed to create data directory {}",
            options.data_dir.display()
        )
    })?;

    let settings = SettingsStore::new(options.data_dir.join("settings.json"))?;
    let current = settings.settings();

    let kv = open_storage(&current, &options.data_dir)?;
    let store = RecognizedTextStore::with_key(kv, &current.storage.key);

    let source = options
        .capture_source
        .clone()
        .or_else(|| current.capture.source.clone())
        .unwrap_or_else(|| options.data_dir.join("captures"));
    log::info!(
        "Capturing from {}, {} storage",
        source.display(),
        current.storage.backend.as_str()
    );
    let capture: Arc<dyn CaptureProvider> = Arc::new(StillImageCapture::new(source));

    let recognizer = Arc::new(CommandRecognizer::new(
        current.recognizer.program.clone(),
        current.recognizer.args.clone(),
    ));

    let scanner = ScanController::new(capture.clone(), recognizer, store.clone())
        .with_timeouts(current.scan.timeouts());

    Ok(AppState {
        settings,
        store,
        scanner,
        capture,
    })
}

pub fn run() -> Result<()> {
    let options = LaunchOptions::from_env();

    // RUST_LOG wins over the default level
    let default_level = if options.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    log::info!("SnapText starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        let app = build_app(&options)?;
        presenter::run_console(&app).await
    })
}
