//! AI Assistant — background hotkey utility entry point.
//!
//! This is the shell that wires the domains together. No business logic
//! lives here — only module declarations, startup, and the event loop.
//!
//! Work is split across:
//!   - pipeline.rs    — the analysis state machine (queue → model → outcome)
//!   - assistant.rs   — hotkey event handling and the one-at-a-time rule
//!   - delivery.rs    — clipboard, paste keystroke, notification wording
//!   - notify.rs      — notification-area balloons on Windows
//!   - commands.rs    — one-shot CLI commands (keys, test, capture, startup)

pub mod assistant;
pub mod capture;
pub mod cli;
mod commands;
pub mod config;
pub mod credentials;
pub mod delivery;
pub mod hotkey;
pub mod llm;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod startup;

use assistant::Assistant;
use capture::CaptureQueue;
use cli::{Cli, Commands};
use config::ConfigStore;
use credentials::CredentialPool;
use delivery::SystemClipboard;
use llm::GeminiClient;
use pipeline::Orchestrator;
use std::sync::Arc;
use std::time::Duration;

/// Entry point — called by `main` with parsed arguments.
pub fn run(cli: Cli) -> Result<(), String> {
    // .env.local → .env from the working directory; first one found wins.
    'env_load: for env_file in [".env.local", ".env"] {
        let path = std::path::Path::new(env_file);
        if path.exists() {
            if let Err(e) = dotenvy::from_path(path) {
                eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e);
            }
            break 'env_load;
        }
    }

    let path = match cli.config {
        Some(path) => path,
        None => config::default_config_path().map_err(|e| e.to_string())?,
    };

    if matches!(cli.command, Some(Commands::ConfigPath)) {
        println!("{}", path.display());
        return Ok(());
    }

    let store = Arc::new(ConfigStore::open(path).map_err(|e| e.to_string())?);
    logging::init(&store.snapshot().logging);
    log::info!("[CONFIG] Using {}", store.path().display());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {}", e))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => runtime.block_on(serve(store)),
        Commands::Keys { action } => commands::keys(store, action),
        Commands::Test => runtime.block_on(commands::test_connection(store)),
        Commands::Capture { save } => commands::capture(store, save),
        Commands::Startup { action } => commands::startup(store, action),
        Commands::ConfigPath => Ok(()),
    }
}

/// Keys from the config file, or a non-persisted pool seeded from
/// `GEMINI_API_KEY` when there are none.
pub(crate) fn build_pool(store: &Arc<ConfigStore>) -> CredentialPool {
    CredentialPool::from_store_or_env(Arc::clone(store), std::env::var("GEMINI_API_KEY").ok())
}

/// Run the background service until Ctrl+C.
async fn serve(store: Arc<ConfigStore>) -> Result<(), String> {
    log::info!("AI Assistant starting up");
    let config = store.snapshot();

    startup::StartupManager.reconcile(config.startup.launch_on_boot);

    let pool = Arc::new(build_pool(&store));
    if pool.is_empty() {
        log::warn!("[CONFIG] No API keys configured — add one with `ai-assistant keys add <KEY>`");
    } else {
        log::info!(
            "[CONFIG] {} API key(s), active position {}, rotation {}",
            pool.len(),
            pool.current_index(),
            if pool.rotate_on_quota_error() { "on" } else { "off" }
        );
    }

    let queue = Arc::new(CaptureQueue::new(config.queue.max_items));
    log::info!("[QUEUE] Holding up to {} capture(s)", queue.capacity());
    let screenshots = capture::default_provider(&config.screenshot);
    let client = GeminiClient::new(Duration::from_secs(
        config.gemini.request_timeout_secs.max(1),
    ))?;
    let orchestrator = Orchestrator::new(pool, queue, Arc::clone(&screenshots), client);
    let assistant = Arc::new(Assistant::new(
        orchestrator,
        Arc::clone(&store),
        screenshots,
        Arc::new(SystemClipboard),
        notify::system_notifier(),
    ));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    hotkey::spawn_listener(
        hotkey::bindings(&config.hotkey, &config.capture_hotkey, &config.toggle_hotkey),
        tx,
    );
    log::info!(
        "Ready — analyze: {}, queue capture: {}, toggle: {}",
        config.hotkey,
        config.capture_hotkey,
        config.toggle_hotkey
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("Shutting down AI Assistant");
                break;
            }
            event = rx.recv() => match event {
                Some(event) => {
                    assistant.handle(event);
                }
                None => {
                    log::warn!("[HOTKEY] No hotkey listener running; waiting for Ctrl+C");
                    let _ = (&mut shutdown).await;
                    log::info!("Shutting down AI Assistant");
                    break;
                }
            },
        }
    }
    if assistant.is_busy() {
        log::warn!("[PIPELINE] Exiting with an analysis still in flight; its answer is dropped");
    }
    // Last handle on the notifier in the common case, which removes the tray icon.
    drop(assistant);
    Ok(())
}
