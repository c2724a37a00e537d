//! One-shot CLI commands.
//!
//! Thin wrappers over the pool, the config store, the Gemini client and
//! the startup manager. Each command does one thing and prints the result.

use crate::capture::ScreenCapture;
use crate::cli::{KeysAction, StartupAction};
use crate::config::ConfigStore;
use crate::credentials::CredentialPool;
use crate::llm::GeminiClient;
use crate::startup::StartupManager;
use std::sync::Arc;
use std::time::Duration;

pub fn keys(store: Arc<ConfigStore>, action: KeysAction) -> Result<(), String> {
    if let KeysAction::Rotate { enabled } = action {
        store
            .update(|c| c.gemini.auto_rotate_on_quota_error = enabled)
            .map_err(|e| e.to_string())?;
        println!(
            "Rotation on quota errors: {}",
            if enabled { "on" } else { "off" }
        );
        return Ok(());
    }

    if let KeysAction::List = action {
        print_keys(&crate::build_pool(&store));
        return Ok(());
    }

    let pool = CredentialPool::from_store(store);
    match action {
        KeysAction::Add { key } => {
            let position = pool.add(&key).ok_or("Refusing to add an empty key")?;
            println!("Added key at position {}", position);
        }
        KeysAction::Remove { position } => {
            let removed = pool
                .remove(position)
                .ok_or_else(|| format!("No key at position {}", position))?;
            println!("Removed {} (was position {})", removed.masked(), removed.position);
        }
        KeysAction::Move { from, to } => {
            if !pool.reorder(from, to) {
                return Err(format!(
                    "Positions must be below {} (got {} -> {})",
                    pool.len(),
                    from,
                    to
                ));
            }
            print_keys(&pool);
        }
        KeysAction::Use { position } => {
            let active = pool
                .select(position)
                .ok_or_else(|| format!("No key at position {}", position))?;
            println!("Active key: [{}] {}", active.position, active.masked());
        }
        KeysAction::List | KeysAction::Rotate { .. } => {}
    }
    Ok(())
}

fn print_keys(pool: &CredentialPool) {
    let credentials = pool.credentials();
    if credentials.is_empty() {
        println!("No API keys configured. Add one with: ai-assistant keys add <KEY>");
        return;
    }
    let active = pool.current_index();
    for c in credentials {
        let marker = if c.position == active { "*" } else { " " };
        println!("{} [{}] {}", marker, c.position, c.masked());
    }
    if !pool.is_persistent() {
        println!("  (from GEMINI_API_KEY, not saved in the config file)");
    }
    println!(
        "Rotation on quota errors: {}",
        if pool.rotate_on_quota_error() { "on" } else { "off" }
    );
}

pub async fn test_connection(store: Arc<ConfigStore>) -> Result<(), String> {
    let config = store.snapshot();
    let pool = crate::build_pool(&store);
    let credential = pool
        .current()
        .ok_or("No API keys configured. Add one with: ai-assistant keys add <KEY>")?;
    let client = GeminiClient::new(Duration::from_secs(config.gemini.request_timeout_secs.max(1)))?;

    println!(
        "Testing key [{}] {} with {}...",
        credential.position,
        credential.masked(),
        config.gemini.model
    );
    let start = std::time::Instant::now();
    client
        .test_connection(&config.gemini.model, &credential)
        .await
        .map_err(|e| format!("Connection test failed: {}", e))?;
    println!("OK ({}ms)", start.elapsed().as_millis());
    Ok(())
}

/// One capture, optionally saved, to check the screen can be read.
pub fn capture(store: Arc<ConfigStore>, save: bool) -> Result<(), String> {
    let mut screenshot = store.snapshot().screenshot;
    screenshot.save_to_disk |= save;
    let (item, saved) = ScreenCapture::new(&screenshot)
        .capture_and_save()
        .map_err(|e| format!("Capture failed: {}", e))?;
    println!("Captured {} bytes of PNG", item.png.len());
    match saved {
        Some(path) => println!("Saved to {}", path.display()),
        None if screenshot.save_to_disk => println!("Could not save the screenshot (see log)"),
        None => {}
    }
    Ok(())
}

pub fn startup(store: Arc<ConfigStore>, action: StartupAction) -> Result<(), String> {
    let manager = StartupManager;
    match action {
        StartupAction::Status => {
            let enabled = manager.is_enabled().map_err(|e| e.to_string())?;
            println!("Launch on login: {}", if enabled { "enabled" } else { "disabled" });
        }
        StartupAction::Enable | StartupAction::Disable => {
            let enable = matches!(action, StartupAction::Enable);
            let result = if enable {
                manager.enable()
            } else {
                manager.disable()
            };
            result.map_err(|e| e.to_string())?;
            store
                .update(|c| c.startup.launch_on_boot = enable)
                .map_err(|e| e.to_string())?;
            println!("Launch on login: {}", if enable { "enabled" } else { "disabled" });
        }
    }
    Ok(())
}
