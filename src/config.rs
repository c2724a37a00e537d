//! Persisted application configuration.
//!
//! Stored as pretty JSON at `~/.config/ai-assistant/config.json` (Windows:
//! `%APPDATA%\ai-assistant\config.json`). Every section carries serde
//! defaults so a partial or older file still loads.
//!
//! Writes go through a sibling temp file and a rename, so a crash mid-save
//! leaves either the old file or the new one, never a truncated key list.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

const APP_DIR: &str = "ai-assistant";
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Analyze the screenshot(s) \
and provide a concise solution. If several screenshots are given, treat them as consecutive \
pages of the same content, oldest first. Be direct and actionable.";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ── Schema ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Analyze trigger.
    pub hotkey: String,
    /// Queue-a-capture trigger.
    pub capture_hotkey: String,
    /// Enable/disable trigger.
    pub toggle_hotkey: String,
    pub gemini: GeminiConfig,
    pub auto_paste: AutoPasteConfig,
    pub queue: QueueConfig,
    pub screenshot: ScreenshotConfig,
    pub startup: StartupConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_keys: Vec<String>,
    pub current_key_index: usize,
    pub auto_rotate_on_quota_error: bool,
    pub model: String,
    pub system_prompt: String,
    pub request_timeout_secs: u64,
    /// Single-key field from older config files. Folded into `api_keys`
    /// on load and never written back.
    #[serde(skip_serializing, rename = "api_key")]
    pub legacy_api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoPasteConfig {
    pub enabled: bool,
    pub delay_ms: u64,
    pub restore_clipboard: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_items: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScreenshotConfig {
    pub save_to_disk: bool,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StartupConfig {
    pub launch_on_boot: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub save_logs: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hotkey: "ctrl+shift+alt+a".to_string(),
            capture_hotkey: "ctrl+shift+alt+s".to_string(),
            toggle_hotkey: "ctrl+shift+alt+p".to_string(),
            gemini: GeminiConfig::default(),
            auto_paste: AutoPasteConfig::default(),
            queue: QueueConfig::default(),
            screenshot: ScreenshotConfig::default(),
            startup: StartupConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            current_key_index: 0,
            auto_rotate_on_quota_error: true,
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            request_timeout_secs: 60,
            legacy_api_key: None,
        }
    }
}

impl Default for AutoPasteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 500,
            restore_clipboard: false,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_items: 20 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            save_logs: true,
        }
    }
}

impl AppConfig {
    /// Fold the legacy single key into the key list and clamp the index.
    /// Returns whether anything changed.
    fn normalize(&mut self) -> bool {
        let before = (
            self.gemini.api_keys.clone(),
            self.gemini.current_key_index,
            self.queue.max_items,
        );
        let had_legacy = self.gemini.legacy_api_key.is_some();
        if let Some(key) = self.gemini.legacy_api_key.take() {
            let key = key.trim().to_string();
            if !key.is_empty() && !self.gemini.api_keys.contains(&key) {
                self.gemini.api_keys.insert(0, key);
            }
        }
        self.gemini.api_keys.retain(|k| !k.trim().is_empty());
        self.gemini.current_key_index = crate::credentials::clamp_index(
            self.gemini.current_key_index,
            self.gemini.api_keys.len(),
        );
        if self.queue.max_items == 0 {
            self.queue.max_items = QueueConfig::default().max_items;
        }
        had_legacy
            || before
                != (
                    self.gemini.api_keys.clone(),
                    self.gemini.current_key_index,
                    self.queue.max_items,
                )
    }

    /// Immutable per-run view handed to the orchestrator and delivery.
    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            model: self.gemini.model.clone(),
            system_prompt: self.gemini.system_prompt.clone(),
            request_timeout: Duration::from_secs(self.gemini.request_timeout_secs.max(1)),
            delivery: DeliveryOptions {
                auto_paste: self.auto_paste.enabled,
                delay: Duration::from_millis(self.auto_paste.delay_ms),
                restore_clipboard: self.auto_paste.restore_clipboard,
            },
        }
    }
}

/// Snapshot of the settings one analysis run uses. A settings change only
/// affects the next run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub model: String,
    pub system_prompt: String,
    pub request_timeout: Duration,
    pub delivery: DeliveryOptions,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeliveryOptions {
    pub auto_paste: bool,
    pub delay: Duration,
    pub restore_clipboard: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AppConfig::default().analysis_settings()
    }
}

// ── Paths ────────────────────────────────────────────────────────────

/// Default location of the config file.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|c| c.join(APP_DIR).join(CONFIG_FILE))
        .ok_or(ConfigError::NoConfigDir)
}

/// Directory for the optional log file.
pub fn log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join(APP_DIR).join("logs"))
}

// ── Load / save ──────────────────────────────────────────────────────

/// Read a config file. A missing file yields defaults, which are written
/// out so the user has something to edit.
pub fn load(path: &Path) -> Result<AppConfig, ConfigError> {
    match read_existing(path)? {
        Some((config, false)) => Ok(config),
        Some((config, true)) => {
            log::info!(
                "[CONFIG] Migrated legacy fields / out-of-range values in {}",
                path.display()
            );
            save(path, &config)?;
            Ok(config)
        }
        None => {
            log::info!("[CONFIG] No config at {}, writing defaults", path.display());
            let config = AppConfig::default();
            save(path, &config)?;
            Ok(config)
        }
    }
}

/// Read and normalize a config file; `None` when it does not exist. The
/// flag tells whether normalizing changed anything.
fn read_existing(path: &Path) -> Result<Option<(AppConfig, bool)>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => {
            let mut config: AppConfig =
                serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
                    path: path.to_path_buf(),
                    source,
                })?;
            let changed = config.normalize();
            Ok(Some((config, changed)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Atomically persist a config: temp file in the same directory, fsync,
/// then rename over the target.
pub fn save(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = std::fs::File::create(&tmp_path).map_err(io_err)?;
    file.write_all(json.as_bytes()).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);
    std::fs::rename(&tmp_path, path).map_err(io_err)?;
    log::debug!("[CONFIG] Saved {}", path.display());
    Ok(())
}

// ── Shared store ─────────────────────────────────────────────────────

/// Shared handle on the config file. The file is the source of truth: the
/// CLI and a running service may both write it, so every read and every
/// update starts from what is on disk. The in-memory copy is only a
/// fallback for when the file is missing or unreadable.
pub struct ConfigStore {
    path: PathBuf,
    config: Mutex<AppConfig>,
}

impl ConfigStore {
    pub fn open(path: PathBuf) -> Result<Self, ConfigError> {
        let config = load(&path)?;
        Ok(Self {
            path,
            config: Mutex::new(config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AppConfig> {
        let mut guard = self.config.lock().unwrap_or_else(|e| e.into_inner());
        match read_existing(&self.path) {
            Ok(Some((config, _))) => *guard = config,
            Ok(None) => {}
            Err(e) => log::warn!("[CONFIG] Keeping last good config: {}", e),
        }
        guard
    }

    /// Current settings as on disk.
    pub fn snapshot(&self) -> AppConfig {
        self.lock().clone()
    }

    /// Re-read, apply `f`, and persist before returning. Changes written by
    /// another process since the last read are kept.
    pub fn update<F>(&self, f: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut guard = self.lock();
        f(&mut guard);
        save(&self.path, &guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = load(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"hotkey": "ctrl+q", "gemini": {"api_keys": ["k1", "k2"], "current_key_index": 1}}"#,
        )
        .unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.hotkey, "ctrl+q");
        assert_eq!(config.capture_hotkey, "ctrl+shift+alt+s");
        assert_eq!(config.gemini.api_keys, vec!["k1", "k2"]);
        assert_eq!(config.gemini.current_key_index, 1);
        assert!(config.gemini.auto_rotate_on_quota_error);
        assert_eq!(config.auto_paste.delay_ms, 500);
        assert_eq!(config.queue.max_items, 20);
    }

    #[test]
    fn legacy_single_key_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"gemini": {"api_key": "old-key"}}"#).unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.gemini.api_keys, vec!["old-key"]);

        save(&path, &config).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("\"api_key\""));
    }

    #[test]
    fn out_of_range_index_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"gemini": {"api_keys": ["a"], "current_key_index": 7}}"#)
            .unwrap();
        assert_eq!(load(&path).unwrap().gemini.current_key_index, 0);
    }

    #[test]
    fn invalid_json_is_an_error_not_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load(&path), Err(ConfigError::Json { .. })));
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        save(&path, &AppConfig::default()).unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("config.json.tmp").exists());
    }

    #[test]
    fn store_update_persists_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = ConfigStore::open(path.clone()).unwrap();
        store
            .update(|c| c.gemini.api_keys.push("fresh".to_string()))
            .unwrap();

        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.gemini.api_keys, vec!["fresh"]);
        assert_eq!(store.snapshot().gemini.api_keys, vec!["fresh"]);
    }

    #[test]
    fn two_stores_on_one_file_see_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let service = ConfigStore::open(path.clone()).unwrap();
        let cli = ConfigStore::open(path.clone()).unwrap();

        cli.update(|c| c.gemini.model = "gemini-other".to_string())
            .unwrap();
        assert_eq!(service.snapshot().gemini.model, "gemini-other");

        service.update(|c| c.auto_paste.delay_ms = 0).unwrap();
        let on_disk = load(&path).unwrap();
        assert_eq!(on_disk.gemini.model, "gemini-other");
        assert_eq!(on_disk.auto_paste.delay_ms, 0);
    }

    #[test]
    fn broken_file_keeps_last_good_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = ConfigStore::open(path.clone()).unwrap();
        store.update(|c| c.hotkey = "ctrl+q".to_string()).unwrap();
        std::fs::write(&path, "{half a file").unwrap();
        assert_eq!(store.snapshot().hotkey, "ctrl+q");
    }

    #[test]
    fn analysis_settings_reflect_config() {
        let mut config = AppConfig::default();
        config.gemini.model = "gemini-test".to_string();
        config.auto_paste.delay_ms = 250;
        config.auto_paste.restore_clipboard = true;
        let settings = config.analysis_settings();
        assert_eq!(settings.model, "gemini-test");
        assert_eq!(settings.delivery.delay, Duration::from_millis(250));
        assert!(settings.delivery.restore_clipboard);
    }
}
