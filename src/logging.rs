//! env_logger setup.
//!
//! `RUST_LOG` wins when set; otherwise the persisted `logging.level` is
//! used. With `save_logs`, every line also goes to a log file.

use crate::config::{log_dir, LoggingConfig};
use std::fs::{File, OpenOptions};
use std::io::Write;

const LOG_FILE: &str = "ai-assistant.log";

pub fn level_filter(level: &str) -> log::LevelFilter {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => log::LevelFilter::Trace,
        "DEBUG" => log::LevelFilter::Debug,
        "WARN" | "WARNING" => log::LevelFilter::Warn,
        "ERROR" | "CRITICAL" => log::LevelFilter::Error,
        "OFF" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

/// Writes to stderr and the log file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = std::io::stderr().write_all(buf);
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = std::io::stderr().flush();
        self.file.flush()
    }
}

fn open_log_file() -> Option<File> {
    let dir = log_dir()?;
    std::fs::create_dir_all(&dir).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
        .ok()
}

/// Install the global logger. Safe to call more than once; later calls
/// are no-ops.
pub fn init(config: &LoggingConfig) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level_filter(&config.level));
    // Keep dependency chatter down unless RUST_LOG asks for it.
    builder.filter_module("reqwest", log::LevelFilter::Warn);
    builder.filter_module("hyper_util", log::LevelFilter::Warn);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }

    if config.save_logs {
        match open_log_file() {
            Some(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
            }
            None => eprintln!("[STARTUP] Could not open log file, logging to stderr only"),
        }
    }

    if builder.try_init().is_ok() {
        log::debug!("[STARTUP] Logger initialized at {}", config.level);
    }
}
