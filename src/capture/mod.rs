//! Screen capture domain — public API.
//!
//! This module owns screenshot capture and the queue of captures waiting
//! for one combined analysis. External code should only use the items
//! exported here.

mod queue;
mod screenshot;

pub use queue::{CaptureQueue, QueueFull};
pub use screenshot::{default_provider, encode_png, ScreenCapture};

use std::time::SystemTime;

/// One captured screen, PNG-encoded, plus when it was taken.
#[derive(Clone)]
pub struct CaptureItem {
    pub png: Vec<u8>,
    pub captured_at: SystemTime,
}

impl CaptureItem {
    pub fn new(png: Vec<u8>) -> Self {
        Self {
            png,
            captured_at: SystemTime::now(),
        }
    }
}

impl std::fmt::Debug for CaptureItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureItem")
            .field("bytes", &self.png.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no monitors found")]
    NoMonitor,
    #[error("screen capture failed: {0}")]
    Capture(String),
    #[error("PNG encode failed: {0}")]
    Encode(String),
    #[error("screen capture is not supported on this platform")]
    Unsupported,
}

/// Synchronous pixel read of the screen. No side effects beyond the
/// optional save-to-disk copy.
pub trait ScreenshotProvider: Send + Sync {
    fn capture(&self) -> Result<CaptureItem, CaptureError>;
}
