//! Full-screen capture of the primary monitor.
//!
//! Uses xcap on Windows. The capture is a pixel read only: focus never
//! leaves the window the user is typing into, so the later paste lands
//! where they expect.

use super::{CaptureError, CaptureItem, ScreenshotProvider};
use crate::config::ScreenshotConfig;
use std::path::PathBuf;
use std::sync::Arc;

/// Encode RGBA pixels to PNG bytes in memory — no disk I/O.
pub fn encode_png(image: &image::RgbaImage) -> Result<Vec<u8>, CaptureError> {
    let mut png_bytes = Vec::new();
    image
        .write_to(
            &mut std::io::Cursor::new(&mut png_bytes),
            image::ImageFormat::Png,
        )
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    Ok(png_bytes)
}

/// Screen capture with an optional copy written to disk.
pub struct ScreenCapture {
    save_dir: Option<PathBuf>,
}

impl ScreenCapture {
    pub fn new(config: &ScreenshotConfig) -> Self {
        let save_dir = if config.save_to_disk {
            config
                .output_dir
                .clone()
                .or_else(|| dirs::picture_dir().map(|p| p.join("ai-assistant")))
        } else {
            None
        };
        Self { save_dir }
    }

    /// Write `item` into the save directory, if one is configured.
    fn save_copy(&self, item: &CaptureItem) -> Option<PathBuf> {
        let dir = self.save_dir.as_ref()?;
        let millis = item
            .captured_at
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let path = dir.join(format!("screenshot_{}.png", millis));
        let result = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, &item.png));
        match result {
            Ok(()) => {
                log::info!("[CAPTURE] Saved copy to {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::warn!("[CAPTURE] Failed to save {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Capture once and report where the copy went, if anywhere.
    pub fn capture_and_save(&self) -> Result<(CaptureItem, Option<PathBuf>), CaptureError> {
        let start = std::time::Instant::now();
        let pixels = self.grab()?;
        let (w, h) = (pixels.width(), pixels.height());
        let item = CaptureItem::new(encode_png(&pixels)?);
        log::info!(
            "[CAPTURE] {}x{} captured in {}ms ({} bytes)",
            w,
            h,
            start.elapsed().as_millis(),
            item.png.len()
        );
        let saved = self.save_copy(&item);
        Ok((item, saved))
    }

    #[cfg(target_os = "windows")]
    fn grab(&self) -> Result<image::RgbaImage, CaptureError> {
        let monitors =
            xcap::Monitor::all().map_err(|e| CaptureError::Capture(e.to_string()))?;
        let monitor = monitors.into_iter().next().ok_or(CaptureError::NoMonitor)?;
        monitor
            .capture_image()
            .map_err(|e| CaptureError::Capture(e.to_string()))
    }

    #[cfg(not(target_os = "windows"))]
    fn grab(&self) -> Result<image::RgbaImage, CaptureError> {
        Err(CaptureError::Unsupported)
    }
}

impl ScreenshotProvider for ScreenCapture {
    fn capture(&self) -> Result<CaptureItem, CaptureError> {
        self.capture_and_save().map(|(item, _)| item)
    }
}

pub fn default_provider(config: &ScreenshotConfig) -> Arc<dyn ScreenshotProvider> {
    Arc::new(ScreenCapture::new(config))
}
