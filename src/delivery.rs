//! Response delivery — clipboard write, paste keystroke, notifications.
//!
//! On success the answer goes to the clipboard, then (after the configured
//! delay) a Ctrl+V is sent to whatever window has focus. On failure the
//! clipboard is left alone and exactly one notification names the failure
//! kind.

use crate::config::DeliveryOptions;
use crate::llm::AnalysisOutcome;
use std::time::Duration;

/// Wait between the paste keystroke and restoring the old clipboard, so
/// the target app reads our text first.
const RESTORE_SETTLE: Duration = Duration::from_millis(300);
const NOTIFY_TITLE: &str = "AI Assistant";
const NOTIFY_ERROR_TITLE: &str = "AI Assistant Error";
const MAX_NOTIFY_DETAIL: usize = 120;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
    #[error("paste keystroke failed: {0}")]
    Paste(String),
    #[error("paste keystroke is not supported on this platform")]
    Unsupported,
}

pub trait ClipboardDriver: Send + Sync {
    fn write(&self, text: &str) -> Result<(), DeliveryError>;
    /// Current clipboard text, `None` when it holds no text.
    fn read(&self) -> Result<Option<String>, DeliveryError>;
    fn emit_paste_keystroke(&self) -> Result<(), DeliveryError>;
}

/// Fire-and-forget user notification. Must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// What happened to a delivered outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryReport {
    /// Text on the clipboard and Ctrl+V sent.
    Pasted,
    /// Text on the clipboard only.
    Copied,
    /// Could not even write the clipboard.
    ClipboardFailed,
    /// Failure outcome; only a notification was shown.
    Notified,
}

pub async fn deliver(
    outcome: &AnalysisOutcome,
    options: &DeliveryOptions,
    clipboard: &dyn ClipboardDriver,
    notifier: &dyn Notifier,
) -> DeliveryReport {
    match outcome {
        AnalysisOutcome::Success { text } => {
            let report = deliver_text(text, options, clipboard).await;
            match report {
                DeliveryReport::Pasted => notifier.notify(NOTIFY_TITLE, "Response pasted!"),
                DeliveryReport::Copied => {
                    notifier.notify(NOTIFY_TITLE, "Response copied to clipboard")
                }
                _ => notifier.notify(NOTIFY_ERROR_TITLE, "Could not access the clipboard"),
            }
            report
        }
        AnalysisOutcome::Failure { kind, message } => {
            let detail = truncate(message, MAX_NOTIFY_DETAIL);
            let body = if detail.is_empty() {
                kind.label().to_string()
            } else {
                format!("{}: {}", kind.label(), detail)
            };
            notifier.notify(NOTIFY_ERROR_TITLE, &body);
            DeliveryReport::Notified
        }
    }
}

async fn deliver_text(
    text: &str,
    options: &DeliveryOptions,
    clipboard: &dyn ClipboardDriver,
) -> DeliveryReport {
    let previous = if options.auto_paste && options.restore_clipboard {
        match clipboard.read() {
            Ok(prev) => prev,
            Err(e) => {
                log::warn!("[PASTE] Could not read original clipboard: {}", e);
                None
            }
        }
    } else {
        None
    };

    if let Err(e) = clipboard.write(text) {
        log::error!("[PASTE] Failed to write clipboard: {}", e);
        return DeliveryReport::ClipboardFailed;
    }
    log::info!("[PASTE] Copied {} chars to clipboard", text.len());

    if !options.auto_paste {
        return DeliveryReport::Copied;
    }

    tokio::time::sleep(options.delay).await;
    if let Err(e) = clipboard.emit_paste_keystroke() {
        log::warn!("[PASTE] {} — leaving response on clipboard", e);
        return DeliveryReport::Copied;
    }
    log::info!("[PASTE] Paste command sent");

    if let Some(previous) = previous {
        tokio::time::sleep(RESTORE_SETTLE).await;
        match clipboard.write(&previous) {
            Ok(()) => log::info!("[PASTE] Original clipboard restored"),
            Err(e) => log::warn!("[PASTE] Failed to restore clipboard: {}", e),
        }
    }
    DeliveryReport::Pasted
}

fn truncate(s: &str, max_chars: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars).collect();
    format!("{}…", cut)
}

// ── System implementations ───────────────────────────────────────────

/// Native clipboard via arboard, Ctrl+V via `SendInput` on Windows.
pub struct SystemClipboard;

impl ClipboardDriver for SystemClipboard {
    fn write(&self, text: &str) -> Result<(), DeliveryError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| DeliveryError::Clipboard(e.to_string()))?;
        clipboard
            .set_text(text)
            .map_err(|e| DeliveryError::Clipboard(e.to_string()))
    }

    fn read(&self) -> Result<Option<String>, DeliveryError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| DeliveryError::Clipboard(e.to_string()))?;
        match clipboard.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(DeliveryError::Clipboard(e.to_string())),
        }
    }

    #[cfg(target_os = "windows")]
    fn emit_paste_keystroke(&self) -> Result<(), DeliveryError> {
        use windows::Win32::UI::Input::KeyboardAndMouse::{
            SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
            KEYEVENTF_KEYUP, VIRTUAL_KEY, VK_CONTROL,
        };

        fn key(vk: VIRTUAL_KEY, up: bool) -> INPUT {
            INPUT {
                r#type: INPUT_KEYBOARD,
                Anonymous: INPUT_0 {
                    ki: KEYBDINPUT {
                        wVk: vk,
                        wScan: 0,
                        dwFlags: if up { KEYEVENTF_KEYUP } else { KEYBD_EVENT_FLAGS(0) },
                        time: 0,
                        dwExtraInfo: 0,
                    },
                },
            }
        }

        let vk_v = VIRTUAL_KEY(0x56);
        let inputs = [
            key(VK_CONTROL, false),
            key(vk_v, false),
            key(vk_v, true),
            key(VK_CONTROL, true),
        ];
        let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(DeliveryError::Paste(format!(
                "SendInput injected {} of {} events",
                sent,
                inputs.len()
            )));
        }
        Ok(())
    }

    #[cfg(not(target_os = "windows"))]
    fn emit_paste_keystroke(&self) -> Result<(), DeliveryError> {
        Err(DeliveryError::Unsupported)
    }
}

/// Notifications as log lines. Non-blocking by construction.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        log::info!("[NOTIFY] {} — {}", title, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FailureKind;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeClipboard {
        content: Mutex<Option<String>>,
        writes: Mutex<Vec<String>>,
        pastes: Mutex<usize>,
        paste_fails: bool,
    }

    impl ClipboardDriver for FakeClipboard {
        fn write(&self, text: &str) -> Result<(), DeliveryError> {
            *self.content.lock().unwrap() = Some(text.to_string());
            self.writes.lock().unwrap().push(text.to_string());
            Ok(())
        }
        fn read(&self) -> Result<Option<String>, DeliveryError> {
            Ok(self.content.lock().unwrap().clone())
        }
        fn emit_paste_keystroke(&self) -> Result<(), DeliveryError> {
            if self.paste_fails {
                return Err(DeliveryError::Unsupported);
            }
            *self.pastes.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, String)>>);

    impl Notifier for Recorder {
        fn notify(&self, title: &str, message: &str) {
            self.0
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
        }
    }

    fn options(auto_paste: bool, restore: bool) -> DeliveryOptions {
        DeliveryOptions {
            auto_paste,
            delay: Duration::from_millis(0),
            restore_clipboard: restore,
        }
    }

    fn success(text: &str) -> AnalysisOutcome {
        AnalysisOutcome::Success {
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn paste_and_restore() {
        let clip = FakeClipboard::default();
        *clip.content.lock().unwrap() = Some("original".to_string());
        let notes = Recorder::default();

        let report = deliver(&success("answer"), &options(true, true), &clip, &notes).await;

        assert_eq!(report, DeliveryReport::Pasted);
        assert_eq!(*clip.pastes.lock().unwrap(), 1);
        assert_eq!(*clip.writes.lock().unwrap(), vec!["answer", "original"]);
        assert_eq!(clip.content.lock().unwrap().as_deref(), Some("original"));
        assert_eq!(notes.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn copy_only_when_auto_paste_disabled() {
        let clip = FakeClipboard::default();
        let notes = Recorder::default();
        let report = deliver(&success("answer"), &options(false, true), &clip, &notes).await;

        assert_eq!(report, DeliveryReport::Copied);
        assert_eq!(*clip.pastes.lock().unwrap(), 0);
        assert_eq!(clip.content.lock().unwrap().as_deref(), Some("answer"));
        assert_eq!(notes.0.lock().unwrap()[0].1, "Response copied to clipboard");
    }

    #[tokio::test]
    async fn paste_failure_falls_back_to_copy() {
        let clip = FakeClipboard {
            paste_fails: true,
            ..Default::default()
        };
        *clip.content.lock().unwrap() = Some("original".to_string());
        let notes = Recorder::default();
        let report = deliver(&success("answer"), &options(true, true), &clip, &notes).await;

        assert_eq!(report, DeliveryReport::Copied);
        assert_eq!(clip.content.lock().unwrap().as_deref(), Some("answer"));
    }

    #[tokio::test]
    async fn failure_never_touches_clipboard() {
        let clip = FakeClipboard::default();
        let notes = Recorder::default();
        let outcome = AnalysisOutcome::failure(FailureKind::AllKeysExhausted, "quota");
        let report = deliver(&outcome, &options(true, true), &clip, &notes).await;

        assert_eq!(report, DeliveryReport::Notified);
        assert!(clip.writes.lock().unwrap().is_empty());
        let notes = notes.0.lock().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, "AI Assistant Error");
        assert!(notes[0].1.starts_with("All API keys exhausted"));
    }

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate("  short  ", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd…");
    }
}
