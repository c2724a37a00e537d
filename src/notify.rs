//! User-visible notifications.
//!
//! On Windows every note becomes a balloon on a notification-area icon the
//! assistant owns for as long as it runs. The icon lives on its own thread
//! with a message-only window; `notify` only queues a message for it, so
//! callers never wait on the shell. Elsewhere notes go to the log.

use crate::delivery::{LogNotifier, Notifier};
use std::sync::Arc;

/// Best notifier for this platform. Falls back to the log when the icon
/// cannot be created.
#[cfg(target_os = "windows")]
pub fn system_notifier() -> Arc<dyn Notifier> {
    match balloon::BalloonNotifier::start() {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            log::warn!("[NOTIFY] Tray notifications unavailable, logging only: {}", e);
            Arc::new(LogNotifier)
        }
    }
}

#[cfg(not(target_os = "windows"))]
pub fn system_notifier() -> Arc<dyn Notifier> {
    Arc::new(LogNotifier)
}

/// Copy `text` into a fixed, zeroed UTF-16 buffer, truncating so the last
/// slot stays a terminator.
#[cfg(any(target_os = "windows", test))]
fn copy_wide(dst: &mut [u16], text: &str) {
    let max = dst.len().saturating_sub(1);
    for (slot, unit) in dst.iter_mut().zip(text.encode_utf16().take(max)) {
        *slot = unit;
    }
}

#[cfg(target_os = "windows")]
mod balloon {
    use super::copy_wide;
    use crate::delivery::Notifier;
    use std::sync::mpsc::{self, Sender};
    use std::sync::Mutex;
    use std::thread::JoinHandle;
    use windows::core::w;
    use windows::Win32::Foundation::{HINSTANCE, HWND};
    use windows::Win32::UI::Shell::{
        Shell_NotifyIconW, NIF_ICON, NIF_INFO, NIF_TIP, NIIF_ERROR, NIIF_INFO, NIM_ADD,
        NIM_DELETE, NIM_MODIFY, NOTIFYICONDATAW,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        CreateWindowExW, DestroyWindow, LoadIconW, HMENU, HWND_MESSAGE, IDI_APPLICATION,
        WINDOW_EX_STYLE, WINDOW_STYLE,
    };

    const ICON_ID: u32 = 1;
    const TOOLTIP: &str = "AI Assistant";

    struct Balloon {
        title: String,
        message: String,
        error: bool,
    }

    pub struct BalloonNotifier {
        tx: Mutex<Option<Sender<Balloon>>>,
        thread: Mutex<Option<JoinHandle<()>>>,
    }

    impl BalloonNotifier {
        /// Create the icon on a dedicated thread; returns once it is shown.
        pub fn start() -> Result<Self, String> {
            let (tx, rx) = mpsc::channel::<Balloon>();
            let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

            let thread = std::thread::Builder::new()
                .name("notify-icon".to_string())
                .spawn(move || {
                    let icon = match unsafe { TrayIcon::add() } {
                        Ok(icon) => {
                            let _ = ready_tx.send(Ok(()));
                            icon
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    for balloon in rx {
                        unsafe { icon.show(&balloon) };
                    }
                })
                .map_err(|e| format!("failed to start notify thread: {}", e))?;

            ready_rx
                .recv()
                .map_err(|_| "notify thread exited during startup".to_string())??;
            log::info!("[NOTIFY] Notification icon added");
            Ok(Self {
                tx: Mutex::new(Some(tx)),
                thread: Mutex::new(Some(thread)),
            })
        }
    }

    impl Notifier for BalloonNotifier {
        fn notify(&self, title: &str, message: &str) {
            log::info!("[NOTIFY] {}: {}", title, message);
            let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(Balloon {
                    title: title.to_string(),
                    message: message.to_string(),
                    error: title.contains("Error"),
                });
            }
        }
    }

    impl Drop for BalloonNotifier {
        fn drop(&mut self) {
            // Closing the channel ends the loop, which removes the icon.
            self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
            if let Some(thread) = self.thread.lock().unwrap_or_else(|e| e.into_inner()).take() {
                let _ = thread.join();
            }
        }
    }

    /// Notification-area icon bound to a message-only window. Removed on drop.
    struct TrayIcon {
        hwnd: HWND,
    }

    impl TrayIcon {
        unsafe fn add() -> Result<Self, String> {
            let hwnd = CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                w!("STATIC"),
                w!("AI Assistant"),
                WINDOW_STYLE::default(),
                0,
                0,
                0,
                0,
                HWND_MESSAGE,
                HMENU::default(),
                HINSTANCE::default(),
                None,
            )
            .map_err(|e| format!("CreateWindowExW failed: {}", e))?;

            let icon = Self { hwnd };
            let mut nid = icon.data();
            nid.uFlags = NIF_ICON | NIF_TIP;
            nid.hIcon = LoadIconW(HINSTANCE::default(), IDI_APPLICATION).unwrap_or_default();
            copy_wide(&mut nid.szTip, TOOLTIP);
            if !Shell_NotifyIconW(NIM_ADD, &nid).as_bool() {
                // Drop still destroys the window; NIM_DELETE on a missing icon is harmless.
                return Err("Shell_NotifyIconW(NIM_ADD) failed".to_string());
            }
            Ok(icon)
        }

        unsafe fn data(&self) -> NOTIFYICONDATAW {
            let mut nid: NOTIFYICONDATAW = std::mem::zeroed();
            nid.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
            nid.hWnd = self.hwnd;
            nid.uID = ICON_ID;
            nid
        }

        unsafe fn show(&self, balloon: &Balloon) {
            let mut nid = self.data();
            nid.uFlags = NIF_INFO;
            nid.dwInfoFlags = if balloon.error { NIIF_ERROR } else { NIIF_INFO };
            copy_wide(&mut nid.szInfoTitle, &balloon.title);
            copy_wide(&mut nid.szInfo, &balloon.message);
            if !Shell_NotifyIconW(NIM_MODIFY, &nid).as_bool() {
                log::warn!("[NOTIFY] Shell_NotifyIconW(NIM_MODIFY) failed");
            }
        }
    }

    impl Drop for TrayIcon {
        fn drop(&mut self) {
            unsafe {
                let nid = self.data();
                let _ = Shell_NotifyIconW(NIM_DELETE, &nid);
                let _ = DestroyWindow(self.hwnd);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_wide_keeps_a_terminator() {
        let mut buf = [0u16; 6];
        copy_wide(&mut buf, "Screenshot Queued");
        assert_eq!(String::from_utf16(&buf[..5]).unwrap(), "Scree");
        assert_eq!(buf[5], 0);
    }

    #[test]
    fn copy_wide_short_text_fits() {
        let mut buf = [0u16; 8];
        copy_wide(&mut buf, "ok");
        assert_eq!(&buf[..3], &[b'o' as u16, b'k' as u16, 0]);
    }
}
