//! Hotkey event handling — the glue between the listener and the pipeline.
//!
//! Handles events without blocking the caller: every piece of real work
//! runs on a spawned task. At most one analysis is in flight; a second
//! analyze press while one runs is dropped, while capture presses keep
//! queueing. Captures are chained so they land in the queue in press
//! order, however long each screen grab takes. Disabling lets an
//! in-flight analysis finish but starts no new work.

use crate::capture::{CaptureQueue, ScreenshotProvider};
use crate::config::ConfigStore;
use crate::delivery::{self, ClipboardDriver, DeliveryReport, Notifier};
use crate::hotkey::HotkeyEvent;
use crate::llm::{FailureKind, ModelClient};
use crate::pipeline::Orchestrator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const TITLE: &str = "AI Assistant";

pub struct Assistant<C> {
    orchestrator: Orchestrator<C>,
    store: Arc<ConfigStore>,
    screenshots: Arc<dyn ScreenshotProvider>,
    clipboard: Arc<dyn ClipboardDriver>,
    notifier: Arc<dyn Notifier>,
    enabled: AtomicBool,
    in_flight: AtomicBool,
    /// Completion signal of the most recently started capture.
    last_capture: Mutex<Option<oneshot::Receiver<()>>>,
}

/// Clears the in-flight flag when the analysis task ends, panics included.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<C: ModelClient + 'static> Assistant<C> {
    pub fn new(
        orchestrator: Orchestrator<C>,
        store: Arc<ConfigStore>,
        screenshots: Arc<dyn ScreenshotProvider>,
        clipboard: Arc<dyn ClipboardDriver>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            orchestrator,
            store,
            screenshots,
            clipboard,
            notifier,
            enabled: AtomicBool::new(true),
            in_flight: AtomicBool::new(false),
            last_capture: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        log::info!("[HOTKEY] Assistant {}", if enabled { "enabled" } else { "disabled" });
        self.notifier.notify(
            TITLE,
            if enabled { "Assistant enabled" } else { "Assistant disabled" },
        );
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn queue(&self) -> &Arc<CaptureQueue> {
        self.orchestrator.queue()
    }

    /// Dispatch one hotkey press. Returns the spawned task, if any work
    /// was started.
    pub fn handle(self: &Arc<Self>, event: HotkeyEvent) -> Option<JoinHandle<()>> {
        if event == HotkeyEvent::Toggle {
            self.set_enabled(!self.is_enabled());
            return None;
        }
        if !self.is_enabled() {
            log::info!("[HOTKEY] {:?} pressed but assistant is disabled", event);
            return None;
        }
        match event {
            HotkeyEvent::Capture => {
                // Taken here, on the caller's thread, so the chain follows
                // press order rather than task scheduling order.
                let (done_tx, done_rx) = oneshot::channel();
                let previous = self
                    .last_capture
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .replace(done_rx);
                let this = Arc::clone(self);
                Some(tokio::spawn(async move {
                    if let Some(previous) = previous {
                        // Err just means the previous task ended without signalling.
                        let _ = previous.await;
                    }
                    this.capture_to_queue().await;
                    let _ = done_tx.send(());
                }))
            }
            HotkeyEvent::Analyze => {
                if self.in_flight.swap(true, Ordering::SeqCst) {
                    log::info!("[HOTKEY] Analysis already running, ignoring analyze hotkey");
                    return None;
                }
                let this = Arc::clone(self);
                Some(tokio::spawn(async move {
                    let _guard = InFlightGuard(&this.in_flight);
                    this.analyze_and_deliver().await;
                }))
            }
            HotkeyEvent::Toggle => None,
        }
    }

    async fn capture_to_queue(&self) {
        let provider = Arc::clone(&self.screenshots);
        let captured = match tokio::task::spawn_blocking(move || provider.capture()).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        let item = match captured {
            Ok(item) => item,
            Err(e) => {
                log::error!("[CAPTURE] Failed to capture screenshot: {}", e);
                self.notifier
                    .notify("AI Assistant Error", &format!("Capture failed: {}", e));
                return;
            }
        };
        match self.queue().enqueue(item) {
            Ok(total) => self
                .notifier
                .notify(TITLE, &format!("Screenshot Queued (Total: {})", total)),
            Err(full) => self.notifier.notify(
                "AI Assistant Error",
                &format!("{}: {}", FailureKind::QueueFull.label(), full),
            ),
        }
    }

    /// One analysis end to end. Settings are snapshotted here, so edits
    /// made while it runs apply to the next press.
    pub async fn analyze_and_deliver(&self) -> DeliveryReport {
        let settings = self.store.snapshot().analysis_settings();
        log::info!("[HOTKEY] Analyze pressed — starting analysis");
        let outcome = self.orchestrator.run(&settings).await;
        delivery::deliver(
            &outcome,
            &settings.delivery,
            self.clipboard.as_ref(),
            self.notifier.as_ref(),
        )
        .await
    }
}
