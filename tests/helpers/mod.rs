//! Shared fakes for pipeline and assistant tests.
#![allow(dead_code)]

use ai_assistant_lib::capture::{CaptureError, CaptureItem, ScreenshotProvider};
use ai_assistant_lib::credentials::Credential;
use ai_assistant_lib::delivery::{ClipboardDriver, DeliveryError, Notifier};
use ai_assistant_lib::llm::{AnalysisRequest, ModelClient, RemoteError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn quota_error() -> RemoteError {
    RemoteError::new(
        Some(429),
        "Resource has been exhausted (e.g. check quota). (RESOURCE_EXHAUSTED)",
    )
}

pub fn malformed_error() -> RemoteError {
    RemoteError::new(Some(400), "Request contains an invalid argument.")
}

/// What a `ScriptedClient` saw. Shared so tests can inspect it after the
/// client moves into the orchestrator.
#[derive(Default)]
pub struct CallLog {
    positions: Mutex<Vec<usize>>,
    images: Mutex<Vec<Vec<Vec<u8>>>>,
}

impl CallLog {
    /// Key positions in the order they were tried.
    pub fn positions(&self) -> Vec<usize> {
        self.positions.lock().unwrap().clone()
    }

    /// Image payloads of every request received.
    pub fn images(&self) -> Vec<Vec<Vec<u8>>> {
        self.images.lock().unwrap().clone()
    }
}

/// Model client answering per key position.
#[derive(Default)]
pub struct ScriptedClient {
    replies: HashMap<usize, Result<String, RemoteError>>,
    log: Arc<CallLog>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, position: usize, reply: Result<&str, RemoteError>) -> Self {
        self.replies.insert(position, reply.map(|s| s.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn log(&self) -> Arc<CallLog> {
        Arc::clone(&self.log)
    }
}

impl ModelClient for ScriptedClient {
    async fn send(
        &self,
        request: &AnalysisRequest,
        credential: &Credential,
    ) -> Result<String, RemoteError> {
        self.log.positions.lock().unwrap().push(credential.position);
        self.log.images.lock().unwrap().push(request.images.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .get(&credential.position)
            .cloned()
            .unwrap_or_else(|| Err(RemoteError::new(None, "no scripted reply")))
    }
}

/// Screens tagged 1, 2, 3... in the order capture was called.
#[derive(Default)]
pub struct CountingScreens {
    next: AtomicU8,
    fail: bool,
    first_delay: Option<Duration>,
}

impl CountingScreens {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// The first grab blocks for `delay`; later ones return at once.
    pub fn slow_first(delay: Duration) -> Self {
        Self {
            first_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn taken(&self) -> u8 {
        self.next.load(Ordering::SeqCst)
    }
}

impl ScreenshotProvider for CountingScreens {
    fn capture(&self) -> Result<CaptureItem, CaptureError> {
        if self.fail {
            return Err(CaptureError::NoMonitor);
        }
        let tag = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        if let (1, Some(delay)) = (tag, self.first_delay) {
            std::thread::sleep(delay);
        }
        Ok(CaptureItem::new(vec![tag]))
    }
}

#[derive(Default)]
pub struct FakeClipboard {
    pub content: Mutex<Option<String>>,
    pub pastes: Mutex<usize>,
}

impl ClipboardDriver for FakeClipboard {
    fn write(&self, text: &str) -> Result<(), DeliveryError> {
        *self.content.lock().unwrap() = Some(text.to_string());
        Ok(())
    }

    fn read(&self) -> Result<Option<String>, DeliveryError> {
        Ok(self.content.lock().unwrap().clone())
    }

    fn emit_paste_keystroke(&self) -> Result<(), DeliveryError> {
        *self.pastes.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, _title: &str, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

pub fn keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("test-key-{:02}-abcdef", i)).collect()
}
