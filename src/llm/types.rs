//! Analysis request/outcome types shared by the client and the pipeline.

use serde::Serialize;

/// One combined request: images oldest first, plus the prompt and model
/// they are sent with.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// PNG bytes in capture order.
    pub images: Vec<Vec<u8>>,
    pub system_prompt: String,
    pub model: String,
}

/// Why an analysis produced no text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    NoCredentials,
    /// Quota hit on one key with rotation disabled.
    QuotaExceeded,
    /// Every key in the pool hit its quota during this request.
    AllKeysExhausted,
    /// Non-quota failure: auth, network, timeout, malformed request, capture.
    Terminal,
    QueueFull,
}

impl FailureKind {
    /// Human-readable label for notifications.
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::NoCredentials => "No API keys configured",
            FailureKind::QuotaExceeded => "API quota exceeded",
            FailureKind::AllKeysExhausted => "All API keys exhausted",
            FailureKind::Terminal => "Request failed",
            FailureKind::QueueFull => "Screenshot queue is full",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Final result of one analysis run. Exactly one of text or failure.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Success { text: String },
    Failure { kind: FailureKind, message: String },
}

impl AnalysisOutcome {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        AnalysisOutcome::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            AnalysisOutcome::Success { .. } => None,
            AnalysisOutcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Structured error from the remote model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub status: Option<u16>,
    pub message: String,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(code) => write!(f, "HTTP {}: {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

impl RemoteError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn timeout(after: std::time::Duration) -> Self {
        Self::new(None, format!("request timed out after {}s", after.as_secs()))
    }
}
