//! LLM domain — remote model client and failure classification.
//!
//! Public API for the request side of the assistant.
//!
//!   - provider.rs — `ModelClient` trait the pipeline is generic over
//!   - gemini.rs   — Gemini `generateContent` implementation
//!   - quota.rs    — quota vs terminal error classification
//!   - types.rs    — request / outcome / error types

pub mod gemini;
pub mod provider;
pub mod quota;
pub mod types;

pub use gemini::GeminiClient;
pub use provider::ModelClient;
pub use quota::{classify, ErrorClass};
pub use types::{AnalysisOutcome, AnalysisRequest, FailureKind, RemoteError};
