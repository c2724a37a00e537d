//! Remote model client trait — the seam between the pipeline and the API.
//!
//! The pipeline only ever talks to a `ModelClient`. The Gemini client is
//! the production implementation; tests script their own.

use super::types::{AnalysisRequest, RemoteError};
use crate::credentials::Credential;
use std::future::Future;

pub trait ModelClient: Send + Sync {
    /// Send every image of `request` in one call with `credential`.
    /// Returns the model's text or a structured error.
    fn send(
        &self,
        request: &AnalysisRequest,
        credential: &Credential,
    ) -> impl Future<Output = Result<String, RemoteError>> + Send;
}
