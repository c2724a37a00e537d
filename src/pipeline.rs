//! Analysis pipeline — queued or fresh screenshots → model → final outcome.
//!
//! One `run` is one logical request:
//!   build (drain queue, or capture one screen) → send with the active key
//!   → on quota errors rotate and resend, each key at most once
//!   → a single `AnalysisOutcome`.
//!
//! Retries are bounded by the number of keys, not a fixed count. Per-attempt
//! failures stay inside this module; callers only see the final outcome.

use crate::capture::{CaptureQueue, ScreenshotProvider};
use crate::config::AnalysisSettings;
use crate::credentials::{Credential, CredentialPool};
use crate::llm::{
    classify, AnalysisOutcome, AnalysisRequest, ErrorClass, FailureKind, ModelClient, RemoteError,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub struct Orchestrator<C> {
    pool: Arc<CredentialPool>,
    queue: Arc<CaptureQueue>,
    screenshots: Arc<dyn ScreenshotProvider>,
    client: C,
}

impl<C: ModelClient> Orchestrator<C> {
    pub fn new(
        pool: Arc<CredentialPool>,
        queue: Arc<CaptureQueue>,
        screenshots: Arc<dyn ScreenshotProvider>,
        client: C,
    ) -> Self {
        Self {
            pool,
            queue,
            screenshots,
            client,
        }
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    pub fn queue(&self) -> &Arc<CaptureQueue> {
        &self.queue
    }

    /// Full run: build the request from the queue (or one fresh capture)
    /// and send it.
    pub async fn run(&self, settings: &AnalysisSettings) -> AnalysisOutcome {
        let pipeline_start = std::time::Instant::now();

        // Checked before draining so queued captures survive a missing key.
        if self.pool.is_empty() {
            log::warn!("[LLM] No API keys configured — not sending");
            return AnalysisOutcome::failure(
                FailureKind::NoCredentials,
                "Add a Gemini API key to the configuration",
            );
        }

        let request = match self.build_request(settings).await {
            Ok(request) => request,
            Err(message) => {
                log::error!("[CAPTURE] {}", message);
                return AnalysisOutcome::failure(FailureKind::Terminal, message);
            }
        };

        let outcome = self.analyze(&request, settings.request_timeout).await;
        log::info!(
            "[PIPELINE] Total: {}ms ({} image(s), success: {})",
            pipeline_start.elapsed().as_millis(),
            request.images.len(),
            outcome.is_success()
        );
        outcome
    }

    async fn build_request(&self, settings: &AnalysisSettings) -> Result<AnalysisRequest, String> {
        let mut items = self.queue.drain_all();
        if items.is_empty() {
            log::info!("[CAPTURE] Queue empty, capturing current screen");
            let provider = Arc::clone(&self.screenshots);
            let item = tokio::task::spawn_blocking(move || provider.capture())
                .await
                .map_err(|e| format!("Capture task failed: {}", e))?
                .map_err(|e| e.to_string())?;
            items.push(item);
        }
        Ok(AnalysisRequest {
            images: items.into_iter().map(|i| i.png).collect(),
            system_prompt: settings.system_prompt.clone(),
            model: settings.model.clone(),
        })
    }

    /// Send `request`, rotating keys on quota errors. Never tries the same
    /// key position twice.
    pub async fn analyze(&self, request: &AnalysisRequest, timeout: Duration) -> AnalysisOutcome {
        let Some(mut credential) = self.pool.current() else {
            return AnalysisOutcome::failure(
                FailureKind::NoCredentials,
                "Add a Gemini API key to the configuration",
            );
        };
        let mut attempted: HashSet<usize> = HashSet::new();

        loop {
            attempted.insert(credential.position);
            let attempt = attempted.len();

            let error = match self.send_once(request, &credential, timeout).await {
                Ok(text) => {
                    log::info!(
                        "[LLM] Attempt {}: key position {} succeeded ({} chars)",
                        attempt,
                        credential.position,
                        text.len()
                    );
                    return AnalysisOutcome::Success { text };
                }
                Err(e) => e,
            };
            let message = redact(&error.to_string(), &credential);

            if classify(&error) == ErrorClass::Terminal {
                log::error!(
                    "[LLM] Attempt {}: key position {} failed — Terminal, rotated: false — {}",
                    attempt,
                    credential.position,
                    message
                );
                return AnalysisOutcome::failure(FailureKind::Terminal, message);
            }

            if !self.pool.rotate_on_quota_error() {
                log::warn!(
                    "[ROTATE] Attempt {}: key position {} — Quota, rotated: false (rotation disabled)",
                    attempt,
                    credential.position
                );
                return AnalysisOutcome::failure(FailureKind::QuotaExceeded, message);
            }

            if attempted.len() >= self.pool.len() {
                log::warn!(
                    "[ROTATE] Attempt {}: key position {} — Quota, rotated: false (all {} key(s) tried)",
                    attempt,
                    credential.position,
                    attempted.len()
                );
                return AnalysisOutcome::failure(FailureKind::AllKeysExhausted, message);
            }

            match self.pool.rotate() {
                Some(next)
                    if next.position != credential.position
                        && !attempted.contains(&next.position) =>
                {
                    log::warn!(
                        "[ROTATE] Attempt {}: key position {} — Quota, rotated: true -> position {}",
                        attempt,
                        credential.position,
                        next.position
                    );
                    credential = next;
                }
                _ => {
                    log::warn!(
                        "[ROTATE] Attempt {}: key position {} — Quota, rotated: false (no untried key)",
                        attempt,
                        credential.position
                    );
                    return AnalysisOutcome::failure(FailureKind::AllKeysExhausted, message);
                }
            }
        }
    }

    async fn send_once(
        &self,
        request: &AnalysisRequest,
        credential: &Credential,
        timeout: Duration,
    ) -> Result<String, RemoteError> {
        match tokio::time::timeout(timeout, self.client.send(request, credential)).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::timeout(timeout)),
        }
    }
}

/// Strip the raw key from an error message before it reaches logs or
/// notifications.
fn redact(message: &str, credential: &Credential) -> String {
    if credential.value.is_empty() {
        return message.to_string();
    }
    message.replace(&credential.value, &credential.masked())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_masks_key_in_message() {
        let c = Credential {
            value: "AIzaSyTopSecret99".to_string(),
            position: 0,
        };
        let out = redact("API key AIzaSyTopSecret99 not valid", &c);
        assert!(!out.contains("TopSecret"));
        assert!(out.contains("AIza…et99"));
    }
}
