//! Gemini `generateContent` client.
//!
//! Request shape:
//! - API key in the `x-goog-api-key` header, not the URL (URLs end up in logs)
//! - Non-streaming; the whole answer is pasted at once
//! - Images go in one user turn as `inlineData`, in capture order

use super::provider::ModelClient;
use super::types::{AnalysisRequest, RemoteError};
use crate::credentials::Credential;
use base64::Engine;
use std::time::Duration;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MAX_OUTPUT_TOKENS: u32 = 8192;

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(timeout: Duration) -> Result<Self, String> {
        Self::with_base_url(API_BASE, timeout)
    }

    /// Point the client at a different endpoint root (proxies, local mocks).
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.base_url, model)
    }

    async fn post(
        &self,
        model: &str,
        credential: &Credential,
        body: &serde_json::Value,
    ) -> Result<String, RemoteError> {
        let start = std::time::Instant::now();
        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", &credential.value)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteError::new(None, format!("request timed out: {}", e))
                } else {
                    RemoteError::new(e.status().map(|s| s.as_u16()), e.to_string())
                }
            })?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| RemoteError::new(Some(status.as_u16()), e.to_string()))?;
        log::info!(
            "[LLM] Gemini responded {} in {}ms",
            status.as_u16(),
            start.elapsed().as_millis()
        );

        if !status.is_success() {
            return Err(RemoteError::new(
                Some(status.as_u16()),
                extract_error_message(&raw),
            ));
        }

        let json: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| RemoteError::new(Some(status.as_u16()), format!("invalid JSON: {}", e)))?;
        log_usage(&json);
        extract_text(&json)
            .ok_or_else(|| RemoteError::new(Some(status.as_u16()), empty_reason(&json)))
    }

    /// Minimal text-only request to check a key works.
    pub async fn test_connection(
        &self,
        model: &str,
        credential: &Credential,
    ) -> Result<(), RemoteError> {
        let body = serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": "Reply with just: ok"}]}],
            "generationConfig": {"maxOutputTokens": 16}
        });
        self.post(model, credential, &body).await.map(|_| ())
    }
}

impl ModelClient for GeminiClient {
    async fn send(
        &self,
        request: &AnalysisRequest,
        credential: &Credential,
    ) -> Result<String, RemoteError> {
        log::info!(
            "[LLM] Model: {} — {} image(s), key position {}",
            request.model,
            request.images.len(),
            credential.position
        );
        let body = build_request_body(request);
        self.post(&request.model, credential, &body).await
    }
}

/// JSON body for a multi-image `generateContent` call.
pub fn build_request_body(request: &AnalysisRequest) -> serde_json::Value {
    let mut parts: Vec<serde_json::Value> = request
        .images
        .iter()
        .map(|png| {
            serde_json::json!({
                "inlineData": {
                    "mimeType": "image/png",
                    "data": base64::engine::general_purpose::STANDARD.encode(png),
                }
            })
        })
        .collect();
    if request.images.len() > 1 {
        parts.push(serde_json::json!({
            "text": format!(
                "{} screenshots follow in the order they were taken (oldest first).",
                request.images.len()
            )
        }));
        // Keep the ordering hint ahead of the images.
        parts.rotate_right(1);
    }

    let mut body = serde_json::json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": { "maxOutputTokens": MAX_OUTPUT_TOKENS }
    });
    if !request.system_prompt.trim().is_empty() {
        body["systemInstruction"] = serde_json::json!({
            "parts": [{ "text": request.system_prompt }]
        });
    }
    body
}

/// Concatenate `candidates[0].content.parts[*].text`.
fn extract_text(json: &serde_json::Value) -> Option<String> {
    let parts = json
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn empty_reason(json: &serde_json::Value) -> String {
    if let Some(reason) = json["promptFeedback"]["blockReason"].as_str() {
        return format!("empty response (blocked: {})", reason);
    }
    if let Some(reason) = json["candidates"][0]["finishReason"].as_str() {
        return format!("empty response (finish reason: {})", reason);
    }
    "empty response".to_string()
}

/// `error.message` from a Gemini error body, or the raw body.
fn extract_error_message(raw: &str) -> String {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|json| {
            let err = json.get("error")?;
            let message = err.get("message")?.as_str()?.to_string();
            Some(match err.get("status").and_then(|s| s.as_str()) {
                Some(status) => format!("{} ({})", message, status),
                None => message,
            })
        })
        .unwrap_or_else(|| raw.trim().to_string())
}

fn log_usage(json: &serde_json::Value) {
    if let Some(usage) = json.get("usageMetadata") {
        log::info!(
            "[LLM] Input tokens: {}, output tokens: {}",
            usage["promptTokenCount"].as_u64().unwrap_or(0),
            usage["candidatesTokenCount"].as_u64().unwrap_or(0)
        );
    }
}
