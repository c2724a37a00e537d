//! Quota-error classification.
//!
//! Decides whether a failed call should trigger key rotation: HTTP 429, or
//! one of a few fixed phrases in the message. Everything else is terminal.

use super::types::RemoteError;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Quota,
    Terminal,
}

/// Case-insensitive. `resource[ _]exhausted` also covers Gemini's
/// `RESOURCE_EXHAUSTED` status string.
fn quota_vocabulary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)quota|rate[ _-]?limit|resource[ _]exhausted")
            .expect("quota vocabulary regex is valid")
    })
}

pub fn classify(error: &RemoteError) -> ErrorClass {
    if error.status == Some(429) || quota_vocabulary().is_match(&error.message) {
        ErrorClass::Quota
    } else {
        ErrorClass::Terminal
    }
}
