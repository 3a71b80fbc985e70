//! JSON bodies of the chunk-session endpoints.

use serde::Deserialize;

use super::{SessionStart, SessionStatus};

const MAX_ERROR_TEXT: usize = 300;

#[derive(Deserialize)]
struct StartBody {
    session_id: String,
    #[serde(default)]
    recommended_chunk_size: Option<u64>,
}

#[derive(Deserialize)]
struct AppendBody {
    progress: f64,
}

#[derive(Deserialize)]
struct FinishBody {
    status: String,
}

fn exists_default() -> bool {
    true
}

#[derive(Deserialize)]
struct StatusBody {
    #[serde(default = "exists_default")]
    exists: bool,
    #[serde(default, alias = "uploaded_size")]
    received: u64,
    #[serde(default, alias = "total_size")]
    total: u64,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub(crate) fn parse_start(body: &[u8]) -> Result<SessionStart, String> {
    let b: StartBody = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    if b.session_id.trim().is_empty() {
        return Err("empty session_id".to_string());
    }
    Ok(SessionStart {
        session_id: b.session_id,
        recommended_chunk_size: b.recommended_chunk_size,
    })
}

/// Server percent (may be fractional, e.g. 33.33) floored to an integer in 0..=100.
pub(crate) fn parse_append(body: &[u8]) -> Result<u8, String> {
    let b: AppendBody = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    if !b.progress.is_finite() {
        return Err(format!("progress is not a number: {}", b.progress));
    }
    Ok(b.progress.floor().clamp(0.0, 100.0) as u8)
}

pub(crate) fn parse_finish(body: &[u8]) -> Result<(), String> {
    let b: FinishBody = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    if b.status != "finished" {
        return Err(format!("unexpected status {:?}", b.status));
    }
    Ok(())
}

pub(crate) fn parse_status(body: &[u8]) -> Result<SessionStatus, String> {
    let b: StatusBody = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    Ok(SessionStatus {
        exists: b.exists,
        received: b.received,
        total: b.total,
    })
}

/// Diagnostic text of an error response: the `error` field when the body is
/// JSON, otherwise the (truncated) raw text.
pub(crate) fn error_message(body: &[u8]) -> String {
    if let Ok(b) = serde_json::from_slice::<ErrorBody>(body) {
        return b.error;
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return "no response body".to_string();
    }
    text.chars().take(MAX_ERROR_TEXT).collect()
}
