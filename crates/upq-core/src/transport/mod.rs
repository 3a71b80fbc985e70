//! Chunk-session transport: the five remote operations of one upload.
//!
//! Each call is one HTTP round trip and keeps no state between calls. The
//! scheduler is generic over [`ChunkTransport`] so tests can script failures.

mod error;
mod http;
mod wire;

pub use error::{Phase, TransportError, TransportErrorKind};
pub use http::CurlTransport;

use std::future::Future;

/// Reply to a successful `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStart {
    pub session_id: String,
    /// Chunk size the server suggests; informational only.
    pub recommended_chunk_size: Option<u64>,
}

/// Server-side view of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub exists: bool,
    pub received: u64,
    pub total: u64,
}

impl SessionStatus {
    /// Percent acknowledged by the server, kept below 100 (finish is still pending).
    pub fn progress(&self) -> u8 {
        if !self.exists || self.total == 0 {
            return 0;
        }
        let pct = u128::from(self.received.min(self.total)) * 100 / u128::from(self.total);
        (pct as u8).min(99)
    }
}

/// Remote operations against the chunk-session API.
pub trait ChunkTransport: Send + Sync + 'static {
    /// Open a session for a file of `total_size` bytes.
    fn start_session(
        &self,
        name: &str,
        total_size: u64,
        media_type: &str,
    ) -> impl Future<Output = Result<SessionStart, TransportError>> + Send;

    /// Send chunk `chunk_index`; returns the server's progress percent.
    ///
    /// Resending the same index with the same bytes after an ambiguous
    /// failure is allowed.
    fn append_chunk(
        &self,
        session_id: &str,
        chunk_index: u64,
        chunk: Vec<u8>,
        total_chunks: u64,
    ) -> impl Future<Output = Result<u8, TransportError>> + Send;

    /// Assemble the uploaded chunks under `final_name`.
    fn finish_session(
        &self,
        session_id: &str,
        final_name: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Read-only lookup used when resuming after a restart.
    fn query_status(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<SessionStatus, TransportError>> + Send;

    /// Best-effort cleanup. Failures are logged by the implementation.
    fn cancel_session(&self, session_id: &str) -> impl Future<Output = ()> + Send;
}
