use std::fmt;

/// Remote phase that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Append,
    Finish,
    Status,
    Cancel,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Append => "append",
            Phase::Finish => "finish",
            Phase::Status => "status",
            Phase::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportErrorKind {
    /// Request could not be built (bad URL, form encoding).
    #[error("request: {0}")]
    Request(String),
    /// Connection, timeout, or other libcurl-level failure.
    #[error("network: {0}")]
    Network(String),
    /// Non-2xx status with the server's diagnostic text.
    #[error("HTTP {status}: {message}")]
    Http { status: u32, message: String },
    /// 2xx status but the body was not what the phase expects.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A failed HTTP phase. All kinds take the same retry path; the text ends up
/// in the task's `last_error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{phase} failed: {kind}")]
pub struct TransportError {
    pub phase: Phase,
    pub kind: TransportErrorKind,
}

impl TransportError {
    pub fn new(phase: Phase, kind: TransportErrorKind) -> Self {
        Self { phase, kind }
    }

    pub fn network(phase: Phase, msg: impl Into<String>) -> Self {
        Self::new(phase, TransportErrorKind::Network(msg.into()))
    }

    pub fn http(phase: Phase, status: u32, message: impl Into<String>) -> Self {
        Self::new(
            phase,
            TransportErrorKind::Http {
                status,
                message: message.into(),
            },
        )
    }

    pub fn malformed(phase: Phase, msg: impl Into<String>) -> Self {
        Self::new(phase, TransportErrorKind::Malformed(msg.into()))
    }
}
