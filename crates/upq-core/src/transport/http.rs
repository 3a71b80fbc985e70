//! libcurl implementation of the chunk-session API (multipart POST + GET).
//!
//! Each request runs on the blocking pool; the async side only awaits the
//! join handle, so a slow chunk never stalls other tasks on the runtime.

use curl::easy::{Easy, Form, List};
use std::time::Duration;

use super::error::{Phase, TransportError, TransportErrorKind};
use super::wire;
use super::{ChunkTransport, SessionStart, SessionStatus};
use crate::config::UpqConfig;

/// One multipart field.
enum Field {
    Text(&'static str, String),
    Blob(&'static str, Vec<u8>),
}

struct HttpReply {
    code: u32,
    body: Vec<u8>,
}

impl HttpReply {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

/// Chunk transport over HTTP using the curl crate.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    base_url: String,
    connect_timeout: Duration,
    timeout: Duration,
}

impl CurlTransport {
    /// `base_url` is the common prefix, e.g. `http://host/upload/upload_chunk`.
    pub fn new(base_url: &str, connect_timeout: Duration, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            connect_timeout,
            timeout,
        }
    }

    pub fn from_config(cfg: &UpqConfig) -> Self {
        Self::new(
            &cfg.server_url,
            Duration::from_secs(cfg.connect_timeout_secs),
            Duration::from_secs(cfg.request_timeout_secs),
        )
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    async fn post(
        &self,
        phase: Phase,
        endpoint: &str,
        fields: Vec<Field>,
    ) -> Result<HttpReply, TransportError> {
        let url = self.endpoint(endpoint);
        let (connect_timeout, timeout) = (self.connect_timeout, self.timeout);
        run_blocking(phase, move || {
            let mut easy = new_easy(&url, connect_timeout, timeout)?;
            let mut form = Form::new();
            for field in fields {
                let added = match field {
                    Field::Text(name, value) => form.part(name).contents(value.as_bytes()).add(),
                    Field::Blob(name, bytes) => form
                        .part(name)
                        .buffer("blob", bytes)
                        .content_type("application/octet-stream")
                        .add(),
                };
                added.map_err(|e| TransportErrorKind::Request(e.to_string()))?;
            }
            easy.httppost(form).map_err(curl_err)?;
            perform(easy)
        })
        .await
    }

    async fn get(&self, phase: Phase, url: String) -> Result<HttpReply, TransportError> {
        let (connect_timeout, timeout) = (self.connect_timeout, self.timeout);
        run_blocking(phase, move || {
            let mut easy = new_easy(&url, connect_timeout, timeout)?;
            easy.get(true).map_err(curl_err)?;
            perform(easy)
        })
        .await
    }
}

/// Runs a blocking curl closure on the blocking pool and tags its error with `phase`.
async fn run_blocking<F>(phase: Phase, f: F) -> Result<HttpReply, TransportError>
where
    F: FnOnce() -> Result<HttpReply, TransportErrorKind> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TransportError::network(phase, format!("request task join: {}", e)))?
        .map_err(|kind| TransportError::new(phase, kind))
}

fn curl_err(e: curl::Error) -> TransportErrorKind {
    TransportErrorKind::Network(e.to_string())
}

fn new_easy(
    url: &str,
    connect_timeout: Duration,
    timeout: Duration,
) -> Result<Easy, TransportErrorKind> {
    let mut easy = Easy::new();
    easy.url(url)
        .map_err(|e| TransportErrorKind::Request(format!("invalid URL {}: {}", url, e)))?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.connect_timeout(connect_timeout).map_err(curl_err)?;
    easy.timeout(timeout).map_err(curl_err)?;
    // No `Expect: 100-continue` round trip before every chunk body.
    let mut list = List::new();
    list.append("Expect:").map_err(curl_err)?;
    easy.http_headers(list).map_err(curl_err)?;
    Ok(easy)
}

fn perform(mut easy: Easy) -> Result<HttpReply, TransportErrorKind> {
    let mut body = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(curl_err)?;
        transfer.perform().map_err(curl_err)?;
    }
    let code = easy.response_code().map_err(curl_err)?;
    Ok(HttpReply { code, body })
}

fn check(phase: Phase, reply: &HttpReply) -> Result<(), TransportError> {
    if reply.is_success() {
        return Ok(());
    }
    Err(TransportError::http(
        phase,
        reply.code,
        wire::error_message(&reply.body),
    ))
}

impl ChunkTransport for CurlTransport {
    async fn start_session(
        &self,
        name: &str,
        total_size: u64,
        media_type: &str,
    ) -> Result<SessionStart, TransportError> {
        let fields = vec![
            Field::Text("name", name.to_string()),
            Field::Text("total_size", total_size.to_string()),
            Field::Text("file_type", media_type.to_string()),
        ];
        let reply = self.post(Phase::Start, "start", fields).await?;
        check(Phase::Start, &reply)?;
        let start = wire::parse_start(&reply.body)
            .map_err(|e| TransportError::malformed(Phase::Start, e))?;
        tracing::debug!(session_id = %start.session_id, name, total_size, "upload session started");
        Ok(start)
    }

    async fn append_chunk(
        &self,
        session_id: &str,
        chunk_index: u64,
        chunk: Vec<u8>,
        total_chunks: u64,
    ) -> Result<u8, TransportError> {
        let fields = vec![
            Field::Text("session_id", session_id.to_string()),
            Field::Text("chunk_index", chunk_index.to_string()),
            Field::Blob("chunk", chunk),
            Field::Text("total_chunks", total_chunks.to_string()),
        ];
        let reply = self.post(Phase::Append, "append", fields).await?;
        check(Phase::Append, &reply)?;
        wire::parse_append(&reply.body).map_err(|e| TransportError::malformed(Phase::Append, e))
    }

    async fn finish_session(&self, session_id: &str, final_name: &str) -> Result<(), TransportError> {
        let fields = vec![
            Field::Text("session_id", session_id.to_string()),
            Field::Text("final_filename", final_name.to_string()),
        ];
        let reply = self.post(Phase::Finish, "finish", fields).await?;
        check(Phase::Finish, &reply)?;
        wire::parse_finish(&reply.body).map_err(|e| TransportError::malformed(Phase::Finish, e))
    }

    async fn query_status(&self, session_id: &str) -> Result<SessionStatus, TransportError> {
        let mut url = url::Url::parse(&self.endpoint("status")).map_err(|e| {
            TransportError::new(Phase::Status, TransportErrorKind::Request(e.to_string()))
        })?;
        url.query_pairs_mut().append_pair("session_id", session_id);
        let reply = self.get(Phase::Status, url.to_string()).await?;
        if reply.code == 404 {
            return Ok(SessionStatus {
                exists: false,
                received: 0,
                total: 0,
            });
        }
        check(Phase::Status, &reply)?;
        wire::parse_status(&reply.body).map_err(|e| TransportError::malformed(Phase::Status, e))
    }

    async fn cancel_session(&self, session_id: &str) {
        let fields = vec![Field::Text("session_id", session_id.to_string())];
        let result = match self.post(Phase::Cancel, "cancel", fields).await {
            Ok(reply) => check(Phase::Cancel, &reply),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => tracing::debug!(session_id, "upload session cancelled"),
            Err(e) => tracing::warn!(session_id, "best-effort cancel: {}", e),
        }
    }
}
