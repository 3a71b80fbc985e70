//! Non-persistable file handles, keyed by task id.
//!
//! Handles live only as long as the owning queue (one manager instance, one
//! CLI process). After a restart the registry is empty and every unfinished
//! task has to be re-attached before it can continue.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::task::TaskId;

/// The file backing a task is gone or no longer the file that was queued.
#[derive(Debug, Clone, thiserror::Error)]
#[error("file {name} is unavailable: {reason}")]
pub struct MissingFileError {
    pub name: String,
    pub reason: String,
}

/// Failure reading one chunk from a handle.
#[derive(Debug, thiserror::Error)]
pub enum ChunkReadError {
    #[error(transparent)]
    Missing(#[from] MissingFileError),
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
enum FileSource {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// Readable handle to a file selected for upload.
#[derive(Debug, Clone)]
pub struct FileHandle {
    pub name: String,
    pub size: u64,
    pub media_type: String,
    /// Modification time in ms since the Unix epoch (0 when unknown).
    pub last_modified: u64,
    source: FileSource,
}

impl FileHandle {
    /// Stat a file on disk. The content is read lazily, one chunk at a time.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("stat {}", path.display()))?;
        if !meta.is_file() {
            anyhow::bail!("{} is not a regular file", path.display());
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("{} has no file name", path.display()))?;
        let last_modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Ok(Self {
            media_type: guess_media_type(&name).to_string(),
            name,
            size: meta.len(),
            last_modified,
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// In-memory file, mostly for tests and embedding callers.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let bytes: Vec<u8> = bytes.into();
        let bytes: Arc<[u8]> = Arc::from(bytes);
        Self {
            media_type: guess_media_type(&name).to_string(),
            name,
            size: bytes.len() as u64,
            last_modified: 0,
            source: FileSource::Memory(bytes),
        }
    }

    pub fn with_last_modified(mut self, ms: u64) -> Self {
        self.last_modified = ms;
        self
    }

    /// Read bytes `[start, end)`.
    pub async fn read_chunk(&self, start: u64, end: u64) -> Result<Vec<u8>, ChunkReadError> {
        let len = end.saturating_sub(start) as usize;
        match &self.source {
            FileSource::Memory(bytes) => {
                let s = start.min(bytes.len() as u64) as usize;
                let e = end.min(bytes.len() as u64) as usize;
                Ok(bytes[s..e].to_vec())
            }
            FileSource::Path(path) => {
                let io_err = |source: std::io::Error| ChunkReadError::Io {
                    path: path.clone(),
                    source,
                };
                let mut file = match tokio::fs::File::open(path).await {
                    Ok(f) => f,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Err(self.missing("file no longer exists").into());
                    }
                    Err(e) => return Err(io_err(e)),
                };
                let current = file.metadata().await.map_err(io_err)?.len();
                if current != self.size {
                    return Err(self
                        .missing(&format!("size changed from {} to {} bytes", self.size, current))
                        .into());
                }
                file.seek(SeekFrom::Start(start)).await.map_err(io_err)?;
                let mut buf = vec![0u8; len];
                file.read_exact(&mut buf).await.map_err(io_err)?;
                Ok(buf)
            }
        }
    }

    fn missing(&self, reason: &str) -> MissingFileError {
        MissingFileError {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Content type from the file extension; `application/octet-stream` otherwise.
pub fn guess_media_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "7z" => "application/x-7z-compressed",
        _ => "application/octet-stream",
    }
}

/// In-memory association task id -> file handle.
#[derive(Debug, Default)]
pub struct FileRegistry {
    files: HashMap<TaskId, FileHandle>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: TaskId, file: FileHandle) {
        self.files.insert(id, file);
    }

    /// The handle for `id`, or None when the task is waiting for its file.
    pub fn resolve(&self, id: &TaskId) -> Option<FileHandle> {
        self.files.get(id).cloned()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.files.contains_key(id)
    }

    /// Drop the handle so large in-memory sources are not retained.
    pub fn release(&mut self, id: &TaskId) -> bool {
        self.files.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
