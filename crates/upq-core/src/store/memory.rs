use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{decode_snapshot, encode_snapshot, QueueStore};
use crate::task::UploadTask;

/// Snapshot kept in process memory. Clones share the same slot, so a test can
/// hand one clone to a manager and inspect (or reload from) another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<String>>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Raw JSON of the last snapshot.
    pub fn raw(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|s| s.clone())
    }
}

impl QueueStore for MemoryStore {
    async fn save(&self, tasks: &[UploadTask]) -> Result<()> {
        let json = encode_snapshot(tasks)?;
        *self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))? = Some(json);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self) -> Result<Vec<UploadTask>> {
        match self.raw() {
            Some(json) => decode_snapshot(&json),
            None => Ok(Vec::new()),
        }
    }
}
