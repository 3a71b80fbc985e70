//! CLI command handlers, one per file.

mod clear;
mod remove;
mod restart;
mod run;
mod status;

pub use clear::run_clear;
pub use remove::run_remove;
pub use restart::run_restart;
pub use run::run_uploads;
pub use status::run_status;

use anyhow::Result;
use std::sync::Arc;
use upq_core::config::UpqConfig;
use upq_core::scheduler::{ManagerOptions, UploadManager};
use upq_core::store::SqliteStore;
use upq_core::transport::CurlTransport;
use upq_core::view::{NoopView, QueueView};

type Manager = UploadManager<CurlTransport, SqliteStore>;

/// Open the persisted queue with the configured server and a running worker pool.
async fn open_manager(cfg: &UpqConfig, view: Arc<dyn QueueView>) -> Result<Manager> {
    open_with(cfg, view, manager_options(cfg, true)).await
}

/// Open the queue for a one-shot edit: no session reconciliation on startup.
async fn open_for_edit(cfg: &UpqConfig) -> Result<Manager> {
    open_with(cfg, Arc::new(NoopView), manager_options(cfg, false)).await
}

fn manager_options(cfg: &UpqConfig, reconcile: bool) -> ManagerOptions {
    ManagerOptions {
        reconcile,
        ..ManagerOptions::from_config(cfg)
    }
}

async fn open_with(cfg: &UpqConfig, view: Arc<dyn QueueView>, options: ManagerOptions) -> Result<Manager> {
    let store = SqliteStore::open_default().await?;
    let transport = CurlTransport::from_config(cfg);
    UploadManager::create(options, transport, store, view).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_commands_skip_reconciliation() {
        let cfg = UpqConfig::default();
        assert!(manager_options(&cfg, true).reconcile);
        assert!(!manager_options(&cfg, false).reconcile);
        assert_eq!(manager_options(&cfg, false).chunk_size, cfg.chunk_size);
    }
}
