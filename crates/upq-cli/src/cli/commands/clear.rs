//! `upq clear` – drop completed tasks.

use anyhow::Result;
use upq_core::config::UpqConfig;

use super::open_for_edit;

pub async fn run_clear(cfg: &UpqConfig) -> Result<()> {
    let manager = open_for_edit(cfg).await?;
    let removed = manager.clear_completed().await;
    manager.dispose().await?;
    println!("Cleared {} completed upload(s)", removed?);
    Ok(())
}
