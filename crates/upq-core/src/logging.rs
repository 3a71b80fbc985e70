//! Tracing setup for the `upq` binary.
//!
//! Events go to `$XDG_STATE_HOME/upq/upq.log`; `RUST_LOG` overrides the
//! default directives.

use anyhow::{anyhow, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,upq=debug,upq_core=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Create `dir` if needed and open `upq.log` inside it for appending.
fn open_log(dir: &Path) -> Result<(PathBuf, File)> {
    fs::create_dir_all(dir)?;
    let path = dir.join("upq.log");
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

/// Install the file subscriber. An error leaves no subscriber installed, so
/// the caller may still call [`init_logging_stderr`].
pub fn init_logging() -> Result<()> {
    let dirs = xdg::BaseDirectories::with_prefix("upq")?;
    let (path, file) = open_log(&dirs.get_state_home())?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("tracing subscriber: {}", e))?;

    tracing::info!(path = %path.display(), "logging to file");
    Ok(())
}

pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
