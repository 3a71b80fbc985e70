//! SQLite-backed snapshot store (sqlx).

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use super::{decode_snapshot, encode_snapshot, QueueStore};
use crate::task::UploadTask;

const DEFAULT_QUEUE: &str = "upload_queue";

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the SQLite queue database.
///
/// The database file is stored under the XDG state directory:
/// `~/.local/state/upq/queue.db` on Debian.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    queue: String,
}

impl SqliteStore {
    /// Open (or create) the default queue database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("upq")?;
        let state_dir = xdg_dirs.get_state_home();
        Self::open_at(state_dir.join("queue.db")).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;
        let store = SqliteStore {
            pool,
            queue: DEFAULT_QUEUE.to_string(),
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        // One row per named queue; `tasks_json` is the ordered task array.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS queue_snapshot (
                name TEXT PRIMARY KEY,
                tasks_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl QueueStore for SqliteStore {
    async fn save(&self, tasks: &[UploadTask]) -> Result<()> {
        let json = encode_snapshot(tasks)?;
        sqlx::query(
            r#"
            INSERT INTO queue_snapshot (name, tasks_json, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET
                tasks_json = excluded.tasks_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(self.queue.as_str())
        .bind(json)
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load(&self) -> Result<Vec<UploadTask>> {
        let row = sqlx::query(
            r#"
            SELECT tasks_json
            FROM queue_snapshot
            WHERE name = ?1
            "#,
        )
        .bind(self.queue.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let json: String = row.get("tasks_json");
                decode_snapshot(&json)
            }
            None => Ok(Vec::new()),
        }
    }
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
