//! Connection handling and schema for the request queue database.

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

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

/// Handle to the SQLite request queue.
///
/// The default database lives under the XDG state directory:
/// `~/.local/state/retryq/requests.db`.
#[derive(Clone)]
pub struct SqliteQueue {
    pub(crate) pool: Pool<Sqlite>,
}

impl SqliteQueue {
    /// Open (or create) the default queue database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("retryq")?;
        let db_path = xdg_dirs.get_state_home().join("requests.db");
        Self::open_at(&db_path).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await
            .with_context(|| format!("open request queue: {}", path.display()))?;
        let queue = SqliteQueue { pool };
        queue.migrate().await?;
        tracing::debug!(path = %path.display(), "request queue opened");
        Ok(queue)
    }

    async fn migrate(&self) -> Result<()> {
        // - `data_json` holds the command parameters verbatim.
        // - `retry_count` only ever grows while the row exists.
        // - `claimed_at` is set while a delivery pass owns the row.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                command TEXT NOT NULL,
                data_json TEXT NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                claimed_at INTEGER
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Databases created before claims existed lack the column.
        let columns = sqlx::query("PRAGMA table_info(requests)")
            .fetch_all(&self.pool)
            .await?;
        let has_claimed_at = columns
            .iter()
            .any(|c| c.get::<String, _>("name") == "claimed_at");
        if !has_claimed_at {
            sqlx::query("ALTER TABLE requests ADD COLUMN claimed_at INTEGER")
                .execute(&self.pool)
                .await
                .context("add claimed_at column")?;
        }

        Ok(())
    }
}

#[cfg(test)]
/// Open an in-memory database for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<SqliteQueue> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let queue = SqliteQueue { pool };
    queue.migrate().await?;
    Ok(queue)
}
