// src/db/pool.rs
// Async connection pool using deadpool-sqlite
//
// All database access goes through `pool.interact()`: the closure runs on a
// dedicated connection off the async runtime, so SQLite's synchronous API
// never blocks the scheduler. Schema setup runs once at open.

use anyhow::{Context, Result, anyhow};
use deadpool_sqlite::{Config, Hook, Pool, Runtime};
use rusqlite::Connection;
use std::path::Path;
use uuid::Uuid;

use super::schema;

/// Database pool wrapper with per-connection setup.
pub struct DatabasePool {
    pool: Pool,
}

impl DatabasePool {
    /// Open a pooled database at the given path, creating parent directories
    /// and running schema setup.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let conn_str = path.display().to_string();
        Self::open_internal(&conn_str, make_post_create_hook(true), None).await
    }

    /// Open a pooled in-memory database.
    ///
    /// Uses a shared-cache URI so every connection sees the same database,
    /// and a single connection so concurrent test writers serialize on the
    /// pool instead of tripping over shared-cache table locks.
    pub async fn open_in_memory() -> Result<Self> {
        let uri = format!(
            "file:memdb_{}?mode=memory&cache=shared",
            Uuid::new_v4().simple()
        );
        Self::open_internal(&uri, make_post_create_hook(false), Some(1)).await
    }

    async fn open_internal(conn_str: &str, hook: Hook, max_size: Option<usize>) -> Result<Self> {
        let cfg = Config::new(conn_str);
        let mut builder = cfg
            .builder(Runtime::Tokio1)
            .context("failed to create pool builder")?
            .post_create(hook);
        if let Some(size) = max_size {
            builder = builder.max_size(size);
        }
        let pool = builder.build().context("failed to build connection pool")?;

        let db = Self { pool };
        db.interact(|conn| schema::run_migrations(conn)).await?;
        Ok(db)
    }

    /// Run a closure against a pooled connection.
    pub async fn interact<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.pool.get().await.context("failed to get connection")?;
        conn.interact(move |conn| f(conn))
            .await
            .map_err(|e| anyhow!("database task failed: {e}"))?
    }
}

/// Per-connection setup: foreign keys and a busy timeout everywhere, WAL for
/// file-backed databases (not applicable in-memory).
fn make_post_create_hook(file_backed: bool) -> Hook {
    Hook::async_fn(move |conn, _metrics| {
        Box::pin(async move {
            conn.interact(move |conn| {
                if file_backed {
                    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
                }
                conn.execute_batch(
                    "PRAGMA foreign_keys=ON; \
                     PRAGMA busy_timeout=5000;",
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await
            .map_err(|e| {
                deadpool_sqlite::HookError::Message(format!("interact failed: {e}").into())
            })?
            .map_err(|e| {
                deadpool_sqlite::HookError::Message(format!("connection setup failed: {e}").into())
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_runs_schema() {
        let pool = DatabasePool::open_in_memory().await.unwrap();
        let count: i64 = pool
            .interact(|conn| {
                conn.query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type='table' \
                     AND name IN ('documents','sentences','sentiments')",
                    [],
                    |row| row.get(0),
                )
                .map_err(Into::into)
            })
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_open_file_backed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let pool = DatabasePool::open(&path).await.unwrap();
        let ok: i64 = pool
            .interact(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get(0))
                    .map_err(Into::into)
            })
            .await
            .unwrap();
        assert_eq!(ok, 1);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_interact_propagates_errors() {
        let pool = DatabasePool::open_in_memory().await.unwrap();
        let result = pool
            .interact(|conn| {
                conn.execute("INSERT INTO no_such_table (x) VALUES (1)", [])?;
                Ok(())
            })
            .await;
        assert!(result.is_err());
    }
}
