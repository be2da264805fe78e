use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::error::{Error, Result};

/// Durable key/value table of translations backed by SQLite.
///
/// Keys are [`CacheKey`](super::CacheKey) hashes; values are translated text.
/// Writes use `INSERT OR REPLACE`, so the last write for a key wins.
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::CacheInit(format!(
                    "Failed to create cache directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            Error::CacheInit(format!("Failed to open cache at {}: {}", path.display(), e))
        })?;

        // WAL keeps readers and the single writer out of each other's way.
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             CREATE TABLE IF NOT EXISTS translations (
                 key   TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );",
        )
        .map_err(|e| Error::CacheInit(format!("Failed to initialize schema: {e}")))?;

        debug!("Opened translation cache at {}", path.display());

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM translations WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| Error::CacheRead(e.to_string()))
    }

    /// Write all entries in one transaction.
    pub fn put_many(&mut self, entries: &[(String, String)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| Error::CacheWrite(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare_cached("INSERT OR REPLACE INTO translations (key, value) VALUES (?1, ?2)")
                .map_err(|e| Error::CacheWrite(e.to_string()))?;
            for (key, value) in entries {
                stmt.execute(params![key, value])
                    .map_err(|e| Error::CacheWrite(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| Error::CacheWrite(e.to_string()))
    }

    #[cfg(test)]
    fn len(&self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM translations", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| usize::try_from(n).unwrap_or(0))
            .map_err(|e| Error::CacheRead(e.to_string()))
    }

    /// Release the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| Error::CacheWrite(format!("Failed to close cache: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_store_roundtrip_and_replace() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(dir.path().join("t.sqlite3")).unwrap();

        assert_eq!(store.get("k").unwrap(), None);
        store
            .put_many(&[("k".to_string(), "first".to_string())])
            .unwrap();
        store
            .put_many(&[("k".to_string(), "second".to_string())])
            .unwrap();

        assert_eq!(store.get("k").unwrap().as_deref(), Some("second"));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("t.sqlite3");

        let mut store = SqliteStore::open(&path).unwrap();
        store
            .put_many(&[
                ("a".to_string(), "سلام".to_string()),
                ("b".to_string(), "دنیا".to_string()),
            ])
            .unwrap();
        store.close().unwrap();

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("سلام"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("دنیا"));
    }

    #[test]
    fn test_store_open_fails_on_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SqliteStore::open(dir.path()),
            Err(Error::CacheInit(_))
        ));
    }
}
