use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};

pub mod keys;
mod migrations;
pub mod store;

use migrations::run_migrations;
pub use store::{KvStore, MemoryStore};

/// SQLite-backed key-value store.
///
/// Calls are synchronous; the connection sits behind a mutex so the handle
/// can be cloned into the interval controller and the playback coordinator.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    db_path: Arc<Option<PathBuf>>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let conn = Connection::open(&db_path).context("failed to open SQLite database")?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            error!("Failed to enable WAL mode: {err}");
        }

        let database = Self::from_connection(conn, Some(db_path))?;
        if let Some(path) = database.path() {
            info!("Database initialized at {}", path.display());
        }
        Ok(database)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(conn, None)
    }

    fn from_connection(mut conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        run_migrations(&mut conn).context("failed to run database migrations")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut guard = self.lock();
        task(&mut guard)
    }
}

impl KvStore for Database {
    fn get(&self, key: &str) -> Option<String> {
        let result = self.execute(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .with_context(|| format!("failed to read key {key}"))
        });

        match result {
            Ok(value) => value,
            Err(err) => {
                error!("{err:#}");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.execute(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .with_context(|| format!("failed to write key {key}"))?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.execute(|conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
                .with_context(|| format!("failed to delete key {key}"))?;
            Ok(())
        })
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_previous_value() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get("ff.work"), None);

        db.set("ff.work", "25").unwrap();
        db.set("ff.work", "40").unwrap();
        assert_eq!(db.get("ff.work").as_deref(), Some("40"));
        assert_eq!(db.keys().unwrap(), vec!["ff.work".to_string()]);
    }

    #[test]
    fn remove_drops_key() {
        let db = Database::open_in_memory().unwrap();
        db.set("ff.muted", "true").unwrap();
        db.remove("ff.muted").unwrap();
        assert_eq!(db.get("ff.muted"), None);
        assert!(db.keys().unwrap().is_empty());
    }

    #[test]
    fn values_survive_reopen() {
        let path = std::env::temp_dir().join(format!(
            "focusflow-db-test-{}/focusflow.sqlite3",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        {
            let db = Database::new(path.clone()).unwrap();
            db.set("ff.seconds", "1234").unwrap();
        }

        let db = Database::new(path.clone()).unwrap();
        assert_eq!(db.get("ff.seconds").as_deref(), Some("1234"));

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
