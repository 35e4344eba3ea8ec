use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::StoreError;
use crate::repository::Repository;
use crate::schema;

/// Thread-safe SQLite connection wrapper.
/// Uses parking_lot::Mutex for synchronous access (rusqlite is not Sync).
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("create dir: {e}")))?;
        }

        let conn = Connection::open(path)?;
        let db = Self::init(conn, path.to_owned())?;
        info!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self, StoreError> {
        conn.execute_batch(schema::PRAGMAS)
            .map_err(|e| StoreError::Database(format!("pragmas: {e}")))?;

        conn.execute_batch(schema::CREATE_TABLES)
            .map_err(|e| StoreError::Database(format!("schema: {e}")))?;

        let version: Option<u32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        if version.is_none() {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [schema::SCHEMA_VERSION],
            )
            .map_err(|e| StoreError::Database(format!("schema version: {e}")))?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Execute a closure with the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Repository for Database {
    fn save(&self, bucket: &str, key: &str, value: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO records (bucket, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(bucket, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                rusqlite::params![bucket, key, value, now],
            )?;
            Ok(())
        })
    }

    fn fetch(&self, bucket: &str, key: &str) -> Result<Option<String>, StoreError> {
        self.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM records WHERE bucket = ?1 AND key = ?2",
                    [bucket, key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM records WHERE bucket = ?1 AND key = ?2",
                [bucket, key],
            )?;
            Ok(n > 0)
        })
    }

    fn fetch_all(&self, bucket: &str) -> Result<Vec<(String, String)>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT key, value FROM records WHERE bucket = ?1 ORDER BY key")?;
            let rows = stmt
                .query_map([bucket], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn delete_bucket(&self, bucket: &str) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM records WHERE bucket = ?1", [bucket])?;
            Ok(n)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.path(), Path::new(":memory:"));
    }

    #[test]
    fn schema_version_set() {
        let db = Database::in_memory().unwrap();
        let version: u32 = db
            .with_conn(|conn| {
                conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))
                    .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(version, schema::SCHEMA_VERSION);
    }

    #[test]
    fn open_file_database_twice() {
        let dir = std::env::temp_dir().join(format!("nightfury-store-{}", uuid::Uuid::now_v7()));
        let path = dir.join("test.db");
        let db = Database::open(&path).unwrap();
        db.save("games", "ludo", "{}").unwrap();
        assert!(path.exists());

        let db2 = Database::open(&path).unwrap();
        assert_eq!(db2.fetch("games", "ludo").unwrap().as_deref(), Some("{}"));
        let versions: u32 = db2
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
                    .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(versions, 1);

        drop(db);
        drop(db2);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_overwrites() {
        let db = Database::in_memory().unwrap();
        db.save("clients", "k1", r#"{"v":1}"#).unwrap();
        db.save("clients", "k1", r#"{"v":2}"#).unwrap();
        assert_eq!(
            db.fetch("clients", "k1").unwrap().as_deref(),
            Some(r#"{"v":2}"#)
        );
        assert_eq!(db.fetch_all("clients").unwrap().len(), 1);
    }

    #[test]
    fn fetch_missing_is_none() {
        let db = Database::in_memory().unwrap();
        assert!(db.fetch("clients", "nobody").unwrap().is_none());
    }

    #[test]
    fn buckets_are_isolated() {
        let db = Database::in_memory().unwrap();
        db.save("clients", "same", "1").unwrap();
        db.save("games", "same", "2").unwrap();
        assert_eq!(db.fetch("clients", "same").unwrap().as_deref(), Some("1"));
        assert_eq!(db.delete_bucket("clients").unwrap(), 1);
        assert_eq!(db.fetch("games", "same").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn delete_reports_presence() {
        let db = Database::in_memory().unwrap();
        db.save("hints", "a", "{}").unwrap();
        assert!(db.delete("hints", "a").unwrap());
        assert!(!db.delete("hints", "a").unwrap());
    }

    #[test]
    fn fetch_all_sorted_by_key() {
        let db = Database::in_memory().unwrap();
        db.save("games", "b", "2").unwrap();
        db.save("games", "a", "1").unwrap();
        let keys: Vec<String> = db
            .fetch_all("games")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, ["a", "b"]);
    }
}
