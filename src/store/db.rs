// ecert-cache — SQLite Database Management
//
// Opens the certificate database file, probes it, and applies the schema.
// `create` may create the file; `open` requires it to exist already so a
// removed store is never silently recreated without its table.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use super::StoreError;

/// How long a writer waits on a lock held by another connection.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Wrapper around a SQLite connection to the certificate database.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Open (or create) the database at `path`, probe it, and ensure the
    /// `Certificates` table exists.
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let db = Self::from_connection(conn, path)?;
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an existing database file without creating or migrating it.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::from_connection(conn, path)
    }

    /// Open an in-memory database (for testing only).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            path: PathBuf::from(":memory:"),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn from_connection(conn: Connection, path: &Path) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self {
            conn,
            path: path.to_path_buf(),
        };
        db.ping()?;
        Ok(db)
    }

    /// Liveness probe: fails with `LivenessProbe` if the file is not a
    /// readable SQLite database.
    pub fn ping(&self) -> Result<(), StoreError> {
        self.conn
            .query_row("SELECT count(*) FROM sqlite_master", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|_| ())
            .map_err(StoreError::LivenessProbe)
    }

    /// Whether the `Certificates` table is present.
    pub fn has_schema(&self) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'Certificates'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_parts(self) -> (Connection, PathBuf) {
        (self.conn, self.path)
    }

    pub(crate) fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS Certificates (
                id      TEXT PRIMARY KEY,
                cert    BLOB
            );",
        )?;

        tracing::debug!(path = %self.path.display(), "Certificates table ensured");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn table_count(db: &Database) -> i64 {
        db.conn()
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='Certificates'",
                [],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn test_open_in_memory_creates_table() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(table_count(&db), 1);
        assert!(db.has_schema().unwrap());
    }

    #[test]
    fn test_schema_migration_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.run_migrations().is_ok(), "Migrations should be idempotent");
        assert_eq!(table_count(&db), 1);
    }

    #[test]
    fn test_create_then_open_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.db");

        drop(Database::create(&path).unwrap());
        assert!(path.exists());

        let db = Database::open(&path).unwrap();
        assert!(db.has_schema().unwrap());
        assert_eq!(db.path(), path.as_path());
    }

    #[test]
    fn test_open_does_not_create_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.db");

        assert!(Database::open(&path).is_err());
        assert!(!path.exists(), "open must not create the store file");
    }

    #[test]
    fn test_garbage_file_fails_liveness_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.db");
        std::fs::write(&path, vec![0x42u8; 4096]).unwrap();

        match Database::open(&path) {
            Err(StoreError::LivenessProbe(_)) => {}
            Err(other) => panic!("Expected LivenessProbe, got {other:?}"),
            Ok(_) => panic!("Expected LivenessProbe, got a database"),
        }
    }

    #[test]
    fn test_primary_key_rejects_duplicate_id() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO Certificates (id, cert) VALUES (?1, ?2)",
                rusqlite::params!["AQI=", vec![0xAAu8]],
            )
            .unwrap();

        let dup = db.conn().execute(
            "INSERT INTO Certificates (id, cert) VALUES (?1, ?2)",
            rusqlite::params!["AQI=", vec![0xBBu8]],
        );
        assert!(dup.is_err(), "id must be unique");
    }
}
