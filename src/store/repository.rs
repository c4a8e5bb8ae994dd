// ecert-cache — Certificate Store
//
// Fetch-through access to cached enrollment certificates. A lookup hit
// returns the stored blob; a miss calls the caller's fetcher, inserts the
// result in its own transaction, and returns the row as re-read from disk.
//
// The connection mutex is held per statement/transaction, never across the
// fetcher. Two callers racing on the same uncached identity may both fetch;
// the loser's insert hits the primary key and falls back to the winner's row.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};

use super::db::Database;
use super::encoding::IdentityEncoder;
use super::error::FetchError;
use super::lifecycle::{release_store, Slot};
use super::models::{fingerprint, CertificateRecord, CertificateSummary};
use super::StoreError;

enum InsertOutcome {
    Inserted,
    /// Another writer committed the same id first.
    AlreadyPresent,
}

/// Handle to an open certificate database.
pub struct CertificateStore {
    conn: Mutex<Option<Connection>>,
    path: PathBuf,
    encoder: Arc<dyn IdentityEncoder>,
    /// Lifecycle slot that hands out this handle, if any.
    owner: Weak<Slot>,
    /// Process-wide claim on the store file, released on close.
    claim: Option<PathBuf>,
}

impl CertificateStore {
    /// Wrap an already-open database without a `StoreLifecycle`.
    ///
    /// The handle is unmanaged: it takes no process-wide claim on the file,
    /// so the one-open-handle guarantee does not cover it.
    pub fn from_database(db: Database, encoder: Arc<dyn IdentityEncoder>) -> Self {
        let (conn, path) = db.into_parts();
        Self {
            conn: Mutex::new(Some(conn)),
            path,
            encoder,
            owner: Weak::new(),
            claim: None,
        }
    }

    pub(crate) fn with_owner(
        db: Database,
        encoder: Arc<dyn IdentityEncoder>,
        owner: Weak<Slot>,
        claim: PathBuf,
    ) -> Self {
        let (conn, path) = db.into_parts();
        Self {
            conn: Mutex::new(Some(conn)),
            path,
            encoder,
            owner,
            claim: Some(claim),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Primary key the given identity is stored under.
    pub fn key_for(&self, identity: &[u8]) -> String {
        self.encoder.encode(identity)
    }

    /// Return the enrollment certificate for `identity`, calling `fetch`
    /// only if it is not cached yet.
    pub fn get<F, E>(&self, identity: &[u8], fetch: F) -> Result<Vec<u8>, StoreError>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, E>,
        E: Into<FetchError>,
    {
        let key = self.key_for(identity);

        if let Some(cert) = self.lookup(&key)? {
            tracing::debug!(key = %key, fingerprint = %fingerprint(&cert), "Enrollment certificate cache hit");
            return Ok(cert);
        }

        tracing::info!(key = %key, "Enrollment certificate not cached, fetching from issuer");
        let cert = fetch(identity).map_err(|e| StoreError::Fetch(e.into()))?;
        if cert.is_empty() {
            return Err(StoreError::EmptyCertificate(key));
        }

        match self.insert(&key, &cert)? {
            InsertOutcome::Inserted => {
                tracing::info!(key = %key, fingerprint = %fingerprint(&cert), "Enrollment certificate stored");
            }
            InsertOutcome::AlreadyPresent => {
                tracing::debug!(key = %key, "Certificate inserted concurrently, using stored copy");
            }
        }

        self.lookup(&key)?.ok_or(StoreError::ReadAfterWrite(key))
    }

    /// `get` on the blocking pool, for async callers.
    pub async fn get_async<F, E>(self: Arc<Self>, identity: Vec<u8>, fetch: F) -> Result<Vec<u8>, StoreError>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, E> + Send + 'static,
        E: Into<FetchError> + 'static,
    {
        tokio::task::spawn_blocking(move || self.get(&identity, fetch))
            .await
            .map_err(|e| StoreError::Other(format!("Certificate lookup task failed: {}", e)))?
    }

    /// Cached record for `identity`, without fetching on a miss.
    pub fn peek(&self, identity: &[u8]) -> Result<Option<CertificateRecord>, StoreError> {
        let key = self.key_for(identity);
        Ok(self.lookup(&key)?.map(|cert| CertificateRecord::new(key, cert)))
    }

    pub fn contains(&self, identity: &[u8]) -> Result<bool, StoreError> {
        Ok(self.peek(identity)?.is_some())
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT count(*) FROM Certificates", [], |row| row.get(0))?;
            Ok(n.max(0) as u64)
        })
    }

    /// All cached certificates, ordered by id. Rows with an empty or NULL
    /// blob are corrupt and skipped with a warning.
    pub fn list(&self) -> Result<Vec<CertificateSummary>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, cert FROM Certificates ORDER BY id ASC")?;
            let rows = stmt.query_map([], |row| {
                let id: String = row.get(0)?;
                let cert: Option<Vec<u8>> = row.get(1)?;
                Ok((id, cert))
            })?;

            let mut summaries = Vec::new();
            for row in rows {
                match row? {
                    (id, Some(cert)) if !cert.is_empty() => {
                        summaries.push(CertificateRecord::new(id, cert).summary());
                    }
                    (id, _) => {
                        tracing::warn!(key = %id, "Skipping corrupt certificate row");
                    }
                }
            }
            Ok(summaries)
        })
    }

    /// Close the connection and release the lifecycle slot if this handle
    /// still occupies it. Safe to call more than once.
    pub fn close(&self) {
        self.close_connection();

        if let Some(slot) = self.owner.upgrade() {
            let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if current.as_ref().is_some_and(|h| std::ptr::eq(Arc::as_ptr(h), self)) {
                *current = None;
            }
        }
    }

    pub(crate) fn close_connection(&self) {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(conn) = conn {
            match conn.close() {
                Ok(()) => tracing::debug!(path = %self.path.display(), "Certificate store connection closed"),
                Err((_, e)) => tracing::warn!(path = %self.path.display(), error = %e, "Error closing certificate store"),
            }
            if let Some(claim) = &self.claim {
                release_store(claim);
            }
        }
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let conn = guard.as_mut().ok_or(StoreError::NotOpen)?;
        f(conn)
    }

    /// `Ok(None)` is a miss. A present row with an empty or NULL blob is corrupt.
    fn lookup(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let row: Option<Option<Vec<u8>>> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT cert FROM Certificates WHERE id = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?)
        })?;

        match row {
            None => Ok(None),
            Some(Some(cert)) if !cert.is_empty() => Ok(Some(cert)),
            Some(_) => Err(StoreError::CorruptRecord(key.to_string())),
        }
    }

    fn insert(&self, key: &str, cert: &[u8]) -> Result<InsertOutcome, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            match tx.execute(
                "INSERT INTO Certificates (id, cert) VALUES (?1, ?2)",
                params![key, cert],
            ) {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    rollback(tx);
                    return Ok(InsertOutcome::AlreadyPresent);
                }
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "Failed inserting certificate");
                    rollback(tx);
                    return Err(StoreError::Database(e));
                }
            }

            // A failed commit drops the transaction, which rolls it back.
            tx.commit().map_err(|e| {
                tracing::error!(key = %key, error = %e, "Failed committing certificate insert");
                StoreError::Commit(e)
            })?;

            Ok(InsertOutcome::Inserted)
        })
    }
}

impl Drop for CertificateStore {
    fn drop(&mut self) {
        self.close_connection();
    }
}

fn rollback(tx: Transaction<'_>) {
    if let Err(e) = tx.rollback() {
        tracing::warn!(error = %e, "Rollback failed");
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
