// ecert-cache — Store lifecycle
//
// Owns the single open `CertificateStore` handle. The "is open" state is the
// slot itself, and every transition (initialize, open, close, delete) happens
// under the slot mutex, so concurrent initializers see exactly one winner.
// Open store files are also claimed in a process-wide registry, so two
// lifecycles resolving to the same file cannot both hold a handle.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use super::bootstrap::SchemaBootstrapper;
use super::db::Database;
use super::encoding::{Base64IdentityEncoder, IdentityEncoder};
use super::paths::{PathResolver, StorePaths};
use super::repository::CertificateStore;
use super::StoreError;

pub(crate) type Slot = Mutex<Option<Arc<CertificateStore>>>;

static GLOBAL: OnceLock<StoreLifecycle> = OnceLock::new();

/// Store files with an open managed handle in this process.
static OPEN_STORES: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

fn open_stores() -> MutexGuard<'static, HashSet<PathBuf>> {
    OPEN_STORES
        .get_or_init(|| Mutex::new(HashSet::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn registry_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Claim `path` for a new handle. Fails if another handle holds it.
fn claim_store(path: &Path) -> Result<PathBuf, StoreError> {
    let key = registry_key(path);
    if !open_stores().insert(key.clone()) {
        return Err(StoreError::AlreadyInitialized);
    }
    Ok(key)
}

pub(crate) fn release_store(key: &Path) {
    open_stores().remove(key);
}

pub struct StoreLifecycle {
    resolver: Box<dyn PathResolver>,
    encoder: Arc<dyn IdentityEncoder>,
    slot: Arc<Slot>,
}

impl StoreLifecycle {
    pub fn new(resolver: impl PathResolver + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
            encoder: Arc::new(Base64IdentityEncoder),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Replace the default base64 identity encoder.
    pub fn with_encoder(mut self, encoder: impl IdentityEncoder + 'static) -> Self {
        self.encoder = Arc::new(encoder);
        self
    }

    /// Process-wide lifecycle rooted at `StorePaths::from_env()`.
    pub fn global() -> &'static StoreLifecycle {
        GLOBAL.get_or_init(|| Self::new(StorePaths::from_env()))
    }

    pub fn resolver(&self) -> &dyn PathResolver {
        self.resolver.as_ref()
    }

    /// Bootstrap the store if needed and open it.
    ///
    /// Fails with `AlreadyInitialized` while a handle is open.
    pub fn initialize(&self) -> Result<Arc<CertificateStore>, StoreError> {
        let mut slot = self.lock_slot();
        if slot.is_some() {
            return Err(StoreError::AlreadyInitialized);
        }

        let outcome = SchemaBootstrapper::new(self.resolver()).ensure_store_exists()?;
        tracing::debug!(?outcome, "Certificate store bootstrap finished");

        self.open_locked(&mut slot)
    }

    /// Return the open handle, or open the already-bootstrapped store.
    pub fn open(&self) -> Result<Arc<CertificateStore>, StoreError> {
        let mut slot = self.lock_slot();
        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }
        self.open_locked(&mut slot)
    }

    /// The open handle, if any.
    pub fn handle(&self) -> Option<Arc<CertificateStore>> {
        self.lock_slot().clone()
    }

    pub fn is_open(&self) -> bool {
        self.lock_slot().is_some()
    }

    /// Close the open handle. A no-op when nothing is open.
    pub fn close(&self) {
        let handle = self.lock_slot().take();
        if let Some(handle) = handle {
            handle.close_connection();
            tracing::info!(path = %handle.path().display(), "Certificate store closed");
        }
    }

    /// Close any open handle and remove the whole store directory.
    pub fn delete_store(&self) -> Result<(), StoreError> {
        let mut slot = self.lock_slot();
        if let Some(handle) = slot.take() {
            handle.close_connection();
        }

        let dir = self.resolver.resolve_directory();
        tracing::debug!(path = %dir.display(), "Removing certificate store");
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!(path = %dir.display(), "Certificate store removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn open_locked(
        &self,
        slot: &mut Option<Arc<CertificateStore>>,
    ) -> Result<Arc<CertificateStore>, StoreError> {
        let path = self.resolver.resolve_file_path();
        let claim = claim_store(&path).map_err(|e| {
            tracing::warn!(path = %path.display(), "Certificate store already open in this process");
            e
        })?;

        let db = match Database::open(&path) {
            Ok(db) => db,
            Err(e) => {
                release_store(&claim);
                tracing::error!(path = %path.display(), error = %e, "Error opening certificate store");
                return Err(e);
            }
        };

        let handle = Arc::new(CertificateStore::with_owner(
            db,
            Arc::clone(&self.encoder),
            Arc::downgrade(&self.slot),
            claim,
        ));
        *slot = Some(Arc::clone(&handle));

        tracing::info!(path = %path.display(), "Certificate store opened");
        Ok(handle)
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<Arc<CertificateStore>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for StoreLifecycle {
    fn drop(&mut self) {
        self.close();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
