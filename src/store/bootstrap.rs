// ecert-cache — Store bootstrap
//
// Makes sure the directory, database file, and `Certificates` table exist
// before the store is first opened. Running it against a complete store is
// a no-op; every existence-check failure is returned to the caller.

use std::fs::DirBuilder;
use std::path::Path;

use super::db::Database;
use super::paths::PathResolver;
use super::StoreError;

/// What `ensure_store_exists` had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Directory, file, and table were created.
    Created,
    /// A complete store was already present; nothing was touched.
    Existing,
    /// The file existed without the table (interrupted bootstrap); the table was added.
    SchemaRepaired,
}

pub struct SchemaBootstrapper<'a> {
    resolver: &'a dyn PathResolver,
}

impl<'a> SchemaBootstrapper<'a> {
    pub fn new(resolver: &'a dyn PathResolver) -> Self {
        Self { resolver }
    }

    /// Idempotently bring the store at the resolved path into existence.
    pub fn ensure_store_exists(&self) -> Result<BootstrapOutcome, StoreError> {
        let dir = self.resolver.resolve_directory();
        let name = self.resolver.resolve_file_name();

        let dir_missing = self.resolver.is_missing_or_empty(&dir)?;
        tracing::debug!(path = %dir.display(), missing = dir_missing, "Checked store directory");

        let file_missing = dir_missing || self.resolver.is_file_missing(&dir, &name)?;
        tracing::debug!(file = %name, missing = file_missing, "Checked store file");

        if file_missing {
            self.create_store()?;
            return Ok(BootstrapOutcome::Created);
        }

        let db = Database::open(&self.resolver.resolve_file_path())?;
        if db.has_schema()? {
            return Ok(BootstrapOutcome::Existing);
        }

        tracing::warn!(path = %db.path().display(), "Store file has no Certificates table, creating it");
        db.run_migrations()?;
        Ok(BootstrapOutcome::SchemaRepaired)
    }

    /// Create the directory, file, and table. Fails with `AlreadyExists` if
    /// the store file is already present.
    pub fn create_store(&self) -> Result<(), StoreError> {
        let dir = self.resolver.resolve_directory();
        let name = self.resolver.resolve_file_name();
        let path = self.resolver.resolve_file_path();

        if !self.resolver.is_file_missing(&dir, &name)? {
            return Err(StoreError::AlreadyExists(path));
        }

        tracing::debug!(path = %dir.display(), "Creating certificate store directory");
        create_dir_all(&dir)?;

        let db = Database::create(&path)?;
        tracing::info!(path = %db.path().display(), "Certificate store created");
        Ok(())
    }
}

/// Recursively create `dir` with mode 0755 on unix.
fn create_dir_all(dir: &Path) -> std::io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }

    builder.create(dir)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
