// ecert-cache — Store path resolution
//
// Decides where the certificate database lives on disk. The store only
// consumes the `PathResolver` predicates; `StorePaths` is the default
// policy (explicit directory, `ECERT_CACHE_DIR`, or the platform data dir).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable overriding the store directory.
pub const STORE_DIR_ENV: &str = "ECERT_CACHE_DIR";

/// Fixed file name of the backing database.
pub const STORE_FILE_NAME: &str = "client.db";

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Resolves the on-disk location of the store and answers existence checks.
pub trait PathResolver: Send + Sync {
    /// Directory holding the store file.
    fn resolve_directory(&self) -> PathBuf;

    /// File name of the store inside `resolve_directory()`.
    fn resolve_file_name(&self) -> String;

    /// True if `dir` does not exist or has no entries.
    fn is_missing_or_empty(&self, dir: &Path) -> io::Result<bool> {
        dir_missing_or_empty(dir)
    }

    /// True if `dir/name` does not exist.
    fn is_file_missing(&self, dir: &Path, name: &str) -> io::Result<bool> {
        file_missing(dir, name)
    }

    fn resolve_file_path(&self) -> PathBuf {
        self.resolve_directory().join(self.resolve_file_name())
    }
}

// ─── Default Policy ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StorePaths {
    dir: PathBuf,
    file_name: String,
}

impl StorePaths {
    /// Store rooted at an explicit directory, using the default file name.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file_name: STORE_FILE_NAME.to_string(),
        }
    }

    /// `$ECERT_CACHE_DIR` if set, else `<data_dir>/ecert-cache/validator`.
    /// Falls back to `./ecert-cache/validator` when the platform has no data dir.
    pub fn from_env() -> Self {
        match std::env::var_os(STORE_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::new(PathBuf::from(dir)),
            _ => Self::new(Self::default_dir()),
        }
    }

    pub fn default_dir() -> PathBuf {
        let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("ecert-cache").join("validator")
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }
}

impl PathResolver for StorePaths {
    fn resolve_directory(&self) -> PathBuf {
        self.dir.clone()
    }

    fn resolve_file_name(&self) -> String {
        self.file_name.clone()
    }
}

// ─── Predicates ──────────────────────────────────────────────────────────────

pub fn dir_missing_or_empty(dir: &Path) -> io::Result<bool> {
    match fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e),
    }
}

/// A path that exists but is not a regular file is an error, not "missing".
pub fn file_missing(dir: &Path, name: &str) -> io::Result<bool> {
    let path = dir.join(name);
    match fs::metadata(&path) {
        Ok(meta) if meta.is_file() => Ok(false),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} exists but is not a regular file", path.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dir_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(dir_missing_or_empty(&missing).unwrap());
    }

    #[test]
    fn test_empty_dir_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(dir_missing_or_empty(dir.path()).unwrap());
    }

    #[test]
    fn test_populated_dir_is_not_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("other"), b"x").unwrap();
        assert!(!dir_missing_or_empty(dir.path()).unwrap());
    }

    #[test]
    fn test_file_missing_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        assert!(file_missing(dir.path(), STORE_FILE_NAME).unwrap());

        fs::write(dir.path().join(STORE_FILE_NAME), b"").unwrap();
        assert!(!file_missing(dir.path(), STORE_FILE_NAME).unwrap());
    }

    #[test]
    fn test_directory_in_place_of_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(STORE_FILE_NAME)).unwrap();

        let err = file_missing(dir.path(), STORE_FILE_NAME).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_store_paths_resolve_file_path() {
        let paths = StorePaths::new("/tmp/store");
        assert_eq!(paths.resolve_file_name(), "client.db");
        assert_eq!(paths.resolve_file_path(), PathBuf::from("/tmp/store/client.db"));

        let custom = StorePaths::new("/tmp/store").with_file_name("certs.db");
        assert_eq!(custom.resolve_file_path(), PathBuf::from("/tmp/store/certs.db"));
    }

    #[test]
    fn test_default_dir_is_namespaced() {
        let dir = StorePaths::default_dir();
        assert!(dir.ends_with("ecert-cache/validator"));
    }
}
