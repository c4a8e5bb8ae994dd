// ecert-cache — Store Module
//
// Persistent fetch-through cache of enrollment certificates backed by a
// single-table SQLite file. `StoreLifecycle` bootstraps and hands out the
// one open `CertificateStore`; the store answers `get(identity, fetch)`.

mod bootstrap;
mod db;
mod encoding;
mod error;
mod lifecycle;
mod models;
mod paths;
mod repository;

pub use bootstrap::{BootstrapOutcome, SchemaBootstrapper};
pub use db::Database;
pub use encoding::{Base64IdentityEncoder, IdentityEncoder};
pub use error::{FetchError, StoreError};
pub use lifecycle::StoreLifecycle;
pub use models::{fingerprint, CertificateRecord, CertificateSummary};
pub use paths::{PathResolver, StorePaths, STORE_DIR_ENV, STORE_FILE_NAME};
pub use repository::CertificateStore;
