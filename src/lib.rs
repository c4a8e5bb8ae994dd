// ecert-cache — Library root
//
// Re-exports the certificate store and the admin CLI.

pub mod cli;
pub mod error;
pub mod store;

pub use error::{EcertError, Result};
pub use store::{CertificateStore, StoreError, StoreLifecycle};
