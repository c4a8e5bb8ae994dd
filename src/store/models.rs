// ecert-cache — Certificate record models
//
// Certificates are public material, but the raw bytes are noisy in logs
// and Debug output. Both views below render a size and SHA-256 fingerprint
// instead of the blob.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// A cached `(id, cert)` row.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    /// Encoded identity (primary key).
    pub id: String,
    /// Certificate bytes as returned by the issuer.
    pub cert: Vec<u8>,
}

impl CertificateRecord {
    pub fn new(id: String, cert: Vec<u8>) -> Self {
        Self { id, cert }
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.cert)
    }

    pub fn summary(&self) -> CertificateSummary {
        CertificateSummary {
            id: self.id.clone(),
            size: self.cert.len(),
            sha256: self.fingerprint(),
        }
    }
}

impl fmt::Debug for CertificateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRecord")
            .field("id", &self.id)
            .field("size", &self.cert.len())
            .field("sha256", &self.fingerprint())
            .finish()
    }
}

/// Listing view of a cached certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
    pub id: String,
    pub size: usize,
    pub sha256: String,
}

impl fmt::Display for CertificateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} │ {:>6} bytes │ sha256:{}", self.id, self.size, self.sha256)
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
