// ecert-cache — Identity key encoding

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Maps a raw identity to the text primary key of its certificate row.
/// Implementations must be deterministic and injective.
pub trait IdentityEncoder: Send + Sync {
    fn encode(&self, identity: &[u8]) -> String;
}

/// Standard-alphabet, padded base64.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64IdentityEncoder;

impl IdentityEncoder for Base64IdentityEncoder {
    fn encode(&self, identity: &[u8]) -> String {
        STANDARD.encode(identity)
    }
}
