//! Error types for OTAP credential crypto.

use thiserror::Error;

/// Errors surfaced by proof construction.
///
/// Verification intentionally has no error channel: every failure mode maps
/// to "unauthorized".
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}
