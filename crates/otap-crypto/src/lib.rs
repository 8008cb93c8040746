//! Credential proofs for the OTAP control surface.
//!
//! Proves knowledge of the shared operator secret without transmitting it:
//! the caller encrypts a fixed, publicly-known marker with ChaCha20-Poly1305
//! keyed from the secret via HKDF-SHA256 and a fresh random nonce. The
//! server decrypts and accepts only when decryption succeeds and the
//! recovered plaintext equals the marker.
//!
//! Known limitation: there is no seen-nonce set, so a captured proof can be
//! replayed until the shared secret rotates. Adding replay protection would
//! require a persistent nonce cache with a TTL policy and is deliberately
//! out of scope.

pub mod error;
pub mod proof;

pub use error::CryptoError;
pub use proof::{NONCE_SIZE, Prover, Verifier};
