//! Crypto Error Types

use thiserror::Error;

/// Errors from signature operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The endpoint secret is empty, so no key material can be derived.
    #[error("Signing secret must not be empty")]
    EmptySecret,
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
