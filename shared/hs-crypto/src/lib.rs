//! Hookstream Webhook Cryptography
//!
//! Signature primitives shared by the protocol adapters:
//!
//! - **HMAC-SHA256**: hex-encoded signing and constant-time verification
//!   (GitHub/Stripe/Jira/Sentry-style webhook schemes).
//! - **Ed25519**: detached signatures over a 32-byte seed derived from an
//!   arbitrary secret string (QQ-style bot handshake).

pub mod ed25519;
pub mod error;
pub mod signing;

pub use error::{CryptoError, Result};
