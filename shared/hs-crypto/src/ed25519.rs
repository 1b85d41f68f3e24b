//! Ed25519 Handshake Signatures
//!
//! Detached signatures for the QQ-style bot protocol. The provider hands the
//! endpoint an arbitrary secret string and expects both sides to derive the
//! signing seed by repeating the string's UTF-8 bytes to 32 bytes. That
//! derivation is not a KDF and must stay exactly as the platform defines it;
//! swapping in a hashed derivation breaks handshake compatibility.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, SIGNATURE_LENGTH};

use crate::error::{CryptoError, Result};

/// Ed25519 seed length in bytes.
pub const SEED_LENGTH: usize = 32;

/// Derive a 32-byte Ed25519 seed from a secret string.
///
/// Repeats the secret's UTF-8 bytes until 32 bytes are filled, truncating
/// the final repetition. An empty secret cannot fill the seed and is
/// rejected.
pub fn derive_seed(secret: &str) -> Result<[u8; SEED_LENGTH]> {
    let bytes = secret.as_bytes();
    if bytes.is_empty() {
        return Err(CryptoError::EmptySecret);
    }

    let mut seed = [0u8; SEED_LENGTH];
    for (i, slot) in seed.iter_mut().enumerate() {
        *slot = bytes[i % bytes.len()];
    }
    Ok(seed)
}

/// Sign a message with the seed derived from `secret`.
pub fn sign(secret: &str, message: &[u8]) -> Result<[u8; SIGNATURE_LENGTH]> {
    let seed = derive_seed(secret)?;
    let key = SigningKey::from_bytes(&seed);
    Ok(key.sign(message).to_bytes())
}

/// Verify a detached signature with the seed derived from `secret`.
///
/// Signatures that are not exactly 64 bytes fail closed (`Ok(false)`), they
/// never panic or error.
pub fn verify(secret: &str, message: &[u8], signature: &[u8]) -> Result<bool> {
    let seed = derive_seed(secret)?;

    let Ok(sig_bytes) = <[u8; SIGNATURE_LENGTH]>::try_from(signature) else {
        return Ok(false);
    };
    let sig = Signature::from_bytes(&sig_bytes);

    let key = SigningKey::from_bytes(&seed);
    Ok(key.verifying_key().verify(message, &sig).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_repeats_and_truncates() {
        let seed = derive_seed("s").unwrap();
        assert_eq!(seed, [b's'; 32]);

        let seed = derive_seed("abc").unwrap();
        let expected: Vec<u8> = b"abc".iter().copied().cycle().take(32).collect();
        assert_eq!(seed.to_vec(), expected);

        // Secrets longer than 32 bytes truncate
        let long = "0123456789abcdef0123456789abcdefEXTRA";
        let seed = derive_seed(long).unwrap();
        assert_eq!(&seed[..], &long.as_bytes()[..32]);
    }

    #[test]
    fn empty_secret_rejected() {
        assert_eq!(derive_seed(""), Err(CryptoError::EmptySecret));
        assert_eq!(sign("", b"msg"), Err(CryptoError::EmptySecret));
        assert_eq!(verify("", b"msg", &[0u8; 64]), Err(CryptoError::EmptySecret));
    }

    #[test]
    fn sign_verify_roundtrip() {
        for (secret, message) in [
            ("s", b"123abc".as_slice()),
            ("bot-app-secret", b"1700000000{\"op\":0}".as_slice()),
            ("\u{65e5}\u{672c}\u{8a9e}", b"".as_slice()),
        ] {
            let sig = sign(secret, message).unwrap();
            assert!(verify(secret, message, &sig).unwrap());
        }
    }

    #[test]
    fn tampered_input_fails() {
        let sig = sign("secret", b"event body").unwrap();
        assert!(!verify("secret", b"event bodY", &sig).unwrap());
        assert!(!verify("wrong", b"event body", &sig).unwrap());

        let mut bad = sig;
        bad[0] ^= 0x01;
        assert!(!verify("secret", b"event body", &bad).unwrap());
    }

    #[test]
    fn wrong_length_signature_fails_closed() {
        let sig = sign("secret", b"event body").unwrap();
        assert!(!verify("secret", b"event body", &sig[..63]).unwrap());

        let mut long = sig.to_vec();
        long.push(0);
        assert!(!verify("secret", b"event body", &long).unwrap());
        assert!(!verify("secret", b"event body", &[]).unwrap());
    }
}
