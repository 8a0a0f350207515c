// Secure random draws for nonces, IVs and session keys.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{KexError, Result};

/// Size of a freshness nonce in bytes.
pub const NONCE_LEN: usize = 16;
/// Size of a symmetric IV in bytes.
pub const IV_LEN: usize = 16;
/// Size of a session key in bytes.
pub const SESSION_KEY_LEN: usize = 32;

/// Fill an `N`-byte array from the operating system CSPRNG.
///
/// A failure to obtain entropy is reported, never papered over.
pub fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut out = [0u8; N];
    OsRng
        .try_fill_bytes(&mut out)
        .map_err(|e| KexError::EntropyUnavailable(e.to_string()))?;
    Ok(out)
}

/// A 16-byte freshness nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    /// Draw a fresh nonce.
    pub fn generate() -> Result<Self> {
        random_bytes::<NONCE_LEN>().map(Nonce)
    }

    /// Rebuild a nonce received on the wire.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; NONCE_LEN] = bytes.try_into().map_err(|_| {
            KexError::MalformedEnvelope(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Nonce(arr))
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}
