// AES-256-OFB session channel with PKCS#7 block padding.
//
// Every encryption consumes an `Iv`, and an `Iv` can only come from a fresh
// random draw, so one key never sees the same IV twice through this API.

use aes::Aes256;
use block_padding::{Pkcs7, RawPadding};
use ofb::cipher::{KeyIvInit, StreamCipher};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::hash::fingerprint;
use crate::crypto::random::{random_bytes, IV_LEN, SESSION_KEY_LEN};
use crate::error::{KexError, Result};
use crate::wire::b64;

type Aes256Ofb = ofb::Ofb<Aes256>;

const BLOCK_LEN: usize = 16;

/// A 32-byte symmetric session key minted by the authority.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionKey({})", self.fingerprint())
    }
}

/// A single-use 16-byte initialisation vector.
#[derive(Debug)]
pub struct Iv([u8; IV_LEN]);

impl Iv {
    /// Draw a fresh IV.
    pub fn generate() -> Result<Self> {
        random_bytes::<IV_LEN>().map(Iv)
    }
}

/// Ciphertext together with the IV it was produced under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    #[serde(with = "b64")]
    pub iv: Vec<u8>,
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
}

impl SessionKey {
    /// Mint a new random session key.
    pub fn generate() -> Result<Self> {
        random_bytes::<SESSION_KEY_LEN>().map(SessionKey)
    }

    /// Rebuild a key carried inside a session certificate.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SESSION_KEY_LEN] = bytes.try_into().map_err(|_| {
            KexError::MalformedEnvelope(format!(
                "session key must be {SESSION_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(SessionKey(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }

    /// Log-safe fingerprint of the key.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.0)
    }

    /// Encrypt `plaintext` under this key and the given IV, consuming the IV.
    pub fn encrypt(&self, iv: Iv, plaintext: &[u8]) -> Result<SealedBox> {
        let mut buf = pad(plaintext);
        let mut cipher = Aes256Ofb::new_from_slices(&self.0, &iv.0)
            .map_err(|e| KexError::Encryption(format!("cipher init: {e}")))?;
        cipher.apply_keystream(&mut buf);
        Ok(SealedBox {
            iv: iv.0.to_vec(),
            ciphertext: buf,
        })
    }

    /// Encrypt under a freshly drawn IV.
    pub fn seal(&self, plaintext: &[u8]) -> Result<SealedBox> {
        self.encrypt(Iv::generate()?, plaintext)
    }

    /// Decrypt a sealed box and strip its padding.
    pub fn open(&self, sealed: &SealedBox) -> Result<Vec<u8>> {
        if sealed.iv.len() != IV_LEN {
            return Err(KexError::MalformedEnvelope(format!(
                "iv must be {IV_LEN} bytes, got {}",
                sealed.iv.len()
            )));
        }
        if sealed.ciphertext.is_empty() || sealed.ciphertext.len() % BLOCK_LEN != 0 {
            return Err(KexError::DecryptionFailed(
                "ciphertext is not a whole number of blocks".into(),
            ));
        }
        let mut buf = sealed.ciphertext.clone();
        let mut cipher = Aes256Ofb::new_from_slices(&self.0, &sealed.iv)
            .map_err(|e| KexError::DecryptionFailed(format!("cipher init: {e}")))?;
        cipher.apply_keystream(&mut buf);
        unpad(buf)
    }
}

fn pad(plaintext: &[u8]) -> Vec<u8> {
    let tail = plaintext.len() % BLOCK_LEN;
    let body = plaintext.len() - tail;
    let mut buf = Vec::with_capacity(body + BLOCK_LEN);
    buf.extend_from_slice(&plaintext[..body]);

    let mut last = [0u8; BLOCK_LEN];
    last[..tail].copy_from_slice(&plaintext[body..]);
    Pkcs7::raw_pad(&mut last, tail);
    buf.extend_from_slice(&last);
    buf
}

fn unpad(mut buf: Vec<u8>) -> Result<Vec<u8>> {
    let body = buf.len() - BLOCK_LEN;
    let kept = Pkcs7::raw_unpad(&buf[body..])
        .map_err(|_| KexError::DecryptionFailed("bad block padding".into()))?
        .len();
    buf.truncate(body + kept);
    Ok(buf)
}
