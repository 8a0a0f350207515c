// RSA-OAEP encryption and RSA-PKCS1v15 signatures, both over SHA-256.
//
// OAEP caps one block at k - 2*hLen - 2 bytes (190 for a 2048-bit key), which
// is smaller than a serialized certificate. Longer plaintexts are split into
// blocks that are encrypted independently:
//
//   ciphertext = OAEP(block_0) || OAEP(block_1) || ...   (each exactly k bytes)

use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::crypto::hash::sha256;
use crate::error::{KexError, Result};

/// OAEP-SHA256 padding overhead per block.
const OAEP_OVERHEAD: usize = 2 * 32 + 2;

/// Largest plaintext that fits one OAEP block under `key`.
pub fn max_block_payload(key: &RsaPublicKey) -> usize {
    key.size().saturating_sub(OAEP_OVERHEAD)
}

/// Encrypt `plaintext` for the holder of `key`.
pub fn encrypt(plaintext: &[u8], key: &RsaPublicKey) -> Result<Vec<u8>> {
    let chunk = max_block_payload(key);
    if chunk == 0 {
        return Err(KexError::InvalidKey("modulus too small for OAEP-SHA256".into()));
    }

    let mut out = Vec::with_capacity(plaintext.len().div_ceil(chunk).max(1) * key.size());
    // An empty plaintext still produces one block so the receiver sees a valid ciphertext.
    let blocks: Vec<&[u8]> = if plaintext.is_empty() {
        vec![plaintext]
    } else {
        plaintext.chunks(chunk).collect()
    };
    for block in blocks {
        let ct = key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), block)
            .map_err(|e| KexError::Encryption(format!("rsa-oaep: {e}")))?;
        out.extend_from_slice(&ct);
    }
    Ok(out)
}

/// Decrypt a ciphertext produced by [`encrypt`] under our public key.
pub fn decrypt(ciphertext: &[u8], key: &RsaPrivateKey) -> Result<Vec<u8>> {
    let k = key.size();
    if ciphertext.is_empty() || ciphertext.len() % k != 0 {
        return Err(KexError::DecryptionFailed(format!(
            "ciphertext length {} is not a multiple of {k}",
            ciphertext.len()
        )));
    }

    let mut out = Vec::with_capacity(ciphertext.len());
    for block in ciphertext.chunks(k) {
        let pt = key
            .decrypt(Oaep::new::<Sha256>(), block)
            .map_err(|e| KexError::DecryptionFailed(format!("rsa-oaep: {e}")))?;
        out.extend_from_slice(&pt);
    }
    Ok(out)
}

/// Sign SHA-256(`message`) with PKCS1v15 padding.
pub fn sign(message: &[u8], key: &RsaPrivateKey) -> Result<Vec<u8>> {
    let digest = sha256(message);
    key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .map_err(|e| KexError::Encryption(format!("rsa sign: {e}")))
}

/// Check a PKCS1v15 / SHA-256 signature. Any malformed input simply fails.
pub fn verify(message: &[u8], signature: &[u8], key: &RsaPublicKey) -> bool {
    let digest = sha256(message);
    key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrincipalKeyPair;

    #[test]
    fn single_block_roundtrip() {
        let kp = PrincipalKeyPair::generate(1024).unwrap();
        let ct = encrypt(b"short", kp.public_key()).unwrap();
        assert_eq!(ct.len(), kp.public_key().size());
        assert_eq!(decrypt(&ct, kp.private_key()).unwrap(), b"short");
    }

    #[test]
    fn multi_block_roundtrip() {
        let kp = PrincipalKeyPair::generate(1024).unwrap();
        let plaintext: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();
        let ct = encrypt(&plaintext, kp.public_key()).unwrap();
        let blocks = plaintext.len().div_ceil(max_block_payload(kp.public_key()));
        assert_eq!(ct.len(), blocks * kp.public_key().size());
        assert_eq!(decrypt(&ct, kp.private_key()).unwrap(), plaintext);
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let kp = PrincipalKeyPair::generate(1024).unwrap();
        let ct = encrypt(b"data", kp.public_key()).unwrap();
        let err = decrypt(&ct[..ct.len() - 1], kp.private_key()).unwrap_err();
        assert!(matches!(err, KexError::DecryptionFailed(_)));
        assert!(decrypt(&[], kp.private_key()).is_err());
    }

    #[test]
    fn sign_verify() {
        let kp = PrincipalKeyPair::generate(1024).unwrap();
        let sig = sign(b"hello kextrust", kp.private_key()).unwrap();
        assert!(verify(b"hello kextrust", &sig, kp.public_key()));
        assert!(!verify(b"hello kextrusT", &sig, kp.public_key()));
        assert!(!verify(b"hello kextrust", &sig[1..], kp.public_key()));
    }
}
