// RSA principal key pairs and their PKCS#1 PEM encoding.

use std::path::Path;

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::crypto::asymmetric;
use crate::error::{KexError, Result};

/// Default modulus size for freshly provisioned principals.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// An RSA key pair owned by one principal (agent or authority).
#[derive(Debug, Clone)]
pub struct PrincipalKeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl PrincipalKeyPair {
    /// Generate a fresh key pair with a `bits`-bit modulus.
    pub fn generate(bits: usize) -> Result<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| KexError::InvalidKey(format!("key generation: {e}")))?;
        Ok(Self::from_private_key(private_key))
    }

    /// Wrap an existing private key.
    pub fn from_private_key(private_key: RsaPrivateKey) -> Self {
        let public_key = private_key.to_public_key();
        Self {
            private_key,
            public_key,
        }
    }

    /// Parse a `RSA PRIVATE KEY` PEM block.
    pub fn from_pkcs1_pem(pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|e| KexError::InvalidKey(format!("private key PEM: {e}")))?;
        Ok(Self::from_private_key(private_key))
    }

    /// Load the private key file written by [`PrincipalKeyPair::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let pem = std::fs::read_to_string(path)?;
        Self::from_pkcs1_pem(&pem)
    }

    /// Write the private key and public key as PKCS#1 PEM files.
    pub fn save(&self, private_path: impl AsRef<Path>, public_path: impl AsRef<Path>) -> Result<()> {
        let private_pem = self
            .private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| KexError::InvalidKey(format!("private key PEM: {e}")))?;
        std::fs::write(private_path, private_pem.as_bytes())?;
        std::fs::write(public_path, self.public_key_pem()?)?;
        Ok(())
    }

    /// The public half, PKCS#1 PEM encoded.
    pub fn public_key_pem(&self) -> Result<String> {
        public_key_to_pem(&self.public_key)
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// Sign arbitrary data (PKCS1v15 / SHA-256).
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        asymmetric::sign(data, &self.private_key)
    }

    /// Decrypt a blob addressed to this principal.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        asymmetric::decrypt(ciphertext, &self.private_key)
    }
}

/// Encode a public key as a `RSA PUBLIC KEY` PEM block.
pub fn public_key_to_pem(key: &RsaPublicKey) -> Result<String> {
    key.to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| KexError::InvalidKey(format!("public key PEM: {e}")))
}

/// Parse a `RSA PUBLIC KEY` PEM block.
pub fn public_key_from_pem(pem: &str) -> Result<RsaPublicKey> {
    RsaPublicKey::from_pkcs1_pem(pem)
        .map_err(|e| KexError::InvalidKey(format!("public key PEM: {e}")))
}

/// Load a public key file.
pub fn load_public_key(path: impl AsRef<Path>) -> Result<RsaPublicKey> {
    let pem = std::fs::read_to_string(path)?;
    public_key_from_pem(&pem)
}
