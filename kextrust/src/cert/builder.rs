// Certificate Builder: fluent API for assembling and signing an `Info` record.

use rsa::RsaPublicKey;

use crate::cert::{Certificate, Info, Role};
use crate::crypto::keys::{public_key_to_pem, PrincipalKeyPair};
use crate::crypto::random::Nonce;
use crate::crypto::symmetric::SessionKey;
use crate::error::{KexError, Result};

/// Builder for a [`Certificate`] signed by the authority's key pair.
///
/// # Example
/// ```ignore
/// let cert = CertificateBuilder::new(&authority_keys)
///     .principal(Role::Initiator, "alice")
///     .principal(Role::Acceptor, "bob")
///     .initiator_nonce(&nonce)
///     .session_key(&key)
///     .build()?;
/// ```
pub struct CertificateBuilder<'a> {
    issuer: &'a PrincipalKeyPair,
    info: Info,
}

impl<'a> CertificateBuilder<'a> {
    /// Start building a certificate that will be signed by `issuer`.
    pub fn new(issuer: &'a PrincipalKeyPair) -> Self {
        Self {
            issuer,
            info: Info::default(),
        }
    }

    /// Put a principal ID in `role`'s slot.
    pub fn principal(mut self, role: Role, id: &str) -> Self {
        match role {
            Role::Initiator => self.info.initiator = Some(id.to_owned()),
            Role::Acceptor => self.info.acceptor = Some(id.to_owned()),
        }
        self
    }

    /// Put a public key (PEM encoded) in `role`'s slot.
    pub fn public_key(mut self, role: Role, key: &RsaPublicKey) -> Result<Self> {
        let pem = public_key_to_pem(key)?;
        match role {
            Role::Initiator => self.info.initiator_key = Some(pem),
            Role::Acceptor => self.info.acceptor_key = Some(pem),
        }
        Ok(self)
    }

    pub fn initiator_nonce(mut self, nonce: &Nonce) -> Self {
        self.info.initiator_nonce = Some(nonce.to_vec());
        self
    }

    pub fn session_key(mut self, key: &SessionKey) -> Self {
        self.info.session_key = Some(key.as_bytes().to_vec());
        self
    }

    /// Consume the builder and produce a signed [`Certificate`].
    pub fn build(self) -> Result<Certificate> {
        if self.info.is_empty() {
            return Err(KexError::CertificateMismatch("refusing to sign an empty info".into()));
        }
        // A session key is only meaningful when bound to both peers and the nonce.
        if self.info.session_key.is_some()
            && (self.info.initiator.is_none()
                || self.info.acceptor.is_none()
                || self.info.initiator_nonce.is_none())
        {
            return Err(KexError::CertificateMismatch(
                "session key must be bound to both principals and the initiator nonce".into(),
            ));
        }

        let signable = self.info.signable_bytes()?;
        let signature = self.issuer.sign(&signable)?;
        Ok(Certificate {
            info: self.info,
            signature,
        })
    }
}
