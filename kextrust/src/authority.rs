// Trusted third party ("Trent"): issues key certificates and mints session keys.
//
//   Initiator --key-certificate(acceptor)--> Authority
//   Acceptor  --session-certificate(initiator, acceptor, {N_i}Trent)--> Authority
//
// The authority keeps no per-request state: its registry and key pair are
// fixed at construction, so any number of requests may be served in parallel.

use tracing::{debug, info};

use crate::cert::builder::CertificateBuilder;
use crate::cert::{Certificate, Role};
use crate::crypto::asymmetric;
use crate::crypto::keys::PrincipalKeyPair;
use crate::crypto::random::Nonce;
use crate::crypto::symmetric::SessionKey;
use crate::error::{KexError, Result};
use crate::registry::Registry;
use crate::transport::Endpoint;
use crate::wire::{self, KeyCertificateRequest, SessionCertificateRequest, SessionCertificateResponse};

/// The authority engine.
pub struct Authority {
    keys: PrincipalKeyPair,
    registry: Registry,
}

impl Authority {
    pub fn new(keys: PrincipalKeyPair, registry: Registry) -> Self {
        Self { keys, registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn public_key(&self) -> &rsa::RsaPublicKey {
        self.keys.public_key()
    }

    /// Certify `subject`'s public key, placed in `role`'s slots.
    pub fn issue_key_certificate(&self, subject: &str, role: Role) -> Result<Certificate> {
        let key = self.registry.public_key(subject)?;
        let cert = CertificateBuilder::new(&self.keys)
            .principal(role, subject)
            .public_key(role, key)?
            .build()?;
        debug!(subject, role = role.label(), "issued key certificate");
        Ok(cert)
    }

    /// Mint a session key for `initiator` -> `acceptor`.
    ///
    /// Every call mints a new key; nothing is cached per pair.
    pub fn issue_session_certificate(
        &self,
        initiator: &str,
        acceptor: &str,
        wrapped_nonce: &[u8],
    ) -> Result<SessionCertificateResponse> {
        let acceptor_key = self.registry.public_key(acceptor)?;
        let key_certificate = self.issue_key_certificate(initiator, Role::Initiator)?;

        let nonce = Nonce::from_slice(&self.keys.decrypt(wrapped_nonce)?)?;
        let session_key = SessionKey::generate()?;

        let session_certificate = CertificateBuilder::new(&self.keys)
            .initiator_nonce(&nonce)
            .session_key(&session_key)
            .principal(Role::Initiator, initiator)
            .principal(Role::Acceptor, acceptor)
            .build()?;
        let sealed_session_certificate =
            asymmetric::encrypt(&wire::encode(&session_certificate)?, acceptor_key)?;

        info!(
            initiator,
            acceptor,
            session_key = %session_key.fingerprint(),
            "minted session key"
        );
        Ok(SessionCertificateResponse {
            key_certificate,
            sealed_session_certificate,
        })
    }

    /// Serve one inbound envelope.
    pub fn handle(&self, endpoint: Endpoint, payload: &[u8]) -> Result<Vec<u8>> {
        match endpoint {
            Endpoint::KeyCertificate => {
                let req: KeyCertificateRequest = wire::decode(payload)?;
                let cert = self.issue_key_certificate(&req.subject, Role::Acceptor)?;
                wire::encode(&cert)
            }
            Endpoint::SessionCertificate => {
                let req: SessionCertificateRequest = wire::decode(payload)?;
                let resp = self.issue_session_certificate(&req.initiator, &req.acceptor, &req.wrapped_nonce)?;
                wire::encode(&resp)
            }
            other => Err(KexError::UnsupportedEndpoint(other.path())),
        }
    }
}
