// Certificate Validator: verify the authority's signature and the bindings a
// handshake step relies on.

use rsa::RsaPublicKey;

use crate::cert::{Certificate, Role};
use crate::crypto::asymmetric::verify;
use crate::crypto::keys::public_key_from_pem;
use crate::crypto::random::Nonce;
use crate::crypto::symmetric::SessionKey;
use crate::error::{KexError, Result};

/// Fields of a verified session certificate.
#[derive(Debug)]
pub struct SessionGrant {
    pub initiator: String,
    pub acceptor: String,
    pub initiator_nonce: Nonce,
    pub session_key: SessionKey,
}

/// Verify the authority's signature over the certificate's info.
pub fn validate(cert: &Certificate, authority: &RsaPublicKey) -> Result<()> {
    let signable = cert.info.signable_bytes()?;
    if verify(&signable, &cert.signature, authority) {
        Ok(())
    } else {
        Err(KexError::SignatureInvalid("certificate not signed by the authority".into()))
    }
}

/// Validate a key certificate and return the public key it binds to
/// `expected_id` in `role`'s slot.
pub fn validate_key_certificate(
    cert: &Certificate,
    authority: &RsaPublicKey,
    role: Role,
    expected_id: &str,
) -> Result<RsaPublicKey> {
    validate(cert, authority)?;

    match cert.info.id(role) {
        Some(id) if id == expected_id => {}
        other => {
            return Err(KexError::CertificateMismatch(format!(
                "key certificate names {} {:?}, expected {expected_id:?}",
                role.label(),
                other
            )));
        }
    }

    let pem = cert.info.key_pem(role).ok_or_else(|| {
        KexError::CertificateMismatch(format!("key certificate carries no {} key", role.label()))
    })?;
    public_key_from_pem(pem)
}

/// Validate a session certificate and check it binds exactly this pair of
/// principals and this initiator nonce.
pub fn validate_session_certificate(
    cert: &Certificate,
    authority: &RsaPublicKey,
    initiator: &str,
    acceptor: &str,
    initiator_nonce: &Nonce,
) -> Result<SessionGrant> {
    validate(cert, authority)?;

    let info = &cert.info;
    let missing = |field: &str| KexError::CertificateMismatch(format!("session certificate lacks {field}"));

    let cert_initiator = info.initiator.as_deref().ok_or_else(|| missing("initiator"))?;
    let cert_acceptor = info.acceptor.as_deref().ok_or_else(|| missing("acceptor"))?;
    if cert_initiator != initiator || cert_acceptor != acceptor {
        return Err(KexError::CertificateMismatch(format!(
            "session certificate is for {cert_initiator} -> {cert_acceptor}, expected {initiator} -> {acceptor}"
        )));
    }

    let nonce = Nonce::from_slice(info.initiator_nonce.as_deref().ok_or_else(|| missing("initiator nonce"))?)?;
    if &nonce != initiator_nonce {
        return Err(KexError::CertificateMismatch(
            "session certificate carries a different initiator nonce".into(),
        ));
    }

    let session_key = SessionKey::from_slice(info.session_key.as_deref().ok_or_else(|| missing("session key"))?)?;

    Ok(SessionGrant {
        initiator: cert_initiator.to_owned(),
        acceptor: cert_acceptor.to_owned(),
        initiator_nonce: nonce,
        session_key,
    })
}
