// Acceptor side: answer a nonce envelope with a session offer, then check the
// initiator's proof.
//
// `accept_nonce` touches no session state. The caller stores the returned
// `AwaitingProof` only once the whole step has succeeded.

use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::cert::validator::{validate_key_certificate, validate_session_certificate};
use crate::cert::{Certificate, Info, Role};
use crate::crypto::asymmetric;
use crate::crypto::random::Nonce;
use crate::crypto::symmetric::SealedBox;
use crate::error::{KexError, Result};
use crate::handshake::Credentials;
use crate::session::{AwaitingProof, EstablishedSession};
use crate::transport::{Endpoint, Exchange, Party};
use crate::wire::{
    self, NonceEnvelope, NonceReply, SessionCertificateRequest, SessionCertificateResponse, SessionOffer,
};

/// Contents of an opened nonce envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceReceipt {
    pub initiator: String,
    pub nonce: Nonce,
}

/// Server side of the handshake for one principal.
pub struct Acceptor<'a> {
    creds: &'a Credentials,
    exchange: &'a dyn Exchange,
}

impl<'a> Acceptor<'a> {
    pub fn new(creds: &'a Credentials, exchange: &'a dyn Exchange) -> Self {
        Self { creds, exchange }
    }

    /// Decrypt an envelope into the initiator's ID and nonce.
    pub fn open_envelope(&self, envelope: &NonceEnvelope) -> Result<NonceReceipt> {
        let info: Info = wire::decode(&self.creds.keys.decrypt(&envelope.ciphertext)?)?;
        let initiator = info
            .initiator
            .ok_or_else(|| KexError::MalformedEnvelope("nonce envelope lacks initiator".into()))?;
        let nonce = Nonce::from_slice(
            info.initiator_nonce
                .as_deref()
                .ok_or_else(|| KexError::MalformedEnvelope("nonce envelope lacks nonce".into()))?,
        )?;
        if initiator == self.creds.id {
            return Err(KexError::SelfHandshake(initiator));
        }
        Ok(NonceReceipt { initiator, nonce })
    }

    /// Ask the authority to certify a session for `receipt`.
    pub fn request_certificates(&self, receipt: &NonceReceipt) -> Result<SessionCertificateResponse> {
        let request = SessionCertificateRequest {
            initiator: receipt.initiator.clone(),
            acceptor: self.creds.id.clone(),
            wrapped_nonce: asymmetric::encrypt(receipt.nonce.as_bytes(), &self.creds.authority_key)?,
        };
        let reply = self.exchange.exchange(
            Party::Authority,
            Endpoint::SessionCertificate,
            wire::encode(&request)?,
        )?;
        wire::decode(&reply)
    }

    /// Check the authority's certificates and build the reply to the initiator.
    pub fn offer(
        &self,
        receipt: NonceReceipt,
        certificates: SessionCertificateResponse,
    ) -> Result<(NonceReply, AwaitingProof)> {
        let authority = &self.creds.authority_key;
        let initiator_key = validate_key_certificate(
            &certificates.key_certificate,
            authority,
            Role::Initiator,
            &receipt.initiator,
        )
        .inspect_err(|e| warn!(initiator = %receipt.initiator, error = %e, "rejected key certificate"))?;

        let certificate: Certificate =
            wire::decode(&self.creds.keys.decrypt(&certificates.sealed_session_certificate)?)?;
        let grant = validate_session_certificate(
            &certificate,
            authority,
            &receipt.initiator,
            &self.creds.id,
            &receipt.nonce,
        )
        .inspect_err(|e| warn!(initiator = %receipt.initiator, error = %e, "rejected session certificate"))?;

        let local_nonce = Nonce::generate()?;
        let offer = SessionOffer {
            certificate,
            acceptor_nonce: local_nonce.to_vec(),
        };
        let reply = NonceReply {
            ciphertext: asymmetric::encrypt(&wire::encode(&offer)?, &initiator_key)?,
        };

        debug!(initiator = %receipt.initiator, session_key = %grant.session_key.fingerprint(), "offered session");
        let record = AwaitingProof {
            peer: receipt.initiator,
            peer_key: initiator_key,
            session_key: grant.session_key,
            local_nonce,
        };
        Ok((reply, record))
    }

    /// The whole nonce-receipt step.
    pub fn accept_nonce(&self, envelope: &NonceEnvelope) -> Result<(NonceReply, AwaitingProof)> {
        let receipt = self.open_envelope(envelope)?;
        let certificates = self.request_certificates(&receipt)?;
        self.offer(receipt, certificates)
    }
}

impl AwaitingProof {
    /// Consume the record if `proof` decrypts to our nonce.
    ///
    /// On mismatch, or a proof that does not decrypt, the record comes back
    /// unchanged with a [`KexError::NonceMismatch`].
    pub fn confirm(self, proof: &SealedBox) -> std::result::Result<EstablishedSession, (Self, KexError)> {
        let matches = match self.session_key.open(proof) {
            Ok(candidate) => bool::from(candidate.as_slice().ct_eq(self.local_nonce.as_bytes().as_slice())),
            Err(_) => false,
        };
        if !matches {
            let err = KexError::NonceMismatch(self.peer.clone());
            return Err((self, err));
        }
        Ok(EstablishedSession::new(self.peer, self.peer_key, self.session_key))
    }
}
