// Initiator side: four steps, each one request/reply exchange or local check.
//
// Every step takes the current state out of the machine before doing any work,
// so a failing step leaves the machine `Idle`.

use std::mem;

use tracing::{debug, warn};

use crate::cert::validator::{validate_key_certificate, validate_session_certificate};
use crate::cert::{Certificate, Info, Role};
use crate::crypto::asymmetric;
use crate::crypto::random::Nonce;
use crate::error::{KexError, Result};
use crate::handshake::state::InitiatorState;
use crate::handshake::Credentials;
use crate::session::EstablishedSession;
use crate::transport::{Endpoint, Exchange, Party};
use crate::wire::{self, KeyCertificateRequest, NonceEnvelope, NonceReply, SealedMessage, SessionOffer};

/// Client side of one handshake with `peer`.
pub struct Initiator<'a> {
    creds: &'a Credentials,
    exchange: &'a dyn Exchange,
    peer: String,
    state: InitiatorState,
}

impl<'a> Initiator<'a> {
    pub fn new(creds: &'a Credentials, exchange: &'a dyn Exchange, peer: impl Into<String>) -> Result<Self> {
        let peer = peer.into();
        if peer == creds.id {
            return Err(KexError::SelfHandshake(peer));
        }
        Ok(Self {
            creds,
            exchange,
            peer,
            state: InitiatorState::Idle,
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> &InitiatorState {
        &self.state
    }

    fn take_state(&mut self) -> InitiatorState {
        mem::replace(&mut self.state, InitiatorState::Idle)
    }

    /// Step 1: obtain and check the acceptor's key certificate.
    pub fn request_key(&mut self) -> Result<()> {
        match self.take_state() {
            InitiatorState::Idle => {}
            other => return Err(other.transition_error("KeyRequested")),
        }

        let request = wire::encode(&KeyCertificateRequest {
            subject: self.peer.clone(),
        })?;
        let reply = self
            .exchange
            .exchange(Party::Authority, Endpoint::KeyCertificate, request)?;
        let cert: Certificate = wire::decode(&reply)?;
        let acceptor_key =
            validate_key_certificate(&cert, &self.creds.authority_key, Role::Acceptor, &self.peer)
                .inspect_err(|e| warn!(peer = %self.peer, error = %e, "rejected key certificate"))?;

        debug!(peer = %self.peer, "acceptor key certified");
        self.state = InitiatorState::KeyRequested { acceptor_key };
        Ok(())
    }

    /// Step 2: deliver `{initiator, initiator_nonce}` to the acceptor.
    ///
    /// The acceptor contacts the authority before replying, so a successful
    /// return means a session key has already been minted.
    pub fn send_nonce(&mut self) -> Result<()> {
        let acceptor_key = match self.take_state() {
            InitiatorState::KeyRequested { acceptor_key } => acceptor_key,
            other => return Err(other.transition_error("NonceSent")),
        };

        let nonce = Nonce::generate()?;
        let info = Info {
            initiator: Some(self.creds.id.clone()),
            initiator_nonce: Some(nonce.to_vec()),
            ..Info::default()
        };
        let envelope = NonceEnvelope {
            ciphertext: asymmetric::encrypt(&wire::encode(&info)?, &acceptor_key)?,
        };
        let reply = self.exchange.exchange(
            Party::Peer(&self.peer),
            Endpoint::NonceReceipt,
            wire::encode(&envelope)?,
        )?;
        let reply: NonceReply = wire::decode(&reply)?;

        debug!(peer = %self.peer, "nonce delivered");
        self.state = InitiatorState::NonceSent {
            acceptor_key,
            nonce,
            reply,
        };
        Ok(())
    }

    /// Step 3: open the acceptor's reply and re-verify the session certificate.
    pub fn receive_session_key(&mut self) -> Result<()> {
        let (acceptor_key, nonce, reply) = match self.take_state() {
            InitiatorState::NonceSent {
                acceptor_key,
                nonce,
                reply,
            } => (acceptor_key, nonce, reply),
            other => return Err(other.transition_error("SessionKeyReceived")),
        };

        let offer: SessionOffer = wire::decode(&self.creds.keys.decrypt(&reply.ciphertext)?)?;
        let grant = validate_session_certificate(
            &offer.certificate,
            &self.creds.authority_key,
            &self.creds.id,
            &self.peer,
            &nonce,
        )
        .inspect_err(|e| warn!(peer = %self.peer, error = %e, "rejected session certificate"))?;
        let acceptor_nonce = Nonce::from_slice(&offer.acceptor_nonce)?;

        debug!(peer = %self.peer, session_key = %grant.session_key.fingerprint(), "session key received");
        self.state = InitiatorState::SessionKeyReceived {
            acceptor_key,
            session_key: grant.session_key,
            acceptor_nonce,
        };
        Ok(())
    }

    /// Step 4: prove possession of the session key by returning the
    /// acceptor's nonce under it.
    pub fn send_proof(&mut self) -> Result<()> {
        let (acceptor_key, session_key, acceptor_nonce) = match self.take_state() {
            InitiatorState::SessionKeyReceived {
                acceptor_key,
                session_key,
                acceptor_nonce,
            } => (acceptor_key, session_key, acceptor_nonce),
            other => return Err(other.transition_error("Confirmed")),
        };

        let proof = SealedMessage {
            sender: self.creds.id.clone(),
            sealed: session_key.seal(acceptor_nonce.as_bytes())?,
        };
        self.exchange.exchange(
            Party::Peer(&self.peer),
            Endpoint::ProofReceipt,
            wire::encode(&proof)?,
        )?;

        self.state = InitiatorState::Confirmed {
            session: EstablishedSession::new(self.peer.clone(), acceptor_key, session_key),
        };
        Ok(())
    }

    /// Hand over the established session once the machine is `Confirmed`.
    pub fn finish(mut self) -> Result<EstablishedSession> {
        match self.take_state() {
            InitiatorState::Confirmed { session } => Ok(session),
            other => Err(other.transition_error("Established")),
        }
    }

    /// Drive all four steps in order.
    pub fn run(mut self) -> Result<EstablishedSession> {
        self.request_key()?;
        self.send_nonce()?;
        self.receive_session_key()?;
        self.send_proof()?;
        self.finish()
    }
}
