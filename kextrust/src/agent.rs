//! Per-principal façade: runs outbound handshakes, serves the peer endpoints,
//! and carries application messages over established sessions.

use std::sync::Arc;

use bytes::Bytes;
use rsa::RsaPublicKey;
use tracing::{debug, info, warn};

use crate::crypto::symmetric::SessionKey;
use crate::error::{KexError, Result};
use crate::handshake::{Acceptor, Credentials, Initiator};
use crate::session::{Inbox, Session, SessionPhase, SessionStore};
use crate::transport::{Endpoint, Exchange, Party};
use crate::wire::{self, NonceEnvelope, NonceReply, SealedMessage};

pub struct Agent {
    creds: Credentials,
    sessions: SessionStore,
    inbox: Inbox,
    exchange: Arc<dyn Exchange>,
}

impl Agent {
    pub fn new(creds: Credentials, exchange: Arc<dyn Exchange>) -> Self {
        Self {
            creds,
            sessions: SessionStore::new(),
            inbox: Inbox::new(),
            exchange,
        }
    }

    pub fn id(&self) -> &str {
        &self.creds.id
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        self.creds.keys.public_key()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.creds
    }

    // ── Initiator role ───────────────────────────────────────────────────

    /// Run a full handshake with `peer`.
    ///
    /// Blocks for the four round trips. On success the new session replaces
    /// whatever was held for `peer`; on failure the record is left as it was.
    /// While it runs, handshake envelopes from `peer` are refused with
    /// [`KexError::HandshakeInProgress`].
    pub fn initiate(&self, peer: &str) -> Result<()> {
        if peer == self.creds.id {
            return Err(KexError::SelfHandshake(peer.to_owned()));
        }
        let slot = self.sessions.slot(peer);
        let _handshake = slot.handshake.lock();

        debug!(peer, "starting handshake");
        match Initiator::new(&self.creds, self.exchange.as_ref(), peer)?.run() {
            Ok(session) => {
                info!(peer, session_key = %session.session_key().fingerprint(), "session established");
                *slot.record.lock() = Some(Session::Established(session));
                Ok(())
            }
            Err(e) => {
                warn!(peer, error = %e, "handshake failed");
                Err(e)
            }
        }
    }

    // ── Acceptor role and messaging ──────────────────────────────────────

    /// Serve one inbound envelope and return the serialized reply.
    pub fn handle(&self, endpoint: Endpoint, payload: &[u8]) -> Result<Vec<u8>> {
        match endpoint {
            Endpoint::NonceReceipt => self.on_nonce(payload),
            Endpoint::ProofReceipt => self.on_proof(payload),
            Endpoint::Message => self.on_message(payload),
            Endpoint::KeyCertificate | Endpoint::SessionCertificate => {
                Err(KexError::UnsupportedEndpoint(endpoint.path()))
            }
        }
    }

    fn on_nonce(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let envelope: NonceEnvelope = wire::decode(payload)?;
        let reply = self
            .accept(&envelope)
            .inspect_err(|e| warn!(error = %e, "nonce receipt rejected"))?;
        wire::encode(&reply)
    }

    fn accept(&self, envelope: &NonceEnvelope) -> Result<NonceReply> {
        let acceptor = Acceptor::new(&self.creds, self.exchange.as_ref());
        let receipt = acceptor.open_envelope(envelope)?;

        // Only a peer that already has a slot can have a handshake running.
        let known = self.sessions.get(&receipt.initiator);
        let _busy = match &known {
            Some(slot) => Some(
                slot.handshake
                    .try_lock()
                    .ok_or_else(|| KexError::HandshakeInProgress(receipt.initiator.clone()))?,
            ),
            None => None,
        };

        let certificates = acceptor.request_certificates(&receipt)?;
        let (reply, pending) = acceptor.offer(receipt, certificates)?;

        // The authority has vouched for the initiator; a slot may be created now.
        let peer = pending.peer().to_owned();
        let slot = self.sessions.slot(&peer);
        let mut record = slot.record.lock();
        let next = Session::offer(record.take(), pending);
        debug!(peer = %peer, phase = ?next.phase(), "awaiting proof");
        *record = Some(next);
        Ok(reply)
    }

    fn on_proof(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let proof: SealedMessage = wire::decode(payload)?;
        let peer = proof.sender.as_str();
        let no_pending = || KexError::SessionNotEstablished(format!("no pending handshake with {peer}"));

        let slot = self.sessions.get(peer).ok_or_else(no_pending)?;
        let _busy = slot
            .handshake
            .try_lock()
            .ok_or_else(|| KexError::HandshakeInProgress(peer.to_owned()))?;
        let mut record = slot.record.lock();

        let (current, pending) = match record.take() {
            Some(Session::AwaitingProof(pending)) => (None, pending),
            Some(Session::Rekeying { current, pending }) => (Some(current), pending),
            other => {
                *record = other;
                return Err(no_pending());
            }
        };
        match pending.confirm(&proof.sealed) {
            Ok(session) => {
                info!(peer, session_key = %session.session_key().fingerprint(), "session established");
                *record = Some(Session::Established(session));
                Ok(Vec::new())
            }
            Err((pending, e)) => {
                warn!(peer, "rejected session proof");
                *record = Some(match current {
                    Some(current) => Session::Rekeying { current, pending },
                    None => Session::AwaitingProof(pending),
                });
                Err(e)
            }
        }
    }

    fn on_message(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let message: SealedMessage = wire::decode(payload)?;
        let plaintext = self.receive(&message)?;
        debug!(peer = %message.sender, len = plaintext.len(), "message received");
        Ok(Vec::new())
    }

    /// Open a sealed message from an established peer and file it in the inbox.
    pub fn receive(&self, message: &SealedMessage) -> Result<Bytes> {
        let plaintext = self
            .sessions
            .with_established(&message.sender, |session| session.open(&message.sealed))?;
        let plaintext = Bytes::from(plaintext);
        self.inbox.push(&message.sender, plaintext.clone());
        Ok(plaintext)
    }

    /// Seal `message` under the session with `peer` and deliver it.
    pub fn send(&self, peer: &str, message: &[u8]) -> Result<()> {
        let sealed = self
            .sessions
            .with_established(peer, |session| session.seal(message))?;
        let envelope = SealedMessage {
            sender: self.creds.id.clone(),
            sealed,
        };
        self.exchange
            .exchange(Party::Peer(peer), Endpoint::Message, wire::encode(&envelope)?)?;
        Ok(())
    }

    // ── Inspection ───────────────────────────────────────────────────────

    /// Messages received from `peer`, oldest first.
    pub fn inbox(&self, peer: &str) -> Vec<Bytes> {
        self.inbox.messages(peer)
    }

    pub fn drain_inbox(&self, peer: &str) -> Vec<Bytes> {
        self.inbox.drain(peer)
    }

    pub fn session_phase(&self, peer: &str) -> Option<SessionPhase> {
        self.sessions.phase(peer)
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn established_peers(&self) -> Vec<String> {
        self.sessions.established_peers()
    }

    /// Fingerprint of the key in use with `peer`, or of the pending key when
    /// nothing is established yet.
    pub fn session_key_fingerprint(&self, peer: &str) -> Option<String> {
        let slot = self.sessions.get(peer)?;
        let record = slot.record.lock();
        match record.as_ref()? {
            Session::AwaitingProof(pending) => Some(pending.session_key.fingerprint()),
            Session::Established(current) | Session::Rekeying { current, .. } => {
                Some(current.session_key().fingerprint())
            }
        }
    }

    /// A copy of the established session key for `peer`.
    pub fn session_key(&self, peer: &str) -> Result<SessionKey> {
        self.sessions
            .with_established(peer, |session| Ok(session.session_key().clone()))
    }
}
