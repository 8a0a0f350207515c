// Initiator handshake state machine.

use rsa::RsaPublicKey;

use crate::crypto::random::Nonce;
use crate::crypto::symmetric::SessionKey;
use crate::error::KexError;
use crate::session::EstablishedSession;
use crate::wire::NonceReply;

/// Where an initiator's handshake with one acceptor stands.
#[derive(Debug)]
pub enum InitiatorState {
    /// Nothing in flight.
    Idle,

    /// The authority certified the acceptor's public key.
    KeyRequested { acceptor_key: RsaPublicKey },

    /// The nonce envelope was delivered; the acceptor's reply is not yet opened.
    NonceSent {
        acceptor_key: RsaPublicKey,
        nonce: Nonce,
        reply: NonceReply,
    },

    /// The session certificate checked out; the proof is not yet sent.
    SessionKeyReceived {
        acceptor_key: RsaPublicKey,
        session_key: SessionKey,
        acceptor_nonce: Nonce,
    },

    /// The acceptor took our proof.
    Confirmed { session: EstablishedSession },
}

impl InitiatorState {
    pub fn label(&self) -> &'static str {
        match self {
            InitiatorState::Idle => "Idle",
            InitiatorState::KeyRequested { .. } => "KeyRequested",
            InitiatorState::NonceSent { .. } => "NonceSent",
            InitiatorState::SessionKeyReceived { .. } => "SessionKeyReceived",
            InitiatorState::Confirmed { .. } => "Confirmed",
        }
    }

    pub(crate) fn transition_error(&self, to: &str) -> KexError {
        KexError::InvalidStateTransition {
            from: self.label().into(),
            to: to.into(),
        }
    }
}
