//! Per-peer session records and the inbox.
//!
//! A record is [`AwaitingProof`] (acceptor side, key minted but not yet
//! proven by the initiator), [`EstablishedSession`], or an established
//! session with a newer `AwaitingProof` beside it. Only an established
//! session can encrypt or decrypt application messages, and it can only be
//! obtained by consuming a proven `AwaitingProof` or a confirmed initiator
//! handshake.
//!
//! Each peer has its own slot; the map of slots is only locked long enough to
//! find or create one. A slot carries two locks: `record` guards the session
//! record and is never held across a network exchange, and `handshake` is
//! held by whichever of this principal's handshakes with that peer is
//! running, outbound or inbound.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use rsa::RsaPublicKey;
use tracing::warn;

use crate::crypto::random::Nonce;
use crate::crypto::symmetric::{SealedBox, SessionKey};
use crate::error::{KexError, Result};

/// Externally visible phase of a peer's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    AwaitingProof,
    Established,
    /// Established, with a newer handshake waiting for its proof.
    Rekeying,
}

/// Acceptor-side record between the nonce reply and the initiator's proof.
#[derive(Debug)]
pub struct AwaitingProof {
    pub(crate) peer: String,
    pub(crate) peer_key: RsaPublicKey,
    pub(crate) session_key: SessionKey,
    pub(crate) local_nonce: Nonce,
}

impl AwaitingProof {
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn local_nonce(&self) -> &Nonce {
        &self.local_nonce
    }
}

/// A session whose key both sides have proven to hold.
#[derive(Debug)]
pub struct EstablishedSession {
    peer: String,
    peer_key: RsaPublicKey,
    session_key: SessionKey,
}

impl EstablishedSession {
    pub(crate) fn new(peer: String, peer_key: RsaPublicKey, session_key: SessionKey) -> Self {
        Self {
            peer,
            peer_key,
            session_key,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// The peer's public key, as certified by the authority.
    pub fn peer_key(&self) -> &RsaPublicKey {
        &self.peer_key
    }

    pub fn session_key(&self) -> &SessionKey {
        &self.session_key
    }

    /// Encrypt an application message under a fresh IV.
    pub fn seal(&self, message: &[u8]) -> Result<SealedBox> {
        self.session_key.seal(message)
    }

    /// Decrypt an application message.
    pub fn open(&self, sealed: &SealedBox) -> Result<Vec<u8>> {
        self.session_key.open(sealed)
    }
}

/// One peer's session record.
#[derive(Debug)]
pub enum Session {
    AwaitingProof(AwaitingProof),
    Established(EstablishedSession),
    Rekeying {
        current: EstablishedSession,
        pending: AwaitingProof,
    },
}

impl Session {
    pub fn phase(&self) -> SessionPhase {
        match self {
            Session::AwaitingProof(_) => SessionPhase::AwaitingProof,
            Session::Established(_) => SessionPhase::Established,
            Session::Rekeying { .. } => SessionPhase::Rekeying,
        }
    }

    /// The session messages travel over, if any.
    pub fn established(&self) -> Option<&EstablishedSession> {
        match self {
            Session::Established(current) | Session::Rekeying { current, .. } => Some(current),
            Session::AwaitingProof(_) => None,
        }
    }

    /// Record a fresh `AwaitingProof` for this peer. An established session
    /// keeps carrying messages until the new key is proven.
    pub fn offer(previous: Option<Session>, pending: AwaitingProof) -> Session {
        match previous {
            Some(Session::Established(current)) | Some(Session::Rekeying { current, .. }) => {
                Session::Rekeying { current, pending }
            }
            Some(Session::AwaitingProof(_)) | None => Session::AwaitingProof(pending),
        }
    }
}

/// Locks for one peer. An empty `record` means no session state is held.
#[derive(Default)]
pub struct PeerSlot {
    pub handshake: Mutex<()>,
    pub record: Mutex<Option<Session>>,
}

/// All of one principal's sessions, keyed by peer ID.
#[derive(Default)]
pub struct SessionStore {
    slots: RwLock<HashMap<String, Arc<PeerSlot>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for `peer`, created empty on first use.
    pub fn slot(&self, peer: &str) -> Arc<PeerSlot> {
        if let Some(slot) = self.slots.read().get(peer) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(peer.to_owned()).or_default())
    }

    /// The slot for `peer`, if one was ever created.
    pub fn get(&self, peer: &str) -> Option<Arc<PeerSlot>> {
        self.slots.read().get(peer).cloned()
    }

    pub fn phase(&self, peer: &str) -> Option<SessionPhase> {
        let slot = self.get(peer)?;
        let record = slot.record.lock();
        record.as_ref().map(Session::phase)
    }

    /// Run `f` against the established session with `peer`.
    pub fn with_established<R>(
        &self,
        peer: &str,
        f: impl FnOnce(&EstablishedSession) -> Result<R>,
    ) -> Result<R> {
        let slot = self
            .get(peer)
            .ok_or_else(|| KexError::SessionNotEstablished(peer.to_owned()))?;
        let record = slot.record.lock();
        match record.as_ref().and_then(Session::established) {
            Some(session) => f(session),
            None => Err(KexError::SessionNotEstablished(peer.to_owned())),
        }
    }

    /// Peers with an established session, sorted.
    pub fn established_peers(&self) -> Vec<String> {
        let slots: Vec<(String, Arc<PeerSlot>)> = self
            .slots
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        let mut peers: Vec<String> = slots
            .into_iter()
            .filter(|(_, slot)| slot.record.lock().as_ref().and_then(Session::established).is_some())
            .map(|(peer, _)| peer)
            .collect();
        peers.sort_unstable();
        peers
    }
}

/// Messages kept per peer before the oldest are dropped.
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// Decrypted application messages, per sending peer, in arrival order.
///
/// Each peer's queue is bounded; once full, the oldest message is dropped.
pub struct Inbox {
    capacity: usize,
    messages: Mutex<HashMap<String, VecDeque<Bytes>>>,
}

impl Default for Inbox {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_INBOX_CAPACITY)
    }
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            messages: Mutex::new(HashMap::new()),
        }
    }

    pub fn push(&self, peer: &str, message: Bytes) {
        let mut messages = self.messages.lock();
        let queue = messages.entry(peer.to_owned()).or_default();
        if queue.len() == self.capacity {
            queue.pop_front();
            warn!(peer, capacity = self.capacity, "inbox full, dropped oldest message");
        }
        queue.push_back(message);
    }

    /// A copy of everything held from `peer`.
    pub fn messages(&self, peer: &str) -> Vec<Bytes> {
        self.messages
            .lock()
            .get(peer)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove and return everything held from `peer`.
    pub fn drain(&self, peer: &str) -> Vec<Bytes> {
        self.messages
            .lock()
            .remove(peer)
            .map(Vec::from)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrincipalKeyPair;

    fn established(peer: &str) -> EstablishedSession {
        let kp = PrincipalKeyPair::generate(1024).unwrap();
        EstablishedSession::new(peer.into(), kp.public_key().clone(), SessionKey::generate().unwrap())
    }

    fn pending(peer: &str) -> AwaitingProof {
        let kp = PrincipalKeyPair::generate(1024).unwrap();
        AwaitingProof {
            peer: peer.into(),
            peer_key: kp.public_key().clone(),
            session_key: SessionKey::generate().unwrap(),
            local_nonce: Nonce::generate().unwrap(),
        }
    }

    #[test]
    fn slot_is_shared_per_peer() {
        let store = SessionStore::new();
        let a = store.slot("bob");
        let b = store.slot("bob");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &store.slot("carol")));
    }

    #[test]
    fn phase_follows_slot_contents() {
        let store = SessionStore::new();
        assert_eq!(store.phase("bob"), None);
        *store.slot("bob").record.lock() = Some(Session::Established(established("bob")));
        assert_eq!(store.phase("bob"), Some(SessionPhase::Established));
        assert_eq!(store.established_peers(), vec!["bob".to_string()]);
    }

    #[test]
    fn with_established_requires_established() {
        let store = SessionStore::new();
        let err = store.with_established("bob", |_| Ok(())).unwrap_err();
        assert!(matches!(err, KexError::SessionNotEstablished(_)));

        *store.slot("bob").record.lock() = Some(Session::Established(established("bob")));
        let sealed = store.with_established("bob", |s| s.seal(b"hi")).unwrap();
        let opened = store.with_established("bob", |s| s.open(&sealed)).unwrap();
        assert_eq!(opened, b"hi");
    }

    #[test]
    fn inbox_keeps_order_per_peer() {
        let inbox = Inbox::new();
        inbox.push("alice", Bytes::from_static(b"one"));
        inbox.push("alice", Bytes::from_static(b"two"));
        inbox.push("carol", Bytes::from_static(b"other"));
        assert_eq!(inbox.messages("alice"), vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]);
        assert_eq!(inbox.drain("alice").len(), 2);
        assert!(inbox.messages("alice").is_empty());
        assert_eq!(inbox.messages("carol").len(), 1);
    }

    #[test]
    fn offer_keeps_an_established_session() {
        let current = established("bob");
        let key = current.session_key().clone();

        let record = Session::offer(Some(Session::Established(current)), pending("bob"));
        assert_eq!(record.phase(), SessionPhase::Rekeying);
        assert_eq!(record.established().unwrap().session_key(), &key);

        // A second offer replaces the pending half only.
        let record = Session::offer(Some(record), pending("bob"));
        assert_eq!(record.phase(), SessionPhase::Rekeying);
        assert_eq!(record.established().unwrap().session_key(), &key);

        let record = Session::offer(None, pending("bob"));
        assert_eq!(record.phase(), SessionPhase::AwaitingProof);
        assert!(record.established().is_none());
    }

    #[test]
    fn rekeying_peer_counts_as_established() {
        let store = SessionStore::new();
        *store.slot("bob").record.lock() = Some(Session::offer(
            Some(Session::Established(established("bob"))),
            pending("bob"),
        ));
        assert_eq!(store.phase("bob"), Some(SessionPhase::Rekeying));
        assert_eq!(store.established_peers(), vec!["bob".to_string()]);
        assert!(store.with_established("bob", |s| s.seal(b"still up")).is_ok());
    }

    #[test]
    fn inbox_drops_oldest_when_full() {
        let inbox = Inbox::with_capacity(2);
        for message in [&b"one"[..], b"two", b"three"] {
            inbox.push("alice", Bytes::copy_from_slice(message));
        }
        assert_eq!(inbox.messages("alice"), vec![&b"two"[..], &b"three"[..]]);
        assert_eq!(inbox.drain("alice").len(), 2);
    }
}
