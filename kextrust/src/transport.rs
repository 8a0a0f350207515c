//! The narrow seam between the protocol engine and whatever moves bytes.
//!
//! The engine only ever needs one primitive: post a serialized envelope to a
//! named endpoint on the authority or on a peer, and get back the serialized
//! reply or an error. [`LocalNetwork`] wires engines together in-process.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::agent::Agent;
use crate::authority::Authority;
use crate::error::{KexError, Result};

/// Who a request is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party<'a> {
    Authority,
    Peer(&'a str),
}

impl fmt::Display for Party<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Authority => f.write_str("authority"),
            Party::Peer(id) => write!(f, "peer {id}"),
        }
    }
}

/// Named protocol endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Authority: key certificate for one subject.
    KeyCertificate,
    /// Authority: mint and certify a session key.
    SessionCertificate,
    /// Acceptor: the initiator's nonce envelope.
    NonceReceipt,
    /// Acceptor: the initiator's proof of session-key possession.
    ProofReceipt,
    /// Either peer: an application message.
    Message,
}

impl Endpoint {
    pub const ALL: [Endpoint; 5] = [
        Endpoint::KeyCertificate,
        Endpoint::SessionCertificate,
        Endpoint::NonceReceipt,
        Endpoint::ProofReceipt,
        Endpoint::Message,
    ];

    /// URL path used by the HTTP transport.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::KeyCertificate => "/key-certificate",
            Endpoint::SessionCertificate => "/session-certificate",
            Endpoint::NonceReceipt => "/nonce-receipt",
            Endpoint::ProofReceipt => "/proof-receipt",
            Endpoint::Message => "/message",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.path() == path)
    }

    /// Whether the authority (rather than a peer) serves this endpoint.
    pub fn is_authority(self) -> bool {
        matches!(self, Endpoint::KeyCertificate | Endpoint::SessionCertificate)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path()[1..])
    }
}

/// Blocking request/reply primitive the engine sends through.
///
/// Implementations report connection failures, timeouts and non-success
/// replies as [`KexError::TransportError`]. They never retry.
pub trait Exchange: Send + Sync {
    fn exchange(&self, to: Party<'_>, endpoint: Endpoint, payload: Vec<u8>) -> Result<Vec<u8>>;
}

impl<T: Exchange + ?Sized> Exchange for Arc<T> {
    fn exchange(&self, to: Party<'_>, endpoint: Endpoint, payload: Vec<u8>) -> Result<Vec<u8>> {
        (**self).exchange(to, endpoint, payload)
    }
}

// ── In-process network ───────────────────────────────────────────────────

/// Routes exchanges directly to in-process engines.
///
/// A handler error on the far side reaches the caller as a transport error,
/// as it would over HTTP. Every request payload is recorded so callers can
/// inspect or replay captured envelopes.
#[derive(Default)]
pub struct LocalNetwork {
    authority: RwLock<Option<Arc<Authority>>>,
    agents: RwLock<HashMap<String, Weak<Agent>>>,
    captured: Mutex<Vec<(Endpoint, Vec<u8>)>>,
}

impl LocalNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attach_authority(&self, authority: Arc<Authority>) {
        *self.authority.write() = Some(authority);
    }

    /// Register an agent under its own ID. Held weakly; agents own the network.
    pub fn attach_agent(&self, agent: &Arc<Agent>) {
        self.agents
            .write()
            .insert(agent.id().to_owned(), Arc::downgrade(agent));
    }

    /// Request payloads posted to `endpoint`, oldest first.
    pub fn captured(&self, endpoint: Endpoint) -> Vec<Vec<u8>> {
        self.captured
            .lock()
            .iter()
            .filter(|(e, _)| *e == endpoint)
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn route(&self, to: Party<'_>, endpoint: Endpoint, payload: &[u8]) -> Result<Vec<u8>> {
        match to {
            Party::Authority => {
                let authority = self
                    .authority
                    .read()
                    .clone()
                    .ok_or_else(|| KexError::TransportError("no authority attached".into()))?;
                authority.handle(endpoint, payload)
            }
            Party::Peer(id) => {
                let agent = self
                    .agents
                    .read()
                    .get(id)
                    .and_then(Weak::upgrade)
                    .ok_or_else(|| KexError::TransportError(format!("no route to peer {id}")))?;
                agent.handle(endpoint, payload)
            }
        }
    }
}

impl Exchange for LocalNetwork {
    fn exchange(&self, to: Party<'_>, endpoint: Endpoint, payload: Vec<u8>) -> Result<Vec<u8>> {
        self.captured.lock().push((endpoint, payload.clone()));
        self.route(to, endpoint, &payload).map_err(|e| match e {
            KexError::TransportError(_) => e,
            other => KexError::TransportError(format!("{to} rejected {endpoint}: {other}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_paths_roundtrip() {
        for endpoint in Endpoint::ALL {
            assert_eq!(Endpoint::from_path(endpoint.path()), Some(endpoint));
        }
        assert_eq!(Endpoint::from_path("/step7/"), None);
        assert_eq!(Endpoint::NonceReceipt.to_string(), "nonce-receipt");
    }

    #[test]
    fn authority_endpoints() {
        assert!(Endpoint::KeyCertificate.is_authority());
        assert!(Endpoint::SessionCertificate.is_authority());
        assert!(!Endpoint::Message.is_authority());
    }

    #[test]
    fn unrouted_peer_is_transport_error() {
        let net = LocalNetwork::new();
        let err = net
            .exchange(Party::Peer("nobody"), Endpoint::Message, b"{}".to_vec())
            .unwrap_err();
        assert!(matches!(err, KexError::TransportError(_)));
        assert_eq!(net.captured(Endpoint::Message).len(), 1);
    }
}
