// Peer-side handshake engines.
//
//   Initiator                 Acceptor                  Authority
//     |-- key-certificate(acceptor) ----------------------->|
//     |<------------------------------- Certificate --------|
//     |-- nonce-receipt {I, N_i}B -->|                      |
//     |                              |-- session-cert ----->|
//     |                              |<-- certs ------------|
//     |<-- {SessionOffer}A ----------|                      |
//     |-- proof-receipt {N_b}K ----->|                      |
//     |==== messages under K ========|

pub mod acceptor;
pub mod initiator;
pub mod state;

use rsa::RsaPublicKey;

use crate::crypto::keys::PrincipalKeyPair;

pub use acceptor::{Acceptor, NonceReceipt};
pub use initiator::Initiator;
pub use state::InitiatorState;

/// What a principal needs to take part in a handshake.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub id: String,
    pub keys: PrincipalKeyPair,
    /// The authority's public key, provisioned out of band.
    pub authority_key: RsaPublicKey,
}

impl Credentials {
    pub fn new(id: impl Into<String>, keys: PrincipalKeyPair, authority_key: RsaPublicKey) -> Self {
        Self {
            id: id.into(),
            keys,
            authority_key,
        }
    }
}
