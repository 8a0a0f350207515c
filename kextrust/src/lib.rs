// KexTrust: Trent-brokered three-party session key exchange
//
// Crate root: module declarations and public re-exports.

pub mod error;
pub mod crypto;
pub mod cert;
pub mod wire;
pub mod registry;
pub mod transport;
pub mod authority;
pub mod handshake;
pub mod session;
pub mod agent;

// Re-export key types at crate root for convenience.
pub use agent::Agent;
pub use authority::Authority;
pub use cert::{Certificate, Info};
pub use crypto::keys::PrincipalKeyPair;
pub use error::{KexError, Result};
pub use handshake::{Credentials, Initiator, InitiatorState};
pub use registry::Registry;
pub use session::{EstablishedSession, SessionPhase};
pub use transport::{Endpoint, Exchange, LocalNetwork, Party};
