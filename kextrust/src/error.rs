// KexTrust error types

use thiserror::Error;

/// Top-level error type for the KexTrust crate.
#[derive(Debug, Error)]
pub enum KexError {
    // ── Trust chain errors ──────────────────────────────────────────────
    #[error("unknown principal: {0}")]
    UnknownPrincipal(String),

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("certificate does not match the handshake: {0}")]
    CertificateMismatch(String),

    #[error("nonce proof does not match for peer {0}")]
    NonceMismatch(String),

    // ── Crypto errors ───────────────────────────────────────────────────
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("entropy unavailable: {0}")]
    EntropyUnavailable(String),

    // ── Envelope errors ─────────────────────────────────────────────────
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("endpoint {0} is not served here")]
    UnsupportedEndpoint(&'static str),

    // ── Session / handshake errors ──────────────────────────────────────
    #[error("invalid handshake state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("no established session with {0}")]
    SessionNotEstablished(String),

    #[error("refusing to open a session with self ({0})")]
    SelfHandshake(String),

    #[error("a handshake with {0} is already in progress")]
    HandshakeInProgress(String),

    // ── Transport ───────────────────────────────────────────────────────
    #[error("transport error: {0}")]
    TransportError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KexError {
    fn from(e: serde_json::Error) -> Self {
        KexError::MalformedEnvelope(e.to_string())
    }
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, KexError>;
