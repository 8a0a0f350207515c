//! Envelope types posted to each endpoint, and their JSON codec.
//!
//! Every endpoint has exactly one request shape and one reply shape. Decoding
//! denies unknown fields, so an envelope posted to the wrong endpoint is
//! rejected as malformed instead of being half-interpreted.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cert::Certificate;
use crate::crypto::symmetric::SealedBox;
use crate::error::{KexError, Result};

/// Authority: look up one principal's public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyCertificateRequest {
    pub subject: String,
}

/// Acceptor -> Authority: certify a session between two principals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionCertificateRequest {
    pub initiator: String,
    pub acceptor: String,
    /// The initiator's nonce, encrypted under the authority's public key.
    #[serde(with = "b64")]
    pub wrapped_nonce: Vec<u8>,
}

/// Authority -> Acceptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionCertificateResponse {
    /// Binds the initiator's ID to its public key.
    pub key_certificate: Certificate,
    /// The session certificate, encrypted under the acceptor's public key.
    #[serde(with = "b64")]
    pub sealed_session_certificate: Vec<u8>,
}

/// Initiator -> Acceptor: `Info{initiator, initiator_nonce}` under the acceptor's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NonceEnvelope {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
}

/// Acceptor -> Initiator: a [`SessionOffer`] under the initiator's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NonceReply {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
}

/// Plaintext carried inside a [`NonceReply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionOffer {
    pub certificate: Certificate,
    #[serde(with = "b64")]
    pub acceptor_nonce: Vec<u8>,
}

/// Symmetrically encrypted payload: the nonce proof or an application message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SealedMessage {
    pub sender: String,
    pub sealed: SealedBox,
}

/// Serialize an envelope for the transport.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| KexError::Encryption(format!("encode: {e}")))
}

/// Parse an envelope received from the transport.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| KexError::MalformedEnvelope(e.to_string()))
}

/// Serde adapter: `Vec<u8>` as standard base64.
pub mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter: `Option<Vec<u8>>` as standard base64.
pub mod b64_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_str(&STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
