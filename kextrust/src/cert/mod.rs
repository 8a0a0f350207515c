// Certificates issued by the authority: a signed `Info` record.

pub mod builder;
pub mod validator;

use serde::{Deserialize, Serialize};

use crate::error::{KexError, Result};
use crate::wire::{b64, b64_opt};

// ── Role ─────────────────────────────────────────────────────────────────

/// Which side of a handshake an identity or key slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Initiator,
    Acceptor,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Initiator => "initiator",
            Role::Acceptor => "acceptor",
        }
    }
}

// ── Info ─────────────────────────────────────────────────────────────────

/// The signed content of a certificate. Any subset of fields may be present.
///
/// Field order and omission rules define the canonical encoding returned by
/// [`Info::signable_bytes`]: fields are emitted in declaration order and
/// absent fields are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Info {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "b64_opt")]
    pub initiator_nonce: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "b64_opt")]
    pub acceptor_nonce: Option<Vec<u8>>,
    /// PKCS#1 PEM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_key: Option<String>,
    /// PKCS#1 PEM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptor_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "b64_opt")]
    pub session_key: Option<Vec<u8>>,
}

impl Info {
    /// The exact bytes the authority signs and every verifier re-derives.
    pub fn signable_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| KexError::Encryption(format!("info encode: {e}")))
    }

    /// The principal ID held in `role`'s slot.
    pub fn id(&self, role: Role) -> Option<&str> {
        match role {
            Role::Initiator => self.initiator.as_deref(),
            Role::Acceptor => self.acceptor.as_deref(),
        }
    }

    /// The PEM public key held in `role`'s slot.
    pub fn key_pem(&self, role: Role) -> Option<&str> {
        match role {
            Role::Initiator => self.initiator_key.as_deref(),
            Role::Acceptor => self.acceptor_key.as_deref(),
        }
    }

    fn is_empty(&self) -> bool {
        *self == Info::default()
    }
}

// ── Certificate ──────────────────────────────────────────────────────────

/// An [`Info`] record plus the authority's RSA-PKCS1v15/SHA-256 signature over
/// its signable bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Certificate {
    pub info: Info,
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_are_omitted() {
        let info = Info {
            acceptor: Some("bob".into()),
            acceptor_key: Some("PEM".into()),
            ..Info::default()
        };
        let bytes = info.signable_bytes().unwrap();
        assert_eq!(bytes, br#"{"acceptor":"bob","acceptor_key":"PEM"}"#);
    }

    #[test]
    fn encoding_survives_a_wire_roundtrip() {
        let info = Info {
            initiator: Some("alice".into()),
            acceptor: Some("bob".into()),
            initiator_nonce: Some(vec![1; 16]),
            session_key: Some(vec![2; 32]),
            ..Info::default()
        };
        let wire = serde_json::to_vec(&info).unwrap();
        let back: Info = serde_json::from_slice(&wire).unwrap();
        assert_eq!(back.signable_bytes().unwrap(), info.signable_bytes().unwrap());
    }

    #[test]
    fn role_slots() {
        let info = Info {
            initiator: Some("alice".into()),
            acceptor_key: Some("K".into()),
            ..Info::default()
        };
        assert_eq!(info.id(Role::Initiator), Some("alice"));
        assert_eq!(info.id(Role::Acceptor), None);
        assert_eq!(info.key_pem(Role::Acceptor), Some("K"));
        assert!(!info.is_empty());
        assert!(Info::default().is_empty());
    }
}
