//! Authority-side identity registry: principal ID -> public key.
//!
//! Built once from trusted provisioning data and never mutated afterwards.

use std::collections::HashMap;
use std::path::Path;

use rsa::RsaPublicKey;

use crate::crypto::keys::load_public_key;
use crate::error::{KexError, Result};

/// Immutable map of registered principals.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    principals: HashMap<String, RsaPublicKey>,
}

impl Registry {
    /// Build from `(id, key)` pairs. A later duplicate ID replaces an earlier one.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, RsaPublicKey)>,
        S: Into<String>,
    {
        Self {
            principals: entries.into_iter().map(|(id, key)| (id.into(), key)).collect(),
        }
    }

    /// Build from `(id, path-to-PEM-public-key)` pairs.
    pub fn from_pem_files<I, S, P>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: AsRef<Path>,
    {
        let mut principals = HashMap::new();
        for (id, path) in entries {
            let id = id.into();
            let key = load_public_key(path.as_ref()).map_err(|e| {
                KexError::InvalidKey(format!("principal {id} ({}): {e}", path.as_ref().display()))
            })?;
            principals.insert(id, key);
        }
        Ok(Self { principals })
    }

    /// Look up a principal's public key.
    pub fn public_key(&self, id: &str) -> Result<&RsaPublicKey> {
        self.principals
            .get(id)
            .ok_or_else(|| KexError::UnknownPrincipal(id.to_owned()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.principals.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }

    /// Registered IDs, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.principals.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrincipalKeyPair;

    #[test]
    fn lookup_known_and_unknown() {
        let kp = PrincipalKeyPair::generate(1024).unwrap();
        let registry = Registry::new([("alice", kp.public_key().clone())]);
        assert_eq!(registry.public_key("alice").unwrap(), kp.public_key());
        assert!(registry.contains("alice"));
        let err = registry.public_key("mallory").unwrap_err();
        assert!(matches!(err, KexError::UnknownPrincipal(id) if id == "mallory"));
    }

    #[test]
    fn ids_sorted() {
        let kp = PrincipalKeyPair::generate(1024).unwrap();
        let registry = Registry::new([
            ("carol", kp.public_key().clone()),
            ("alice", kp.public_key().clone()),
        ]);
        assert_eq!(registry.ids(), vec!["alice", "carol"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn missing_pem_file_reported() {
        let err = Registry::from_pem_files([("alice", "/nonexistent/alice.pub")]).unwrap_err();
        assert!(matches!(err, KexError::InvalidKey(_)));
    }
}
