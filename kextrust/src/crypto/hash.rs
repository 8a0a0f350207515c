// Hashing: SHA-256 for signatures, BLAKE3 fingerprints for logs.

use sha2::{Digest, Sha256};

/// SHA-256 hash of `data`, returning a 32-byte digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

/// Short hex fingerprint of secret material, safe to put in a log line.
pub fn fingerprint(data: &[u8]) -> String {
    blake3::hash(data).as_bytes()[..6]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
