//! Deterministic digests over ordered string sequences.
//!
//! One primitive serves both identity derivation (session origins) and
//! content fingerprinting: SHA-256 over the parts in order, hex encoded.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 over the parts in the order given.
///
/// Each part is length-prefixed before hashing so sequence boundaries are
/// unambiguous: `["ab", "c"]` and `["a", "bc"]` produce different digests.
pub fn digest_parts<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_deterministic() {
        let a = digest_parts(["alice", "10.0.0.1", "Mozilla/5.0"]);
        let b = digest_parts(["alice", "10.0.0.1", "Mozilla/5.0"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_digest_order_matters() {
        let a = digest_parts(["one", "two"]);
        let b = digest_parts(["two", "one"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_digest_boundaries_unambiguous() {
        let a = digest_parts(["ab", "c"]);
        let b = digest_parts(["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_digest_empty_sequence() {
        let no_parts: [&str; 0] = [];
        let empty = digest_parts(no_parts);
        let one = digest_parts([""]);
        assert_ne!(empty, one);
    }
}
