//! Content fingerprinting.
//!
//! A fingerprint digests every content record reachable from one hierarchy
//! item (the item and all descendants). A cached render is trusted only
//! while its fingerprint equals a freshly computed one, which makes content
//! mutation self-invalidating: any edit moves a record digest, the
//! fingerprint changes, and the stale render falls out as a miss. No
//! timestamps or revision counters are involved.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::{ContentNode, DigestIndex, WHOLE_HIERARCHY};
use crate::hash;

/// Digest over the ordered content digests reachable from one item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// Fingerprint a sequence of content digests in walk order.
    pub fn from_digests<'a, I>(digests: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self(hash::digest_parts(digests))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Full digests are noisy in logs; the first 12 hex chars identify one
        write!(f, "{}", &self.0[..12.min(self.0.len())])
    }
}

/// Why a fingerprint could not be established.
#[derive(Debug, Clone, Error)]
pub enum FingerprintError {
    /// The addressed item is not present in the hierarchy snapshot
    #[error("item '{item_id}' not found in hierarchy")]
    ItemNotFound { item_id: String },

    /// The digest index lacks entries for referenced records. Signals a
    /// content-model inconsistency between hierarchy and record store.
    #[error("digest index missing {missing} of {referenced} referenced records")]
    IncompleteDigestIndex { referenced: usize, missing: usize },
}

/// Compute the fingerprint for an item within a hierarchy snapshot.
///
/// `item_id == "all"` fingerprints the whole hierarchy. References are
/// collected in walk order and deduplicated, then resolved against the
/// digest index; any unresolved reference fails the computation loudly
/// rather than producing a fingerprint that silently ignores content.
pub fn compute_fingerprint(
    hierarchy: &ContentNode,
    item_id: &str,
    digests: &DigestIndex,
) -> Result<ContentFingerprint, FingerprintError> {
    let root = if item_id == WHOLE_HIERARCHY {
        hierarchy
    } else {
        hierarchy
            .find(item_id)
            .ok_or_else(|| FingerprintError::ItemNotFound {
                item_id: item_id.to_string(),
            })?
    };

    let refs = root.collect_refs();
    let mut parts = Vec::with_capacity(refs.len());
    let mut missing = 0usize;
    for content_ref in &refs {
        match digests.get(content_ref) {
            Some(digest) => parts.push(digest.as_str()),
            None => missing += 1,
        }
    }

    if missing > 0 {
        return Err(FingerprintError::IncompleteDigestIndex {
            referenced: refs.len(),
            missing,
        });
    }

    Ok(ContentFingerprint::from_digests(parts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> ContentNode {
        ContentNode::with_children(
            "all",
            "ref-root",
            vec![
                ContentNode::with_children(
                    "chapter-1",
                    "ref-ch1",
                    vec![ContentNode::new("page-1", "ref-p1")],
                ),
                ContentNode::new("chapter-2", "ref-ch2"),
            ],
        )
    }

    fn digests() -> DigestIndex {
        [
            ("ref-root", "d-root"),
            ("ref-ch1", "d-ch1"),
            ("ref-p1", "d-p1"),
            ("ref-ch2", "d-ch2"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_stable_for_unchanged_content() {
        let a = compute_fingerprint(&tree(), "all", &digests()).unwrap();
        let b = compute_fingerprint(&tree(), "all", &digests()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_changes_when_any_descendant_changes() {
        let before = compute_fingerprint(&tree(), "chapter-1", &digests()).unwrap();

        let mut edited = digests();
        edited.insert("ref-p1".to_string(), "d-p1-edited".to_string());
        let after = compute_fingerprint(&tree(), "chapter-1", &edited).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn test_subtree_ignores_sibling_changes() {
        let before = compute_fingerprint(&tree(), "chapter-2", &digests()).unwrap();

        let mut edited = digests();
        edited.insert("ref-p1".to_string(), "d-p1-edited".to_string());
        let after = compute_fingerprint(&tree(), "chapter-2", &edited).unwrap();

        assert_eq!(before, after);

        // The whole-hierarchy fingerprint does move.
        let whole_before = compute_fingerprint(&tree(), "all", &digests()).unwrap();
        let whole_after = compute_fingerprint(&tree(), "all", &edited).unwrap();
        assert_ne!(whole_before, whole_after);
    }

    #[test]
    fn test_unknown_item_fails() {
        let err = compute_fingerprint(&tree(), "chapter-99", &digests()).unwrap_err();
        assert!(matches!(err, FingerprintError::ItemNotFound { .. }));
    }

    #[test]
    fn test_missing_digest_fails_loudly() {
        let mut incomplete = digests();
        incomplete.remove("ref-ch1");
        incomplete.remove("ref-p1");

        let err = compute_fingerprint(&tree(), "all", &incomplete).unwrap_err();
        match err {
            FingerprintError::IncompleteDigestIndex {
                referenced,
                missing,
            } => {
                assert_eq!(referenced, 4);
                assert_eq!(missing, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_hierarchy_reorder_moves_fingerprint() {
        let reordered = ContentNode::with_children(
            "all",
            "ref-root",
            vec![
                ContentNode::new("chapter-2", "ref-ch2"),
                ContentNode::with_children(
                    "chapter-1",
                    "ref-ch1",
                    vec![ContentNode::new("page-1", "ref-p1")],
                ),
            ],
        );
        let a = compute_fingerprint(&tree(), "all", &digests()).unwrap();
        let b = compute_fingerprint(&reordered, "all", &digests()).unwrap();
        assert_ne!(a, b);
    }
}
