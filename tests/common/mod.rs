//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::DateTime;

use vigil::clock::ManualClock;
use vigil::content::{ContentNode, DigestIndex};
use vigil::permission::{PermissionFlag, PermissionNode, PermissionTree};
use vigil::source::{ContentSource, PermissionSource, SourceError};
use vigil::{Vigil, VigilConfig};

pub const CHROME_WIN: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";
pub const FIREFOX_LINUX: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:127.0) Gecko/20100101 Firefox/127.0";

/// Permission source backed by a breadcrumb -> tree map.
pub struct MapPermissionSource {
    grants: Mutex<HashMap<String, PermissionTree>>,
    fetch_count: AtomicU64,
    failing: AtomicBool,
}

impl MapPermissionSource {
    pub fn new() -> Self {
        Self {
            grants: Mutex::new(HashMap::new()),
            fetch_count: AtomicU64::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Set the tree returned for a breadcrumb.
    pub fn grant(&self, breadcrumb: &str, tree: PermissionTree) {
        self.grants
            .lock()
            .expect("grants lock")
            .insert(breadcrumb.to_string(), tree);
    }

    /// Drop all grants for a breadcrumb (subsequent fetches see an empty
    /// tree).
    pub fn revoke(&self, breadcrumb: &str) {
        self.grants.lock().expect("grants lock").remove(breadcrumb);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// How many times the backend was actually consulted.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

impl PermissionSource for MapPermissionSource {
    fn fetch_permissions(&self, breadcrumb: &str) -> Result<PermissionTree, SourceError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::new("permission backend offline"));
        }
        Ok(self
            .grants
            .lock()
            .expect("grants lock")
            .get(breadcrumb)
            .cloned()
            .unwrap_or_else(PermissionTree::empty))
    }
}

/// Content source with editable hierarchies and digests.
pub struct MemoryContentSource {
    hierarchies: Mutex<HashMap<String, ContentNode>>,
    digests: Mutex<HashMap<String, DigestIndex>>,
    failing: AtomicBool,
}

impl MemoryContentSource {
    pub fn new() -> Self {
        Self {
            hierarchies: Mutex::new(HashMap::new()),
            digests: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Store the hierarchy served under a metadata key
    /// (`"<project>:<variant>"`).
    pub fn set_hierarchy(&self, metadata_key: &str, tree: ContentNode) {
        self.hierarchies
            .lock()
            .expect("hierarchies lock")
            .insert(metadata_key.to_string(), tree);
    }

    /// Set one content record's digest, as an editor saving would.
    pub fn set_digest(&self, project_id: &str, content_ref: &str, digest: &str) {
        self.digests
            .lock()
            .expect("digests lock")
            .entry(project_id.to_string())
            .or_default()
            .insert(content_ref.to_string(), digest.to_string());
    }

    /// Remove a record's digest, leaving the hierarchy dangling.
    pub fn remove_digest(&self, project_id: &str, content_ref: &str) {
        if let Some(index) = self
            .digests
            .lock()
            .expect("digests lock")
            .get_mut(project_id)
        {
            index.remove(content_ref);
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl ContentSource for MemoryContentSource {
    fn hierarchy(&self, metadata_key: &str) -> Result<ContentNode, SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::new("content backend offline"));
        }
        self.hierarchies
            .lock()
            .expect("hierarchies lock")
            .get(metadata_key)
            .cloned()
            .ok_or_else(|| SourceError::new(format!("no hierarchy under '{}'", metadata_key)))
    }

    fn content_digests(&self, project_id: &str) -> Result<DigestIndex, SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::new("content backend offline"));
        }
        Ok(self
            .digests
            .lock()
            .expect("digests lock")
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Everything a scenario needs, wired together with a manual clock.
pub struct TestBed {
    pub vigil: Vigil,
    pub permissions: Arc<MapPermissionSource>,
    pub content: Arc<MemoryContentSource>,
    pub clock: Arc<ManualClock>,
}

pub fn test_bed(config: VigilConfig) -> TestBed {
    let permissions = Arc::new(MapPermissionSource::new());
    let content = Arc::new(MemoryContentSource::new());
    let clock = Arc::new(ManualClock::starting_at(
        DateTime::from_timestamp_millis(1_717_200_000_000).expect("valid timestamp"),
    ));
    let vigil = Vigil::new(
        config,
        permissions.clone(),
        content.clone(),
        clock.clone(),
    );
    TestBed {
        vigil,
        permissions,
        content,
        clock,
    }
}

pub fn default_bed() -> TestBed {
    test_bed(VigilConfig::default())
}

/// Tree granting view (plus edit) on a path.
pub fn viewer_tree(path: &str) -> PermissionTree {
    PermissionTree::new(vec![PermissionNode::new(
        path,
        [PermissionFlag::View, PermissionFlag::Edit],
    )])
}

/// Tree granting edit only, no view.
pub fn editor_only_tree(path: &str) -> PermissionTree {
    PermissionTree::new(vec![PermissionNode::new(path, [PermissionFlag::Edit])])
}

/// A small two-chapter hierarchy rooted at "all", with its digests
/// installed for `project_id`.
pub fn seed_project(bed: &TestBed, project_id: &str, variant: &str) {
    let tree = ContentNode::with_children(
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
    );
    bed.content
        .set_hierarchy(&format!("{}:{}", project_id, variant), tree);
    for (content_ref, digest) in [
        ("ref-root", "d-root-1"),
        ("ref-ch1", "d-ch1-1"),
        ("ref-p1", "d-p1-1"),
        ("ref-ch2", "d-ch2-1"),
    ] {
        bed.content.set_digest(project_id, content_ref, digest);
    }
}
