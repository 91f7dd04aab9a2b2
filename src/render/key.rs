//! Render cache key definitions.

use std::fmt;

/// Separator joining key segments. Project, variant, and item ids are slugs
/// that never contain it.
pub const KEY_SEPARATOR: &str = "___";

/// Cache key for one rendered fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderKey {
    /// Owning project
    pub project_id: String,
    /// Publishing channel variant (e.g. "web-en", "web-de", "epub")
    pub channel_variant_id: String,
    /// Hierarchy item, or [`crate::content::WHOLE_HIERARCHY`]
    pub item_id: String,
}

impl RenderKey {
    /// Create a new render key.
    pub fn new(project_id: &str, channel_variant_id: &str, item_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            channel_variant_id: channel_variant_id.to_string(),
            item_id: item_id.to_string(),
        }
    }

    /// Key addressing the whole hierarchy of a variant.
    pub fn whole_hierarchy(project_id: &str, channel_variant_id: &str) -> Self {
        Self::new(
            project_id,
            channel_variant_id,
            crate::content::WHOLE_HIERARCHY,
        )
    }

    /// Convert to storage key string.
    /// Format: project___variant___item
    pub fn to_storage_key(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.project_id, KEY_SEPARATOR, self.channel_variant_id, KEY_SEPARATOR, self.item_id
        )
    }

    /// Prefix matching every entry of a project, across all variants.
    pub fn project_prefix(project_id: &str) -> String {
        format!("{}{}", project_id, KEY_SEPARATOR)
    }

    /// Prefix matching every entry of one channel variant of a project.
    pub fn variant_prefix(project_id: &str, channel_variant_id: &str) -> String {
        format!(
            "{}{}{}{}",
            project_id, KEY_SEPARATOR, channel_variant_id, KEY_SEPARATOR
        )
    }
}

impl fmt::Display for RenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.project_id, self.channel_variant_id, self.item_id
        )
    }
}
