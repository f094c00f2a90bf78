//! Patch data model and registry key addressing.

use bytes::Bytes;
use std::fmt;

/// Revision number identifying one build of a platform.
pub type Revision = u32;

/// One named binary artifact filed under a registry key.
///
/// The payload is a [`Bytes`] handle: the registry is the long-term owner
/// and in-flight responses hold cheap refcounted clones, so a patch
/// replaced mid-send stays alive until the last send referencing it
/// completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Patch file name, unique within one registry key
    pub name: String,
    /// Raw patch content
    pub data: Bytes,
}

impl Patch {
    /// Create a patch from a name and its raw content.
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Registry key: the platform and revision a bucket of patches is filed
/// under. Equality and hashing are structural.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PatchKey {
    /// Platform name (e.g. "WindowsClient")
    pub platform: String,
    /// Build revision
    pub revision: Revision,
}

impl PatchKey {
    /// Create a key from a platform name and revision.
    pub fn new(platform: impl Into<String>, revision: Revision) -> Self {
        Self {
            platform: platform.into(),
            revision,
        }
    }

    /// Cache subdirectory name for this key: `<platform>_<revision>`.
    #[must_use]
    pub fn cache_dir_name(&self) -> String {
        format!("{}_{}", self.platform, self.revision)
    }

    /// Parse a key back out of a cache subdirectory name.
    ///
    /// The revision is the suffix after the last underscore, so platform
    /// names may themselves contain underscores. Returns `None` for names
    /// that do not fit the layout.
    #[must_use]
    pub fn parse_cache_dir_name(name: &str) -> Option<Self> {
        let (platform, revision) = name.rsplit_once('_')?;
        if platform.is_empty() {
            return None;
        }
        let revision = revision.parse().ok()?;
        Some(Self::new(platform, revision))
    }
}

impl fmt::Display for PatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.platform, self.revision)
    }
}

/// Patch metadata without payload, as returned by list operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchMeta {
    /// Patch file name
    pub name: String,
    /// Key the patch is filed under
    pub key: PatchKey,
    /// Payload size in bytes
    pub size: u64,
}

/// Name and size pair echoed back by upload and delete responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSummary {
    /// Patch file name
    pub name: String,
    /// Payload size in bytes
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cache_dir_name_round_trip() {
        let key = PatchKey::new("WindowsClient", 321800);
        assert_eq!(key.cache_dir_name(), "WindowsClient_321800");
        assert_eq!(
            PatchKey::parse_cache_dir_name("WindowsClient_321800"),
            Some(key)
        );
    }

    #[test]
    fn platform_with_underscores_parses() {
        let key = PatchKey::new("wow_classic_era", 7);
        let parsed = PatchKey::parse_cache_dir_name(&key.cache_dir_name());
        assert_eq!(parsed, Some(key));
    }

    #[test]
    fn malformed_dir_names_rejected() {
        assert_eq!(PatchKey::parse_cache_dir_name("noseparator"), None);
        assert_eq!(PatchKey::parse_cache_dir_name("_42"), None);
        assert_eq!(PatchKey::parse_cache_dir_name("win_notanumber"), None);
    }

    #[test]
    fn patch_size_matches_data() {
        let patch = Patch::new("a.pak", vec![0u8; 100]);
        assert_eq!(patch.size(), 100);
    }
}
