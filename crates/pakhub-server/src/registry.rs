//! In-memory patch registry.
//!
//! The registry is the single source of truth for patch content while the
//! server runs. It is owned by the event-loop thread and accessed without
//! locks; the persistence worker only ever sees refcounted payload clones
//! handed to it through the cache channel.

use pakhub_protocol::{Patch, PatchKey, PatchMeta};
use std::collections::HashMap;

/// Patches grouped by registry key.
///
/// Within one key, patch names are unique: uploading a patch whose name is
/// already present replaces that patch in place.
#[derive(Debug, Default)]
pub struct PatchRegistry {
    entries: HashMap<PatchKey, Vec<Patch>>,
}

impl PatchRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for every stored patch, across all keys.
    #[must_use]
    pub fn list(&self) -> Vec<PatchMeta> {
        self.entries
            .iter()
            .flat_map(|(key, patches)| {
                patches.iter().map(|patch| PatchMeta {
                    name: patch.name.clone(),
                    key: key.clone(),
                    size: patch.size(),
                })
            })
            .collect()
    }

    /// Clones of the patches filed under a key; empty when unknown.
    ///
    /// The clones are cheap: payload bytes are refcounted, so a response
    /// holding them stays valid even if the entry is replaced or removed
    /// mid-send.
    #[must_use]
    pub fn get(&self, key: &PatchKey) -> Vec<Patch> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    /// Store patches under a key, replacing same-named entries in place
    /// and appending the rest. Returns metadata for the uploaded set.
    ///
    /// An empty set is a no-op: no key entry is created for it.
    pub fn upsert(&mut self, key: PatchKey, patches: Vec<Patch>) -> Vec<PatchMeta> {
        if patches.is_empty() {
            return Vec::new();
        }
        let metas: Vec<PatchMeta> = patches
            .iter()
            .map(|patch| PatchMeta {
                name: patch.name.clone(),
                key: key.clone(),
                size: patch.size(),
            })
            .collect();

        let bucket = self.entries.entry(key).or_default();
        for patch in patches {
            match bucket.iter_mut().find(|p| p.name == patch.name) {
                Some(existing) => *existing = patch,
                None => bucket.push(patch),
            }
        }
        metas
    }

    /// Remove every patch under a key. Returns the removed patches; empty
    /// when the key was unknown. Key entries never linger empty.
    pub fn remove(&mut self, key: &PatchKey) -> Vec<Patch> {
        self.entries.remove(key).unwrap_or_default()
    }

    /// Total number of stored patches, across all keys.
    #[must_use]
    pub fn patch_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Number of distinct keys with at least one patch.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }
}
