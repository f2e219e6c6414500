// SPDX-License-Identifier: MIT OR Apache-2.0

//! Index of grant keys by principal, scope and resource.
use std::collections::{BTreeMap, HashMap};

use crate::permission::{AccessType, IdentityKey};

/// Maps `principal id -> access type -> resource url -> identity key`.
///
/// The index only holds keys, the permissions themselves live in the owning
/// [`PermissionSet`](crate::PermissionSet) which keeps both in sync.
#[derive(Clone, Debug, Default)]
pub struct PermissionIndex {
    entries: HashMap<String, HashMap<AccessType, BTreeMap<String, IdentityKey>>>,
}

impl PermissionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a key. Inserting the same key again has no effect.
    pub fn insert(&mut self, key: &IdentityKey) {
        self.entries
            .entry(key.principal.id().to_string())
            .or_default()
            .entry(key.access_type)
            .or_default()
            .insert(key.resource_url.clone(), key.clone());
    }

    /// Remove a key, pruning empty branches. Returns `true` if the key was indexed.
    pub fn remove(&mut self, key: &IdentityKey) -> bool {
        let principal_id = key.principal.id();
        let Some(by_type) = self.entries.get_mut(principal_id) else {
            return false;
        };
        let Some(by_resource) = by_type.get_mut(&key.access_type) else {
            return false;
        };
        let removed = by_resource.remove(&key.resource_url).is_some();

        if by_resource.is_empty() {
            by_type.remove(&key.access_type);
        }
        if by_type.is_empty() {
            self.entries.remove(principal_id);
        }
        removed
    }

    /// Exact lookup.
    pub fn lookup(
        &self,
        principal_id: &str,
        access_type: AccessType,
        resource_url: &str,
    ) -> Option<&IdentityKey> {
        self.entries
            .get(principal_id)?
            .get(&access_type)?
            .get(resource_url)
    }

    /// Find the key of the grant which applies to a resource for a principal.
    ///
    /// A direct grant on exactly this resource wins. Otherwise the inherited grant with the most
    /// specific container url being a prefix of the resource url is selected, equal lengths are
    /// resolved by picking the lexicographically greatest url.
    pub fn find_applicable(&self, principal_id: &str, resource_url: &str) -> Option<&IdentityKey> {
        if let Some(key) = self.lookup(principal_id, AccessType::Direct, resource_url) {
            return Some(key);
        }

        self.entries
            .get(principal_id)?
            .get(&AccessType::Inherited)?
            .iter()
            .filter(|(container_url, _)| resource_url.starts_with(container_url.as_str()))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            .map(|(_, key)| key)
    }

    /// Identifiers of all indexed principals.
    pub fn principal_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn contains_principal(&self, principal_id: &str) -> bool {
        self.entries.contains_key(principal_id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
