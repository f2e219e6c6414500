// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::{debug, trace};

use crate::config::PermissionSetConfig;
use crate::group::GroupListing;
use crate::index::PermissionIndex;
use crate::mode::{AccessMode, AccessModes};
use crate::permission::{AccessType, IdentityKey, Permission, PermissionError};
use crate::principal::{EVERYONE, Principal, is_mail_alias};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionSetError {
    #[error("permission set has no resource url")]
    MissingResource,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error(transparent)]
    Permission(#[from] PermissionError),
}

/// Kind of resource a permission set governs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResourceType {
    #[default]
    Resource,

    /// Permissions added to containers are inherited by all resources below them.
    Container,
}

/// All permissions declared by the policy of one resource.
///
/// Every permission is stored once per identity key, adding a permission for an existing key
/// merges both. Agent and group permissions are indexed by principal so the permission which
/// applies to a resource can be found without scanning the whole set.
///
/// Granting `Control` implies full access to the policy document of the resource. For every such
/// grant the set keeps a "virtual" permission on the policy document, these take part in access
/// checks but are never exported.
#[derive(Clone, Debug)]
pub struct PermissionSet {
    resource_url: Option<String>,
    acl_url: Option<String>,
    resource_type: ResourceType,

    /// Explicitly granted permissions.
    permissions: BTreeMap<IdentityKey, Permission>,

    /// Permissions implied by `Control` grants.
    implied: BTreeMap<IdentityKey, Permission>,

    pub(crate) by_agent: PermissionIndex,

    /// Group and public grants, the latter indexed under the `EVERYONE` identifier.
    pub(crate) by_group: PermissionIndex,

    /// Group listings loaded during access checks.
    pub(crate) groups: HashMap<String, GroupListing>,

    config: PermissionSetConfig,
}

impl PermissionSet {
    /// Permission set for a resource, with its policy document located next to it.
    pub fn new(resource_url: impl Into<String>, resource_type: ResourceType) -> Self {
        Self::from_config(PermissionSetConfig::default()).with_resource(resource_url, resource_type)
    }

    /// Empty permission set without a resource.
    pub fn from_config(config: PermissionSetConfig) -> Self {
        Self {
            resource_url: None,
            acl_url: None,
            resource_type: ResourceType::default(),
            permissions: BTreeMap::new(),
            implied: BTreeMap::new(),
            by_agent: PermissionIndex::new(),
            by_group: PermissionIndex::new(),
            groups: HashMap::new(),
            config,
        }
    }

    /// Set the governed resource. The policy document url is derived from it unless it was set
    /// before.
    pub fn with_resource(
        mut self,
        resource_url: impl Into<String>,
        resource_type: ResourceType,
    ) -> Self {
        let resource_url = resource_url.into();
        if self.acl_url.is_none() {
            self.acl_url = Some(self.config.locator.policy_url_for(&resource_url));
        }
        self.resource_url = Some(resource_url);
        self.resource_type = resource_type;
        self
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }

    /// Set the url of the policy document this set is read from and written to.
    pub fn with_acl_url(mut self, acl_url: impl Into<String>) -> Self {
        self.acl_url = Some(acl_url.into());
        self
    }

    pub fn resource_url(&self) -> Option<&str> {
        self.resource_url.as_deref()
    }

    pub fn acl_url(&self) -> Option<&str> {
        self.acl_url.as_deref()
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn config(&self) -> &PermissionSetConfig {
        &self.config
    }

    /// Scope of permissions added through this set.
    pub fn default_access_type(&self) -> AccessType {
        match self.resource_type {
            ResourceType::Resource => AccessType::Direct,
            ResourceType::Container => AccessType::Inherited,
        }
    }

    /// Grant access modes on the resource of this set to an agent.
    ///
    /// Modes are added to an existing permission for the same agent. Granting to the "everyone"
    /// identifier is a public grant.
    pub fn add_permission(
        &mut self,
        agent_id: &str,
        modes: impl IntoIterator<Item = AccessMode>,
        origins: &[&str],
    ) -> Result<&mut Self, PermissionSetError> {
        if agent_id.is_empty() {
            return Err(PermissionSetError::InvalidArgument("agent id is empty"));
        }
        if is_mail_alias(agent_id) {
            return Err(PermissionSetError::InvalidArgument(
                "mail aliases can not be granted access",
            ));
        }
        self.grant(Principal::agent(agent_id), modes, origins)
    }

    /// Grant access modes on the resource of this set to all members of a group.
    pub fn add_group_permission(
        &mut self,
        group_id: &str,
        modes: impl IntoIterator<Item = AccessMode>,
    ) -> Result<&mut Self, PermissionSetError> {
        if group_id.is_empty() {
            return Err(PermissionSetError::InvalidArgument("group id is empty"));
        }
        self.grant(Principal::group(group_id), modes, &[])
    }

    /// Grant access modes on the resource of this set to everyone.
    pub fn add_public_permission(
        &mut self,
        modes: impl IntoIterator<Item = AccessMode>,
    ) -> Result<&mut Self, PermissionSetError> {
        self.grant(Principal::Public, modes, &[])
    }

    fn grant(
        &mut self,
        principal: Principal,
        modes: impl IntoIterator<Item = AccessMode>,
        origins: &[&str],
    ) -> Result<&mut Self, PermissionSetError> {
        let Some(resource_url) = &self.resource_url else {
            return Err(PermissionSetError::MissingResource);
        };
        let modes = AccessModes::from_iter(modes);
        if modes.is_empty() {
            return Err(PermissionSetError::InvalidArgument("no access modes given"));
        }

        let mut permission = Permission::new(resource_url.clone(), self.default_access_type());
        permission.set_principal(principal)?;
        permission.add_modes(modes.iter());
        for origin in origins {
            permission.add_origin(*origin);
        }

        self.add_authorization(permission)?;
        Ok(self)
    }

    /// Insert a permission, merging it with an existing one with the same identity key.
    pub fn add_authorization(&mut self, permission: Permission) -> Result<(), PermissionSetError> {
        let key = permission.identity_key()?;
        if permission.is_empty() {
            return Err(PermissionSetError::InvalidArgument(
                "permission grants no access modes",
            ));
        }

        let collection = if permission.is_virtual() {
            &mut self.implied
        } else {
            &mut self.permissions
        };
        let merged = match collection.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let existing = entry.into_mut();
                existing.merge_with(&permission)?;
                existing
            }
            Entry::Vacant(entry) => entry.insert(permission),
        };
        trace!(%key, modes = %merged.modes(), "added permission");

        let implies_control = !merged.is_virtual() && merged.allows_control();
        let origins: Vec<String> = merged.origins().map(str::to_string).collect();
        self.index_mut(&key.principal).insert(&key);

        if implies_control {
            self.imply_control(&key, origins)?;
        }
        Ok(())
    }

    /// Synthesize full access to the policy document for a principal holding `Control`.
    fn imply_control(
        &mut self,
        key: &IdentityKey,
        origins: Vec<String>,
    ) -> Result<(), PermissionSetError> {
        let policy_url = self.config.locator.policy_url_for(&key.resource_url);
        debug!(%key, %policy_url, "implied control permission");
        let mut permission = Permission::new_virtual(policy_url, key.principal.clone());
        permission.add_modes(AccessMode::ALL);
        for origin in origins {
            permission.add_origin(origin);
        }
        self.add_authorization(permission)
    }

    /// Remove access modes granted to an agent on the resource of this set.
    ///
    /// The permission is deleted when no mode is left. Removing modes which were never granted is
    /// a no-op.
    pub fn remove_permission(
        &mut self,
        agent_id: &str,
        modes: impl IntoIterator<Item = AccessMode>,
    ) -> Result<(), PermissionSetError> {
        if agent_id.is_empty() {
            return Err(PermissionSetError::InvalidArgument("agent id is empty"));
        }
        self.revoke(Principal::agent(agent_id), modes)
    }

    /// Remove access modes granted to a group on the resource of this set.
    pub fn remove_group_permission(
        &mut self,
        group_id: &str,
        modes: impl IntoIterator<Item = AccessMode>,
    ) -> Result<(), PermissionSetError> {
        if group_id.is_empty() {
            return Err(PermissionSetError::InvalidArgument("group id is empty"));
        }
        self.revoke(Principal::group(group_id), modes)
    }

    fn revoke(
        &mut self,
        principal: Principal,
        modes: impl IntoIterator<Item = AccessMode>,
    ) -> Result<(), PermissionSetError> {
        let Some(resource_url) = &self.resource_url else {
            return Err(PermissionSetError::MissingResource);
        };
        let key = IdentityKey {
            principal,
            resource_url: resource_url.clone(),
            access_type: self.default_access_type(),
        };

        let Some(permission) = self.permissions.get_mut(&key) else {
            return Ok(());
        };
        let had_control = permission.allows_control();
        permission.remove_modes(modes);
        let lost_control = had_control && !permission.allows_control();

        if permission.is_empty() {
            self.permissions.remove(&key);
            self.unindex_if_unused(&key);
            debug!(%key, "removed permission");
        }

        if lost_control {
            self.prune_implied(&key);
        }
        Ok(())
    }

    /// Drop the virtual policy permission derived from the given grant if no other `Control`
    /// grant of the same principal still implies it.
    fn prune_implied(&mut self, key: &IdentityKey) {
        let policy_url = self.config.locator.policy_url_for(&key.resource_url);
        let still_implied = self.permissions.iter().any(|(other, permission)| {
            other.principal == key.principal
                && permission.allows_control()
                && self.config.locator.policy_url_for(&other.resource_url) == policy_url
        });
        if still_implied {
            return;
        }

        let implied_key = IdentityKey {
            principal: key.principal.clone(),
            resource_url: policy_url,
            access_type: AccessType::Direct,
        };
        if self.implied.remove(&implied_key).is_some() {
            self.unindex_if_unused(&implied_key);
            debug!(key = %implied_key, "removed implied control permission");
        }
    }

    fn unindex_if_unused(&mut self, key: &IdentityKey) {
        if !self.permissions.contains_key(key) && !self.implied.contains_key(key) {
            self.index_mut(&key.principal).remove(key);
        }
    }

    fn index_mut(&mut self, principal: &Principal) -> &mut PermissionIndex {
        if principal.is_agent() {
            &mut self.by_agent
        } else {
            &mut self.by_group
        }
    }

    /// Explicit and implied permissions stored under a key.
    pub(crate) fn grants(&self, key: &IdentityKey) -> impl Iterator<Item = &Permission> {
        self.permissions
            .get(key)
            .into_iter()
            .chain(self.implied.get(key))
    }

    /// All explicitly granted permissions, ordered by identity key.
    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.values()
    }

    /// Permissions synthesized for `Control` grants.
    pub fn virtual_permissions(&self) -> impl Iterator<Item = &Permission> {
        self.implied.values()
    }

    /// Number of explicitly granted permissions.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// The explicit agent permission applying to a resource, if any.
    pub fn permission_for(&self, agent_id: &str, resource_url: &str) -> Option<&Permission> {
        let key = self.by_agent.find_applicable(agent_id, resource_url)?;
        self.permissions.get(key)
    }

    /// Returns true if at least one permission is granted to a group other than everyone.
    pub fn has_groups(&self) -> bool {
        self.by_group.principal_ids().any(|id| id != EVERYONE)
    }

    /// Identifiers of all groups permissions are granted to, sorted.
    pub fn group_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .by_group
            .principal_ids()
            .filter(|id| *id != EVERYONE)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Group listing loaded by a previous access check.
    pub fn cached_group(&self, group_id: &str) -> Option<&GroupListing> {
        self.groups.get(group_id)
    }

    pub fn policy_url_for(&self, resource_url: &str) -> String {
        self.config.locator.policy_url_for(resource_url)
    }

    pub fn is_policy_document(&self, url: &str) -> bool {
        self.config.locator.is_policy_url(url)
    }
}

impl Default for PermissionSet {
    fn default() -> Self {
        Self::from_config(PermissionSetConfig::default())
    }
}

/// Sets are equal when they govern the same resource with the same explicit permissions.
/// Implied permissions and loaded group listings are derived state and not compared.
impl PartialEq for PermissionSet {
    fn eq(&self, other: &Self) -> bool {
        self.resource_url == other.resource_url
            && self.acl_url == other.acl_url
            && self.resource_type == other.resource_type
            && self.permissions == other.permissions
    }
}

impl Eq for PermissionSet {}
