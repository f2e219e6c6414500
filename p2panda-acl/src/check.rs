// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access checks against a permission set.
use futures_util::future::join_all;
use tracing::{debug, trace};

use crate::group::GroupListing;
use crate::mode::AccessMode;
use crate::permission::{IdentityKey, Permission};
use crate::principal::EVERYONE;
use crate::set::PermissionSet;
use crate::traits::GroupFetcher;

/// Request context of an access check.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Only grant cross-origin requests if the matching permission lists the request origin.
    pub strict_origin: bool,

    /// Origin the request was made from.
    pub origin: Option<String>,

    /// Host serving the resource. Requests from this origin are same-origin requests.
    pub host: Option<String>,
}

impl CheckOptions {
    pub fn strict(mut self) -> Self {
        self.strict_origin = true;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Origin a matching permission needs to list, `None` if the request passes without one.
    fn required_origin(&self) -> Option<&str> {
        if !self.strict_origin {
            return None;
        }
        let origin = self.origin.as_deref()?;
        if self.host.as_deref() == Some(origin) {
            return None;
        }
        Some(origin)
    }
}

fn origin_allowed(permission: &Permission, options: &CheckOptions) -> bool {
    options
        .required_origin()
        .is_none_or(|origin| permission.allows_origin(origin))
}

impl PermissionSet {
    /// Decide if an agent may access a resource with the requested mode.
    ///
    /// Public grants are checked first, then grants to the agent itself and finally grants to
    /// groups. Group listings which are not loaded yet are fetched concurrently and kept for later
    /// checks. A listing which can not be fetched denies access through its group but does not
    /// fail the check. Anonymous requests (without agent) are only granted through public grants.
    pub async fn check_access<F>(
        &mut self,
        resource_url: &str,
        agent_id: Option<&str>,
        mode: AccessMode,
        options: &CheckOptions,
        fetcher: &F,
    ) -> bool
    where
        F: GroupFetcher,
    {
        if self.check_access_local(resource_url, agent_id, mode, options) {
            return true;
        }

        let Some(agent_id) = agent_id else {
            debug!(resource_url, %mode, "anonymous access denied");
            return false;
        };

        if !self.has_groups() {
            debug!(resource_url, agent_id, %mode, "access denied");
            return false;
        }

        self.load_groups(fetcher, options).await;

        let granted = self.check_group_access(resource_url, agent_id, mode, options);
        debug!(resource_url, agent_id, %mode, granted, "checked group access");
        granted
    }

    /// Check public grants and grants to the agent itself.
    ///
    /// This never performs any I/O, group grants are only considered by
    /// [`PermissionSet::check_access`].
    pub fn check_access_local(
        &self,
        resource_url: &str,
        agent_id: Option<&str>,
        mode: AccessMode,
        options: &CheckOptions,
    ) -> bool {
        if let Some(key) = self.by_group.find_applicable(EVERYONE, resource_url) {
            if self.grants(key).any(|permission| permission.allows(mode)) {
                debug!(resource_url, %mode, "access granted to everyone");
                return true;
            }
        }

        let Some(agent_id) = agent_id else {
            return false;
        };
        if let Some(key) = self.by_agent.find_applicable(agent_id, resource_url) {
            if self.key_allows(key, mode, options) {
                debug!(resource_url, agent_id, %mode, "access granted to agent");
                return true;
            }
        }

        false
    }

    fn check_group_access(
        &self,
        resource_url: &str,
        agent_id: &str,
        mode: AccessMode,
        options: &CheckOptions,
    ) -> bool {
        self.group_ids().into_iter().any(|group_id| {
            let is_member = self
                .groups
                .get(group_id)
                .is_some_and(|listing| listing.has_member(agent_id));
            if !is_member {
                return false;
            }

            let Some(key) = self.by_group.find_applicable(group_id, resource_url) else {
                return false;
            };
            let allowed = self.key_allows(key, mode, options);
            trace!(group_id, agent_id, allowed, "checked group grant");
            allowed
        })
    }

    fn key_allows(&self, key: &IdentityKey, mode: AccessMode, options: &CheckOptions) -> bool {
        self.grants(key)
            .any(|permission| permission.allows(mode) && origin_allowed(permission, options))
    }

    /// Fetch all group listings not loaded yet.
    ///
    /// Loads run concurrently, every listing is stored under its own group id once all of them
    /// completed. Listings which could not be fetched are not stored and fetched again on the
    /// next check.
    async fn load_groups<F>(&mut self, fetcher: &F, options: &CheckOptions)
    where
        F: GroupFetcher,
    {
        let missing: Vec<String> = self
            .group_ids()
            .into_iter()
            .filter(|group_id| !self.groups.contains_key(*group_id))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            return;
        }

        trace!(groups = missing.len(), "loading group listings");
        let loads = missing
            .iter()
            .map(|group_id| GroupListing::load_from(group_id, fetcher, options));
        let listings = join_all(loads).await;

        for (group_id, listing) in missing.into_iter().zip(listings) {
            if let Some(listing) = listing {
                self.groups.insert(group_id, listing);
            }
        }
    }
}
