// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading and writing permission sets and group listings through a [`PolicyStore`].
use std::convert::Infallible;
use std::error::Error;

use thiserror::Error;
use tracing::{debug, warn};

use crate::check::CheckOptions;
use crate::group::GroupListing;
use crate::set::PermissionSet;
use crate::traits::{Codec, Format, GroupFetcher, PolicyLocator, PolicyStore};

#[derive(Debug, Error)]
pub enum PolicyError<C, S>
where
    C: Error,
    S: Error,
{
    #[error("can not persist permission set without {0}")]
    MissingDependency(&'static str),

    #[error("{0}")]
    Codec(C),

    #[error("{0}")]
    Store(S),
}

impl PermissionSet {
    /// Serialize and store this set at its policy document url.
    pub async fn save<C, S>(
        &self,
        codec: &C,
        store: &S,
        format: Format,
    ) -> Result<(), PolicyError<C::Error, S::Error>>
    where
        C: Codec,
        S: PolicyStore,
    {
        let Some(acl_url) = self.acl_url() else {
            return Err(PolicyError::MissingDependency("policy document url"));
        };
        let document = codec.serialize(self, format).map_err(PolicyError::Codec)?;
        store
            .put(acl_url, document, format.content_type())
            .await
            .map_err(PolicyError::Store)?;
        debug!(acl_url, permissions = self.len(), "saved permission set");
        Ok(())
    }

    /// Delete the policy document of this set. Returns `false` if it did not exist.
    pub async fn clear<S>(&self, store: &S) -> Result<bool, PolicyError<Infallible, S::Error>>
    where
        S: PolicyStore,
    {
        let Some(acl_url) = self.acl_url() else {
            return Err(PolicyError::MissingDependency("policy document url"));
        };
        let deleted = store.delete(acl_url).await.map_err(PolicyError::Store)?;
        debug!(acl_url, deleted, "cleared permission set");
        Ok(deleted)
    }

    /// Load the permission set stored at a policy document url.
    pub async fn load<C, S>(
        codec: &C,
        store: &S,
        acl_url: &str,
    ) -> Result<Option<PermissionSet>, PolicyError<C::Error, S::Error>>
    where
        C: Codec,
        S: PolicyStore,
    {
        let Some(document) = store.get(acl_url).await.map_err(PolicyError::Store)? else {
            return Ok(None);
        };
        let set = codec.parse(&document, acl_url).map_err(PolicyError::Codec)?;
        Ok(Some(set))
    }

    /// Load the permission set governing a resource.
    ///
    /// Resources without their own policy document are governed by the policy of the closest
    /// container above them, only its inherited permissions apply to the resource.
    pub async fn load_nearest<C, S>(
        codec: &C,
        store: &S,
        locator: &dyn PolicyLocator,
        resource_url: &str,
    ) -> Result<Option<PermissionSet>, PolicyError<C::Error, S::Error>>
    where
        C: Codec,
        S: PolicyStore,
    {
        let mut candidate = Some(resource_url);
        while let Some(url) = candidate {
            let acl_url = locator.policy_url_for(url);
            if let Some(set) = Self::load(codec, store, &acl_url).await? {
                debug!(resource_url, %acl_url, "found policy document");
                return Ok(Some(set));
            }
            candidate = parent_container(url);
        }

        debug!(resource_url, "no policy document found");
        Ok(None)
    }
}

/// Url of the container holding a resource, `None` for the root container.
pub fn parent_container(url: &str) -> Option<&str> {
    let path_start = url.find("://").map(|index| index + 3).unwrap_or(0);
    let trimmed = url.trim_end_matches('/');
    if trimmed.len() <= path_start {
        return None;
    }
    let slash = trimmed[path_start..].rfind('/')? + path_start;
    Some(&url[..=slash])
}

/// Group fetcher reading group listing documents from a policy store.
///
/// Groups are identified by a fragment inside their listing document, e.g.
/// `https://example.org/groups#team` is listed in `https://example.org/groups`.
#[derive(Clone, Debug)]
pub struct StoreGroupFetcher<C, S> {
    codec: C,
    store: S,
}

impl<C, S> StoreGroupFetcher<C, S> {
    pub fn new(codec: C, store: S) -> Self {
        Self { codec, store }
    }
}

impl<C, S> GroupFetcher for StoreGroupFetcher<C, S>
where
    C: Codec,
    S: PolicyStore,
{
    type Error = S::Error;

    async fn fetch_group(
        &self,
        group_id: &str,
        _options: &CheckOptions,
    ) -> Result<Option<GroupListing>, Self::Error> {
        let document_url = group_id.split_once('#').map_or(group_id, |(url, _)| url);
        let Some(document) = self.store.get(document_url).await? else {
            return Ok(None);
        };

        match self.codec.parse_group_listing(&document, group_id) {
            Ok(listing) => Ok(Some(listing)),
            Err(err) => {
                warn!(group_id, %err, "malformed group listing");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parent_container;

    #[test]
    fn parent_containers() {
        assert_eq!(
            parent_container("https://example.org/docs/file1"),
            Some("https://example.org/docs/")
        );
        assert_eq!(
            parent_container("https://example.org/docs/"),
            Some("https://example.org/")
        );
        assert_eq!(parent_container("https://example.org/"), None);
        assert_eq!(parent_container("https://example.org"), None);
        assert_eq!(parent_container("/docs/file1"), Some("/docs/"));
        assert_eq!(parent_container("/docs/"), Some("/"));
        assert_eq!(parent_container("/"), None);
    }
}
