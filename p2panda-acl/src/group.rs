// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::convert::Infallible;

use tracing::{debug, warn};

use crate::check::CheckOptions;
use crate::traits::GroupFetcher;

/// Membership roster of a group principal.
///
/// Listings are fetched when an access check needs them and are not modified afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupListing {
    id: String,
    uid: Option<String>,
    members: BTreeSet<String>,
}

impl GroupListing {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Attach an opaque label to this listing.
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    /// Returns `true` if the member was not listed yet.
    pub fn add_member(&mut self, member_id: impl Into<String>) -> bool {
        self.members.insert(member_id.into())
    }

    /// Identifiers are compared case-sensitively.
    pub fn has_member(&self, member_id: &str) -> bool {
        self.members.contains(member_id)
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Load the listing of a group with the given fetcher.
    ///
    /// Failing to fetch a listing is not an error: `None` is returned and the group is treated as
    /// having no members, which denies access through it.
    pub async fn load_from<F>(group_id: &str, fetcher: &F, options: &CheckOptions) -> Option<Self>
    where
        F: GroupFetcher,
    {
        match fetcher.fetch_group(group_id, options).await {
            Ok(Some(listing)) => {
                debug!(group_id, members = listing.len(), "loaded group listing");
                Some(listing)
            }
            Ok(None) => {
                debug!(group_id, "group listing not found");
                None
            }
            Err(err) => {
                warn!(group_id, %err, "failed fetching group listing");
                None
            }
        }
    }
}

/// Fetcher for callers without access to group listings, every group appears empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoGroupFetcher;

impl GroupFetcher for NoGroupFetcher {
    type Error = Infallible;

    async fn fetch_group(
        &self,
        _group_id: &str,
        _options: &CheckOptions,
    ) -> Result<Option<GroupListing>, Self::Error> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use crate::check::CheckOptions;
    use crate::test_utils::{FailingFetcher, StaticFetcher};

    use super::{GroupListing, NoGroupFetcher};

    const TEAM: &str = "https://example.org/groups#team";

    #[test]
    fn membership() {
        let mut listing = GroupListing::new(TEAM).with_uid("team");
        assert!(listing.is_empty());
        assert!(listing.add_member("https://bob.example/#me"));
        assert!(!listing.add_member("https://bob.example/#me"));

        assert_eq!(listing.id(), TEAM);
        assert_eq!(listing.uid(), Some("team"));
        assert_eq!(listing.len(), 1);
        assert!(listing.has_member("https://bob.example/#me"));
        assert!(!listing.has_member("https://BOB.example/#me"));
        assert!(!listing.has_member("https://carol.example/#me"));
    }

    #[tokio::test]
    async fn load_listing() {
        let mut listing = GroupListing::new(TEAM);
        listing.add_member("https://bob.example/#me");
        let fetcher = StaticFetcher::from_listings([listing.clone()]);

        let loaded = GroupListing::load_from(TEAM, &fetcher, &CheckOptions::default()).await;
        assert_eq!(loaded, Some(listing));

        let missing = GroupListing::load_from(
            "https://example.org/groups#other",
            &fetcher,
            &CheckOptions::default(),
        )
        .await;
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn fetch_failures_are_absent() {
        let loaded = GroupListing::load_from(TEAM, &FailingFetcher, &CheckOptions::default()).await;
        assert_eq!(loaded, None);

        let loaded = GroupListing::load_from(TEAM, &NoGroupFetcher, &CheckOptions::default()).await;
        assert_eq!(loaded, None);
    }
}
