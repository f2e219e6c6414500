// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces to the collaborators of a permission set: the codec reading and writing policy
//! documents, the store holding them and the fetcher resolving group listings.
use std::error::Error;
use std::fmt::Debug;

use crate::check::CheckOptions;
use crate::group::GroupListing;
use crate::set::PermissionSet;

/// Serialization format of a policy document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Cbor,
    Json,
}

impl Format {
    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Cbor => "application/cbor",
            Format::Json => "application/json",
        }
    }

    /// Detect the format of a document from its first byte.
    ///
    /// Documents are always maps, JSON ones start with an opening brace (after optional
    /// whitespace) which is never the first byte of a CBOR map.
    pub fn detect(document: &[u8]) -> Self {
        match document.iter().find(|byte| !byte.is_ascii_whitespace()) {
            Some(b'{') => Format::Json,
            _ => Format::Cbor,
        }
    }
}

/// Converts policy documents from and to permission sets.
pub trait Codec {
    type Error: Error;

    /// Parse a policy document located at `base_url` into a permission set.
    fn parse(&self, document: &[u8], base_url: &str) -> Result<PermissionSet, Self::Error>;

    /// Serialize all valid, non-virtual permissions of a set.
    ///
    /// Parsing the output again must result in an equal permission set.
    fn serialize(&self, set: &PermissionSet, format: Format) -> Result<Vec<u8>, Self::Error>;

    /// Parse a group listing document.
    fn parse_group_listing(
        &self,
        document: &[u8],
        group_id: &str,
    ) -> Result<GroupListing, Self::Error>;

    fn serialize_group_listing(
        &self,
        listing: &GroupListing,
        format: Format,
    ) -> Result<Vec<u8>, Self::Error>;
}

/// Resolves group identifiers to their membership listings.
pub trait GroupFetcher {
    type Error: Error;

    /// Fetch the listing of a group.
    ///
    /// Implementations should return `Ok(None)` when the listing does not exist or can not be
    /// understood. Errors are reserved for failures of the underlying transport.
    fn fetch_group(
        &self,
        group_id: &str,
        options: &CheckOptions,
    ) -> impl Future<Output = Result<Option<GroupListing>, Self::Error>>;
}

/// Storage for policy (and group listing) documents, addressed by url.
pub trait PolicyStore {
    type Error: Error;

    /// Returns the document stored at the url or `None` if it does not exist.
    fn get(&self, url: &str) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>>;

    /// Stores a document, replacing any previous one at the same url.
    fn put(
        &self,
        url: &str,
        document: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Removes a document. Returns `true` if a document was removed and `false` if it did not
    /// exist.
    fn delete(&self, url: &str) -> impl Future<Output = Result<bool, Self::Error>>;
}

/// Maps resources to the url of the policy document governing them.
pub trait PolicyLocator: Debug + Send + Sync {
    /// Url of the policy document of a resource. Policy documents map to themselves.
    fn policy_url_for(&self, resource_url: &str) -> String;

    /// Returns true if the url points at a policy document.
    fn is_policy_url(&self, url: &str) -> bool;
}
