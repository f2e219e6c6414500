// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access control lists for resources organised in containers.
//!
//! A [`PermissionSet`] holds the permissions declared by the policy document of a resource. Each
//! [`Permission`] grants a set of [`AccessMode`]s to a single agent, to the members of a group or
//! to everyone, either on the resource itself or, for containers, on everything inside of it.
//!
//! Access checks first consider public grants, then grants to the requesting agent and finally
//! grants to groups. Group listings are resolved through a [`GroupFetcher`](traits::GroupFetcher)
//! when needed.
//!
//! ```
//! use p2panda_acl::{AccessMode, CheckOptions, PermissionSet, ResourceType};
//!
//! let alice = "https://alice.example/profile#me";
//! let mut set = PermissionSet::new("https://example.org/docs/", ResourceType::Container);
//! set.add_permission(alice, [AccessMode::Read], &[]).unwrap();
//!
//! // Grants without group principals can be checked without any I/O.
//! let options = CheckOptions::default();
//! let file = "https://example.org/docs/file1";
//! assert!(set.check_access_local(file, Some(alice), AccessMode::Read, &options));
//! assert!(!set.check_access_local(file, Some(alice), AccessMode::Write, &options));
//! ```
mod cbor;
mod check;
pub mod codec;
mod config;
mod group;
mod index;
#[cfg(feature = "memory")]
mod memory;
mod mode;
mod permission;
pub mod policy;
mod principal;
mod set;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod traits;

pub use check::CheckOptions;
pub use codec::{CodecError, DocumentCodec};
pub use config::{DEFAULT_POLICY_SUFFIX, PermissionSetConfig, SuffixLocator};
pub use group::{GroupListing, NoGroupFetcher};
pub use index::PermissionIndex;
#[cfg(feature = "memory")]
pub use memory::MemoryPolicyStore;
pub use mode::{AccessMode, AccessModes, UnknownAccessMode};
pub use permission::{AccessType, IdentityKey, Permission, PermissionError};
pub use policy::{PolicyError, StoreGroupFetcher};
pub use principal::{EVERYONE, MAILTO_PREFIX, Principal, is_mail_alias};
pub use set::{PermissionSet, PermissionSetError, ResourceType};
