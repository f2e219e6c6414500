// SPDX-License-Identifier: MIT OR Apache-2.0

//! Policy and group listing documents encoded as [CBOR] or JSON.
//!
//! A policy document is a list of authorizations. Each authorization names any number of
//! principals, the resources it grants access to (`access_to` for the resources themselves,
//! `default` for everything inside containers) and the granted access modes:
//!
//! ```json
//! {
//!   "resource": "https://example.org/docs/",
//!   "container": true,
//!   "authorizations": [
//!     {
//!       "agents": ["https://alice.example/#me", "mailto:alice@example.org"],
//!       "default": ["https://example.org/docs/"],
//!       "modes": ["read", "write"]
//!     }
//!   ]
//! }
//! ```
//!
//! Every pair of principal and resource becomes its own [`Permission`]. `mailto:` agents are not
//! principals, they are attached as mail aliases to the permissions of their authorization. Mail
//! aliases of serialized permissions are written to a separate `mail_aliases` list which is never
//! read as principals.
//!
//! [CBOR]: https://cbor.io/
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cbor::{decode_cbor, encode_cbor};
use crate::config::PermissionSetConfig;
use crate::group::GroupListing;
use crate::mode::AccessMode;
use crate::permission::{AccessType, Permission, PermissionError};
use crate::principal::{EVERYONE, Principal, is_mail_alias};
use crate::set::{PermissionSet, PermissionSetError, ResourceType};
use crate::traits::{Codec, Format};

pub use crate::cbor::{DecodeError, EncodeError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct PolicyDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource: Option<String>,

    #[serde(default)]
    container: bool,

    #[serde(default)]
    authorizations: Vec<Authorization>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Authorization {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    agents: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    agent_classes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    groups: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    access_to: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    default: Vec<String>,

    #[serde(default)]
    modes: Vec<AccessMode>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    origins: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    mail_aliases: Vec<String>,
}

impl Authorization {
    fn from_permission(permission: &Permission) -> Option<Self> {
        let mut authorization = Authorization::default();
        match permission.principal()? {
            Principal::Agent(id) => authorization.agents.push(id.clone()),
            Principal::Group(id) => authorization.groups.push(id.clone()),
            Principal::Public => authorization.agent_classes.push(EVERYONE.to_string()),
        }
        authorization.mail_aliases = permission.mail_aliases().to_vec();

        let resource_url = permission.resource_url()?.to_string();
        match permission.access_type() {
            AccessType::Direct => authorization.access_to.push(resource_url),
            AccessType::Inherited => authorization.default.push(resource_url),
        }

        authorization.modes = permission.modes().iter().collect();
        authorization.origins = permission.origins().map(str::to_string).collect();
        Some(authorization)
    }

    fn into_permissions(self) -> Result<Vec<Permission>, PermissionError> {
        let (mailto_agents, agents): (Vec<String>, Vec<String>) = self
            .agents
            .into_iter()
            .partition(|agent| is_mail_alias(agent));
        let mail_aliases: Vec<String> = self
            .mail_aliases
            .into_iter()
            .chain(mailto_agents)
            .collect();

        let principals: Vec<Principal> = agents
            .into_iter()
            .map(Principal::agent)
            .chain(
                self.agent_classes
                    .into_iter()
                    .chain(self.groups)
                    .map(Principal::group),
            )
            .collect();

        let resources = self
            .access_to
            .into_iter()
            .map(|url| (url, AccessType::Direct))
            .chain(self.default.into_iter().map(|url| (url, AccessType::Inherited)));

        let mut permissions = Vec::new();
        for (resource_url, access_type) in resources {
            for principal in &principals {
                let mut permission = Permission::new(resource_url.clone(), access_type);
                permission.set_principal(principal.clone())?;
                permission.add_modes(self.modes.iter().copied());
                for origin in &self.origins {
                    permission.add_origin(origin.clone());
                }
                for alias in &mail_aliases {
                    permission.add_mail_alias(alias.clone());
                }
                permissions.push(permission);
            }
        }
        Ok(permissions)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GroupDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    uid: Option<String>,

    #[serde(default)]
    members: Vec<String>,
}

/// Codec for policy documents in CBOR or JSON format.
///
/// The format of a document is detected when parsing. Parsed permission sets use the
/// configuration of the codec.
#[derive(Clone, Debug, Default)]
pub struct DocumentCodec {
    config: PermissionSetConfig,
}

impl DocumentCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: PermissionSetConfig) -> Self {
        Self { config }
    }

    fn decode<T: for<'a> Deserialize<'a>>(document: &[u8]) -> Result<T, CodecError> {
        match Format::detect(document) {
            Format::Cbor => Ok(decode_cbor(document)?),
            Format::Json => Ok(serde_json::from_slice(document)?),
        }
    }

    fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>, CodecError> {
        match format {
            Format::Cbor => Ok(encode_cbor(value)?),
            Format::Json => Ok(serde_json::to_vec_pretty(value)?),
        }
    }
}

impl Codec for DocumentCodec {
    type Error = CodecError;

    fn parse(&self, document: &[u8], base_url: &str) -> Result<PermissionSet, Self::Error> {
        let document: PolicyDocument = Self::decode(document)?;
        let resource_type = if document.container {
            ResourceType::Container
        } else {
            ResourceType::Resource
        };

        let mut set = PermissionSet::from_config(self.config.clone()).with_acl_url(base_url);
        set = match document.resource {
            Some(resource_url) => set.with_resource(resource_url, resource_type),
            None => set.with_resource_type(resource_type),
        };

        for authorization in document.authorizations {
            for permission in authorization.into_permissions()? {
                if permission.is_empty() {
                    debug!(
                        base_url,
                        resource_url = permission.resource_url(),
                        "skipping authorization without access modes"
                    );
                    continue;
                }
                set.add_authorization(permission)?;
            }
        }

        Ok(set)
    }

    fn serialize(&self, set: &PermissionSet, format: Format) -> Result<Vec<u8>, Self::Error> {
        let authorizations = set
            .permissions()
            .filter(|permission| permission.is_valid() && !permission.is_virtual())
            .filter_map(Authorization::from_permission)
            .collect();
        let document = PolicyDocument {
            resource: set.resource_url().map(str::to_string),
            container: set.resource_type() == ResourceType::Container,
            authorizations,
        };
        Self::encode(&document, format)
    }

    fn parse_group_listing(
        &self,
        document: &[u8],
        group_id: &str,
    ) -> Result<GroupListing, Self::Error> {
        let document: GroupDocument = Self::decode(document)?;
        let mut listing = GroupListing::new(group_id);
        if let Some(uid) = document.uid {
            listing = listing.with_uid(uid);
        }
        for member in document.members {
            listing.add_member(member);
        }
        Ok(listing)
    }

    fn serialize_group_listing(
        &self,
        listing: &GroupListing,
        format: Format,
    ) -> Result<Vec<u8>, Self::Error> {
        let document = GroupDocument {
            id: Some(listing.id().to_string()),
            uid: listing.uid().map(str::to_string),
            members: listing.members().map(str::to_string).collect(),
        };
        Self::encode(&document, format)
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("invalid json document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid permission in document: {0}")]
    Permission(#[from] PermissionError),

    #[error("invalid permission in document: {0}")]
    PermissionSet(#[from] PermissionSetError),
}

#[cfg(test)]
mod tests {
    use crate::check::CheckOptions;
    use crate::mode::AccessMode;
    use crate::permission::{AccessType, Permission};
    use crate::principal::Principal;
    use crate::set::{PermissionSet, ResourceType};
    use crate::traits::{Codec, Format};

    use super::{CodecError, DocumentCodec};

    const ALICE: &str = "https://alice.example/profile#me";
    const BOB: &str = "https://bob.example/profile#me";
    const TEAM: &str = "https://example.org/groups#team";
    const DOCS: &str = "https://example.org/docs/";
    const DOCS_ACL: &str = "https://example.org/docs/.acl";

    fn sample_set() -> PermissionSet {
        let mut set = PermissionSet::new(DOCS, ResourceType::Container);
        let origins = ["https://app.example"];
        set.add_permission(ALICE, [AccessMode::Read, AccessMode::Control], &origins).unwrap();
        set.add_group_permission(TEAM, [AccessMode::Write]).unwrap();
        set.add_public_permission([AccessMode::Read]).unwrap();

        let mut direct = Permission::new(DOCS, AccessType::Direct);
        direct.set_agent(BOB).unwrap();
        direct.add_mode(AccessMode::Append);
        direct.add_mail_alias("mailto:bob@example.org");
        set.add_authorization(direct).unwrap();
        set
    }

    #[test]
    fn round_trip() {
        let codec = DocumentCodec::new();
        let set = sample_set();
        assert_eq!(set.virtual_permissions().count(), 1);

        for format in [Format::Cbor, Format::Json] {
            let document = codec.serialize(&set, format).unwrap();
            let parsed = codec.parse(&document, DOCS_ACL).unwrap();
            assert_eq!(parsed, set);
            assert_eq!(parsed.len(), 4);

            // Implied permissions are derived again while parsing.
            assert_eq!(parsed.virtual_permissions().count(), 1);
        }
    }

    #[test]
    fn mail_aliases_never_grant_access() {
        let codec = DocumentCodec::new();
        let file = "https://example.org/docs/file1";
        let mut set = PermissionSet::new(file, ResourceType::Resource);
        let mut permission = Permission::new(file, AccessType::Direct);
        permission.set_agent(ALICE).unwrap();
        permission.add_mode(AccessMode::Read);
        permission.add_mail_alias("alice@example.org");
        permission.add_mail_alias("mailto:alice@example.org");
        set.add_authorization(permission).unwrap();

        for format in [Format::Json, Format::Cbor] {
            let document = codec.serialize(&set, format).unwrap();
            let parsed = codec
                .parse(&document, "https://example.org/docs/file1.acl")
                .unwrap();
            assert_eq!(parsed, set);
            assert_eq!(parsed.len(), 1);
            assert!(!parsed.check_access_local(
                file,
                Some("alice@example.org"),
                AccessMode::Read,
                &CheckOptions::default()
            ));
        }
    }

    #[test]
    fn parse_json_document() {
        let document = r#"{
            "resource": "https://example.org/docs/file1",
            "authorizations": [
                {
                    "agents": [
                        "https://alice.example/profile#me",
                        "https://bob.example/profile#me",
                        "mailto:team@example.org"
                    ],
                    "access_to": ["https://example.org/docs/file1"],
                    "default": ["https://example.org/docs/"],
                    "modes": ["read", "append"]
                },
                {
                    "agent_classes": ["http://xmlns.com/foaf/0.1/Agent"],
                    "access_to": ["https://example.org/docs/file1"],
                    "modes": ["read"]
                },
                {
                    "groups": ["http://xmlns.com/foaf/0.1/Agent"],
                    "access_to": ["https://example.org/docs/file1"],
                    "modes": ["append"]
                },
                {
                    "agents": ["https://carol.example/#me"],
                    "access_to": ["https://example.org/docs/file1"],
                    "modes": []
                }
            ]
        }"#;

        let set = DocumentCodec::new()
            .parse(document.as_bytes(), "https://example.org/docs/file1.acl")
            .unwrap();
        assert_eq!(set.resource_url(), Some("https://example.org/docs/file1"));
        assert_eq!(set.acl_url(), Some("https://example.org/docs/file1.acl"));
        assert_eq!(set.resource_type(), ResourceType::Resource);

        // Two agents times two resources, plus one merged public permission.
        assert_eq!(set.len(), 5);

        let alice = set
            .permission_for(ALICE, "https://example.org/docs/file1")
            .unwrap();
        assert_eq!(alice.access_type(), AccessType::Direct);
        assert_eq!(alice.mail_aliases(), ["mailto:team@example.org".to_string()]);

        let inherited = set
            .permission_for(BOB, "https://example.org/docs/file2")
            .unwrap();
        assert!(inherited.is_inherited());
        assert!(inherited.allows_append());

        let public = set
            .permissions()
            .find(|permission| permission.principal() == Some(&Principal::Public))
            .unwrap();
        assert!(public.allows_read());
        assert!(public.allows_append());

        // Authorizations without modes do not grant anything.
        assert!(
            set.permission_for("https://carol.example/#me", "https://example.org/docs/file1")
                .is_none()
        );
    }

    #[test]
    fn group_listing_documents() {
        let codec = DocumentCodec::new();
        let document = r#"{ "uid": "team", "members": ["https://bob.example/profile#me"] }"#;
        let listing = codec.parse_group_listing(document.as_bytes(), TEAM).unwrap();
        assert_eq!(listing.id(), TEAM);
        assert_eq!(listing.uid(), Some("team"));
        assert!(listing.has_member(BOB));

        let bytes = codec.serialize_group_listing(&listing, Format::Cbor).unwrap();
        assert_eq!(codec.parse_group_listing(&bytes, TEAM).unwrap(), listing);
    }

    #[test]
    fn malformed_documents() {
        let codec = DocumentCodec::new();
        assert!(matches!(
            codec.parse(b"{ not json", DOCS_ACL),
            Err(CodecError::Json(_))
        ));
        assert!(matches!(
            codec.parse(&[0xff, 0x00], DOCS_ACL),
            Err(CodecError::Decode(_))
        ));
        assert!(matches!(
            codec.parse(br#"{ "authorizations": [{ "modes": ["delete"] }] }"#, DOCS_ACL),
            Err(CodecError::Json(_))
        ));
    }
}
