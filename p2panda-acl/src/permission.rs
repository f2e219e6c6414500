// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mode::{AccessMode, AccessModes};
use crate::principal::{Principal, is_mail_alias};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("can not grant to {requested}, permission is already granted to {existing}")]
    PrincipalConflict {
        existing: Principal,
        requested: Principal,
    },

    #[error("can not merge permissions with different identities: {0} and {1}")]
    IdentityMismatch(IdentityKey, IdentityKey),

    #[error("permission needs a principal and a resource url to be identified")]
    IncompleteIdentity,

    #[error("mail alias {0} can not be granted access")]
    MailAliasPrincipal(String),
}

/// Scope of a permission.
#[derive(
    Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum AccessType {
    /// Applies only to the resource itself.
    #[default]
    Direct,

    /// Applies to a container and everything below it.
    Inherited,
}

/// Identifies the logical grant a permission represents.
///
/// Two permissions with the same key are merged when added to the same set.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct IdentityKey {
    pub principal: Principal,
    pub resource_url: String,
    pub access_type: AccessType,
}

impl Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scope = match self.access_type {
            AccessType::Direct => "direct",
            AccessType::Inherited => "inherited",
        };
        write!(f, "{} on {} ({})", self.principal, self.resource_url, scope)
    }
}

/// A grant of access modes on a resource to a single principal.
///
/// Permissions are usually created through a [`PermissionSet`](crate::PermissionSet) or parsed
/// from a policy document by a [`Codec`](crate::traits::Codec). They can also be built by hand
/// and inserted with `add_authorization`.
#[derive(Clone, Debug, Default)]
pub struct Permission {
    resource_url: Option<String>,
    access_type: AccessType,
    principal: Option<Principal>,
    modes: AccessModes,
    origins: BTreeSet<String>,
    mail_aliases: Vec<String>,
    is_virtual: bool,
}

impl Permission {
    pub fn new(resource_url: impl Into<String>, access_type: AccessType) -> Self {
        Self {
            resource_url: Some(resource_url.into()),
            access_type,
            ..Default::default()
        }
    }

    /// Permission synthesized by the engine itself.
    ///
    /// Virtual permissions take part in access checks but are never exported or serialized.
    pub(crate) fn new_virtual(resource_url: impl Into<String>, principal: Principal) -> Self {
        Self {
            resource_url: Some(resource_url.into()),
            access_type: AccessType::Direct,
            principal: Some(principal),
            is_virtual: true,
            ..Default::default()
        }
    }

    pub fn resource_url(&self) -> Option<&str> {
        self.resource_url.as_deref()
    }

    pub fn access_type(&self) -> AccessType {
        self.access_type
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn modes(&self) -> &AccessModes {
        &self.modes
    }

    pub fn origins(&self) -> impl Iterator<Item = &str> {
        self.origins.iter().map(String::as_str)
    }

    pub fn mail_aliases(&self) -> &[String] {
        &self.mail_aliases
    }

    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    pub fn is_inherited(&self) -> bool {
        self.access_type == AccessType::Inherited
    }

    pub fn is_agent(&self) -> bool {
        self.principal.as_ref().is_some_and(Principal::is_agent)
    }

    /// Returns true for group grants, including public ones.
    pub fn is_group(&self) -> bool {
        self.principal.as_ref().is_some_and(Principal::is_group)
    }

    pub fn is_public(&self) -> bool {
        self.principal.as_ref().is_some_and(Principal::is_public)
    }

    /// Grant to a single agent.
    ///
    /// Granting to the "everyone" identifier is the same as calling [`Permission::set_public`].
    pub fn set_agent(&mut self, agent_id: impl Into<String>) -> Result<(), PermissionError> {
        self.set_principal(Principal::agent(agent_id))
    }

    /// Grant to all members of a group.
    pub fn set_group(&mut self, group_id: impl Into<String>) -> Result<(), PermissionError> {
        self.set_principal(Principal::group(group_id))
    }

    /// Grant to everyone.
    pub fn set_public(&mut self) -> Result<(), PermissionError> {
        self.set_principal(Principal::Public)
    }

    /// Set the principal of this permission.
    ///
    /// Agent and group principals are mutually exclusive: replacing one kind with the other fails
    /// with `PrincipalConflict`. Setting a principal of the same kind overwrites the previous one.
    ///
    /// `mailto:` identifiers are contact addresses and never principals, see
    /// [`Permission::add_mail_alias`].
    pub fn set_principal(&mut self, principal: Principal) -> Result<(), PermissionError> {
        if let Principal::Agent(id) = &principal {
            if is_mail_alias(id) {
                return Err(PermissionError::MailAliasPrincipal(id.clone()));
            }
        }
        if let Some(existing) = &self.principal {
            if existing.is_agent() != principal.is_agent() {
                return Err(PermissionError::PrincipalConflict {
                    existing: existing.clone(),
                    requested: principal,
                });
            }
        }
        self.principal = Some(principal);
        Ok(())
    }

    pub fn add_mode(&mut self, mode: AccessMode) -> &mut Self {
        self.modes.insert(mode);
        self
    }

    pub fn add_modes(&mut self, modes: impl IntoIterator<Item = AccessMode>) -> &mut Self {
        for mode in modes {
            self.modes.insert(mode);
        }
        self
    }

    pub fn remove_mode(&mut self, mode: AccessMode) -> &mut Self {
        self.modes.remove(mode);
        self
    }

    pub fn remove_modes(&mut self, modes: impl IntoIterator<Item = AccessMode>) -> &mut Self {
        for mode in modes {
            self.modes.remove(mode);
        }
        self
    }

    pub fn add_origin(&mut self, origin: impl Into<String>) -> &mut Self {
        self.origins.insert(origin.into());
        self
    }

    pub fn remove_origin(&mut self, origin: &str) -> &mut Self {
        self.origins.remove(origin);
        self
    }

    /// Attach an informal contact address, ignored when access is checked.
    pub fn add_mail_alias(&mut self, alias: impl Into<String>) -> &mut Self {
        let alias = alias.into();
        if !self.mail_aliases.contains(&alias) {
            self.mail_aliases.push(alias);
        }
        self
    }

    pub fn allows(&self, mode: AccessMode) -> bool {
        self.modes.allows(mode)
    }

    pub fn allows_read(&self) -> bool {
        self.allows(AccessMode::Read)
    }

    pub fn allows_write(&self) -> bool {
        self.allows(AccessMode::Write)
    }

    pub fn allows_append(&self) -> bool {
        self.allows(AccessMode::Append)
    }

    pub fn allows_control(&self) -> bool {
        self.allows(AccessMode::Control)
    }

    /// Returns true if the origin was explicitly listed for this permission.
    pub fn allows_origin(&self, origin: &str) -> bool {
        self.origins.contains(origin)
    }

    /// A permission is valid when it names a principal, a resource and at least one mode.
    pub fn is_valid(&self) -> bool {
        self.principal.is_some() && self.resource_url.is_some() && !self.modes.is_empty()
    }

    /// Returns true when no access mode is granted.
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn identity_key(&self) -> Result<IdentityKey, PermissionError> {
        match (&self.principal, &self.resource_url) {
            (Some(principal), Some(resource_url)) => Ok(IdentityKey {
                principal: principal.clone(),
                resource_url: resource_url.clone(),
                access_type: self.access_type,
            }),
            _ => Err(PermissionError::IncompleteIdentity),
        }
    }

    /// Merge the grants of another permission for the same principal, resource and scope into
    /// this one.
    ///
    /// Access modes, origins and mail aliases are united. Merging the same permission again has
    /// no further effect.
    pub fn merge_with(&mut self, other: &Permission) -> Result<(), PermissionError> {
        let key = self.identity_key()?;
        let other_key = other.identity_key()?;
        if key != other_key {
            return Err(PermissionError::IdentityMismatch(key, other_key));
        }

        self.modes.extend(&other.modes);
        self.origins.extend(other.origins.iter().cloned());
        for alias in &other.mail_aliases {
            self.add_mail_alias(alias.clone());
        }
        Ok(())
    }

    /// Identifier of the principal, [`EVERYONE`](crate::EVERYONE) for public grants.
    pub(crate) fn principal_id(&self) -> Option<&str> {
        self.principal.as_ref().map(Principal::id)
    }
}

impl PartialEq for Permission {
    fn eq(&self, other: &Self) -> bool {
        self.principal == other.principal
            && self.resource_url == other.resource_url
            && self.modes == other.modes
            && self.access_type == other.access_type
            && self.mail_aliases == other.mail_aliases
            && self.origins == other.origins
    }
}

impl Eq for Permission {}

#[cfg(test)]
mod tests {
    use crate::mode::AccessMode;
    use crate::principal::{EVERYONE, Principal};

    use super::{AccessType, Permission, PermissionError};

    const ALICE: &str = "https://alice.example/profile#me";
    const FILE: &str = "https://example.org/docs/file1";

    fn alice_reads() -> Permission {
        let mut permission = Permission::new(FILE, AccessType::Direct);
        permission.set_agent(ALICE).unwrap();
        permission.add_mode(AccessMode::Read);
        permission
    }

    #[test]
    fn validity() {
        let mut permission = Permission::new(FILE, AccessType::Direct);
        assert!(!permission.is_valid());
        assert!(permission.is_empty());

        permission.set_agent(ALICE).unwrap();
        assert!(!permission.is_valid());

        permission.add_mode(AccessMode::Read);
        assert!(permission.is_valid());
        assert!(!permission.is_empty());

        let mut without_resource = Permission::default();
        without_resource.set_agent(ALICE).unwrap();
        without_resource.add_mode(AccessMode::Read);
        assert!(!without_resource.is_valid());
        assert_eq!(
            without_resource.identity_key(),
            Err(PermissionError::IncompleteIdentity)
        );
    }

    #[test]
    fn principals_are_exclusive() {
        let mut permission = Permission::new(FILE, AccessType::Direct);
        permission.set_agent(ALICE).unwrap();
        assert!(matches!(
            permission.set_group("https://example.org/groups#team"),
            Err(PermissionError::PrincipalConflict { .. })
        ));
        assert!(permission.set_public().is_err());

        // Same kind overwrites.
        permission.set_agent("https://bob.example/#me").unwrap();
        assert_eq!(
            permission.principal(),
            Some(&Principal::Agent("https://bob.example/#me".into()))
        );

        let mut permission = Permission::new(FILE, AccessType::Direct);
        permission.set_group("https://example.org/groups#team").unwrap();
        assert!(permission.set_agent(ALICE).is_err());
    }

    #[test]
    fn mail_aliases_are_not_principals() {
        let mut permission = Permission::new(FILE, AccessType::Direct);
        assert_eq!(
            permission.set_agent("mailto:alice@example.org"),
            Err(PermissionError::MailAliasPrincipal(
                "mailto:alice@example.org".into()
            ))
        );
        assert!(permission.principal().is_none());

        permission.set_agent(ALICE).unwrap();
        permission.add_mail_alias("mailto:alice@example.org");
        assert_eq!(permission.principal(), Some(&Principal::agent(ALICE)));
        assert_eq!(permission.mail_aliases(), ["mailto:alice@example.org".to_string()]);
    }

    #[test]
    fn everyone_as_agent_is_public() {
        let mut permission = Permission::new(FILE, AccessType::Direct);
        permission.set_agent(EVERYONE).unwrap();
        assert!(permission.is_public());
        assert!(permission.is_group());
        assert!(!permission.is_agent());

        let mut other = Permission::new(FILE, AccessType::Direct);
        other.set_public().unwrap();
        assert_eq!(permission, other);
    }

    #[test]
    fn mode_helpers() {
        let mut permission = alice_reads();
        permission.add_modes([AccessMode::Write, AccessMode::Control]);
        assert!(permission.allows_read());
        assert!(permission.allows_write());
        assert!(permission.allows_append());
        assert!(permission.allows_control());

        // Removing append leaves write in place.
        permission.remove_mode(AccessMode::Append);
        assert!(permission.allows_write());
        assert!(permission.allows_append());

        permission.remove_modes([AccessMode::Write, AccessMode::Control, AccessMode::Read]);
        assert!(permission.is_empty());

        let mut append_only = Permission::new(FILE, AccessType::Direct);
        append_only.add_mode(AccessMode::Append);
        append_only.remove_mode(AccessMode::Write);
        assert!(append_only.allows_append());
    }

    #[test]
    fn merge_unites_modes() {
        let mut permission = alice_reads();
        let mut other = alice_reads();
        other.remove_mode(AccessMode::Read);
        other.add_modes([AccessMode::Write, AccessMode::Append]);
        other.add_origin("https://app.example");

        permission.merge_with(&other).unwrap();
        let modes: Vec<AccessMode> = permission.modes().iter().collect();
        assert_eq!(
            modes,
            vec![AccessMode::Read, AccessMode::Write, AccessMode::Append]
        );
        assert!(permission.allows_origin("https://app.example"));

        // Merging is idempotent.
        let merged = permission.clone();
        permission.merge_with(&other).unwrap();
        assert_eq!(permission, merged);
    }

    #[test]
    fn merge_requires_same_identity() {
        let mut permission = alice_reads();

        let mut inherited = Permission::new(FILE, AccessType::Inherited);
        inherited.set_agent(ALICE).unwrap();
        inherited.add_mode(AccessMode::Write);
        assert!(matches!(
            permission.merge_with(&inherited),
            Err(PermissionError::IdentityMismatch(_, _))
        ));

        let mut elsewhere = Permission::new("https://example.org/other", AccessType::Direct);
        elsewhere.set_agent(ALICE).unwrap();
        assert!(permission.merge_with(&elsewhere).is_err());
        assert!(!permission.allows_write());
    }

    #[test]
    fn equality_and_clone() {
        let permission = alice_reads();
        let mut copy = permission.clone();
        assert_eq!(permission, copy);

        copy.add_origin("https://app.example");
        assert_ne!(permission, copy);
        assert!(!permission.allows_origin("https://app.example"));

        let mut aliased = alice_reads();
        aliased.add_mail_alias("mailto:alice@example.org");
        aliased.add_mail_alias("mailto:alice@example.org");
        assert_eq!(aliased.mail_aliases().len(), 1);
        assert_ne!(permission, aliased);

        // The virtual flag is not part of equality.
        let mut implied = Permission::new_virtual(FILE, Principal::agent(ALICE));
        implied.add_mode(AccessMode::Read);
        assert_eq!(permission, implied);
    }
}
