// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Well-known identifier of the "everyone" class of agents.
///
/// A group grant for this identifier is a public grant and is always represented as
/// [`Principal::Public`].
pub const EVERYONE: &str = "http://xmlns.com/foaf/0.1/Agent";

/// Prefix marking informal contact addresses which are not genuine agent identities.
pub const MAILTO_PREFIX: &str = "mailto:";

/// The identity a permission is granted to.
///
/// The `Group` variant references a group listing which is resolved when access is checked.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Principal {
    Agent(String),
    Group(String),
    Public,
}

impl Principal {
    /// Agent principal, normalised to `Public` for the "everyone" identifier.
    pub fn agent(id: impl Into<String>) -> Self {
        let id = id.into();
        if id == EVERYONE {
            Principal::Public
        } else {
            Principal::Agent(id)
        }
    }

    /// Group principal, normalised to `Public` for the "everyone" identifier.
    pub fn group(id: impl Into<String>) -> Self {
        let id = id.into();
        if id == EVERYONE {
            Principal::Public
        } else {
            Principal::Group(id)
        }
    }

    /// Return the identifier of this principal.
    pub fn id(&self) -> &str {
        match self {
            Principal::Agent(id) => id,
            Principal::Group(id) => id,
            Principal::Public => EVERYONE,
        }
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, Principal::Agent(_))
    }

    /// Return true for group principals, including the public class.
    pub fn is_group(&self) -> bool {
        !self.is_agent()
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Principal::Public)
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Principal::Agent(id) => write!(f, "agent {id}"),
            Principal::Group(id) => write!(f, "group {id}"),
            Principal::Public => write!(f, "everyone"),
        }
    }
}

/// Return true if the identifier is an informal `mailto:` address.
pub fn is_mail_alias(id: &str) -> bool {
    id.starts_with(MAILTO_PREFIX)
}
