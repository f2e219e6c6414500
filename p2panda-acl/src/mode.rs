// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The four access modes which can be granted on a resource.
///
/// Modes are not ordered by "strength" like group access levels: `Write` implies `Append`, but
/// no other mode implies another. `Control` grants permission to manage the policy of a resource
/// and does not include `Read`, `Write` or `Append`.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Permission to read the contents of a resource.
    Read,

    /// Permission to modify or delete a resource.
    Write,

    /// Permission to add data to a resource without removing existing data.
    Append,

    /// Permission to read and modify the policy of a resource.
    Control,
}

impl AccessMode {
    /// All access modes.
    pub const ALL: [AccessMode; 4] = [
        AccessMode::Read,
        AccessMode::Write,
        AccessMode::Append,
        AccessMode::Control,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
            AccessMode::Append => "append",
            AccessMode::Control => "control",
        }
    }
}

impl Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown access mode \"{0}\"")]
pub struct UnknownAccessMode(pub String);

impl FromStr for AccessMode {
    type Err = UnknownAccessMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "read" => Ok(AccessMode::Read),
            "write" => Ok(AccessMode::Write),
            "append" => Ok(AccessMode::Append),
            "control" => Ok(AccessMode::Control),
            _ => Err(UnknownAccessMode(value.to_string())),
        }
    }
}

/// A set of access modes.
///
/// The set stores exactly what was granted. Implication rules are only applied when asking if a
/// mode is allowed, this way removing `Append` never touches an existing `Write` grant and
/// removing `Write` from a set holding only `Append` is a no-op.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessModes(BTreeSet<AccessMode>);

impl AccessModes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set containing every access mode.
    pub fn all() -> Self {
        Self::from_iter(AccessMode::ALL)
    }

    /// Returns `true` if the mode was not already present.
    pub fn insert(&mut self, mode: AccessMode) -> bool {
        self.0.insert(mode)
    }

    /// Returns `true` if the mode was present.
    pub fn remove(&mut self, mode: AccessMode) -> bool {
        self.0.remove(&mode)
    }

    /// Returns `true` if exactly this mode was granted, without applying implication rules.
    pub fn contains(&self, mode: AccessMode) -> bool {
        self.0.contains(&mode)
    }

    /// Returns `true` if the requested mode is granted by this set.
    pub fn allows(&self, mode: AccessMode) -> bool {
        match mode {
            AccessMode::Append => {
                self.contains(AccessMode::Append) || self.contains(AccessMode::Write)
            }
            mode => self.contains(mode),
        }
    }

    pub fn extend(&mut self, other: &AccessModes) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn iter(&self) -> impl Iterator<Item = AccessMode> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<AccessMode> for AccessModes {
    fn from_iter<T: IntoIterator<Item = AccessMode>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<AccessMode> for AccessModes {
    fn from(mode: AccessMode) -> Self {
        Self::from_iter([mode])
    }
}

impl<const N: usize> From<[AccessMode; N]> for AccessModes {
    fn from(modes: [AccessMode; N]) -> Self {
        Self::from_iter(modes)
    }
}

impl Display for AccessModes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let modes: Vec<&str> = self.0.iter().map(AccessMode::as_str).collect();
        write!(f, "[{}]", modes.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessMode, AccessModes};

    #[test]
    fn write_implies_append() {
        let modes = AccessModes::from(AccessMode::Write);
        assert!(modes.allows(AccessMode::Write));
        assert!(modes.allows(AccessMode::Append));
        assert!(!modes.allows(AccessMode::Read));
        assert!(!modes.allows(AccessMode::Control));

        // The reverse does not hold.
        let modes = AccessModes::from(AccessMode::Append);
        assert!(modes.allows(AccessMode::Append));
        assert!(!modes.allows(AccessMode::Write));
    }

    #[test]
    fn control_is_independent() {
        let modes = AccessModes::from(AccessMode::Control);
        assert!(modes.allows(AccessMode::Control));
        for mode in [AccessMode::Read, AccessMode::Write, AccessMode::Append] {
            assert!(!modes.allows(mode));
        }
    }

    #[test]
    fn removal_does_not_apply_implications() {
        let mut modes = AccessModes::from([AccessMode::Write, AccessMode::Append]);
        modes.remove(AccessMode::Append);
        assert!(modes.contains(AccessMode::Write));
        assert!(modes.allows(AccessMode::Append));

        let mut modes = AccessModes::from(AccessMode::Append);
        assert!(!modes.remove(AccessMode::Write));
        assert_eq!(modes, AccessModes::from(AccessMode::Append));
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("Read".parse::<AccessMode>(), Ok(AccessMode::Read));
        assert_eq!("control".parse::<AccessMode>(), Ok(AccessMode::Control));
        assert!("delete".parse::<AccessMode>().is_err());
        assert_eq!(AccessModes::all().to_string(), "[read, write, append, control]");
    }
}
