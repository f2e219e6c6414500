// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use crate::traits::PolicyLocator;

/// Default suffix of policy documents.
pub const DEFAULT_POLICY_SUFFIX: &str = ".acl";

/// Locates policy documents next to their resource by appending a fixed suffix to its url.
#[derive(Clone, Debug)]
pub struct SuffixLocator {
    suffix: String,
}

impl SuffixLocator {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

impl Default for SuffixLocator {
    fn default() -> Self {
        Self::new(DEFAULT_POLICY_SUFFIX)
    }
}

impl PolicyLocator for SuffixLocator {
    fn policy_url_for(&self, resource_url: &str) -> String {
        if self.is_policy_url(resource_url) {
            resource_url.to_string()
        } else {
            format!("{resource_url}{}", self.suffix)
        }
    }

    fn is_policy_url(&self, url: &str) -> bool {
        url.ends_with(&self.suffix)
    }
}

#[derive(Clone, Debug)]
pub struct PermissionSetConfig {
    /// Maps resources to the policy documents implied `Control` grants are synthesized for.
    pub locator: Arc<dyn PolicyLocator>,
}

impl PermissionSetConfig {
    pub fn with_locator(locator: impl PolicyLocator + 'static) -> Self {
        Self {
            locator: Arc::new(locator),
        }
    }
}

impl Default for PermissionSetConfig {
    fn default() -> Self {
        Self::with_locator(SuffixLocator::default())
    }
}
