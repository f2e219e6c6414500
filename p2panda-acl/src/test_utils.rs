// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities.
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use crate::check::CheckOptions;
use crate::group::GroupListing;
use crate::traits::GroupFetcher;

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Fetcher serving a fixed set of group listings and counting how often it was asked.
#[derive(Clone, Debug, Default)]
pub struct StaticFetcher {
    listings: HashMap<String, GroupListing>,
    fetches: Arc<AtomicUsize>,
}

impl StaticFetcher {
    pub fn from_listings(listings: impl IntoIterator<Item = GroupListing>) -> Self {
        Self {
            listings: listings
                .into_iter()
                .map(|listing| (listing.id().to_string(), listing))
                .collect(),
            fetches: Arc::default(),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl GroupFetcher for StaticFetcher {
    type Error = Infallible;

    async fn fetch_group(
        &self,
        group_id: &str,
        _options: &CheckOptions,
    ) -> Result<Option<GroupListing>, Self::Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.listings.get(group_id).cloned())
    }
}

#[derive(Debug, Error)]
#[error("group listing unreachable")]
pub struct UnreachableError;

/// Fetcher failing on every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingFetcher;

impl GroupFetcher for FailingFetcher {
    type Error = UnreachableError;

    async fn fetch_group(
        &self,
        _group_id: &str,
        _options: &CheckOptions,
    ) -> Result<Option<GroupListing>, Self::Error> {
        Err(UnreachableError)
    }
}
