//! Remote inventory discovery
//!
//! This module defines the provider-agnostic view of an organization's
//! repositories and the pagination loop that assembles the complete
//! inventory. Provider clients (see [`crate::github`]) only need to serve a
//! single page at a time.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{Result, SyncError};

/// A repository as declared by the remote organization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    /// Repository name, unique within the organization
    pub name: String,

    /// URL handed to the version-control tool when cloning
    pub clone_url: String,
}

/// One page of a repository listing
#[derive(Debug, Clone, Default)]
pub struct RepositoryPage {
    pub repositories: Vec<RemoteRepository>,

    /// Page number to request next, `None` when this was the last page
    pub next_page: Option<u32>,
}

/// Trait for listing an organization's repositories page by page
#[async_trait]
pub trait RepositorySource: Send + Sync {
    async fn list_repositories(&self, org: &str, page: u32, per_page: u8)
        -> Result<RepositoryPage>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}

/// Fetch the complete inventory of `org`
///
/// Fails as a whole if any page fails. A truncated inventory would make
/// every repository on the missing pages look like an orphan.
pub async fn fetch_inventory<S>(source: &S, org: &str, per_page: u8) -> Result<Vec<RemoteRepository>>
where
    S: RepositorySource + ?Sized,
{
    let mut repositories = Vec::new();
    let mut page = 1u32;

    loop {
        debug!(
            "Fetching page {} of repositories for {} from {}",
            page,
            org,
            source.provider_name()
        );

        let listing = source.list_repositories(org, page, per_page).await?;
        repositories.extend(listing.repositories);

        match listing.next_page {
            None => break,
            Some(next) if next <= page => {
                return Err(SyncError::RemoteUnavailable {
                    org: org.to_string(),
                    page,
                    reason: format!("pagination went from page {} back to page {}", page, next),
                });
            }
            Some(next) => page = next,
        }
    }

    info!(
        "Found {} repositories for the organization {}",
        repositories.len(),
        org
    );
    Ok(repositories)
}
