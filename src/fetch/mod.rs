//! Listing acquisition for collections.
//!
//! Two strategies feed the same [`ListingCache`]:
//! - [`html`] scrapes anchor links from a directory-style page,
//! - [`api`] reads the registry's structured metadata and carries sizes.
//!
//! Both consult the cache first unless a forced refresh is requested, and
//! both leave the cache untouched when the fetch fails.

mod api;
mod html;

pub use api::{accepted_extensions, select_metadata_files};
pub use html::extract_links;

use tracing::{info, warn};

use crate::cache::ListingCache;
use crate::error::FetchError;
use crate::http::HttpClient;
use crate::models::{CollectionSpec, FetchMethod, FileEntry};

#[derive(Debug, Clone)]
pub struct ListingFetcher {
    client: HttpClient,
    cache: ListingCache,
}

impl ListingFetcher {
    pub fn new(client: HttpClient, cache: ListingCache) -> Self {
        Self { client, cache }
    }

    pub fn cache(&self) -> &ListingCache {
        &self.cache
    }

    /// Fetches the listing of `collection` with the strategy it is configured for.
    pub async fn fetch(
        &self,
        collection: &CollectionSpec,
        force_refresh: bool,
    ) -> Result<Vec<FileEntry>, FetchError> {
        match collection.method {
            FetchMethod::Html => {
                self.fetch_html(
                    &collection.name,
                    &collection.source,
                    &collection.extension,
                    force_refresh,
                )
                .await
            }
            FetchMethod::Api => {
                self.fetch_api(
                    &collection.name,
                    &collection.source,
                    &collection.folder_filter,
                    &collection.extension,
                    force_refresh,
                )
                .await
            }
        }
    }

    fn cached(&self, collection: &str, force_refresh: bool) -> Option<Vec<FileEntry>> {
        if force_refresh {
            return None;
        }
        let entries = self.cache.read(collection)?;
        info!(collection, entries = entries.len(), "Using cached listing");
        Some(entries)
    }

    /// Sorts, persists and returns a freshly fetched listing.
    fn store(&self, collection: &str, mut entries: Vec<FileEntry>) -> Vec<FileEntry> {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        if let Err(e) = self.cache.write(collection, &entries) {
            warn!(collection, error = %e, "Failed to cache listing");
        }
        info!(collection, entries = entries.len(), "Fetched listing");
        entries
    }
}
