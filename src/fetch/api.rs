use std::time::Duration;

use tracing::{debug, instrument};

use super::ListingFetcher;
use crate::error::{FetchError, RequestFailure};
use crate::models::{FileEntry, MetadataFile, MetadataResponse};

const METADATA_TIMEOUT: Duration = Duration::from_secs(15);

const PBP_FAMILY: &[&str] = &[".pbp", ".iso", ".cso", ".chd", ".bin", ".zip"];
const ISO_FAMILY: &[&str] = &[".iso", ".cso", ".zip"];

impl ListingFetcher {
    /// Lists the files of registry item `identifier` that belong to the collection.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_api(
        &self,
        collection: &str,
        identifier: &str,
        folder_filter: &str,
        extension: &str,
        force_refresh: bool,
    ) -> Result<Vec<FileEntry>, FetchError> {
        if let Some(entries) = self.cached(collection, force_refresh) {
            return Ok(entries);
        }

        let url = self.client.metadata_url(identifier);
        debug!(url, "Requesting registry metadata");
        let response = self
            .client
            .get(&url)
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .map_err(|e| FetchError::api(identifier, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::api(identifier, RequestFailure::Status(status.as_u16())));
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::api(identifier, e))?;
        let metadata: MetadataResponse =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::api(identifier, e))?;

        let Some(files) = metadata.files else {
            return Err(FetchError::EmptyLibrary {
                identifier: identifier.to_string(),
            });
        };

        let entries = select_metadata_files(files, folder_filter, extension);
        Ok(self.store(collection, entries))
    }
}

/// Extensions accepted for a collection whose primary extension is `extension`.
pub fn accepted_extensions(extension: &str) -> Vec<String> {
    let extension = extension.to_lowercase();
    match extension.as_str() {
        ".pbp" => PBP_FAMILY.iter().map(|e| e.to_string()).collect(),
        ".iso" => ISO_FAMILY.iter().map(|e| e.to_string()).collect(),
        _ => vec![extension, ".zip".to_string(), ".7z".to_string()],
    }
}

/// Filters metadata records by folder substring and extension family.
///
/// Names are literal paths, so matching works on the undecoded name.
pub fn select_metadata_files(
    files: Vec<MetadataFile>,
    folder_filter: &str,
    extension: &str,
) -> Vec<FileEntry> {
    let accepted = accepted_extensions(extension);

    files
        .into_iter()
        .filter(|f| folder_filter.is_empty() || f.name.contains(folder_filter))
        .filter(|f| {
            let lower = f.name.to_lowercase();
            accepted.iter().any(|ext| lower.ends_with(ext.as_str()))
        })
        .map(|f| FileEntry::new(f.name, Some(f.size)))
        .collect()
}
