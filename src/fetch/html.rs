use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, instrument};

use super::ListingFetcher;
use crate::error::{FetchError, RequestFailure};
use crate::models::FileEntry;
use crate::sanitize::percent_decode;

const SCRAPE_TIMEOUT: Duration = Duration::from_secs(20);

/// Archives are acceptable whatever extension the collection asks for.
const ARCHIVE_EXTENSIONS: [&str; 2] = [".zip", ".7z"];

static ANCHOR_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .unwrap_or_else(|e| panic!("invalid anchor regex: {e}"))
});

impl ListingFetcher {
    /// Scrapes `url` for links ending in `extension` (or a generic archive extension).
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_html(
        &self,
        collection: &str,
        url: &str,
        extension: &str,
        force_refresh: bool,
    ) -> Result<Vec<FileEntry>, FetchError> {
        if let Some(entries) = self.cached(collection, force_refresh) {
            return Ok(entries);
        }

        debug!(url, "Scraping listing page");
        let response = self
            .client
            .get(url)
            .timeout(SCRAPE_TIMEOUT)
            .send()
            .await
            .map_err(|e| FetchError::scrape(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::scrape(url, RequestFailure::Status(status.as_u16())));
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::scrape(url, e))?;
        let body = String::from_utf8_lossy(&bytes);

        Ok(self.store(collection, extract_links(&body, extension)))
    }
}

/// Collects matching anchor targets from an HTML page, in document order.
pub fn extract_links(html: &str, extension: &str) -> Vec<FileEntry> {
    let extension = extension.to_lowercase();

    ANCHOR_HREF_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| unescape_entities(m.as_str()))
        .map(|href| match href.strip_prefix("//") {
            Some(rest) => format!("https://{rest}"),
            None => href,
        })
        .filter(|href| !href.contains("sort="))
        .filter(|href| {
            let lower = percent_decode(href).to_lowercase();
            lower.ends_with(&extension) || ARCHIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        })
        .map(|href| FileEntry::new(href, None))
        .collect()
}

/// Resolves the character references an HTML parser would in attribute values.
fn unescape_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let decoded = rest.find(';').and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
