use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tracing::warn;

use crate::config::AppConfig;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Shared client carrying the browser header set and the TLS policy.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    archive_url: String,
}

impl HttpClient {
    pub fn new(archive_url: impl Into<String>, authorization: Option<&str>, insecure_tls: bool) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        if let Some(value) = authorization {
            match HeaderValue::from_str(value) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(e) => warn!(error = %e, "Ignoring credentials with invalid characters"),
            }
        }

        if insecure_tls {
            warn!("TLS certificate validation is disabled");
        }

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(insecure_tls)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            archive_url: archive_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AppConfig, authorization: Option<&str>) -> Result<Self> {
        Self::new(&config.archive_url, authorization, config.insecure_tls)
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Base of the registry's metadata and download endpoints.
    pub fn archive_url(&self) -> &str {
        &self.archive_url
    }

    pub fn metadata_url(&self, identifier: &str) -> String {
        format!("{}/metadata/{identifier}", self.archive_url)
    }

    pub fn download_url(&self, identifier: &str, name: &str) -> String {
        format!(
            "{}/download/{identifier}/{}",
            self.archive_url,
            name.replace(' ', "%20")
        )
    }
}
