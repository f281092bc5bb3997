use serde::{Deserialize, Deserializer, Serialize};

/// How a collection's listing is acquired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FetchMethod {
    #[default]
    Html,
    Api,
}

impl From<String> for FetchMethod {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("API") {
            Self::Api
        } else {
            Self::Html
        }
    }
}

impl From<FetchMethod> for String {
    fn from(value: FetchMethod) -> Self {
        match value {
            FetchMethod::Html => "HTML".to_string(),
            FetchMethod::Api => "API".to_string(),
        }
    }
}

/// One configured remote source, as stored in `collections.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub method: FetchMethod,
    /// Listing page URL (HTML) or registry identifier (API).
    #[serde(rename = "url", default)]
    pub source: String,
    #[serde(rename = "filter", default)]
    pub folder_filter: String,
    #[serde(rename = "folder", default = "default_folder")]
    pub local_folder: String,
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_name() -> String {
    "Unknown".to_string()
}

fn default_folder() -> String {
    "roms".to_string()
}

fn default_extension() -> String {
    ".zip".to_string()
}

/// A downloadable remote file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Remote name or link, percent-encoded as received.
    pub name: String,
    pub size: Option<u64>,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// One record of the registry metadata `files` array.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataFile {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_size")]
    pub size: u64,
}

#[derive(Debug, Deserialize)]
pub struct MetadataResponse {
    pub files: Option<Vec<MetadataFile>>,
}

/// The registry reports sizes as decimal strings, sometimes as numbers.
fn lenient_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}
