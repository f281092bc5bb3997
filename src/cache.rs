use crate::models::FileEntry;
use crate::sanitize::cache_key;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Persisted listings, one JSON file per collection.
///
/// A present entry is authoritative until a forced refresh overwrites it.
#[derive(Debug, Clone)]
pub struct ListingCache {
    cache_dir: PathBuf,
}

impl ListingCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).with_context(|| {
                format!("Failed to create cache directory {}", cache_dir.display())
            })?;
        }
        Ok(Self { cache_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn path_for(&self, collection: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", cache_key(collection)))
    }

    /// Missing and unreadable files both read as `None`.
    pub fn read(&self, collection: &str) -> Option<Vec<FileEntry>> {
        let path = self.path_for(collection);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No cached listing");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt cached listing");
                None
            }
        }
    }

    pub fn write(&self, collection: &str, entries: &[FileEntry]) -> Result<()> {
        let path = self.path_for(collection);
        let content = serde_json::to_string(entries).context("Failed to serialize listing")?;

        let mut tmp = NamedTempFile::new_in(&self.cache_dir)
            .context("Failed to create temporary cache file")?;
        tmp.write_all(content.as_bytes())
            .context("Failed to write cache file")?;
        tmp.persist(&path)
            .with_context(|| format!("Failed to persist cache file {}", path.display()))?;

        debug!(path = %path.display(), entries = entries.len(), "Cached listing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_entry_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let cache = ListingCache::new(dir.path()).unwrap();
        assert!(cache.read("GBA").is_none());
    }

    #[test]
    fn written_entries_read_back_in_order() {
        let dir = TempDir::new().unwrap();
        let cache = ListingCache::new(dir.path()).unwrap();
        let entries = vec![
            FileEntry::new("a.zip", Some(10)),
            FileEntry::new("b.zip", None),
        ];
        cache.write("Game Boy", &entries).unwrap();
        assert_eq!(cache.read("Game Boy"), Some(entries));
        assert!(dir.path().join("Game_Boy.json").exists());
    }

    #[test]
    fn corrupt_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let cache = ListingCache::new(dir.path()).unwrap();
        fs::write(cache.path_for("snes"), "[{\"name\": ").unwrap();
        assert!(cache.read("snes").is_none());
    }

    #[test]
    fn persisted_format_is_name_size_array() {
        let dir = TempDir::new().unwrap();
        let cache = ListingCache::new(dir.path()).unwrap();
        cache
            .write("psx", &[FileEntry::new("x.chd", Some(5))])
            .unwrap();
        let raw = fs::read_to_string(cache.path_for("psx")).unwrap();
        assert_eq!(raw, r#"[{"name":"x.chd","size":5}]"#);
    }

    #[test]
    fn creates_missing_cache_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("cache");
        let cache = ListingCache::new(&nested).unwrap();
        assert!(cache.dir().is_dir());
    }
}
