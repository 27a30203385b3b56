//! On-disk memo of generated articles and stage outputs.
//!
//! Each entry lives in `<dir>/<md5("{key}_{version}")>.json`. Reads never
//! fail: a missing entry is a miss, and an unreadable one is deleted and
//! reported as a miss.

use crate::error::{Error, Result};
use crate::writer::write_file_atomic;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Default number of entries kept before the oldest are evicted.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// A cached payload with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    /// Logical key (topic, or topic and stage)
    pub topic: String,
    /// Prompt version the payload was produced with
    pub prompt_version: String,
    /// Cached payload
    pub article: Value,
    /// RFC 3339 creation time
    pub cached_at: String,
}

/// Size of the cache directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of entries
    pub count: usize,
    /// Total bytes on disk
    pub size_bytes: u64,
}

impl CacheStats {
    /// Size in megabytes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0 / 1024.0
    }
}

/// Content-addressed JSON cache on disk.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    max_entries: Option<usize>,
}

impl DiskCache {
    /// Opens a cache rooted at `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        Ok(Self {
            dir,
            max_entries: Some(DEFAULT_MAX_ENTRIES),
        })
    }

    /// Sets the eviction cap; `None` keeps every entry.
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: Option<usize>) -> Self {
        self.max_entries = max_entries.map(|n| n.max(1));
        self
    }

    /// Cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Hash used as the file stem for a key and version.
    #[must_use]
    pub fn hash_key(key: &str, version: &str) -> String {
        hash(&format!("{key}_{version}"))
    }

    /// Logical key of one pipeline stage output. The version is repeated
    /// in the hashed file stem.
    #[must_use]
    pub fn stage_key(topic: &str, stage: &str, version: &str) -> String {
        format!("{topic}_{stage}_{version}")
    }

    /// Looks up an entry.
    pub fn get(&self, key: &str, version: &str) -> Option<CacheRecord> {
        let hash = Self::hash_key(key, version);
        let value = self.read_value(&hash)?;

        let object = value.as_object()?;
        if !object.contains_key("article") && !object.contains_key("topic") {
            warn!("Cache entry {} has no payload, removing", hash);
            self.remove(&hash);
            return None;
        }

        match serde_json::from_value::<CacheRecord>(value) {
            Ok(record) => {
                debug!("Cache hit: {}", key);
                Some(record)
            }
            Err(e) => {
                warn!("Cache entry {} is malformed ({}), removing", hash, e);
                self.remove(&hash);
                None
            }
        }
    }

    /// Stores a payload, overwriting any previous entry.
    ///
    /// Write failures are logged and swallowed.
    pub fn set(&self, key: &str, payload: &Value, version: &str) {
        let record = CacheRecord {
            topic: key.to_string(),
            prompt_version: version.to_string(),
            article: payload.clone(),
            cached_at: chrono::Utc::now().to_rfc3339(),
        };
        let hash = Self::hash_key(key, version);
        if self.put(&hash, &record) {
            debug!("Cached: {}", key);
        }
    }

    /// Reads an arbitrary record stored under a precomputed hash.
    pub fn load<T: DeserializeOwned>(&self, hash: &str) -> Option<T> {
        let value = self.read_value(hash)?;
        match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Cache entry {} is malformed ({}), removing", hash, e);
                self.remove(hash);
                None
            }
        }
    }

    /// Writes an arbitrary record under a precomputed hash.
    ///
    /// Returns whether the write succeeded.
    pub fn put<T: Serialize>(&self, hash: &str, record: &T) -> bool {
        let path = self.entry_path(hash);
        let result = serde_json::to_string_pretty(record)
            .map_err(Error::from)
            .and_then(|json| write_file_atomic(&path, &json));

        match result {
            Ok(()) => {
                self.evict(&path);
                true
            }
            Err(e) => {
                warn!("Cache write failed: {}", e);
                false
            }
        }
    }

    /// Removes every entry and returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut removed = 0;
        for (path, _) in self.entries() {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }
        info!("Cleared {} cache entries", removed);
        removed
    }

    /// Counts entries and their total size.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for (path, _) in self.entries() {
            stats.count += 1;
            stats.size_bytes += fs::metadata(&path).map_or(0, |m| m.len());
        }
        stats
    }

    fn entry_path(&self, hash: &str) -> PathBuf {
        self.dir.join(format!("{hash}.json"))
    }

    fn read_value(&self, hash: &str) -> Option<Value> {
        let path = self.entry_path(hash);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cache read failed for {}: {}", path.display(), e);
                return None;
            }
        };

        if raw.trim().is_empty() {
            warn!("Cache entry {} is empty, removing", hash);
            self.remove(hash);
            return None;
        }

        match serde_json::from_str::<Value>(&raw) {
            Ok(value) if value.is_object() => {
                touch(&path);
                Some(value)
            }
            Ok(_) => {
                warn!("Cache entry {} is not an object, removing", hash);
                self.remove(hash);
                None
            }
            Err(e) => {
                warn!("Cache entry {} is not valid JSON ({}), removing", hash, e);
                self.remove(hash);
                None
            }
        }
    }

    fn remove(&self, hash: &str) {
        let path = self.entry_path(hash);
        if let Err(e) = fs::remove_file(&path) {
            debug!("Could not remove {}: {}", path.display(), e);
        }
    }

    fn entries(&self) -> Vec<(PathBuf, SystemTime)> {
        let Ok(read_dir) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        read_dir
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .map(|path| {
                let modified = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (path, modified)
            })
            .collect()
    }

    /// Drops the least recently used entries beyond the cap, never `keep`.
    fn evict(&self, keep: &Path) {
        let Some(max_entries) = self.max_entries else {
            return;
        };

        let mut entries = self.entries();
        if entries.len() <= max_entries {
            return;
        }

        entries.sort_by_key(|(_, modified)| *modified);
        let excess = entries.len() - max_entries;
        let victims = entries
            .iter()
            .filter(|(path, _)| path != keep)
            .take(excess);

        for (path, _) in victims {
            match fs::remove_file(path) {
                Ok(()) => debug!("Evicted {}", path.display()),
                Err(e) => warn!("Could not evict {}: {}", path.display(), e),
            }
        }
    }
}

/// Hex MD5 digest of `input`.
#[must_use]
pub fn hash(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

fn touch(path: &Path) {
    let result = fs::File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::now()));
    if let Err(e) = result {
        debug!("Could not refresh {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use serde_json::json;

    fn cache_in(temp: &assert_fs::TempDir) -> DiskCache {
        DiskCache::new(temp.path().join("cache")).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let temp = assert_fs::TempDir::new().unwrap();
        let cache = cache_in(&temp);
        let payload = json!({"title": "Rivers", "content": "<p>Water</p>"});

        cache.set("rivers", &payload, "v1");
        let record = cache.get("rivers", "v1").unwrap();

        assert_eq!(record.article, payload);
        assert_eq!(record.topic, "rivers");
        assert_eq!(record.prompt_version, "v1");
    }

    #[test]
    fn test_version_is_part_of_key() {
        let temp = assert_fs::TempDir::new().unwrap();
        let cache = cache_in(&temp);

        cache.set("rivers", &json!({"title": "x"}), "v1");
        assert!(cache.get("rivers", "v2").is_none());
    }

    #[test]
    fn test_known_hash() {
        assert_eq!(hash(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(DiskCache::hash_key("a", "b"), hash("a_b"));
    }

    #[test]
    fn test_stage_key_carries_version() {
        let key = DiskCache::stage_key("rivers", "draft", "v1");
        assert_eq!(key, "rivers_draft_v1");
        assert_eq!(DiskCache::hash_key(&key, "v1"), hash("rivers_draft_v1_v1"));
        assert_ne!(key, DiskCache::stage_key("rivers", "draft", "v2"));
    }

    #[test]
    fn test_corrupt_entry_is_deleted() {
        let temp = assert_fs::TempDir::new().unwrap();
        let cache = cache_in(&temp);
        let hash = DiskCache::hash_key("broken", "v1");
        let file = temp.child(format!("cache/{hash}.json"));
        file.write_str("{not json").unwrap();

        assert!(cache.get("broken", "v1").is_none());
        assert!(!file.path().exists());
    }

    #[test]
    fn test_empty_and_non_object_entries_are_deleted() {
        let temp = assert_fs::TempDir::new().unwrap();
        let cache = cache_in(&temp);

        let empty = temp.child(format!("cache/{}.json", DiskCache::hash_key("e", "v1")));
        empty.write_str("   ").unwrap();
        assert!(cache.get("e", "v1").is_none());
        assert!(!empty.path().exists());

        let array = temp.child(format!("cache/{}.json", DiskCache::hash_key("a", "v1")));
        array.write_str("[1, 2]").unwrap();
        assert!(cache.get("a", "v1").is_none());
        assert!(!array.path().exists());

        let bare = temp.child(format!("cache/{}.json", DiskCache::hash_key("b", "v1")));
        bare.write_str("{\"other\": 1}").unwrap();
        assert!(cache.get("b", "v1").is_none());
        assert!(!bare.path().exists());
    }

    #[test]
    fn test_clear_and_stats() {
        let temp = assert_fs::TempDir::new().unwrap();
        let cache = cache_in(&temp);
        cache.set("one", &json!({"a": 1}), "v1");
        cache.set("two", &json!({"a": 2}), "v1");

        let stats = cache.stats();
        assert_eq!(stats.count, 2);
        assert!(stats.size_bytes > 0);

        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.stats().count, 0);
    }

    #[test]
    fn test_eviction_caps_entries() {
        let temp = assert_fs::TempDir::new().unwrap();
        let cache = cache_in(&temp).with_max_entries(Some(3));

        for i in 0..6 {
            cache.set(&format!("topic-{i}"), &json!({"n": i}), "v1");
        }

        assert_eq!(cache.stats().count, 3);
        assert!(cache.get("topic-5", "v1").is_some());
    }

    #[test]
    fn test_unbounded_cache_keeps_everything() {
        let temp = assert_fs::TempDir::new().unwrap();
        let cache = cache_in(&temp).with_max_entries(None);

        for i in 0..5 {
            cache.set(&format!("topic-{i}"), &json!({"n": i}), "v1");
        }

        assert_eq!(cache.stats().count, 5);
    }

    #[test]
    fn test_generic_records() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Stored {
            path: String,
        }

        let temp = assert_fs::TempDir::new().unwrap();
        let cache = cache_in(&temp);
        let stored = Stored { path: "/images/a.jpg".into() };

        assert!(cache.put("abc", &stored));
        assert_eq!(cache.load::<Stored>("abc"), Some(stored));
        assert_eq!(cache.load::<Stored>("missing"), None);
    }
}
