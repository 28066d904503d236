//! Storage Areas
//!
//! String-keyed, string-valued areas backing the persistent cache backends.
//! An area is shared with anything else that writes to it: `len`, `keys` and
//! `clear` see every item, not just the ones the cache service wrote.

use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// File extension for stored items
const ITEM_EXTENSION: &str = ".json";
/// Suffix for in-progress writes
const TEMP_SUFFIX: &str = ".tmp";
/// Longest file name stored as the plain encoded key; file systems cap names at 255 bytes
const MAX_PLAIN_NAME_LEN: usize = 200;
/// Marks digest-named files; URL encoding never produces a leading `@`
const HASHED_PREFIX: &str = "@";

// =============================================================================
// StorageArea Trait
// =============================================================================

/// Key/value area with browser-storage semantics
pub trait StorageArea: Send + Sync {
    /// Get the raw item stored under `key`
    fn get_item(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous item
    fn set_item(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove the item under `key`; absent keys are not an error
    fn remove_item(&self, key: &str) -> StoreResult<()>;

    /// Remove every item in the area
    fn clear(&self) -> StoreResult<()>;

    /// Number of items in the area
    fn len(&self) -> StoreResult<usize>;

    /// Whether the area holds no items
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// All keys currently in the area
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Tear the area down (ends a session); defaults to clearing it
    fn close(&self) -> StoreResult<()> {
        self.clear()
    }

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Bytes charged against a quota for one item, the same in every area
#[inline]
fn item_cost(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

fn check_quota(quota: Option<u64>, used: u64, requested: u64) -> StoreResult<()> {
    match quota {
        Some(quota) if used + requested > quota => Err(StoreError::QuotaExceeded {
            used,
            requested,
            quota,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Memory Area
// =============================================================================

/// In-process area, used for tests and hosts without a writable disk
pub struct MemoryArea {
    items: RwLock<HashMap<String, String>>,
    quota_bytes: Option<u64>,
    available: AtomicBool,
}

impl MemoryArea {
    /// Create an unbounded area
    pub fn new() -> Self {
        Self::with_quota(None)
    }

    /// Create an area that rejects writes past `quota_bytes`
    pub fn with_quota(quota_bytes: Option<u64>) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            quota_bytes,
            available: AtomicBool::new(true),
        }
    }

    /// Set availability (for testing)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    /// Bytes currently charged against the quota
    pub fn used_bytes(&self) -> u64 {
        self.items.read().iter().map(|(k, v)| item_cost(k, v)).sum()
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory area disabled".to_string()))
        }
    }
}

impl Default for MemoryArea {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageArea for MemoryArea {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        self.ensure_available()?;
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        self.ensure_available()?;
        let mut items = self.items.write();
        let used: u64 = items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| item_cost(k, v))
            .sum();
        check_quota(self.quota_bytes, used, item_cost(key, value))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        self.ensure_available()?;
        self.items.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.ensure_available()?;
        self.items.write().clear();
        Ok(())
    }

    fn len(&self) -> StoreResult<usize> {
        self.ensure_available()?;
        Ok(self.items.read().len())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.ensure_available()?;
        Ok(self.items.read().keys().cloned().collect())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// =============================================================================
// Directory Area
// =============================================================================

/// Where an item lives on disk
struct ItemFile {
    path: PathBuf,
    /// Key line prefixed to the contents of digest-named files
    header: Option<String>,
}

/// One item found while scanning the directory
struct ScannedItem {
    key: String,
    path: PathBuf,
    value_len: u64,
}

/// Area stored as one file per key under a root directory
///
/// Short keys are stored as the URL-encoded key plus `.json`. Keys whose
/// encoded name would pass 200 bytes are stored under
/// `@<sha256>.json`, with the encoded key on the first line of the file.
pub struct DirectoryArea {
    root_path: PathBuf,
    quota_bytes: Option<u64>,
}

impl DirectoryArea {
    /// Open (creating if needed) an area rooted at `root_path`
    pub fn open(root_path: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::with_quota(root_path, None)
    }

    /// Open an area that rejects writes past `quota_bytes`
    pub fn with_quota(root_path: impl Into<PathBuf>, quota_bytes: Option<u64>) -> StoreResult<Self> {
        let root_path = root_path.into();
        fs::create_dir_all(&root_path)?;
        debug!(path = %root_path.display(), "Opened storage area");
        Ok(Self {
            root_path,
            quota_bytes,
        })
    }

    /// Root directory of the area
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn item_file(&self, key: &str) -> ItemFile {
        let encoded = urlencoding::encode(key);
        if encoded.len() + ITEM_EXTENSION.len() <= MAX_PLAIN_NAME_LEN {
            return ItemFile {
                path: self.root_path.join(format!("{}{}", encoded, ITEM_EXTENSION)),
                header: None,
            };
        }
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        ItemFile {
            path: self
                .root_path
                .join(format!("{}{}{}", HASHED_PREFIX, digest, ITEM_EXTENSION)),
            header: Some(encoded.into_owned()),
        }
    }

    /// Key line of a digest-named file
    fn read_header(path: &Path) -> io::Result<String> {
        let mut line = String::new();
        BufReader::new(fs::File::open(path)?).read_line(&mut line)?;
        Ok(line.trim_end_matches('\n').to_string())
    }

    /// Item files currently in the area, with their key and value size
    fn scan(&self) -> StoreResult<Vec<ScannedItem>> {
        let dir = match fs::read_dir(&self.root_path) {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::new();
        for entry in dir {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(stem) = name.strip_suffix(ITEM_EXTENSION) else {
                continue;
            };
            let path = entry.path();
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);

            let (encoded, value_len) = if stem.starts_with(HASHED_PREFIX) {
                match Self::read_header(&path) {
                    Ok(header) => {
                        let header_len = header.len() as u64 + 1;
                        (header, size.saturating_sub(header_len))
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => return Err(e.into()),
                }
            } else {
                (stem.to_string(), size)
            };
            let Ok(key) = urlencoding::decode(&encoded) else {
                continue;
            };
            items.push(ScannedItem {
                key: key.into_owned(),
                path,
                value_len,
            });
        }
        Ok(items)
    }

    /// Bytes charged against the quota: key plus value length of every item
    pub fn used_bytes(&self) -> StoreResult<u64> {
        Ok(self
            .scan()?
            .iter()
            .map(|item| item.key.len() as u64 + item.value_len)
            .sum())
    }
}

impl StorageArea for DirectoryArea {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        let file = self.item_file(key);
        let contents = match fs::read_to_string(&file.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let Some(header) = file.header else {
            return Ok(Some(contents));
        };
        match contents.split_once('\n') {
            Some((stored, value)) if stored == header => Ok(Some(value.to_string())),
            Some(_) => Ok(None),
            None => Err(StoreError::Malformed {
                key: key.to_string(),
                reason: "missing key line".to_string(),
            }),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        let file = self.item_file(key);

        if self.quota_bytes.is_some() {
            let used: u64 = self
                .scan()?
                .iter()
                .filter(|item| item.key != key)
                .map(|item| item.key.len() as u64 + item.value_len)
                .sum();
            check_quota(self.quota_bytes, used, item_cost(key, value))?;
        }

        // The area may have been closed by another handle
        fs::create_dir_all(&self.root_path)?;

        let contents = match &file.header {
            Some(header) => format!("{}\n{}", header, value),
            None => value.to_string(),
        };
        let mut temp_name = file.path.clone().into_os_string();
        temp_name.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_name);
        fs::write(&temp_path, contents)?;
        fs::rename(&temp_path, &file.path)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.item_file(key).path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> StoreResult<()> {
        for item in self.scan()? {
            match fs::remove_file(&item.path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.scan()?.len())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.scan()?.into_iter().map(|item| item.key).collect())
    }

    fn close(&self) -> StoreResult<()> {
        match fs::remove_dir_all(&self.root_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        self.root_path.display().to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn test_area() -> (DirectoryArea, TempDir) {
        let tmp = TempDir::new().unwrap();
        let area = DirectoryArea::open(tmp.path().join("local")).unwrap();
        (area, tmp)
    }

    #[test]
    fn test_memory_area_basic_operations() {
        let area = MemoryArea::new();
        area.set_item("hostels", "[1,2]").unwrap();
        assert_eq!(area.get_item("hostels").unwrap().as_deref(), Some("[1,2]"));
        assert_eq!(area.len().unwrap(), 1);

        area.remove_item("hostels").unwrap();
        area.remove_item("hostels").unwrap();
        assert!(area.is_empty().unwrap());
    }

    #[test]
    fn test_memory_area_quota() {
        let area = MemoryArea::with_quota(Some(10));
        area.set_item("k", "12345").unwrap(); // 6 bytes
        assert_matches!(
            area.set_item("j", "123456"),
            Err(StoreError::QuotaExceeded { quota: 10, .. })
        );
        // Replacing an item only charges the difference
        area.set_item("k", "123456789").unwrap();
        assert_eq!(area.used_bytes(), 10);
    }

    #[test]
    fn test_memory_area_unavailable() {
        let area = MemoryArea::new();
        area.set_available(false);
        assert_matches!(area.get_item("k"), Err(StoreError::Unavailable(_)));
        assert_matches!(area.set_item("k", "v"), Err(StoreError::Unavailable(_)));
    }

    #[test]
    fn test_directory_area_basic_operations() {
        let (area, _tmp) = test_area();

        area.set_item("rooms/floor-1", r#"{"value":1}"#).unwrap();
        assert_eq!(
            area.get_item("rooms/floor-1").unwrap().as_deref(),
            Some(r#"{"value":1}"#)
        );
        assert_eq!(area.get_item("missing").unwrap(), None);
        assert_eq!(area.keys().unwrap(), vec!["rooms/floor-1".to_string()]);

        area.remove_item("rooms/floor-1").unwrap();
        area.remove_item("rooms/floor-1").unwrap();
        assert_eq!(area.len().unwrap(), 0);
    }

    #[test]
    fn test_directory_area_odd_keys() {
        let (area, _tmp) = test_area();
        for key in ["..", ".", "a b", "x%2Fy", "ключ"] {
            area.set_item(key, key).unwrap();
            assert_eq!(area.get_item(key).unwrap().as_deref(), Some(key));
        }
        let mut keys = area.keys().unwrap();
        keys.sort();
        let mut expected = vec!["..", ".", "a b", "x%2Fy", "ключ"];
        expected.sort();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_directory_area_persistence() {
        let tmp = TempDir::new().unwrap();
        {
            let area = DirectoryArea::open(tmp.path()).unwrap();
            area.set_item("token", "abc").unwrap();
        }
        {
            let area = DirectoryArea::open(tmp.path()).unwrap();
            assert_eq!(area.get_item("token").unwrap().as_deref(), Some("abc"));
        }
    }

    #[test]
    fn test_directory_area_clear_is_area_wide() {
        let (area, _tmp) = test_area();
        area.set_item("a", "1").unwrap();
        area.set_item("b", "2").unwrap();
        // Written by someone else sharing the directory
        fs::write(area.root_path().join("foreign.json"), "x").unwrap();
        assert_eq!(area.len().unwrap(), 3);

        area.clear().unwrap();
        assert_eq!(area.len().unwrap(), 0);
    }

    #[test]
    fn test_directory_area_quota() {
        let tmp = TempDir::new().unwrap();
        let area = DirectoryArea::with_quota(tmp.path(), Some(8)).unwrap();
        area.set_item("a", "12345").unwrap();
        assert_eq!(area.used_bytes().unwrap(), 6);
        assert_matches!(
            area.set_item("b", "12345"),
            Err(StoreError::QuotaExceeded { used: 6, requested: 6, quota: 8 })
        );
        assert_eq!(area.get_item("b").unwrap(), None);
    }

    #[test]
    fn test_quota_cost_matches_across_areas() {
        let tmp = TempDir::new().unwrap();
        let long_key = format!("rooms?ids={}", "7,".repeat(120));
        let directory = DirectoryArea::with_quota(tmp.path(), Some(400)).unwrap();
        let memory = MemoryArea::with_quota(Some(400));
        let areas: [&dyn StorageArea; 2] = [&memory, &directory];

        for area in areas {
            area.set_item("hostels", "[1,2,3]").unwrap();
            area.set_item(&long_key, "[]").unwrap();
            // Replacing an item only charges the new size
            area.set_item("hostels", "[1]").unwrap();
            assert_matches!(
                area.set_item("students", &"x".repeat(200)),
                Err(StoreError::QuotaExceeded { quota: 400, .. }),
                "{}",
                area.describe()
            );
        }
        let expected = item_cost("hostels", "[1]") + item_cost(&long_key, "[]");
        assert_eq!(memory.used_bytes(), expected);
        assert_eq!(directory.used_bytes().unwrap(), expected);
    }

    #[test]
    fn test_directory_area_long_key() {
        let (area, _tmp) = test_area();
        let key = format!(
            "/api/rooms?hostel=4&floor=2&status=available&sort=room_number&order=asc&fields={}",
            "number,capacity,occupants,amenities,".repeat(5)
        );
        assert!(urlencoding::encode(&key).len() > 255);

        area.set_item(&key, r#"{"value":[]}"#).unwrap();
        assert_eq!(area.get_item(&key).unwrap().as_deref(), Some(r#"{"value":[]}"#));
        assert_eq!(area.keys().unwrap(), vec![key.clone()]);

        // A value containing newlines survives the key line
        area.set_item(&key, "a\nb").unwrap();
        assert_eq!(area.get_item(&key).unwrap().as_deref(), Some("a\nb"));
        assert_eq!(area.len().unwrap(), 1);

        area.remove_item(&key).unwrap();
        assert_eq!(area.get_item(&key).unwrap(), None);
        assert!(area.is_empty().unwrap());
    }

    #[test]
    fn test_directory_area_long_key_file_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let key = "k".repeat(300);
        DirectoryArea::open(tmp.path())
            .unwrap()
            .set_item(&key, "v")
            .unwrap();

        let area = DirectoryArea::open(tmp.path()).unwrap();
        assert_eq!(area.get_item(&key).unwrap().as_deref(), Some("v"));
        assert_eq!(area.used_bytes().unwrap(), 301);
        area.clear().unwrap();
        assert_eq!(area.len().unwrap(), 0);
    }

    #[test]
    fn test_directory_area_close() {
        let (area, _tmp) = test_area();
        area.set_item("a", "1").unwrap();
        area.close().unwrap();
        assert!(!area.root_path().exists());
        assert_eq!(area.len().unwrap(), 0);
        assert_eq!(area.get_item("a").unwrap(), None);

        // Writing after close recreates the directory
        area.set_item("b", "2").unwrap();
        assert_eq!(area.len().unwrap(), 1);
    }
}
