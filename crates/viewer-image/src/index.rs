//! Persisted mapping from hashed locations to hashed content.

use shared::storage::{read_json, write_json_atomic};
use shared::{ContentHash, LocationHash};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub const INDEX_FILE: &str = "path_index.json";

type IndexMap = HashMap<LocationHash, ContentHash>;

/// `LocationHash -> ContentHash` index, written through on every change.
///
/// Clones share state. Lookups only contend with the brief map copy taken
/// before each write, never with the file I/O itself.
#[derive(Clone, Debug)]
pub struct PathIndex {
    map: Arc<Mutex<IndexMap>>,
    writer: Arc<Mutex<()>>,
    path: PathBuf,
}

impl PathIndex {
    /// Loads `path_index.json` from `root`.
    pub fn open_in(root: &Path) -> Self {
        Self::open(root.join(INDEX_FILE))
    }

    /// A missing or corrupt file yields an empty index.
    pub fn open(path: PathBuf) -> Self {
        let map = load(&path);
        debug!("Path index loaded with {} entries", map.len());

        Self {
            map: Arc::new(Mutex::new(map)),
            writer: Arc::new(Mutex::new(())),
            path,
        }
    }

    /// Maps a location to its content and writes the index through.
    pub fn register(&self, location: LocationHash, content: ContentHash) {
        {
            let Ok(mut map) = self.map.lock() else {
                return;
            };
            if map.get(&location) == Some(&content) {
                return;
            }
            map.insert(location, content);
        }
        self.persist();
    }

    /// Content last registered for `location`.
    pub fn lookup(&self, location: &LocationHash) -> Option<ContentHash> {
        self.map.lock().ok()?.get(location).cloned()
    }

    /// Forgets one location. Persists only if it was present.
    pub fn remove(&self, location: &LocationHash) -> Option<ContentHash> {
        let removed = self.map.lock().ok()?.remove(location);
        if removed.is_some() {
            self.persist();
        }
        removed
    }

    /// Drops every mapping, on disk too.
    pub fn clear(&self) {
        if let Ok(mut map) = self.map.lock() {
            map.clear();
        }
        self.persist();
    }

    pub fn len(&self) -> usize {
        self.map.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> HashMap<LocationHash, ContentHash> {
        self.map.lock().map(|map| map.clone()).unwrap_or_default()
    }

    fn persist(&self) {
        // Held across the write so an older copy never lands after a newer one.
        let Ok(_writer) = self.writer.lock() else {
            return;
        };
        let snapshot = match self.map.lock() {
            Ok(map) => map.clone(),
            Err(_) => return,
        };

        if let Err(e) = write_json_atomic(&self.path, &snapshot) {
            warn!("Failed to persist path index: {e}");
        }
    }
}

fn load(path: &Path) -> IndexMap {
    let raw: HashMap<String, String> = match read_json(path) {
        Ok(Some(raw)) => raw,
        Ok(None) => return IndexMap::new(),
        Err(e) => {
            warn!("Discarding unreadable path index: {e}");
            return IndexMap::new();
        }
    };

    let total = raw.len();
    let map: IndexMap = raw
        .into_iter()
        .filter_map(|(location, content)| {
            Some((LocationHash::parse(&location)?, ContentHash::parse(&content)?))
        })
        .collect();

    if map.len() != total {
        warn!("Dropped {} malformed path index entries", total - map.len());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{hash_bytes, hash_str};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_register_and_lookup() {
        let dir = TempDir::new().unwrap();
        let index = PathIndex::open_in(dir.path());
        let location = hash_str("/a/cat.png");
        let content = hash_bytes(b"cat");

        assert!(index.lookup(&location).is_none());
        index.register(location.clone(), content.clone());

        assert_eq!(index.lookup(&location), Some(content));
        assert!(dir.path().join(INDEX_FILE).exists());
    }

    #[test]
    fn test_reregister_replaces() {
        let dir = TempDir::new().unwrap();
        let index = PathIndex::open_in(dir.path());
        let location = hash_str("/a/cat.png");

        index.register(location.clone(), hash_bytes(b"v1"));
        index.register(location.clone(), hash_bytes(b"v2"));

        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup(&location), Some(hash_bytes(b"v2")));
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let index = PathIndex::open_in(dir.path());
        for i in 0..50u32 {
            index.register(hash_str(&format!("/book/{i}.png")), hash_bytes(&i.to_le_bytes()));
        }

        let reloaded = PathIndex::open_in(dir.path());

        assert_eq!(reloaded.snapshot(), index.snapshot());
        assert_eq!(reloaded.len(), 50);
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(INDEX_FILE), b"\x00garbage").unwrap();

        let index = PathIndex::open_in(dir.path());
        assert!(index.is_empty());

        index.register(hash_str("/x"), hash_bytes(b"x"));
        assert_eq!(PathIndex::open_in(dir.path()).len(), 1);
    }

    #[test]
    fn test_malformed_entries_are_dropped() {
        let dir = TempDir::new().unwrap();
        let good_location = hash_str("/ok");
        let good_content = hash_bytes(b"ok");
        let raw = format!(
            r#"{{"{}":"{}","/plain/path":"{}"}}"#,
            good_location, good_content, good_content
        );
        fs::write(dir.path().join(INDEX_FILE), raw).unwrap();

        let index = PathIndex::open_in(dir.path());

        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup(&good_location), Some(good_content));
    }

    #[test]
    fn test_clear_and_remove() {
        let dir = TempDir::new().unwrap();
        let index = PathIndex::open_in(dir.path());
        index.register(hash_str("/a"), hash_bytes(b"a"));
        index.register(hash_str("/b"), hash_bytes(b"b"));

        assert_eq!(index.remove(&hash_str("/a")), Some(hash_bytes(b"a")));
        assert!(index.remove(&hash_str("/a")).is_none());

        index.clear();
        assert!(PathIndex::open_in(dir.path()).is_empty());
    }

    #[test]
    fn test_concurrent_registrations() {
        let dir = TempDir::new().unwrap();
        let index = PathIndex::open_in(dir.path());

        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let index = index.clone();
                std::thread::spawn(move || {
                    for i in 0..10u32 {
                        let key = format!("/t{t}/{i}.png");
                        index.register(hash_str(&key), hash_bytes(key.as_bytes()));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(index.len(), 80);
        assert_eq!(PathIndex::open_in(dir.path()).len(), 80);
    }
}
