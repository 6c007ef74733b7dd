//! Two-level thumbnail store keyed by content hash.
//!
//! Thumbnails live in a count-bounded memory cache and, once written, as one
//! file per content hash on disk. Because the key is the content, any number
//! of locations holding the same bytes share a single thumbnail.

use crate::index::PathIndex;
use crate::source::{ImageSource, entry_hash};
use shared::cache::ThumbnailCache;
use shared::image::{ThumbnailFormat, decode_rgba, encode};
use shared::storage::{remove_if_exists, write_bytes_atomic};
use shared::{ContentHash, LocationHash, hash_bytes, hash_str};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use viewer_config::CacheConfig;
use viewer_types::{CacheStats, CachedImage};

pub const THUMBNAIL_DIR: &str = "thumbnails";
const THUMBNAIL_MARKER: &str = ".thumb.";

#[derive(Clone, Debug)]
pub struct ThumbnailStore {
    memory: ThumbnailCache<CachedImage>,
    index: PathIndex,
    dir: PathBuf,
    format: ThumbnailFormat,
}

impl ThumbnailStore {
    /// Store rooted at `dir`, keeping `memory_capacity` thumbnails decoded.
    pub fn new(
        dir: PathBuf,
        index: PathIndex,
        format: ThumbnailFormat,
        memory_capacity: usize,
    ) -> Self {
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("Failed to create thumbnail dir {:?}: {}", dir, e);
        }

        Self {
            memory: ThumbnailCache::new(memory_capacity),
            index,
            dir,
            format,
        }
    }

    /// Store under the config's data root with its format and memory size.
    pub fn from_config(config: &CacheConfig, index: PathIndex) -> Self {
        Self::new(
            config.data_root().join(THUMBNAIL_DIR),
            index,
            config.thumbnail_format,
            config.memory_thumbnails,
        )
    }

    pub fn index(&self) -> &PathIndex {
        &self.index
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<hex>.thumb.<ext>` under the thumbnail directory.
    pub fn thumbnail_path(&self, hash: &ContentHash) -> PathBuf {
        self.dir.join(format!(
            "{}{}{}",
            hash.hex(),
            THUMBNAIL_MARKER,
            self.format.extension()
        ))
    }

    /// Memory first, then disk. A disk hit is promoted to memory.
    pub fn get(&self, hash: &ContentHash) -> Option<CachedImage> {
        if let Some(image) = self.memory.get(hash) {
            return Some(image);
        }

        let path = self.thumbnail_path(hash);
        let data = fs::read(&path).ok()?;
        match decode_rgba(&data) {
            Ok(pixels) => {
                let image = CachedImage::new(pixels);
                self.memory.put(hash.clone(), image.clone());
                Some(image)
            }
            Err(e) => {
                // Drop it so the next request renders a fresh copy
                warn!("Removing undecodable thumbnail {:?}: {}", path, e);
                let _ = remove_if_exists(&path);
                None
            }
        }
    }

    /// True if the thumbnail is in memory or on disk.
    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.memory.contains(hash) || self.thumbnail_path(hash).exists()
    }

    /// Always refreshes memory; writes the file only if none exists yet.
    pub fn put(&self, image: &CachedImage, hash: &ContentHash) {
        self.memory.put(hash.clone(), image.clone());

        let path = self.thumbnail_path(hash);
        if path.exists() {
            return;
        }

        let result = encode(&image.pixels, self.format)
            .map_err(|e| e.to_string())
            .and_then(|data| write_bytes_atomic(&path, &data).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!("Failed to write thumbnail {:?}: {}", path, e);
        }
    }

    /// Resolves the thumbnail for `location`, decoding and rendering only
    /// what is missing.
    ///
    /// `decode` is skipped when the location is already indexed and its
    /// thumbnail is present. `render` is skipped whenever any location has
    /// already produced a thumbnail for the same content.
    pub fn get_or_create<D, R>(
        &self,
        location: &str,
        decode: D,
        render: R,
    ) -> Option<(CachedImage, ContentHash)>
    where
        D: FnOnce() -> Option<Vec<u8>>,
        R: FnOnce(&[u8]) -> Option<CachedImage>,
    {
        self.resolve(hash_str(location), decode, render)
    }

    /// [`get_or_create`](Self::get_or_create) wired to a source's own
    /// decode and render operations, keyed by the entry within its source.
    pub fn get_or_create_from<S: ImageSource + ?Sized>(
        &self,
        source: &S,
        location: &str,
        max_size: u32,
    ) -> Option<(CachedImage, ContentHash)> {
        self.resolve(
            entry_hash(source, location),
            || source.decode(location),
            |data| source.render(data, max_size),
        )
    }

    fn resolve<D, R>(
        &self,
        location_hash: LocationHash,
        decode: D,
        render: R,
    ) -> Option<(CachedImage, ContentHash)>
    where
        D: FnOnce() -> Option<Vec<u8>>,
        R: FnOnce(&[u8]) -> Option<CachedImage>,
    {
        if let Some(content) = self.index.lookup(&location_hash)
            && let Some(image) = self.get(&content)
        {
            return Some((image, content));
        }

        let Some(data) = decode() else {
            debug!("No bytes for thumbnail request");
            return None;
        };

        let content = hash_bytes(&data);
        self.index.register(location_hash, content.clone());

        if let Some(image) = self.get(&content) {
            debug!("Reusing thumbnail for duplicate content {}", content);
            return Some((image, content));
        }

        let image = render(&data)?;
        self.put(&image, &content);
        Some((image, content))
    }

    /// Empties the in-memory tier only.
    pub fn clear_memory(&self) {
        self.memory.clear();
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    /// Deletes every thumbnail file and the path index. Returns how many
    /// files were removed.
    pub fn clear_disk(&self) -> usize {
        self.memory.clear();
        self.index.clear();

        let removed = self
            .thumbnail_files()
            .into_iter()
            .filter(|(path, _)| match remove_if_exists(path) {
                Ok(removed) => removed,
                Err(e) => {
                    warn!("Failed to remove thumbnail: {e}");
                    false
                }
            })
            .count();

        debug!("Removed {} thumbnail files", removed);
        removed
    }

    /// File count and total size of the disk tier.
    pub fn stats(&self) -> CacheStats {
        let files = self.thumbnail_files();
        CacheStats {
            file_count: files.len(),
            total_bytes: files.iter().map(|(_, size)| size).sum(),
        }
    }

    fn thumbnail_files(&self) -> Vec<(PathBuf, u64)> {
        let Ok(read) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        read.filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.contains(THUMBNAIL_MARKER) && !name.ends_with(".tmp"))
            })
            .filter_map(|entry| {
                let meta = entry.metadata().ok()?;
                meta.is_file().then(|| (entry.path(), meta.len()))
            })
            .collect()
    }
}
