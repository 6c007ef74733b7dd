//! Process-wide cache services, constructed once and shared by every view.

use crate::session::ViewingSession;
use shared::{ContentHash, hash_bytes};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use viewer_config::CacheConfig;
use viewer_image::{ImageSource, PathIndex, Prefetcher, ThumbnailStore, entry_hash};
use viewer_library::{FavoritesLedger, SourceSettingsStore};
use viewer_types::{CacheStats, CachedImage, FavoriteStatus};

#[derive(Clone, Debug)]
pub struct CacheServices {
    config: CacheConfig,
    index: PathIndex,
    thumbnails: ThumbnailStore,
    favorites: FavoritesLedger,
    settings: SourceSettingsStore,
}

impl CacheServices {
    /// Opens every store under the config's data root.
    pub fn open(config: CacheConfig) -> Self {
        let root = config.data_root();
        if let Err(e) = fs::create_dir_all(&root) {
            warn!("Failed to create data root {:?}: {}", root, e);
        }
        info!("Opening cache services in {:?}", root);

        let index = PathIndex::open_in(&root);
        let thumbnails = ThumbnailStore::from_config(&config, index.clone());
        let favorites = FavoritesLedger::open_in(&root);
        let settings = SourceSettingsStore::open_in(&root, config.default_reading_direction);

        Self {
            config,
            index,
            thumbnails,
            favorites,
            settings,
        }
    }

    /// Same as [`open`](Self::open) with every record under `root`.
    pub fn open_in(root: &Path, config: CacheConfig) -> Self {
        Self::open(CacheConfig {
            data_dir: Some(root.to_path_buf()),
            ..config
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn index(&self) -> &PathIndex {
        &self.index
    }

    pub fn thumbnails(&self) -> &ThumbnailStore {
        &self.thumbnails
    }

    pub fn favorites(&self) -> &FavoritesLedger {
        &self.favorites
    }

    pub fn settings(&self) -> &SourceSettingsStore {
        &self.settings
    }

    /// Thumbnail at the configured size. Blocking; call off the UI thread.
    pub fn thumbnail(
        &self,
        source: &dyn ImageSource,
        location: &str,
    ) -> Option<(CachedImage, ContentHash)> {
        self.thumbnails
            .get_or_create_from(source, location, self.config.thumbnail_size.pixels())
    }

    /// Direct, inherited through shared content, or none.
    pub fn favorite_status(&self, source: &dyn ImageSource, location: &str) -> FavoriteStatus {
        let entry = entry_hash(source, location);
        let content = self.index.lookup(&entry);
        self.favorites.status(&entry, content.as_ref())
    }

    /// Resolves the content first so the favorite carries over to copies.
    pub fn toggle_favorite(&self, source: &dyn ImageSource, location: &str) -> FavoriteStatus {
        let content = self.content_of(source, location);
        if content.is_none() {
            debug!("Favoriting entry with unknown content");
        }
        self.favorites
            .toggle(&entry_hash(source, location), content.as_ref())
    }

    /// Opens a viewing session restored to the source's last position.
    pub fn open_session(&self, source: Arc<dyn ImageSource>, runtime: Handle) -> ViewingSession {
        let prefetcher = Prefetcher::new(self.config.prefetch_count, runtime);
        ViewingSession::open(source, self.settings.clone(), prefetcher)
    }

    /// Drops decoded thumbnails; disk and annotations stay.
    pub fn clear_memory(&self) {
        self.thumbnails.clear_memory();
    }

    /// Drops thumbnails and the path index. Favorites and source settings
    /// are kept.
    pub fn clear_persisted(&self) -> usize {
        let removed = self.thumbnails.clear_disk();
        info!("Cleared {} cached thumbnails", removed);
        removed
    }

    /// Disk usage of the thumbnail cache.
    pub fn stats(&self) -> CacheStats {
        self.thumbnails.stats()
    }

    fn content_of(&self, source: &dyn ImageSource, location: &str) -> Option<ContentHash> {
        let location_hash = entry_hash(source, location);
        if let Some(content) = self.index.lookup(&location_hash) {
            return Some(content);
        }

        let data = source.decode(location)?;
        let content = hash_bytes(&data);
        self.index.register(location_hash, content.clone());
        Some(content)
    }
}
