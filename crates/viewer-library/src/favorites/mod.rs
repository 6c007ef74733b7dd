//! Favorites tracked both per occurrence and per image content.
//!
//! A location favorited directly also marks its content, so every other
//! occurrence of the same bytes shows up as an inherited favorite. The
//! content entry remembers which locations contributed it and is released
//! once the last of them is toggled off, unless it was favorited at the
//! content level on its own.

pub mod format;

use crate::unix_now;
use serde::{Deserialize, Serialize};
use shared::storage::{read_value, remove_if_exists, write_json_atomic};
use shared::{ContentHash, LocationHash, StoreResult};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use viewer_types::FavoriteStatus;

pub const FAVORITES_FILE: &str = "favorites.json";
pub const LEGACY_FAVORITES_FILE: &str = "favorite_hashes.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub added_at: u64,
    /// Direct locations that brought this content in.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub sources: BTreeSet<LocationHash>,
    /// Favorited as content, independent of any location.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pinned: bool,
}

impl ContentEntry {
    pub fn pinned(added_at: u64) -> Self {
        Self {
            added_at,
            sources: BTreeSet::new(),
            pinned: true,
        }
    }

    fn is_unreferenced(&self) -> bool {
        self.sources.is_empty() && !self.pinned
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub added_at: u64,
    /// Content the location showed when it was favorited, if known.
    #[serde(default)]
    pub content_hash: Option<ContentHash>,
}

/// In-memory ledger state, independent of any file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Favorites {
    pub by_content: BTreeMap<ContentHash, ContentEntry>,
    pub by_source: BTreeMap<LocationHash, SourceEntry>,
}

impl Favorites {
    /// Direct beats inherited; inherited needs the content to be known.
    pub fn status(&self, location: &LocationHash, content: Option<&ContentHash>) -> FavoriteStatus {
        if self.by_source.contains_key(location) {
            FavoriteStatus::Direct
        } else if content.is_some_and(|c| self.by_content.contains_key(c)) {
            FavoriteStatus::Inherited
        } else {
            FavoriteStatus::None
        }
    }

    /// Whether the location itself is favorited.
    pub fn is_direct(&self, location: &LocationHash) -> bool {
        self.by_source.contains_key(location)
    }

    /// Flips the direct favorite of `location` and returns its new status.
    pub fn toggle(
        &mut self,
        location: &LocationHash,
        content: Option<&ContentHash>,
        now: u64,
    ) -> FavoriteStatus {
        if let Some(entry) = self.by_source.remove(location) {
            let content = entry.content_hash.as_ref().or(content);
            if let Some(hash) = content {
                self.release(hash, location);
            }
            return self.status(location, content);
        }

        self.by_source.insert(
            location.clone(),
            SourceEntry {
                added_at: now,
                content_hash: content.cloned(),
            },
        );
        if let Some(hash) = content {
            self.by_content
                .entry(hash.clone())
                .or_insert_with(|| ContentEntry {
                    added_at: now,
                    sources: BTreeSet::new(),
                    pinned: false,
                })
                .sources
                .insert(location.clone());
        }
        FavoriteStatus::Direct
    }

    /// Drops the direct entry of a location that no longer exists. Its
    /// content stays a favorite.
    pub fn forget_location(&mut self, location: &LocationHash) -> bool {
        self.by_source.remove(location).is_some()
    }

    /// Removes a content favorite together with every direct entry that
    /// points at it.
    pub fn clear_content(&mut self, content: &ContentHash) -> bool {
        let removed = self.by_content.remove(content).is_some();
        self.by_source
            .retain(|_, entry| entry.content_hash.as_ref() != Some(content));
        removed
    }

    /// Favorites `content` wherever it appears, without a direct location.
    pub fn favorite_content(&mut self, content: &ContentHash, now: u64) {
        self.by_content
            .entry(content.clone())
            .or_insert_with(|| ContentEntry::pinned(now))
            .pinned = true;
    }

    pub fn direct_locations(&self) -> Vec<LocationHash> {
        self.by_source.keys().cloned().collect()
    }

    pub fn favorite_contents(&self) -> Vec<ContentHash> {
        self.by_content.keys().cloned().collect()
    }

    /// Distinct favorites: every content plus direct locations whose content
    /// is unknown.
    pub fn len(&self) -> usize {
        let unresolved = self
            .by_source
            .values()
            .filter(|entry| entry.content_hash.is_none())
            .count();
        self.by_content.len() + unresolved
    }

    pub fn is_empty(&self) -> bool {
        self.by_content.is_empty() && self.by_source.is_empty()
    }

    fn release(&mut self, content: &ContentHash, location: &LocationHash) {
        let Some(entry) = self.by_content.get_mut(content) else {
            return;
        };
        entry.sources.remove(location);
        if entry.is_unreferenced() {
            self.by_content.remove(content);
        }
    }
}

/// Persistent favorites, written through after every change.
#[derive(Clone, Debug)]
pub struct FavoritesLedger {
    state: Arc<Mutex<Favorites>>,
    writer: Arc<Mutex<()>>,
    path: PathBuf,
}

impl FavoritesLedger {
    /// Loads `favorites.json` from `root`, migrating older layouts.
    pub fn open_in(root: &Path) -> Self {
        let path = root.join(FAVORITES_FILE);
        let favorites = load(&path, &root.join(LEGACY_FAVORITES_FILE));
        debug!(
            "Favorites loaded: {} contents, {} locations",
            favorites.by_content.len(),
            favorites.by_source.len()
        );

        Self {
            state: Arc::new(Mutex::new(favorites)),
            writer: Arc::new(Mutex::new(())),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current status of `location`, given the content it shows.
    pub fn status(&self, location: &LocationHash, content: Option<&ContentHash>) -> FavoriteStatus {
        self.state
            .lock()
            .map(|state| state.status(location, content))
            .unwrap_or_default()
    }

    pub fn is_direct(&self, location: &LocationHash) -> bool {
        self.state
            .lock()
            .map(|state| state.is_direct(location))
            .unwrap_or(false)
    }

    /// Flips the direct favorite and persists.
    pub fn toggle(&self, location: &LocationHash, content: Option<&ContentHash>) -> FavoriteStatus {
        let status = {
            let Ok(mut state) = self.state.lock() else {
                return FavoriteStatus::None;
            };
            state.toggle(location, content, unix_now())
        };
        self.persist();
        status
    }

    /// See [`Favorites::forget_location`].
    pub fn forget_location(&self, location: &LocationHash) -> bool {
        self.mutate(|state| state.forget_location(location))
    }

    /// See [`Favorites::clear_content`].
    pub fn clear_content(&self, content: &ContentHash) -> bool {
        self.mutate(|state| state.clear_content(content))
    }

    /// Pins `content` as a favorite and persists.
    pub fn favorite_content(&self, content: &ContentHash) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.favorite_content(content, unix_now());
        drop(state);
        self.persist();
    }

    pub fn direct_locations(&self) -> Vec<LocationHash> {
        self.snapshot().direct_locations()
    }

    pub fn favorite_contents(&self) -> Vec<ContentHash> {
        self.snapshot().favorite_contents()
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|state| state.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().map(|state| state.is_empty()).unwrap_or(true)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> Favorites {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    // Persists only when `f` reports a change.
    fn mutate(&self, f: impl FnOnce(&mut Favorites) -> bool) -> bool {
        let changed = match self.state.lock() {
            Ok(mut state) => f(&mut state),
            Err(_) => return false,
        };
        if changed {
            self.persist();
        }
        changed
    }

    fn persist(&self) {
        let Ok(_writer) = self.writer.lock() else {
            return;
        };
        let snapshot = match self.state.lock() {
            Ok(state) => state.clone(),
            Err(_) => return,
        };

        if let Err(e) = write_json_atomic(&self.path, &format::encode(&snapshot)) {
            warn!("Failed to persist favorites: {e}");
        }
    }
}

fn load(path: &Path, legacy: &Path) -> Favorites {
    match read_value(path) {
        Ok(Some(value)) => match format::decode(&value, unix_now()) {
            Some((favorites, upgraded)) => {
                if upgraded {
                    info!("Upgrading favorites to version {}", format::CURRENT_VERSION);
                    if let Err(e) = write_json_atomic(path, &format::encode(&favorites)) {
                        warn!("Failed to rewrite favorites: {e}");
                    }
                }
                favorites
            }
            None => {
                warn!("Unrecognised favorites layout in {:?}, starting empty", path);
                Favorites::default()
            }
        },
        Ok(None) => migrate_legacy(path, legacy, remove_if_exists).unwrap_or_else(|e| {
            warn!("Legacy favorites migration failed: {e}");
            Favorites::default()
        }),
        Err(e) => {
            warn!("Discarding unreadable favorites: {e}");
            Favorites::default()
        }
    }
}

/// Converts the legacy content list into pinned content favorites.
///
/// The list is retired only after the current file is written and every
/// hash in it was understood. A failed write or removal is logged and the
/// migrated favorites are still returned.
fn migrate_legacy(
    path: &Path,
    legacy: &Path,
    retire: impl FnOnce(&Path) -> StoreResult<bool>,
) -> StoreResult<Favorites> {
    let Some(value) = read_value(legacy)? else {
        return Ok(Favorites::default());
    };
    let Some(favorites) = format::parse_legacy_list(&value, unix_now()) else {
        warn!("Ignoring unrecognised legacy favorites {:?}", legacy);
        return Ok(Favorites::default());
    };
    info!("Migrated {} legacy favorites", favorites.by_content.len());

    if let Err(e) = write_json_atomic(path, &format::encode(&favorites)) {
        warn!("Migrated favorites not saved yet: {e}");
        return Ok(favorites);
    }

    let skipped = value
        .as_array()
        .map(|hashes| {
            hashes
                .iter()
                .filter(|raw| raw.as_str().and_then(ContentHash::parse_lenient).is_none())
                .count()
        })
        .unwrap_or(0);
    if skipped > 0 {
        warn!("Keeping {:?}: {} entries were not understood", legacy, skipped);
    } else if let Err(e) = retire(legacy) {
        warn!("Failed to remove legacy favorites: {e}");
    }
    Ok(favorites)
}
