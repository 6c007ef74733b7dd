//! One open source being viewed: its position, its look-ahead cache and its
//! persisted per-source settings.

use std::sync::Arc;
use tracing::debug;
use viewer_image::{ImageSource, Prefetcher};
use viewer_library::SourceSettingsStore;
use viewer_nav::NavState;
use viewer_types::{CachedImage, ReadingDirection};

pub struct ViewingSession {
    source: Arc<dyn ImageSource>,
    nav: NavState,
    prefetcher: Prefetcher,
    settings: SourceSettingsStore,
}

impl ViewingSession {
    /// Lists the source and restores its last position, falling back to the
    /// first entry.
    pub fn open(
        source: Arc<dyn ImageSource>,
        settings: SourceSettingsStore,
        prefetcher: Prefetcher,
    ) -> Self {
        let mut session = Self {
            source,
            nav: NavState::default(),
            prefetcher,
            settings,
        };
        session.load_entries();
        session
    }

    pub fn source(&self) -> &Arc<dyn ImageSource> {
        &self.source
    }

    pub fn nav(&self) -> &NavState {
        &self.nav
    }

    pub fn prefetcher(&self) -> &Prefetcher {
        &self.prefetcher
    }

    pub fn prefetcher_mut(&mut self) -> &mut Prefetcher {
        &mut self.prefetcher
    }

    pub fn current(&self) -> Option<&str> {
        self.nav.current()
    }

    pub fn index(&self) -> Option<usize> {
        self.nav.index()
    }

    /// Jumps to `idx`, records it and prefetches around it.
    pub fn go_to(&mut self, idx: usize) -> Option<usize> {
        self.nav.go_to(idx)?;
        self.moved()
    }

    /// Next entry, if any. Same bookkeeping as [`go_to`](Self::go_to).
    pub fn next(&mut self) -> Option<usize> {
        self.nav.go_next()?;
        self.moved()
    }

    pub fn prev(&mut self) -> Option<usize> {
        self.nav.go_prev()?;
        self.moved()
    }

    pub fn first(&mut self) -> Option<usize> {
        self.nav.first()?;
        self.moved()
    }

    pub fn last(&mut self) -> Option<usize> {
        self.nav.last()?;
        self.moved()
    }

    /// Full-resolution pixels of the current entry, from the look-ahead cache
    /// when possible. Blocking on a miss.
    pub fn current_image(&self) -> Option<CachedImage> {
        let location = self.nav.current()?;
        if let Some(image) = self.prefetcher.get_cached(location) {
            return Some(image);
        }

        let image = self.source.load_full(location)?;
        self.prefetcher.add_to_cache(location.to_string(), image.clone());
        Some(image)
    }

    /// Effective direction for this source.
    pub fn reading_direction(&self) -> ReadingDirection {
        self.settings
            .get_effective_reading_direction(self.source.root())
    }

    /// Flips and stores this source's direction.
    pub fn toggle_reading_direction(&self) -> ReadingDirection {
        self.settings.toggle_reading_direction(self.source.root())
    }

    /// Switches to another source. Nothing cached for the old one survives.
    pub fn change_source(&mut self, source: Arc<dyn ImageSource>) {
        self.prefetcher.clear_cache();
        self.source = source;
        self.load_entries();
    }

    /// Re-reads the entry list, keeping the current entry selected when it
    /// still exists.
    pub fn refresh(&mut self) {
        let current = self.nav.current().map(str::to_string);
        let entries = self.source.list_entries();
        let select = current.and_then(|c| entries.iter().position(|e| *e == c));
        self.nav.set_entries(entries, select.or(Some(0)));
        self.schedule_prefetch();
    }

    fn load_entries(&mut self) {
        let entries = self.source.list_entries();
        let restored = self
            .settings
            .get_last_position(self.source.root())
            .filter(|&idx| idx < entries.len());
        debug!(
            "Session opened with {} entries at {:?}",
            entries.len(),
            restored
        );

        self.nav.set_entries(entries, restored.or(Some(0)));
        self.schedule_prefetch();
    }

    fn moved(&mut self) -> Option<usize> {
        let idx = self.nav.index()?;
        self.settings.set_last_position(self.source.root(), idx);
        self.schedule_prefetch();
        Some(idx)
    }

    fn schedule_prefetch(&mut self) {
        let Some(idx) = self.nav.index() else {
            return;
        };
        self.prefetcher.prefetch_around(
            idx,
            self.nav.entries(),
            Arc::clone(&self.source),
            self.nav.previous_index(),
        );
    }
}
