//! Full-resolution look-ahead cache for one viewing session.
//!
//! Holds the current image plus `prefetch_count` neighbours in each
//! direction. A new `prefetch_around` call always cancels the previous job;
//! cancellation is cooperative and checked before each load and again under
//! the cache lock, so the load already in flight is discarded.

use crate::source::ImageSource;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use viewer_config::MAX_PREFETCH_COUNT;
use viewer_nav::{TravelTracker, prefetch_order};
use viewer_types::CachedImage;

type FullImageCache = Arc<Mutex<LruCache<String, CachedImage>>>;

struct PrefetchJob {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<usize>,
}

pub struct Prefetcher {
    cache: FullImageCache,
    prefetch_count: usize,
    tracker: TravelTracker,
    job: Option<PrefetchJob>,
    runtime: Handle,
}

impl Prefetcher {
    /// `prefetch_count` is clamped to `0..=MAX_PREFETCH_COUNT`.
    pub fn new(prefetch_count: usize, runtime: Handle) -> Self {
        let prefetch_count = prefetch_count.min(MAX_PREFETCH_COUNT);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity_for(prefetch_count)))),
            prefetch_count,
            tracker: TravelTracker::new(),
            job: None,
            runtime,
        }
    }

    /// Look-ahead per direction after clamping.
    pub fn prefetch_count(&self) -> usize {
        self.prefetch_count
    }

    /// Full images kept: the current one plus both look-ahead windows.
    pub fn capacity(&self) -> usize {
        capacity_for(self.prefetch_count).get()
    }

    /// Resizes the cache, evicting least recently used images if it shrinks.
    pub fn set_prefetch_count(&mut self, prefetch_count: usize) {
        self.prefetch_count = prefetch_count.min(MAX_PREFETCH_COUNT);
        if let Ok(mut cache) = self.cache.lock() {
            cache.resize(capacity_for(self.prefetch_count));
        }
    }

    /// Marks `path` most recently used on a hit.
    pub fn get_cached(&self, path: &str) -> Option<CachedImage> {
        self.cache.lock().ok()?.get(path).cloned()
    }

    /// Stores an image loaded by the viewer itself.
    pub fn add_to_cache(&self, path: String, image: CachedImage) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(path, image);
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when no job is scheduled or the last one has finished.
    pub fn is_idle(&self) -> bool {
        self.job.as_ref().is_none_or(|job| job.handle.is_finished())
    }

    /// Schedules background loads around `current` and returns the entry
    /// indices queued, in load order.
    pub fn prefetch_around(
        &mut self,
        current: usize,
        entries: &[String],
        source: Arc<dyn ImageSource>,
        previous: Option<usize>,
    ) -> Vec<usize> {
        let direction = self.tracker.observe(current, previous);
        let candidates: Vec<usize> = {
            let Ok(cache) = self.cache.lock() else {
                return Vec::new();
            };
            prefetch_order(current, entries.len(), self.prefetch_count, direction)
                .into_iter()
                .filter(|&idx| !cache.contains(entries[idx].as_str()))
                .collect()
        };

        self.cancel();
        if candidates.is_empty() {
            return candidates;
        }

        debug!(
            "Prefetching {} images {:?} of index {}",
            candidates.len(),
            direction,
            current
        );

        let locations: Vec<String> = candidates.iter().map(|&idx| entries[idx].clone()).collect();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let cache = Arc::clone(&self.cache);

        let handle = self.runtime.spawn_blocking(move || {
            let mut loaded = 0;
            for location in locations {
                if flag.load(Ordering::Acquire) {
                    break;
                }
                let Some(image) = source.load_full(&location) else {
                    warn!("Prefetch load failed for entry");
                    continue;
                };
                // Checked under the lock so a concurrent clear wins.
                let Ok(mut guard) = cache.lock() else {
                    break;
                };
                if flag.load(Ordering::Acquire) {
                    break;
                }
                guard.put(location, image);
                loaded += 1;
            }
            loaded
        });

        self.job = Some(PrefetchJob { cancelled, handle });
        candidates
    }

    /// Stops the in-flight job after its current load.
    pub fn cancel(&mut self) {
        if let Some(job) = self.job.take() {
            job.cancelled.store(true, Ordering::Release);
        }
    }

    /// Cancels any job and forgets every cached image.
    pub fn clear_cache(&mut self) {
        self.cancel();
        self.tracker.reset();
        // after cancel, so a job that takes the lock next sees the flag
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Waits for the in-flight job and returns how many images it added.
    pub async fn join(&mut self) -> usize {
        match self.job.take() {
            Some(job) => job.handle.await.unwrap_or_else(|e| {
                warn!("Prefetch job failed: {e}");
                0
            }),
            None => 0,
        }
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn capacity_for(prefetch_count: usize) -> NonZeroUsize {
    NonZeroUsize::MIN.saturating_add(2 * prefetch_count)
}
