pub mod types;

pub use types::{CacheStats, CachedImage, FavoriteStatus, ReadingDirection, SourceSettings};
