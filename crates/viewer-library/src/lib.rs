pub mod favorites;
pub mod settings;

pub use favorites::{Favorites, FavoritesLedger};
pub use settings::SourceSettingsStore;

use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
