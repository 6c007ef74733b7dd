use serde::{Deserialize, Serialize};
use shared::image::ThumbnailFormat;
use shared::storage::{read_json, write_json_atomic};
use shared::StoreResult;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use viewer_types::ReadingDirection;

pub const APP_DIR: &str = "folio";
const CONFIG_FILE: &str = "cache.json";

/// Upper bound for look-ahead in each direction.
pub const MAX_PREFETCH_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailSize {
    Small,
    #[default]
    Medium,
    Large,
    XLarge,
}

impl ThumbnailSize {
    /// Longest thumbnail edge.
    pub fn pixels(self) -> u32 {
        match self {
            ThumbnailSize::Small => 64,
            ThumbnailSize::Medium => 128,
            ThumbnailSize::Large => 192,
            ThumbnailSize::XLarge => 256,
        }
    }
}

impl fmt::Display for ThumbnailSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px", self.pixels())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Overrides the platform data directory for every persisted record
    pub data_dir: Option<PathBuf>,
    pub thumbnail_size: ThumbnailSize,
    pub thumbnail_format: ThumbnailFormat,
    /// Thumbnails kept decoded in memory, by count
    pub memory_thumbnails: usize,
    /// Images loaded ahead in each direction while viewing (0-5)
    pub prefetch_count: usize,
    /// Used for sources without their own override
    pub default_reading_direction: ReadingDirection,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            thumbnail_size: ThumbnailSize::default(),
            thumbnail_format: ThumbnailFormat::default(),
            memory_thumbnails: shared::cache::DEFAULT_MEMORY_THUMBNAILS,
            prefetch_count: 2,
            default_reading_direction: ReadingDirection::default(),
        }
    }
}

impl CacheConfig {
    /// Loads the config from the platform config directory, falling back to
    /// defaults when it is missing or unreadable.
    pub fn load() -> Self {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                warn!("No config directory available, using defaults");
                Self::default()
            }
        }
    }

    /// Loads from an explicit path. Missing or corrupt files give defaults.
    pub fn load_from(path: &Path) -> Self {
        match read_json::<CacheConfig>(path) {
            Ok(Some(config)) => {
                debug!("Loaded cache config from {:?}", path);
                config.normalized()
            }
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("Ignoring unreadable cache config: {e}");
                Self::default()
            }
        }
    }

    /// Writes the config back to the platform config directory.
    pub fn save(&self) -> StoreResult<()> {
        match config_path() {
            Some(path) => self.save_to(&path),
            None => {
                warn!("No config directory available, config not saved");
                Ok(())
            }
        }
    }

    /// Writes the config atomically to `path`.
    pub fn save_to(&self, path: &Path) -> StoreResult<()> {
        write_json_atomic(path, self)
    }

    /// Clamps values into their supported ranges.
    pub fn normalized(mut self) -> Self {
        if self.prefetch_count > MAX_PREFETCH_COUNT {
            warn!(
                "prefetch_count {} exceeds {}, clamping",
                self.prefetch_count, MAX_PREFETCH_COUNT
            );
            self.prefetch_count = MAX_PREFETCH_COUNT;
        }
        self.memory_thumbnails = self.memory_thumbnails.max(1);
        self
    }

    /// Root directory for every persisted cache record.
    pub fn data_root(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR)
        })
    }
}

/// `<config_dir>/folio/cache.json`, when the platform has a config dir.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig::load_from(&dir.path().join("cache.json"));
        assert_eq!(config, CacheConfig::default());
        assert_eq!(config.memory_thumbnails, 200);
        assert_eq!(config.prefetch_count, 2);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(
            &path,
            r#"{"prefetch_count": 9, "default_reading_direction": "rtl", "thumbnail_size": "large"}"#,
        )
        .unwrap();

        let config = CacheConfig::load_from(&path);

        assert_eq!(config.prefetch_count, MAX_PREFETCH_COUNT);
        assert_eq!(config.default_reading_direction, ReadingDirection::Rtl);
        assert_eq!(config.thumbnail_size.pixels(), 192);
        assert_eq!(config.thumbnail_format, ThumbnailFormat::Png);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "prefetch_count = 3").unwrap();

        assert_eq!(CacheConfig::load_from(&path), CacheConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let config = CacheConfig {
            data_dir: Some(dir.path().join("data")),
            thumbnail_format: ThumbnailFormat::Jpeg,
            prefetch_count: 4,
            ..CacheConfig::default()
        };

        config.save_to(&path).unwrap();

        assert_eq!(CacheConfig::load_from(&path), config);
        assert_eq!(config.data_root(), dir.path().join("data"));
    }

    #[test]
    fn test_format_is_lowercase_on_disk() {
        let json = serde_json::to_value(CacheConfig::default()).unwrap();
        assert_eq!(json["thumbnail_format"], "png");
        assert_eq!(json["default_reading_direction"], "ltr");
    }
}
