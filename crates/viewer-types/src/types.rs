use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Decoded pixels shared between caches. Clones are cheap and point at the
/// same buffer.
#[derive(Clone)]
pub struct CachedImage {
    pub pixels: Arc<RgbaImage>,
    pub width: u32,
    pub height: u32,
}

impl CachedImage {
    /// Wraps decoded pixels for cheap sharing.
    pub fn new(pixels: RgbaImage) -> Self {
        let (width, height) = pixels.dimensions();
        Self {
            pixels: Arc::new(pixels),
            width,
            height,
        }
    }

    /// True if both handles point at the same pixel buffer.
    pub fn same_buffer(&self, other: &CachedImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

impl From<RgbaImage> for CachedImage {
    fn from(pixels: RgbaImage) -> Self {
        Self::new(pixels)
    }
}

impl fmt::Debug for CachedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Merged favorite state of one occurrence of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteStatus {
    #[default]
    None,
    /// The same content is a favorite somewhere else.
    Inherited,
    /// This exact occurrence was favorited.
    Direct,
}

impl FavoriteStatus {
    pub fn is_favorite(self) -> bool {
        !matches!(self, FavoriteStatus::None)
    }
}

impl fmt::Display for FavoriteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FavoriteStatus::None => write!(f, "none"),
            FavoriteStatus::Inherited => write!(f, "inherited"),
            FavoriteStatus::Direct => write!(f, "direct"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadingDirection {
    #[default]
    Ltr,
    Rtl,
}

impl ReadingDirection {
    /// The opposite direction.
    pub fn toggle(self) -> Self {
        match self {
            ReadingDirection::Ltr => ReadingDirection::Rtl,
            ReadingDirection::Rtl => ReadingDirection::Ltr,
        }
    }
}

impl fmt::Display for ReadingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingDirection::Ltr => write!(f, "Left to Right"),
            ReadingDirection::Rtl => write!(f, "Right to Left"),
        }
    }
}

/// Per-source viewer state. Stored only while at least one field is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SourceSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_direction: Option<ReadingDirection>,
}

impl SourceSettings {
    pub fn with_last_position(position: usize) -> Self {
        Self {
            last_position: Some(position),
            ..Self::default()
        }
    }

    /// Nothing set, so the record need not be stored.
    pub fn is_empty(&self) -> bool {
        self.last_position.is_none() && self.reading_direction.is_none()
    }
}

/// On-disk thumbnail usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub file_count: usize,
    pub total_bytes: u64,
}
