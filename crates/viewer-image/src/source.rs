//! Capability interface implemented by every kind of image source.

use shared::image::{decode_rgba, render_thumbnail};
use shared::{LocationHash, hash_str, location_key};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use viewer_nav::scan_dir;
use viewer_types::CachedImage;

/// A folder, archive or rendered document the cache can pull images from.
///
/// Locations are opaque strings chosen by the source; the cache only ever
/// hashes them.
pub trait ImageSource: Send + Sync {
    /// Stable identity of the whole source, e.g. the folder or archive path.
    fn root(&self) -> &str;

    /// Raw encoded bytes of one entry.
    fn decode(&self, location: &str) -> Option<Vec<u8>>;

    /// Entry locations in display order.
    fn list_entries(&self) -> Vec<String>;

    /// Derived thumbnail no larger than `max_size` on either side.
    fn render(&self, data: &[u8], max_size: u32) -> Option<CachedImage> {
        match render_thumbnail(data, max_size) {
            Ok(pixels) => Some(CachedImage::new(pixels)),
            Err(e) => {
                warn!("Failed to render thumbnail: {e}");
                None
            }
        }
    }

    /// Full-resolution pixels of one entry.
    fn load_full(&self, location: &str) -> Option<CachedImage> {
        let data = self.decode(location)?;
        match decode_rgba(&data) {
            Ok(pixels) => Some(CachedImage::new(pixels)),
            Err(e) => {
                warn!("Failed to decode full image: {e}");
                None
            }
        }
    }
}

/// Index and favorite identity of one entry. Qualified by the source root
/// so equal entry names in different sources never collide.
pub fn entry_hash<S: ImageSource + ?Sized>(source: &S, location: &str) -> LocationHash {
    hash_str(&location_key(source.root(), location))
}

/// Plain directory of image files. Locations are the files' full paths.
#[derive(Debug, Clone)]
pub struct FolderSource {
    dir: PathBuf,
    root: String,
    include_hidden: bool,
}

impl FolderSource {
    /// Source over the images directly inside `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let root = dir.to_string_lossy().into_owned();
        Self {
            dir,
            root,
            include_hidden: false,
        }
    }

    /// Lists dot files as well.
    pub fn include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn owns(&self, location: &Path) -> bool {
        location.parent() == Some(self.dir.as_path())
    }
}

impl ImageSource for FolderSource {
    fn root(&self) -> &str {
        &self.root
    }

    fn decode(&self, location: &str) -> Option<Vec<u8>> {
        let path = Path::new(location);
        if !self.owns(path) {
            debug!("Location outside of folder source requested");
            return None;
        }

        match fs::read(path) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("Failed to read {:?}: {}", path, e);
                None
            }
        }
    }

    fn list_entries(&self) -> Vec<String> {
        scan_dir(&self.dir, self.include_hidden)
            .into_iter()
            .map(|path| path.to_string_lossy().into_owned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use shared::image::{ThumbnailFormat, encode};
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> String {
        let img = RgbaImage::from_pixel(width, height, Rgba([9, 9, 9, 255]));
        let path = dir.join(name);
        fs::write(&path, encode(&img, ThumbnailFormat::Png).unwrap()).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_folder_lists_and_decodes() {
        let dir = TempDir::new().unwrap();
        let second = write_png(dir.path(), "p2.png", 8, 8);
        let first = write_png(dir.path(), "p1.png", 40, 20);
        let source = FolderSource::new(dir.path());

        assert_eq!(source.list_entries(), vec![first.clone(), second]);

        let data = source.decode(&first).unwrap();
        let thumb = source.render(&data, 10).unwrap();
        assert_eq!((thumb.width, thumb.height), (10, 5));

        let full = source.load_full(&first).unwrap();
        assert_eq!((full.width, full.height), (40, 20));
    }

    #[test]
    fn test_folder_refuses_foreign_locations() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let foreign = write_png(other.path(), "x.png", 2, 2);

        let source = FolderSource::new(dir.path());

        assert!(source.decode(&foreign).is_none());
    }

    #[test]
    fn test_undecodable_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"not a png").unwrap();
        let source = FolderSource::new(dir.path());
        let location = path.to_string_lossy().into_owned();

        assert!(source.decode(&location).is_some());
        assert!(source.load_full(&location).is_none());
        assert!(source.render(b"not a png", 16).is_none());
    }
}
