use image::{Rgba, RgbaImage};
use shared::image::{ThumbnailFormat, encode};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use viewer::CacheServices;
use viewer_config::CacheConfig;
use viewer_image::{FolderSource, ImageSource};

const SECRET_FOLDER: &str = "very_private_album";
const SECRET_FILE: &str = "secret_holiday";

fn collect_files(dir: &Path, out: &mut Vec<std::path::PathBuf>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect_files(&path, out);
        } else {
            out.push(path);
        }
    }
}

#[test]
fn test_no_plaintext_paths_are_persisted() {
    let data = TempDir::new().unwrap();
    let photos = TempDir::new().unwrap();
    let album = photos.path().join(SECRET_FOLDER);
    fs::create_dir_all(&album).unwrap();

    let img = RgbaImage::from_pixel(20, 10, Rgba([1, 2, 3, 255]));
    let png = encode(&img, ThumbnailFormat::Png).unwrap();
    let location = album.join(format!("{SECRET_FILE}.png"));
    fs::write(&location, &png).unwrap();
    let location = location.to_string_lossy().into_owned();

    let source = FolderSource::new(&album);
    let services = CacheServices::open_in(data.path(), CacheConfig::default());
    services.thumbnail(&source, &location).unwrap();
    services.toggle_favorite(&source, &location);
    services.settings().set_last_position(source.root(), 0);
    services.settings().toggle_reading_direction(source.root());

    let mut files = Vec::new();
    collect_files(data.path(), &mut files);
    assert!(files.len() >= 4);

    for file in files {
        let name = file.strip_prefix(data.path()).unwrap().to_string_lossy().into_owned();
        assert!(!name.contains(SECRET_FOLDER), "{name}");
        assert!(!name.contains(SECRET_FILE), "{name}");

        let bytes = fs::read(&file).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(!text.contains(SECRET_FOLDER), "{name} leaks the folder");
        assert!(!text.contains(SECRET_FILE), "{name} leaks the file name");
    }
}
