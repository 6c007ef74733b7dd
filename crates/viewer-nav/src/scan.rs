use shared::image::is_supported_extension;
use std::cmp::Ordering;
use std::fs;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;
use tracing::warn;

/// Supported images directly inside `dir`, in natural name order.
pub fn scan_dir(dir: &Path, include_hidden: bool) -> Vec<PathBuf> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) => {
            warn!("Failed to read directory {:?}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut images: Vec<PathBuf> = read
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| include_hidden || !is_hidden(path))
        .filter(|path| is_supported_image(path))
        .collect();

    images.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    images
}

/// Extension check only; the file is not opened.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(is_supported_extension)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Case-insensitive ordering that compares digit runs by value, so
/// `page2` sorts before `page10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        let ordering = match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                take_number(&mut a).cmp(&take_number(&mut b))
            }
            (Some(x), Some(y)) => {
                a.next();
                b.next();
                x.to_lowercase().cmp(y.to_lowercase())
            }
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

fn take_number(chars: &mut Peekable<Chars<'_>>) -> u64 {
    let mut value: u64 = 0;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        value = value.saturating_mul(10).saturating_add(u64::from(digit));
        chars.next();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_natural_order() {
        let mut names = vec!["page10.png", "Page2.png", "page1.png", "cover.png"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["cover.png", "page1.png", "Page2.png", "page10.png"]);
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b10.jpg", "b2.PNG", ".hidden.png", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.png")).unwrap();

        let found: Vec<String> = scan_dir(dir.path(), false)
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(found, vec!["b2.PNG", "b10.jpg"]);

        assert_eq!(scan_dir(dir.path(), true).len(), 3);
    }

    #[test]
    fn test_scan_missing_dir_is_empty() {
        assert!(scan_dir(Path::new("/definitely/not/here"), false).is_empty());
    }
}
