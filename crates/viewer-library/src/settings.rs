//! Per-source viewer state keyed by the hashed source path.

use shared::storage::{read_json, remove_if_exists, write_json_atomic};
use shared::{LocationHash, StoreResult, hash_str};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use viewer_types::{ReadingDirection, SourceSettings};

pub const SETTINGS_FILE: &str = "source_settings.json";
pub const LEGACY_POSITIONS_FILE: &str = "last_positions.json";

type SettingsTable = BTreeMap<LocationHash, SourceSettings>;

/// Settings table shared by every view, written through on every change.
#[derive(Clone, Debug)]
pub struct SourceSettingsStore {
    table: Arc<Mutex<SettingsTable>>,
    writer: Arc<Mutex<()>>,
    path: PathBuf,
    default_direction: ReadingDirection,
}

impl SourceSettingsStore {
    /// Loads `source_settings.json` from `root`. Sources without an override
    /// read as `default_direction`.
    pub fn open_in(root: &Path, default_direction: ReadingDirection) -> Self {
        let path = root.join(SETTINGS_FILE);
        let table = load(&path, &root.join(LEGACY_POSITIONS_FILE));
        debug!("Source settings loaded for {} sources", table.len());

        Self {
            table: Arc::new(Mutex::new(table)),
            writer: Arc::new(Mutex::new(())),
            path,
            default_direction,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Direction used by sources without their own override.
    pub fn default_direction(&self) -> ReadingDirection {
        self.default_direction
    }

    /// The stored record, if the source has one.
    pub fn get(&self, source_path: &str) -> Option<SourceSettings> {
        let key = hash_str(source_path);
        self.table.lock().ok()?.get(&key).copied()
    }

    /// Read-modify-write of one record. Records left empty are dropped.
    pub fn update(
        &self,
        source_path: &str,
        mutate: impl FnOnce(&mut SourceSettings),
    ) -> SourceSettings {
        let key = hash_str(source_path);
        let updated = {
            let Ok(mut table) = self.table.lock() else {
                return SourceSettings::default();
            };
            let current = table.get(&key).copied().unwrap_or_default();
            let mut updated = current;
            mutate(&mut updated);
            if updated == current {
                return updated;
            }

            if updated.is_empty() {
                table.remove(&key);
            } else {
                table.insert(key, updated);
            }
            updated
        };
        self.persist();
        updated
    }

    /// Entry index the source was last left at.
    pub fn get_last_position(&self, source_path: &str) -> Option<usize> {
        self.get(source_path)?.last_position
    }

    /// Records where the source was left.
    pub fn set_last_position(&self, source_path: &str, position: usize) {
        self.update(source_path, |settings| settings.last_position = Some(position));
    }

    /// Forgets the position. The record goes if nothing else is set.
    pub fn clear_last_position(&self, source_path: &str) {
        self.update(source_path, |settings| settings.last_position = None);
    }

    /// The stored override only.
    pub fn get_reading_direction(&self, source_path: &str) -> Option<ReadingDirection> {
        self.get(source_path)?.reading_direction
    }

    /// The override, else the default direction.
    pub fn get_effective_reading_direction(&self, source_path: &str) -> ReadingDirection {
        self.get_reading_direction(source_path)
            .unwrap_or(self.default_direction)
    }

    /// `None` removes the override.
    pub fn set_reading_direction(&self, source_path: &str, direction: Option<ReadingDirection>) {
        self.update(source_path, |settings| settings.reading_direction = direction);
    }

    /// Flips the effective direction and stores it as an override.
    pub fn toggle_reading_direction(&self, source_path: &str) -> ReadingDirection {
        let default_direction = self.default_direction;
        let updated = self.update(source_path, |settings| {
            let effective = settings.reading_direction.unwrap_or(default_direction);
            settings.reading_direction = Some(effective.toggle());
        });
        updated.reading_direction.unwrap_or(default_direction)
    }

    /// Number of sources with a stored record.
    pub fn len(&self) -> usize {
        self.table.lock().map(|table| table.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> BTreeMap<LocationHash, SourceSettings> {
        self.table
            .lock()
            .map(|table| table.clone())
            .unwrap_or_default()
    }

    fn persist(&self) {
        let Ok(_writer) = self.writer.lock() else {
            return;
        };
        let snapshot = match self.table.lock() {
            Ok(table) => table.clone(),
            Err(_) => return,
        };

        if let Err(e) = write_json_atomic(&self.path, &snapshot) {
            warn!("Failed to persist source settings: {e}");
        }
    }
}

fn load(path: &Path, legacy: &Path) -> SettingsTable {
    match read_json::<BTreeMap<String, SourceSettings>>(path) {
        Ok(Some(raw)) => raw
            .into_iter()
            .filter_map(|(key, value)| Some((LocationHash::parse(&key)?, value)))
            .collect(),
        Ok(None) => migrate_legacy(path, legacy, remove_if_exists).unwrap_or_else(|e| {
            warn!("Ignoring unreadable legacy positions: {e}");
            SettingsTable::new()
        }),
        Err(e) => {
            warn!("Discarding unreadable source settings: {e}");
            SettingsTable::new()
        }
    }
}

/// Wraps every legacy position into a settings record.
///
/// Only an unreadable legacy file is an error. Once parsed, the positions are
/// kept in memory even if the new table cannot be written yet, and the
/// legacy file is retired only when the table is on disk and every key was
/// understood.
fn migrate_legacy(
    path: &Path,
    legacy: &Path,
    retire: impl FnOnce(&Path) -> StoreResult<bool>,
) -> StoreResult<SettingsTable> {
    let Some(raw) = read_json::<BTreeMap<String, usize>>(legacy)? else {
        return Ok(SettingsTable::new());
    };

    let total = raw.len();
    let table: SettingsTable = raw
        .into_iter()
        .filter_map(|(key, position)| {
            let key = LocationHash::parse_lenient(&key)?;
            Some((key, SourceSettings::with_last_position(position)))
        })
        .collect();

    if let Err(e) = write_json_atomic(path, &table) {
        warn!("Migrated positions not saved yet: {e}");
        return Ok(table);
    }

    if table.len() != total {
        warn!(
            "Keeping {:?}: {} entries were not understood",
            legacy,
            total - table.len()
        );
    } else if let Err(e) = retire(legacy) {
        warn!("Failed to remove legacy positions: {e}");
    }

    info!("Migrated {} legacy last positions", table.len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::StoreError;
    use std::fs;
    use std::io;
    use tempfile::TempDir;

    const BOOK: &str = "/comics/book.cbz";

    fn store(dir: &TempDir) -> SourceSettingsStore {
        SourceSettingsStore::open_in(dir.path(), ReadingDirection::Ltr)
    }

    fn write_legacy(dir: &TempDir, body: String) -> PathBuf {
        let legacy = dir.path().join(LEGACY_POSITIONS_FILE);
        fs::write(&legacy, body).unwrap();
        legacy
    }

    #[test]
    fn test_last_position() {
        let dir = TempDir::new().unwrap();
        let settings = store(&dir);

        assert_eq!(settings.get(BOOK), None);
        assert_eq!(settings.get_last_position(BOOK), None);
        settings.set_last_position(BOOK, 17);
        assert_eq!(settings.get(BOOK), Some(SourceSettings::with_last_position(17)));
        assert_eq!(store(&dir).get_last_position(BOOK), Some(17));
    }

    #[test]
    fn test_round_trip_many_records() {
        let dir = TempDir::new().unwrap();
        let settings = store(&dir);
        for i in 0..20usize {
            let source = format!("/library/volume-{i}.cbz");
            settings.set_last_position(&source, i * 3);
            if i % 2 == 0 {
                settings.set_reading_direction(&source, Some(ReadingDirection::Rtl));
            }
        }

        let reloaded = store(&dir);

        assert_eq!(reloaded.len(), 20);
        assert_eq!(reloaded.snapshot(), settings.snapshot());
        assert_eq!(
            reloaded.get("/library/volume-4.cbz"),
            Some(SourceSettings {
                last_position: Some(12),
                reading_direction: Some(ReadingDirection::Rtl),
            })
        );
        assert_eq!(reloaded.get_reading_direction("/library/volume-5.cbz"), None);
    }

    #[test]
    fn test_empty_record_is_removed() {
        let dir = TempDir::new().unwrap();
        let settings = store(&dir);

        settings.set_last_position(BOOK, 3);
        settings.set_reading_direction(BOOK, Some(ReadingDirection::Rtl));
        settings.clear_last_position(BOOK);
        assert_eq!(settings.len(), 1);

        settings.set_reading_direction(BOOK, None);
        assert!(settings.is_empty());
        assert_eq!(settings.get(BOOK), None);
        assert!(store(&dir).is_empty());
    }

    #[test]
    fn test_effective_direction_and_toggle() {
        let dir = TempDir::new().unwrap();
        let settings = SourceSettingsStore::open_in(dir.path(), ReadingDirection::Rtl);

        assert_eq!(settings.get_reading_direction(BOOK), None);
        assert_eq!(settings.get_effective_reading_direction(BOOK), ReadingDirection::Rtl);

        assert_eq!(settings.toggle_reading_direction(BOOK), ReadingDirection::Ltr);
        assert_eq!(settings.get_reading_direction(BOOK), Some(ReadingDirection::Ltr));
        assert_eq!(settings.toggle_reading_direction(BOOK), ReadingDirection::Rtl);
        // stored explicitly even though it now matches the default
        assert_eq!(settings.get_reading_direction(BOOK), Some(ReadingDirection::Rtl));
    }

    #[test]
    fn test_keys_are_hashed() {
        let dir = TempDir::new().unwrap();
        let settings = store(&dir);
        settings.set_last_position(BOOK, 1);

        let raw = fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap();
        assert!(!raw.contains("comics"));
        assert!(raw.contains(hash_str(BOOK).as_str()));
    }

    #[test]
    fn test_legacy_positions_are_migrated() {
        let dir = TempDir::new().unwrap();
        let legacy = write_legacy(&dir, format!(r#"{{"{}": 9}}"#, hash_str(BOOK)));

        let settings = store(&dir);

        assert_eq!(settings.get_last_position(BOOK), Some(9));
        assert!(!legacy.exists());
        assert!(dir.path().join(SETTINGS_FILE).exists());
    }

    #[test]
    fn test_legacy_bare_hex_keys_are_migrated() {
        let dir = TempDir::new().unwrap();
        let legacy = write_legacy(&dir, format!(r#"{{"{}": 5}}"#, hash_str(BOOK).hex()));

        let settings = store(&dir);

        assert_eq!(settings.get_last_position(BOOK), Some(5));
        assert!(!legacy.exists());
    }

    #[test]
    fn test_legacy_kept_when_keys_are_not_understood() {
        let dir = TempDir::new().unwrap();
        let legacy = write_legacy(
            &dir,
            format!(r#"{{"{}": 2, "/plain/path.cbz": 8}}"#, hash_str(BOOK)),
        );

        let settings = store(&dir);

        assert_eq!(settings.get_last_position(BOOK), Some(2));
        assert_eq!(settings.len(), 1);
        assert!(legacy.exists());
    }

    #[test]
    fn test_unreadable_legacy_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let legacy = write_legacy(&dir, "{not json".to_string());

        let settings = store(&dir);

        assert!(settings.is_empty());
        assert!(legacy.exists());
        assert!(!dir.path().join(SETTINGS_FILE).exists());
    }

    #[test]
    fn test_failed_legacy_removal_keeps_migrated_table() {
        let dir = TempDir::new().unwrap();
        let legacy = write_legacy(&dir, format!(r#"{{"{}": 9}}"#, hash_str(BOOK)));
        let path = dir.path().join(SETTINGS_FILE);

        let table = migrate_legacy(&path, &legacy, |p| {
            Err(StoreError::io(p, io::Error::other("busy")))
        })
        .unwrap();

        assert_eq!(table.get(&hash_str(BOOK)), Some(&SourceSettings::with_last_position(9)));
        assert!(legacy.exists());
        // the next write-through must carry the migrated record along
        let settings = store(&dir);
        settings.set_last_position("/comics/other.cbz", 1);
        assert_eq!(store(&dir).get_last_position(BOOK), Some(9));
    }

    #[test]
    fn test_legacy_ignored_when_current_exists() {
        let dir = TempDir::new().unwrap();
        store(&dir).set_last_position(BOOK, 1);
        let legacy = write_legacy(&dir, format!(r#"{{"{}": 9}}"#, hash_str(BOOK)));

        let settings = store(&dir);

        assert_eq!(settings.get_last_position(BOOK), Some(1));
        assert!(legacy.exists());
    }

    #[test]
    fn test_unknown_fields_are_tolerated() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE),
            format!(r#"{{"{}": {{"last_position": 4, "zoom": 2.0}}}}"#, hash_str(BOOK)),
        )
        .unwrap();

        assert_eq!(store(&dir).get_last_position(BOOK), Some(4));
    }
}
