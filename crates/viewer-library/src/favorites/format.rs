//! On-disk favorites formats, newest first.
//!
//! Each parser turns one historical layout into the in-memory model and
//! knows nothing about files or locking.

use super::{ContentEntry, Favorites, SourceEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{ContentHash, LocationHash};
use std::collections::{BTreeMap, BTreeSet};

pub const CURRENT_VERSION: u32 = 2;

/// Parsers for `favorites.json`, newest first.
pub const FORMATS: &[fn(&Value, u64) -> Option<Favorites>] = &[parse_v2, parse_v1];

/// Tries every known layout of `favorites.json`. The flag is set when the
/// record came from an older layout and must be rewritten.
pub fn decode(value: &Value, now: u64) -> Option<(Favorites, bool)> {
    FORMATS
        .iter()
        .enumerate()
        .find_map(|(i, parse)| parse(value, now).map(|favorites| (favorites, i > 0)))
}

#[derive(Serialize)]
struct CurrentRecordRef<'a> {
    version: u32,
    by_content: &'a BTreeMap<ContentHash, ContentEntry>,
    by_source: &'a BTreeMap<LocationHash, SourceEntry>,
}

#[derive(Deserialize)]
struct CurrentRecord {
    version: u32,
    #[serde(default)]
    by_content: BTreeMap<ContentHash, ContentEntry>,
    #[serde(default)]
    by_source: BTreeMap<LocationHash, SourceEntry>,
}

/// Current layout, tagged with [`CURRENT_VERSION`].
pub fn encode(favorites: &Favorites) -> Value {
    let record = CurrentRecordRef {
        version: CURRENT_VERSION,
        by_content: &favorites.by_content,
        by_source: &favorites.by_source,
    };
    serde_json::to_value(record).unwrap_or(Value::Null)
}

/// Current layout: versioned maps with timestamps and back-references.
pub fn parse_v2(value: &Value, _now: u64) -> Option<Favorites> {
    let record = CurrentRecord::deserialize(value).ok()?;
    if record.version != CURRENT_VERSION {
        return None;
    }

    let mut favorites = Favorites {
        by_content: record.by_content,
        by_source: record.by_source,
    };
    favorites.by_content.retain(|hash, _| hash.is_valid());
    favorites.by_source.retain(|hash, _| hash.is_valid());
    Some(favorites)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct V1Record {
    by_content: Vec<String>,
    #[serde(default)]
    by_source: Vec<String>,
    #[serde(default)]
    source_to_content: BTreeMap<String, String>,
}

/// Unversioned dual-index sets without timestamps.
pub fn parse_v1(value: &Value, now: u64) -> Option<Favorites> {
    let record = V1Record::deserialize(value).ok()?;
    let mut favorites = Favorites::default();

    for raw in &record.by_source {
        let Some(location) = LocationHash::parse_lenient(raw) else {
            continue;
        };
        let content_hash = record
            .source_to_content
            .get(raw)
            .and_then(|c| ContentHash::parse_lenient(c));
        favorites.by_source.insert(
            location,
            SourceEntry {
                added_at: now,
                content_hash,
            },
        );
    }

    for content in record.by_content.iter().filter_map(|c| ContentHash::parse_lenient(c)) {
        let sources: BTreeSet<LocationHash> = favorites
            .by_source
            .iter()
            .filter(|(_, entry)| entry.content_hash.as_ref() == Some(&content))
            .map(|(location, _)| location.clone())
            .collect();
        let pinned = sources.is_empty();
        favorites.by_content.insert(
            content,
            ContentEntry {
                added_at: now,
                sources,
                pinned,
            },
        );
    }

    Some(favorites)
}

/// Legacy `favorite_hashes.json`: a flat list of content hashes, each a
/// content-level favorite.
pub fn parse_legacy_list(value: &Value, now: u64) -> Option<Favorites> {
    let hashes: Vec<String> = Vec::deserialize(value).ok()?;
    let mut favorites = Favorites::default();

    for content in hashes.iter().filter_map(|c| ContentHash::parse_lenient(c)) {
        favorites.by_content.insert(content, ContentEntry::pinned(now));
    }
    Some(favorites)
}
