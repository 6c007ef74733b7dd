//! Digest helpers used to key every cache record.
//!
//! Both content and location identities are SHA-256 digests rendered as
//! `sha256:<hex>`. Locations are only ever stored in hashed form so nothing
//! persisted under the data root reveals a folder or file name.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub const HASH_ALGORITHM: &str = "sha256";

/// Identity of *what* an image is: the digest of its decoded bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

/// Identity of *where* an item lives: the digest of a location string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationHash(String);

macro_rules! tagged_digest {
    ($name:ident) => {
        impl $name {
            /// Accepts an already formatted `algorithm:hex` string.
            pub fn parse(tagged: &str) -> Option<Self> {
                let (algorithm, hex) = tagged.split_once(':')?;
                let valid = algorithm == HASH_ALGORITHM
                    && hex.len() == 64
                    && hex.bytes().all(|b| b.is_ascii_hexdigit());
                valid.then(|| Self(tagged.to_ascii_lowercase()))
            }

            /// Like [`parse`](Self::parse), also accepting a bare hex digest
            /// as written by early builds.
            pub fn parse_lenient(raw: &str) -> Option<Self> {
                Self::parse(raw).or_else(|| Self::parse(&format!("{HASH_ALGORITHM}:{raw}")))
            }

            /// Full tagged form, as persisted.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// The digest without its algorithm tag.
            pub fn hex(&self) -> &str {
                self.0
                    .split_once(':')
                    .map(|(_, hex)| hex)
                    .unwrap_or(&self.0)
            }

            pub fn is_valid(&self) -> bool {
                Self::parse(&self.0).is_some()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

tagged_digest!(ContentHash);
tagged_digest!(LocationHash);

fn digest(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("{HASH_ALGORITHM}:{digest:x}")
}

/// Digest of raw image bytes. Equal bytes give equal hashes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    ContentHash(digest(data))
}

/// Digest of a location string, so paths never appear on disk.
pub fn hash_str(location: &str) -> LocationHash {
    LocationHash(digest(location.as_bytes()))
}

/// Composite location string for an entry inside a source (archive member,
/// folder file, document page). NUL cannot appear in either half of a path.
pub fn location_key(source_root: &str, entry: &str) -> String {
    format!("{source_root}\u{0}{entry}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let hash = hash_bytes(b"abc");
        assert_eq!(
            hash.as_str(),
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash.hex().len(), 64);
    }

    #[test]
    fn test_bytes_and_str_agree() {
        assert_eq!(hash_bytes(b"/a/cat.png").as_str(), hash_str("/a/cat.png").as_str());
    }

    #[test]
    fn test_location_hash_hides_path() {
        let hash = hash_str("/home/user/Pictures/holiday.png");
        assert!(!hash.as_str().contains("holiday"));
        assert!(hash.is_valid());
    }

    #[test]
    fn test_location_key_is_unambiguous() {
        assert_ne!(
            hash_str(&location_key("/a/b", "c.png")),
            hash_str(&location_key("/a", "b/c.png"))
        );
    }

    #[test]
    fn test_parse_lenient_accepts_bare_hex() {
        let hash = hash_str("/comics/book.cbz");
        assert_eq!(LocationHash::parse_lenient(hash.hex()), Some(hash.clone()));
        assert_eq!(LocationHash::parse_lenient(hash.as_str()), Some(hash));
        assert!(LocationHash::parse_lenient("/comics/book.cbz").is_none());
        assert!(LocationHash::parse(hash_str("x").hex()).is_none());
    }

    #[test]
    fn test_parse_rejects_other_formats() {
        assert!(ContentHash::parse("md5:abc").is_none());
        assert!(ContentHash::parse("sha256:xyz").is_none());
        let valid = hash_bytes(b"x");
        assert_eq!(ContentHash::parse(valid.as_str()), Some(valid));
    }
}
