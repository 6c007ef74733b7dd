pub mod cache;
pub mod error;
pub mod hash;
pub mod image;
pub mod storage;

pub use error::{StoreError, StoreResult};
pub use hash::{ContentHash, LocationHash, hash_bytes, hash_str, location_key};
