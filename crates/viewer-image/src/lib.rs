pub mod index;
pub mod prefetch;
pub mod source;
pub mod thumbnail;

pub use index::PathIndex;
pub use prefetch::Prefetcher;
pub use source::{FolderSource, ImageSource, entry_hash};
pub use thumbnail::ThumbnailStore;
