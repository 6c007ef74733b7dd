pub mod direction;
pub mod nav;
pub mod scan;

pub use direction::{TravelDirection, TravelTracker, prefetch_order};
pub use nav::NavState;
pub use scan::{is_supported_image, natural_cmp, scan_dir};
