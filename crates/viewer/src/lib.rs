pub mod services;
pub mod session;

pub use services::CacheServices;
pub use session::ViewingSession;
