// Public (no session) and resource (session required) handlers
pub mod public;
pub mod query;
pub mod resource;

pub use public::{health, not_found, root};
pub use resource::{resource_handler, ALLOWED_METHODS};
