pub mod resources;
pub mod token;
pub mod validate;
