mod models;
pub mod utils;

pub use models::*;
pub use utils::*;
pub mod config;
pub mod keys;
pub mod partition;
pub mod store;
