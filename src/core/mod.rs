pub mod config;
pub mod manager;

pub use config::{CacheConfig, DefaultsConfig};
pub use manager::DefaultsManager;
