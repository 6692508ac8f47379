// config module: TOML settings file, discovery and defaults

pub mod loader;
pub mod types;

pub use loader::load_config;
pub use types::AppConfig;
