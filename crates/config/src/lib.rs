//! Configuration loading: defaults, discovered file, environment overrides.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        apply_env_overrides, clear_config_dir, config_dir, discover_and_load, load_config,
        load_effective, set_config_dir,
    },
    schema::{BridgeConfig, ServerConfig, SessionConfig, ThrottleConfig, VenomConfig},
};
