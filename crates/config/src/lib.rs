//! Configuration loading for the shopbridge daemon.
//! File discovery, `${ENV_VAR}` substitution, defaults on absence.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{discover_and_load, load_config},
    schema::{AppConfig, ErpConfig, JobConfig, JobsConfig, StorageBackend, StorageConfig},
};
