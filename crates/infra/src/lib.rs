//! Infrastructure layer: credential stores, configuration, startup seeding.

pub mod config;
pub mod seed;
pub mod store;


pub use config::{AppConfig, ConfigError};
pub use seed::{seed_defaults, SeedReport};
pub use store::{InMemoryCredentialStore, PostgresCredentialStore};
