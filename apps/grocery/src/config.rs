//! Configuration for the grocery CLI

use std::time::Duration;

use clap::ValueEnum;
use core_config::mongodb::MongoConfig;
use core_config::{ConfigError, FromEnv, env_or_default, env_parse};
use strum::{Display, EnumString};

// Re-export Environment for use in other modules
pub use core_config::Environment;

/// Where the grocery list is stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, ValueEnum)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Backend {
    /// MongoDB collection, kept live through change streams
    #[default]
    Mongodb,
    /// Process-local list seeded with sample items
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub backend: Backend,
    /// Name of the remote collection holding the list
    pub collection: String,
    /// How long to wait for the first snapshot before giving up
    pub snapshot_timeout: Duration,
    /// Present when a MongoDB URL is configured
    pub mongodb: Option<MongoConfig>,
}

impl Config {
    /// Environment variables:
    /// - `GROCERY_BACKEND` (default: `mongodb`)
    /// - `GROCERY_COLLECTION` (default: `groceries`)
    /// - `GROCERY_SNAPSHOT_TIMEOUT_SECS` (default: 10)
    /// - the `MONGODB_*` variables read by [`MongoConfig`]
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();

        let mongodb = match MongoConfig::from_env() {
            Ok(config) => Some(config),
            Err(ConfigError::MissingEnvVar(_)) => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            environment,
            backend: env_parse("GROCERY_BACKEND", Backend::default())?,
            collection: env_or_default("GROCERY_COLLECTION", "groceries"),
            snapshot_timeout: Duration::from_secs(env_parse("GROCERY_SNAPSHOT_TIMEOUT_SECS", 10)?),
            mongodb,
        })
    }
}
