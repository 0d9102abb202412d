use crate::{env_parse, env_required, ConfigError, FromEnv};

/// MongoDB connection settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MongoConfig {
    /// Connection string, e.g. `mongodb://localhost:27017/?replicaSet=rs0`
    pub url: String,
    /// Database holding the grocery collection
    pub database: String,
    /// Application name reported to the server
    pub app_name: Option<String>,
    pub connect_timeout_secs: u64,
    pub server_selection_timeout_secs: u64,
}

impl MongoConfig {
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            app_name: None,
            connect_timeout_secs: 10,
            server_selection_timeout_secs: 30,
        }
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }
}

impl FromEnv for MongoConfig {
    /// Environment variables:
    /// - `MONGODB_URL` or `MONGO_URL` (required)
    /// - `MONGODB_DATABASE` (default: `grocery`)
    /// - `MONGODB_APP_NAME` (optional)
    /// - `MONGODB_CONNECT_TIMEOUT_SECS` (default: 10)
    /// - `MONGODB_SERVER_SELECTION_TIMEOUT_SECS` (default: 30)
    fn from_env() -> Result<Self, ConfigError> {
        let url = env_required("MONGODB_URL")
            .or_else(|_| env_required("MONGO_URL"))
            .map_err(|_| ConfigError::MissingEnvVar("MONGODB_URL or MONGO_URL".to_string()))?;

        Ok(Self {
            url,
            database: crate::env_or_default("MONGODB_DATABASE", "grocery"),
            app_name: std::env::var("MONGODB_APP_NAME").ok(),
            connect_timeout_secs: env_parse("MONGODB_CONNECT_TIMEOUT_SECS", 10)?,
            server_selection_timeout_secs: env_parse("MONGODB_SERVER_SELECTION_TIMEOUT_SECS", 30)?,
        })
    }
}
