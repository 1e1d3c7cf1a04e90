use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::app_err::AppResult;
use crate::commands::snapshot::{DEFAULT_DESCRIPTION, SnapshotOptions};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AppSettings {
    pub profile: String,
    pub region: Option<String>,
    pub ec2_endpoint: Option<String>,
    pub wait_timeout_secs: u64,
    pub snapshot_description: String,
}

impl AppSettings {
    /// Defaults, then `settings.toml` (or `path`) if present, then `SHOTTY_*` variables.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("settings.toml").required(false),
        };

        let settings: AppSettings = Config::builder()
            .set_default("profile", "shotty")?
            .set_default("wait_timeout_secs", 900)?
            .set_default("snapshot_description", DEFAULT_DESCRIPTION)?
            .add_source(file)
            .add_source(Environment::with_prefix("SHOTTY"))
            .build()?
            .try_deserialize()?;

        if settings.wait_timeout_secs == 0 {
            return Err(ConfigError::Message("wait_timeout_secs must be at least 1".to_string()).into());
        }

        Ok(settings)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn snapshot_options(&self) -> SnapshotOptions {
        SnapshotOptions {
            description: self.snapshot_description.clone(),
            wait_timeout: self.wait_timeout(),
        }
    }
}
