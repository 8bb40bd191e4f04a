//! Process settings: where the deploy artifact lives and how to reach the
//! chain. Loaded from an optional `market` config file with `MARKET_*`
//! environment overrides; every field has a default so the binary runs
//! with no file at all.

use crate::config::{ConfigSource, FileSource, HttpSource};
use crate::error::Error;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Deploy artifact location: an http(s) URL or a filesystem path.
    #[serde(default = "defaults::artifact")]
    pub artifact: String,
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "defaults::rpc_url")]
    pub rpc_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            artifact: defaults::artifact(),
            request_timeout_secs: defaults::request_timeout_secs(),
            rpc_url: defaults::rpc_url(),
        }
    }
}

mod defaults {
    pub fn artifact() -> String {
        "deployed-contracts.json".to_string()
    }

    pub fn request_timeout_secs() -> u64 {
        30
    }

    pub fn rpc_url() -> String {
        "http://localhost:8545".to_string()
    }
}

impl Settings {
    /// Load from `market.{toml,json,yaml}` (optional) and `MARKET_*`
    /// environment variables. A missing file falls back to defaults; a
    /// malformed one is reported and the defaults are used.
    pub fn load() -> Self {
        let built = config::Config::builder()
            .add_source(config::File::with_name("market").required(false))
            .add_source(config::Environment::with_prefix("MARKET"))
            .build();
        match built.and_then(|c| c.try_deserialize()) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Settings unreadable, using defaults");
                Settings::default()
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Pick the artifact source by scheme: http(s) fetches, anything else
    /// reads from disk.
    pub fn config_source(&self) -> Result<Box<dyn ConfigSource>, Error> {
        if self.artifact.starts_with("http://") || self.artifact.starts_with("https://") {
            Ok(Box::new(HttpSource::new(
                &self.artifact,
                self.request_timeout(),
            )?))
        } else {
            Ok(Box::new(FileSource::new(&self.artifact)))
        }
    }
}
