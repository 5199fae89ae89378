//! Server settings.
//!
//! Layered with the `config` crate, lowest precedence first:
//!
//! | Source                  | Example                              |
//! |-------------------------|--------------------------------------|
//! | built-in defaults       | port `5000`, heartbeat `30` s        |
//! | optional TOML file      | `port = 6000`, `[world] seed = 9`    |
//! | environment             | `ARCHIPELAGO__WORLD__SEED=9`         |
//!
//! The binary applies its CLI flags on top of the loaded value.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::world::WorldConfig;

pub const ENV_PREFIX: &str = "ARCHIPELAGO";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
    /// Seconds between heartbeat sweeps.
    pub heartbeat_secs: u64,
    /// Unanswered pings tolerated before a session is timed out. At least 1.
    pub max_missed_pings: u32,
    pub regrowth_min_secs: u64,
    pub regrowth_max_secs: u64,
    /// Per-cell chance that empty land grows a tree during one regrowth run.
    pub regrowth_chance: f64,
    pub world: WorldConfig,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5000,
            heartbeat_secs: 30,
            max_missed_pings: 1,
            regrowth_min_secs: 60,
            regrowth_max_secs: 90,
            regrowth_chance: 0.002,
            world: WorldConfig::default(),
        }
    }
}

impl ServerSettings {
    /// Load defaults, then `path` (if any), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings: ServerSettings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_secs == 0 {
            return Err(ConfigError::Message(
                "heartbeat_secs must be positive".into(),
            ));
        }
        if self.max_missed_pings == 0 {
            return Err(ConfigError::Message(
                "max_missed_pings must be at least 1".into(),
            ));
        }
        if self.regrowth_min_secs == 0 || self.regrowth_min_secs > self.regrowth_max_secs {
            return Err(ConfigError::Message(format!(
                "regrowth window {}..{} s is empty or starts at zero",
                self.regrowth_min_secs, self.regrowth_max_secs
            )));
        }
        if !(0.0..=1.0).contains(&self.regrowth_chance) {
            return Err(ConfigError::Message(format!(
                "regrowth_chance must be within [0, 1], got {}",
                self.regrowth_chance
            )));
        }
        // World parameters are checked by generation itself.
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn regrowth_window(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.regrowth_min_secs),
            Duration::from_secs(self.regrowth_max_secs),
        )
    }
}
