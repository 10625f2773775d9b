//! Navigator configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `SAFE_DRIVE_*` environment variables.
//!
//! | Key                     | Env                                | Default                 |
//! |-------------------------|------------------------------------|-------------------------|
//! | `server_url`            | `SAFE_DRIVE_SERVER_URL`            | `http://localhost:8080` |
//! | `tick_interval_ms`      | `SAFE_DRIVE_TICK_INTERVAL_MS`      | `3000`                  |
//! | `announcement`          | `SAFE_DRIVE_ANNOUNCEMENT`          | `current`               |
//! | `stream_timeout_secs`   | `SAFE_DRIVE_STREAM_TIMEOUT_SECS`   | `30`                    |
//! | `request_timeout_secs`  | `SAFE_DRIVE_REQUEST_TIMEOUT_SECS`  | `60`                    |

use crate::error::Result;
use crate::types::{AnnouncementPolicy, SimulationConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_PREFIX: &str = "SAFE_DRIVE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Base URL of the Smart Drive server.
    pub server_url: String,
    /// Pause between simulated checkpoints.
    pub tick_interval_ms: u64,
    /// `current` announces the checkpoint at the cursor, `lookahead` the next one.
    pub announcement: AnnouncementPolicy,
    /// Upper bound on the enrichment stream before falling back.
    pub stream_timeout_secs: u64,
    /// Timeout for `/analyze_route` and `/chat`.
    pub request_timeout_secs: u64,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".into(),
            tick_interval_ms: 3000,
            announcement: AnnouncementPolicy::Current,
            stream_timeout_secs: 30,
            request_timeout_secs: 60,
        }
    }
}

impl NavigatorConfig {
    /// Defaults, overlaid by `file` (if given) and then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        let cfg = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;
        Ok(cfg)
    }

    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            announcement: self.announcement,
        }
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
