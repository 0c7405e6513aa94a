//! Streaming configuration
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variable: `VOID_STREAM_AUTO_LOAD=1`
//! 2. Config file: `stream.toml` / `config/stream.toml`
//! 3. Defaults
//!
//! # Example Config File
//!
//! ```toml
//! [stream]
//! auto_load = true
//! initial_units = ["Persistent", "Hub"]
//! ```

use crate::error::StreamResult;
use crate::unit::UnitId;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Coordinator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Activate loaded units immediately when a transition uses the default mode
    pub auto_load: bool,
    /// Units already resident when the coordinator is created
    pub initial_units: Vec<UnitId>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    stream: StreamConfig,
}

impl StreamConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the auto-load default
    pub fn with_auto_load(mut self, auto_load: bool) -> Self {
        self.auto_load = auto_load;
        self
    }

    /// Pre-seed resident units
    pub fn with_initial_units<I, S>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UnitId>,
    {
        self.initial_units = units.into_iter().map(Into::into).collect();
        self
    }

    /// Parse from TOML text with a `[stream]` table
    pub fn from_toml_str(content: &str) -> StreamResult<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.stream)
    }

    /// Load from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> StreamResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from all sources
    pub fn load() -> Self {
        let mut config = Self::default();

        for path in &["stream.toml", "config/stream.toml"] {
            if !Path::new(path).exists() {
                continue;
            }
            match Self::load_from_file(path) {
                Ok(loaded) => {
                    config = loaded;
                    log::info!("Loaded stream config from {}", path);
                    break;
                }
                Err(e) => log::warn!("Ignoring {}: {}", path, e),
            }
        }

        if let Ok(value) = std::env::var("VOID_STREAM_AUTO_LOAD") {
            config.auto_load = value == "1" || value.eq_ignore_ascii_case("true");
            log::info!("Auto-load from env: {}", config.auto_load);
        }

        config
    }
}
