//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then `RIGOL_*`
//! environment variables (`RIGOL_RESOURCE`, `RIGOL_TIMEOUT_MS`, ...), then command line flags.
//!
//! ```toml
//! resource = "USB0::0x1AB1::0x0588::DS1ET164267347::INSTR"
//! timeout_ms = 20000
//! passthrough_timeout_ms = 2000
//! settle_delay_ms = 100
//! ```

use std::path::Path;
use std::time::Duration;

use ::config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::devices::ds1000e::DEFAULT_SETTLE_DELAY_MS;

pub const DEFAULT_RESOURCE:&str = "USB0::0x1AB1::0x0588::DS1ET164267347::INSTR";
pub const DEFAULT_TIMEOUT_MS:u64 = 20000;
pub const DEFAULT_PASSTHROUGH_TIMEOUT_MS:u64 = 2000;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// VISA resource string of the scope
    pub resource: String,
    /// Read timeout in effect outside of ad hoc commands
    pub timeout_ms: u64,
    /// Read timeout applied while waiting for the reply to a raw console command
    pub passthrough_timeout_ms: u64,
    /// Pause after `:STOP` before the next command
    pub settle_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resource: DEFAULT_RESOURCE.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            passthrough_timeout_ms: DEFAULT_PASSTHROUGH_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }
    pub fn passthrough_timeout(&self) -> Duration { Duration::from_millis(self.passthrough_timeout_ms) }
    pub fn settle_delay(&self) -> Duration { Duration::from_millis(self.settle_delay_ms) }
}

/// Build the settings from every layer. A `config_path` that does not exist is an error;
/// `resource` (from the command line) wins over everything else.
pub fn load_config(config_path:Option<&Path>, resource:Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder()
        .add_source(Config::try_from(&Settings::default())?);

    if let Some(path) = config_path {
        if !path.exists() {
            return Err(ConfigError::Message(format!("Config file not found: {}", path.display())));
        }
        builder = builder.add_source(File::from(path));
    }

    builder = builder
        .add_source(Environment::with_prefix("RIGOL").try_parsing(true))
        .set_override_option("resource", resource)?;

    let settings = builder.build()?.try_deserialize::<Settings>()?;
    log::debug!("Loaded configuration {:?}", settings);
    Ok(settings)
}
