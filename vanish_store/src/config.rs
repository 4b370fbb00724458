//! Store and service settings
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use vanish_store::config::StoreConfig;
//!
//! let config = StoreConfig::default()
//!     .with_sweep_interval(Duration::from_secs(1))
//!     .with_name_attempts(4);
//! assert!(config.disable_core_dumps);
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;
use vanish_types::errors::Error;

/// How often the sweep runs by default
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);
/// Fresh-name candidates tried per upload by default
pub const DEFAULT_NAME_ATTEMPTS: usize = 8;

/// Settings for a [`VaultService`](crate::service::VaultService)
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Wait between sweep cycles
    pub sweep_interval: Duration,
    /// Name candidates tried before an upload fails with a duplicate-name error
    pub name_attempts: usize,
    /// Set the core dump size limit to zero when the service starts
    pub disable_core_dumps: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            name_attempts: DEFAULT_NAME_ATTEMPTS,
            disable_core_dumps: true,
        }
    }
}

impl StoreConfig {
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_name_attempts(mut self, attempts: usize) -> Self {
        self.name_attempts = attempts;
        self
    }

    pub fn with_core_dumps_disabled(mut self, disable: bool) -> Self {
        self.disable_core_dumps = disable;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.sweep_interval.is_zero() {
            return Err(Error::validation("sweep interval must be positive"));
        }

        if self.name_attempts == 0 {
            return Err(Error::validation("at least one name attempt is required"));
        }

        Ok(())
    }
}
