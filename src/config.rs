//! Engine configuration parameters
//!
//! Tunables for one protocol session.  Defaults match what every supported
//! robot expects; hosts can override them from JSON.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::session::reassembler::REASSEMBLY_CAPACITY;

/// Smallest ceiling that still fits the largest known frame
/// (an 82-byte sensor sample plus framing).
const MIN_REASSEMBLY_CEILING: usize = 128;

/// Core engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bytes the reassembler may hold without completing a frame.
    pub reassembly_ceiling: usize,
    /// Client Characteristic Configuration value that enables notifications.
    pub notification_enable: [u8; 2],
    /// Send the variant's baseline query on entering `Ready`.
    pub baseline_query: bool,
    /// Outgoing commands reset the robot's inactivity timeout.
    pub reset_timeout: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reassembly_ceiling: REASSEMBLY_CAPACITY,
            notification_enable: [0x01, 0x00],
            baseline_query: true,
            reset_timeout: true,
        }
    }
}

/// Errors from loading or validating an [`EngineConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Input was not a valid serialised config.
    Corrupted,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config: corrupted"),
            Self::ValidationFailed(why) => write!(f, "config: {why}"),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_REASSEMBLY_CEILING..=REASSEMBLY_CAPACITY).contains(&self.reassembly_ceiling) {
            return Err(ConfigError::ValidationFailed(
                "reassembly_ceiling must be 128–10000",
            ));
        }
        if self.notification_enable == [0x00, 0x00] {
            return Err(ConfigError::ValidationFailed(
                "notification_enable must set the notify or indicate bit",
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.  Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        Ok(cfg)
    }
}
