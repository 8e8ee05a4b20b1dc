//! Engine configuration
//!
//! Loaded from the `[engine]` table of the service's TOML config file.
//! Every field has a default so an empty file is a valid configuration.

use std::path::Path;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::models::TIME_FORMAT;

/// Default upper bound on party size
pub const DEFAULT_MAX_GUESTS: u32 = 10;

/// Default cancellation cutoff for confirmed bookings
pub const DEFAULT_CANCELLATION_CUTOFF_HOURS: u32 = 24;

/// Longest accepted pending expiry (one year)
pub const MAX_PENDING_EXPIRY_HOURS: u32 = 24 * 365;

/// Booking rules applied by the reservation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum party size for a single booking
    pub max_guests: u32,
    /// Refuse bookings on listings whose host has not passed KYC
    pub require_verified_hosts: bool,
    /// Confirmed bookings may only be cancelled while the slot starts more
    /// than this many hours from now. `0` disables the cutoff.
    pub cancellation_cutoff_hours: u32,
    /// Auto-cancel pending bookings older than this. Disabled when unset.
    pub pending_expiry_hours: Option<u32>,
    /// Start time assumed for whole-day slots (`HH:MM`)
    pub default_slot_time: String,
    /// Offset of listing-local time from UTC, in minutes
    pub utc_offset_minutes: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_guests: DEFAULT_MAX_GUESTS,
            require_verified_hosts: false,
            cancellation_cutoff_hours: DEFAULT_CANCELLATION_CUTOFF_HOURS,
            pending_expiry_hours: None,
            default_slot_time: "19:00".to_string(),
            utc_offset_minutes: 0,
        }
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl EngineConfig {
    /// Parse from TOML content and validate
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file containing only engine settings
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_guests == 0 {
            return Err(ConfigError::Invalid {
                field: "max_guests",
                reason: "must be at least 1".into(),
            });
        }
        if let Some(hours) = self.pending_expiry_hours {
            if !(1..=MAX_PENDING_EXPIRY_HOURS).contains(&hours) {
                return Err(ConfigError::Invalid {
                    field: "pending_expiry_hours",
                    reason: format!(
                        "must be between 1 and {} when set",
                        MAX_PENDING_EXPIRY_HOURS
                    ),
                });
            }
        }
        if !(-14 * 60..=14 * 60).contains(&self.utc_offset_minutes) {
            return Err(ConfigError::Invalid {
                field: "utc_offset_minutes",
                reason: format!("{} is outside +/-14h", self.utc_offset_minutes),
            });
        }
        self.slot_start_time()?;
        Ok(())
    }

    /// Parsed `default_slot_time`
    pub fn slot_start_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.default_slot_time, TIME_FORMAT).map_err(|e| {
            ConfigError::Invalid {
                field: "default_slot_time",
                reason: e.to_string(),
            }
        })
    }
}
