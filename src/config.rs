//! Application-level configuration constants.

use crate::distance::DistanceCatalog;
use jiff::tz::TimeZone;
use std::fmt;

// Domain
pub const DOMAIN_TIMEZONE: &str = "Europe/London";
pub const MIN_ODDS: f64 = 1.1;

// UI Behavior
pub const NOTICE_MS: u32 = 4_000;
pub const COPY_NOTICE_MS: u32 = 3_000;

// Default values for input fields
pub const DEFAULT_RANGE_HOURS: i64 = 1;

/// Greyhound race distances (metres) the backend knows about, ascending.
pub const ALL_DISTANCES: [u16; 44] = [
    238, 250, 260, 261, 262, 264, 265, 268, 270, 275, 277, 280, 285, 290, 305, 375, 380, 388, 400,
    415, 435, 460, 462, 470, 476, 480, 483, 490, 491, 500, 515, 540, 550, 575, 590, 592, 620, 630,
    640, 642, 650, 660, 696, 714,
];

#[derive(Debug)]
pub enum ConfigError {
    UnknownTimeZone { name: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownTimeZone { name, reason } => {
                write!(f, "Unknown time zone '{}': {}", name, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Everything query normalization depends on that is not filter state.
///
/// The time zone is passed explicitly rather than read from the process so
/// that the same filter always normalizes to the same wire value.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub time_zone: TimeZone,
    pub catalog: DistanceCatalog,
}

impl QueryConfig {
    pub fn new(time_zone: TimeZone, catalog: DistanceCatalog) -> Self {
        Self { time_zone, catalog }
    }

    /// The production configuration: [`DOMAIN_TIMEZONE`] and [`ALL_DISTANCES`].
    pub fn domain() -> Result<Self, ConfigError> {
        let time_zone =
            TimeZone::get(DOMAIN_TIMEZONE).map_err(|e| ConfigError::UnknownTimeZone {
                name: DOMAIN_TIMEZONE.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::new(time_zone, DistanceCatalog::default()))
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self::new(TimeZone::UTC, DistanceCatalog::default())
    }
}
