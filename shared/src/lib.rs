//! Patrol Shared Core
//!
//! This crate provides the data model, geometry primitives, and mission
//! state machine shared between the patrol engine and its collaborators
//! (command channel adapter, presentation read models).

pub mod geo;
pub mod state_machine;
pub mod types;

pub use types::*;

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Tuning parameters for the system
pub mod limits {
    /// Reference top linear speed of the unit in m/s, used for estimates
    pub const MAX_LINEAR_SPEED_MPS: f64 = 0.5;

    /// Floor for speed percentages so estimates never divide by zero
    pub const MIN_SPEED_PERCENT: u8 = 1;

    /// Effective row width when sweeping a zone, in meters
    pub const SWEEP_ROW_SPACING_M: f64 = 1.0;

    /// Spherical-Earth radius used by all geographic math, in meters
    pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

    /// Maximum retained detection events (oldest evicted first)
    pub const DETECTION_HISTORY_CAP: usize = 100;

    /// Maximum waypoint indices shown by the progress tracker
    pub const WAYPOINT_DISPLAY_CAP: usize = 10;

    /// Battery percentage at or below which an advisory go-home is issued
    pub const DEFAULT_LOW_BATTERY_PERCENT: u8 = 20;

    /// Default suppression window between repeated alerts, in seconds
    pub const DEFAULT_COOLDOWN_SECS: u64 = 30;

    /// Default cadence of schedule evaluation, in seconds
    pub const DEFAULT_SCHEDULE_INTERVAL_SECS: u64 = 60;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_advances() {
        let a = now_ms();
        let b = now_ms();
        assert!(a > 0);
        assert!(b >= a);
    }
}
