//! Progress tracking for the active route mission
//!
//! Tracks the current waypoint for polyline missions and exposes a
//! display-sized subsample for the presentation layer. Zone missions carry
//! no waypoint sequence; their coverage fraction comes from telemetry or
//! not at all.

use patrol_shared::limits;

/// Progress tag for one displayed waypoint index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointState {
    Completed,
    Current,
    Pending,
}

/// One entry of the display subsample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayWaypoint {
    pub index: usize,
    pub state: WaypointState,
}

/// Waypoint bookkeeping for the active mission
#[derive(Debug, Default)]
pub struct WaypointTracker {
    total: usize,
    current: usize,
    coverage: Option<f64>,
    active: bool,
}

impl WaypointTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the tracker for a route with `total` waypoints
    pub fn begin(&mut self, total: usize) {
        self.total = total;
        self.current = 0;
        self.coverage = None;
        self.active = total > 0;
    }

    /// Disarm and forget progress (mission stopped)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record the waypoint index reported by the unit
    pub fn mark_reached(&mut self, index: usize) {
        if self.active && index < self.total {
            self.current = index;
        }
    }

    /// Zone coverage fraction as supplied by telemetry; there is no
    /// internal coverage model
    pub fn set_coverage(&mut self, fraction: f64) {
        self.coverage = Some(fraction.clamp(0.0, 1.0));
    }

    pub fn coverage(&self) -> Option<f64> {
        self.coverage
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Display subsample: every index when the route fits the display cap,
    /// otherwise an evenly spaced selection of cap size with the current
    /// index inserted, ascending, each tagged relative to progress.
    pub fn display(&self) -> Vec<DisplayWaypoint> {
        if !self.active {
            return Vec::new();
        }

        let cap = limits::WAYPOINT_DISPLAY_CAP;
        let mut indices: Vec<usize> = if self.total <= cap {
            (0..self.total).collect()
        } else {
            (0..cap).map(|i| i * (self.total - 1) / (cap - 1)).collect()
        };

        if !indices.contains(&self.current) {
            indices.push(self.current);
        }
        indices.sort_unstable();
        indices.dedup();

        indices
            .into_iter()
            .map(|index| DisplayWaypoint {
                index,
                state: if index < self.current {
                    WaypointState::Completed
                } else if index == self.current {
                    WaypointState::Current
                } else {
                    WaypointState::Pending
                },
            })
            .collect()
    }
}
