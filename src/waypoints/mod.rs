//! Waypoint progress read model

mod tracker;

pub use tracker::{DisplayWaypoint, WaypointState, WaypointTracker};
