//! Patrol Orchestration Engine
//!
//! Coordinates an autonomous ground unit on patrol: the mission state
//! machine, the route/zone store with geometric derivations, waypoint
//! progress tracking, the detection/alert pipeline, and schedule
//! evaluation. The engine owns all state and emits commands and notices;
//! rendering, the physical command link, and storage media are injected
//! collaborators.

pub mod command;
pub mod detection;
pub mod engine;
pub mod persist;
pub mod routes;
pub mod schedule;
pub mod waypoints;

pub use patrol_shared as shared;
