//! Mission State Machine
//!
//! Validates patrol status transitions and owns the per-mission counters.
//! Side effects (command emission, persistence) belong to the engine layer;
//! this type only answers whether a transition is legal and applies it.

use crate::types::{Mission, PatrolStatus, StartOrigin};
use thiserror::Error;

/// A transition that is not legal from the current status
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot {action} while {from:?}")]
pub struct IllegalTransition {
    pub from: PatrolStatus,
    pub action: &'static str,
}

/// The patrol mission state machine
#[derive(Debug, Default)]
pub struct PatrolStateMachine {
    mission: Mission,
}

impl PatrolStateMachine {
    /// Create a new state machine with a Stopped mission
    pub fn new() -> Self {
        Self {
            mission: Mission::default(),
        }
    }

    /// Current mission record
    pub fn mission(&self) -> &Mission {
        &self.mission
    }

    /// Current patrol status
    pub fn status(&self) -> PatrolStatus {
        self.mission.status
    }

    /// Would starting `route_id` displace an active mission on another route?
    ///
    /// Starting over an active mission is a policy decision surfaced to the
    /// caller; the machine itself accepts any confirmed start.
    pub fn would_interrupt(&self, route_id: &str) -> bool {
        self.mission.status != PatrolStatus::Stopped
            && self.mission.active_route.as_deref() != Some(route_id)
    }

    /// Begin a mission on the given route, resetting all counters
    pub fn start(&mut self, route_id: &str, origin: StartOrigin, now_ms: u64) {
        self.mission = Mission {
            status: PatrolStatus::Running,
            active_route: Some(route_id.to_string()),
            origin,
            started_at_ms: Some(now_ms),
            distance_m: 0.0,
            lap_count: 0,
            detection_count: 0,
            current_waypoint: 0,
        };
    }

    /// Running -> Paused
    pub fn pause(&mut self) -> Result<(), IllegalTransition> {
        match self.mission.status {
            PatrolStatus::Running => {
                self.mission.status = PatrolStatus::Paused;
                Ok(())
            }
            from => Err(IllegalTransition {
                from,
                action: "pause",
            }),
        }
    }

    /// Paused -> Running
    pub fn resume(&mut self) -> Result<(), IllegalTransition> {
        match self.mission.status {
            PatrolStatus::Paused => {
                self.mission.status = PatrolStatus::Running;
                Ok(())
            }
            from => Err(IllegalTransition {
                from,
                action: "resume",
            }),
        }
    }

    /// Running | Paused -> Stopped, clearing the active route.
    ///
    /// `started_at_ms` is kept so read models can still show when the most
    /// recent mission ran.
    pub fn stop(&mut self) -> Result<(), IllegalTransition> {
        match self.mission.status {
            PatrolStatus::Running | PatrolStatus::Paused => {
                self.mission.status = PatrolStatus::Stopped;
                self.mission.active_route = None;
                Ok(())
            }
            from => Err(IllegalTransition {
                from,
                action: "stop",
            }),
        }
    }

    /// Any state -> Stopped. The designated override path: never fails.
    pub fn emergency_stop(&mut self) {
        self.mission.status = PatrolStatus::Stopped;
        self.mission.active_route = None;
    }

    /// Record that the unit reached a waypoint; no status change
    pub fn on_waypoint_reached(&mut self, index: usize) {
        self.mission.current_waypoint = index;
    }

    /// Record a completed lap and return the new count
    pub fn on_lap_complete(&mut self) -> u32 {
        self.mission.lap_count += 1;
        self.mission.lap_count
    }

    /// Accumulate traveled distance; ignored unless Running
    pub fn add_distance(&mut self, meters: f64) {
        if self.mission.status == PatrolStatus::Running {
            self.mission.distance_m += meters;
        }
    }

    /// Count a detection against the current mission
    pub fn record_detection(&mut self) {
        self.mission.detection_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_machine() -> PatrolStateMachine {
        let mut fsm = PatrolStateMachine::new();
        fsm.start("route_1", StartOrigin::Operator, 1_000);
        fsm
    }

    #[test]
    fn test_initial_state() {
        let fsm = PatrolStateMachine::new();
        assert_eq!(fsm.status(), PatrolStatus::Stopped);
        assert!(fsm.mission().active_route.is_none());
    }

    #[test]
    fn test_start_resets_counters() {
        let mut fsm = running_machine();
        fsm.add_distance(12.5);
        fsm.record_detection();
        fsm.on_lap_complete();

        fsm.start("route_2", StartOrigin::Operator, 2_000);
        let m = fsm.mission();
        assert_eq!(m.status, PatrolStatus::Running);
        assert_eq!(m.active_route.as_deref(), Some("route_2"));
        assert_eq!(m.distance_m, 0.0);
        assert_eq!(m.detection_count, 0);
        assert_eq!(m.lap_count, 0);
        assert_eq!(m.current_waypoint, 0);
        assert_eq!(m.started_at_ms, Some(2_000));
    }

    #[test]
    fn test_pause_only_legal_from_running() {
        let mut fsm = PatrolStateMachine::new();
        let err = fsm.pause().unwrap_err();
        assert_eq!(err.from, PatrolStatus::Stopped);

        let mut fsm = running_machine();
        assert!(fsm.pause().is_ok());
        assert_eq!(fsm.status(), PatrolStatus::Paused);

        // Pausing again is illegal
        assert!(fsm.pause().is_err());
        assert_eq!(fsm.status(), PatrolStatus::Paused);
    }

    #[test]
    fn test_resume_only_legal_from_paused() {
        let mut fsm = running_machine();
        assert!(fsm.resume().is_err());

        fsm.pause().unwrap();
        assert!(fsm.resume().is_ok());
        assert_eq!(fsm.status(), PatrolStatus::Running);
    }

    #[test]
    fn test_double_stop_is_illegal() {
        let mut fsm = running_machine();
        assert!(fsm.stop().is_ok());
        assert_eq!(fsm.status(), PatrolStatus::Stopped);

        let err = fsm.stop().unwrap_err();
        assert_eq!(err.from, PatrolStatus::Stopped);
        assert_eq!(fsm.status(), PatrolStatus::Stopped);
    }

    #[test]
    fn test_emergency_stop_from_every_state() {
        let setups: [fn(&mut PatrolStateMachine); 3] = [
            |_| {},
            |fsm| fsm.start("r", StartOrigin::Operator, 0),
            |fsm| {
                fsm.start("r", StartOrigin::Operator, 0);
                fsm.pause().unwrap();
            },
        ];
        for setup in setups {
            let mut fsm = PatrolStateMachine::new();
            setup(&mut fsm);
            fsm.emergency_stop();
            assert_eq!(fsm.status(), PatrolStatus::Stopped);
            assert!(fsm.mission().active_route.is_none());
        }
    }

    #[test]
    fn test_would_interrupt() {
        let fsm = PatrolStateMachine::new();
        assert!(!fsm.would_interrupt("route_1"));

        let fsm = running_machine();
        assert!(!fsm.would_interrupt("route_1"));
        assert!(fsm.would_interrupt("route_2"));
    }

    #[test]
    fn test_distance_ignored_unless_running() {
        let mut fsm = running_machine();
        fsm.add_distance(3.0);
        fsm.pause().unwrap();
        fsm.add_distance(5.0);
        assert_eq!(fsm.mission().distance_m, 3.0);
    }

    #[test]
    fn test_stop_keeps_start_timestamp() {
        let mut fsm = running_machine();
        fsm.stop().unwrap();
        assert_eq!(fsm.mission().started_at_ms, Some(1_000));
    }
}
