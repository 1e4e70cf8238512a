//! Mission engine: state, transitions, and command emission
//!
//! Owns every piece of patrol state behind one `&mut self` surface. All
//! side effects are emitted as [`UnitCommand`]s toward the command channel
//! or [`EngineNotice`]s toward the presentation adapter; nothing here
//! renders or performs I/O beyond the injected key-value store.

use crate::command::{CommandOutbox, UnitCommand};
use crate::detection::{AlertIntent, DetectionPipeline, TargetRegistry, TargetRegistryError};
use crate::persist::{keys, KvStore};
use crate::routes::{RouteDraft, RoutePatch, RouteStore, RouteStoreError, SortKey};
use crate::schedule::{self, ScheduleIntent};
use crate::waypoints::{DisplayWaypoint, WaypointTracker};
use patrol_shared::state_machine::{IllegalTransition, PatrolStateMachine};
use patrol_shared::{
    geo, AlertPolicy, CustomTarget, DetectionEvent, LatLng, Mission, PatrolMode, PatrolSettings,
    PatrolStatus, Route, RouteKind, ScheduleConfig, StartOrigin, SweepPattern, TimeOfDay,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Errors surfaced to the operator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("no route selected and none available")]
    NoRouteSelected,

    #[error("route not found: {0}")]
    RouteNotFound(String),

    #[error(transparent)]
    Transition(#[from] IllegalTransition),

    #[error(transparent)]
    Routes(#[from] RouteStoreError),

    #[error(transparent)]
    Targets(#[from] TargetRegistryError),
}

/// Inbound events from the unit and the perception stack.
///
/// A closed set: anything the channel adapter cannot map onto a known kind
/// arrives as `Unrecognized` and is logged and dropped, never silently.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Telemetry {
        battery_percent: u8,
        heading_deg: f64,
        position: Option<LatLng>,
        /// Zone coverage fraction, when the unit reports one
        coverage: Option<f64>,
    },
    Detection(DetectionEvent),
    WaypointReached { index: usize },
    LapComplete,
    Unrecognized { kind: String },
}

/// Events for the presentation adapter
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotice {
    Alert(AlertIntent),
    PausedOnDetection { target: String },
    StatusChanged { from: PatrolStatus, to: PatrolStatus },
}

/// Per-start setting overrides supplied with a start intent
#[derive(Debug, Clone, Default)]
pub struct StartOverrides {
    pub speed_percent: Option<u8>,
    pub mode: Option<PatrolMode>,
    pub pattern: Option<SweepPattern>,
    pub detection_targets: Option<Vec<String>>,
    pub detection_sensitivity: Option<u8>,
}

/// The patrol orchestration engine
pub struct MissionEngine {
    fsm: PatrolStateMachine,
    routes: RouteStore,
    pipeline: DetectionPipeline,
    targets: TargetRegistry,
    tracker: WaypointTracker,
    settings: PatrolSettings,
    alerts: AlertPolicy,
    schedule: ScheduleConfig,
    home: Option<LatLng>,
    last_position: Option<LatLng>,
    low_battery_notified: bool,
    outbox: CommandOutbox,
    notices: mpsc::UnboundedSender<EngineNotice>,
    store: Arc<dyn KvStore>,
}

impl MissionEngine {
    pub fn new(
        outbox: CommandOutbox,
        notices: mpsc::UnboundedSender<EngineNotice>,
        store: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            fsm: PatrolStateMachine::new(),
            routes: RouteStore::new(),
            pipeline: DetectionPipeline::new(),
            targets: TargetRegistry::new(),
            tracker: WaypointTracker::new(),
            settings: PatrolSettings::default(),
            alerts: AlertPolicy::default(),
            schedule: ScheduleConfig::default(),
            home: None,
            last_position: None,
            low_battery_notified: false,
            outbox,
            notices,
            store,
        }
    }

    /// Read persisted state once at startup. Every key falls back to its
    /// default when missing or corrupt; startup never fails on storage.
    pub async fn load(&mut self) {
        if let Some(routes) = self.read_key::<Vec<Route>>(keys::ROUTES).await {
            self.routes.load(routes);
        }
        if let Some(settings) = self.read_key(keys::SETTINGS).await {
            self.settings = settings;
        }
        if let Some(alerts) = self.read_key(keys::ALERTS).await {
            self.alerts = alerts;
        }
        if let Some(schedule) = self.read_key(keys::SCHEDULE).await {
            self.schedule = schedule;
        }
        if let Some(targets) = self.read_key::<Vec<CustomTarget>>(keys::CUSTOM_TARGETS).await {
            self.targets.load(targets);
        }
        if let Some(home) = self.read_key(keys::HOME).await {
            self.home = Some(home);
        }
        if let Some(history) = self.read_key::<Vec<DetectionEvent>>(keys::DETECTIONS).await {
            self.pipeline.load(history);
        }
        info!(
            routes = self.routes.len(),
            detections = self.pipeline.total_recorded(),
            "engine state loaded"
        );
    }

    // ---- mission intents ----------------------------------------------

    /// Would starting `route_id` displace an active mission on another
    /// route? Confirming the switch is the caller's decision.
    pub fn would_interrupt(&self, route_id: &str) -> bool {
        self.fsm.would_interrupt(route_id)
    }

    /// Start a mission. With no explicit id the most recently created
    /// visible route is used; `NoRouteSelected` when there is none.
    pub async fn start(
        &mut self,
        route_id: Option<&str>,
        origin: StartOrigin,
        overrides: StartOverrides,
        now_ms: u64,
    ) -> Result<Route, EngineError> {
        let route = match route_id {
            Some(id) => self
                .routes
                .get(id)
                .cloned()
                .ok_or_else(|| EngineError::RouteNotFound(id.to_string()))?,
            None => self
                .routes
                .newest_visible()
                .cloned()
                .ok_or(EngineError::NoRouteSelected)?,
        };

        self.apply_overrides(overrides).await;

        let from = self.fsm.status();
        self.fsm.start(&route.id, origin, now_ms);
        self.tracker.reset();
        if route.kind == RouteKind::Polyline {
            self.tracker.begin(route.waypoints.len());
        }
        self.last_position = None;
        self.low_battery_notified = false;

        self.outbox.send(UnitCommand::Start {
            route_id: route.id.clone(),
            kind: route.kind,
            waypoints: route.waypoints.clone(),
            mode: self.settings.mode,
            pattern: self.settings.pattern,
            speed_percent: self.settings.speed_percent,
            targets: self.watch_list(),
            sensitivity: self.settings.detection_sensitivity,
        });
        self.notify_status(from);

        info!(route = %route.name, ?origin, "patrol started");
        Ok(route)
    }

    pub fn pause(&mut self) -> Result<(), EngineError> {
        let from = self.fsm.status();
        self.fsm.pause()?;
        self.outbox.send(UnitCommand::Pause);
        self.notify_status(from);
        info!("patrol paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), EngineError> {
        let from = self.fsm.status();
        self.fsm.resume()?;
        self.outbox.send(UnitCommand::Resume);
        self.notify_status(from);
        info!("patrol resumed");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), EngineError> {
        let from = self.fsm.status();
        self.fsm.stop()?;
        self.tracker.reset();
        self.outbox.send(UnitCommand::Stop);
        self.notify_status(from);
        info!("patrol stopped");
        Ok(())
    }

    /// The designated override path: always succeeds, always emits the
    /// emergency command, from any state.
    pub fn emergency_stop(&mut self) {
        let from = self.fsm.status();
        self.fsm.emergency_stop();
        self.tracker.reset();
        self.outbox.send(UnitCommand::EmergencyStop);
        self.notify_status(from);
        warn!("EMERGENCY STOP issued (was {:?})", from);
    }

    // ---- inbound events -----------------------------------------------

    pub async fn handle_event(&mut self, event: InboundEvent, now_ms: u64) {
        match event {
            InboundEvent::Telemetry {
                battery_percent,
                heading_deg,
                position,
                coverage,
            } => {
                debug!(battery_percent, heading_deg, "telemetry");
                if let Some(pos) = position {
                    if let Some(last) = self.last_position {
                        self.fsm.add_distance(geo::distance(last, pos));
                    }
                    self.last_position = Some(pos);
                }
                if let Some(fraction) = coverage {
                    self.tracker.set_coverage(fraction);
                }
                self.check_battery(battery_percent);
            }
            InboundEvent::Detection(detection) => {
                self.on_detection(detection, now_ms).await;
            }
            InboundEvent::WaypointReached { index } => {
                self.fsm.on_waypoint_reached(index);
                self.tracker.mark_reached(index);
            }
            InboundEvent::LapComplete => {
                let laps = self.fsm.on_lap_complete();
                info!(laps, "lap complete");
                if self.settings.mode == PatrolMode::Once {
                    if self.stop().is_ok() {
                        if self.settings.auto_return_home {
                            self.send_go_home();
                        }
                    }
                }
            }
            InboundEvent::Unrecognized { kind } => {
                warn!(kind, "unrecognized inbound event, ignoring");
            }
        }
    }

    async fn on_detection(&mut self, detection: DetectionEvent, now_ms: u64) {
        self.fsm.record_detection();

        let threshold = self
            .targets
            .effective_threshold(&detection.target, self.settings.detection_sensitivity);
        let target = detection.target.clone();
        let outcome = self
            .pipeline
            .on_detection(detection, &self.alerts, threshold, now_ms);

        for alert in outcome.alerts {
            self.notify(EngineNotice::Alert(alert));
        }

        if outcome.wants_pause && self.fsm.status() == PatrolStatus::Running {
            if self.pause().is_ok() {
                info!("patrol paused due to detection: {target}");
                self.notify(EngineNotice::PausedOnDetection { target });
            }
        }

        self.persist(keys::DETECTIONS, &self.pipeline.snapshot()).await;
    }

    fn check_battery(&mut self, battery_percent: u8) {
        if self.fsm.status() != PatrolStatus::Running
            || battery_percent > self.settings.low_battery_percent
            || !self.settings.auto_return_home
        {
            // Re-arm once the battery reads healthy again
            if battery_percent > self.settings.low_battery_percent {
                self.low_battery_notified = false;
            }
            return;
        }
        if self.low_battery_notified {
            return;
        }
        self.low_battery_notified = true;
        warn!(battery_percent, "battery low, advising return home");
        // Advisory only: the unit navigates home on its own, the mission
        // keeps its status until told otherwise.
        self.send_go_home();
    }

    fn send_go_home(&self) {
        match self.home {
            Some(position) => self.outbox.send(UnitCommand::GoHome { position }),
            None => warn!("go-home requested but no home position is set"),
        }
    }

    // ---- schedule -----------------------------------------------------

    pub async fn handle_schedule_tick(&mut self, weekday: u8, now: TimeOfDay, now_ms: u64) {
        let intent = schedule::evaluate(
            &self.schedule,
            weekday,
            now,
            self.fsm.status(),
            self.fsm.mission().origin,
        );
        match intent {
            Some(ScheduleIntent::Start) => {
                match self
                    .start(None, StartOrigin::Schedule, StartOverrides::default(), now_ms)
                    .await
                {
                    Ok(route) => info!(route = %route.name, "schedule auto-start"),
                    Err(e) => warn!(error = %e, "schedule auto-start skipped"),
                }
            }
            Some(ScheduleIntent::Stop) => {
                info!("schedule window closed, stopping patrol");
                let _ = self.stop();
            }
            None => {}
        }
    }

    // ---- route operations ---------------------------------------------

    pub async fn create_route(&mut self, draft: RouteDraft, now_ms: u64) -> Result<Route, EngineError> {
        let route = self.routes.create(draft, now_ms)?;
        self.persist_routes().await;
        Ok(route)
    }

    pub async fn update_route(&mut self, id: &str, patch: RoutePatch) -> Result<Route, EngineError> {
        let route = self.routes.update(id, patch)?;
        self.persist_routes().await;
        Ok(route)
    }

    /// Delete a route. An active mission on that route is stopped first;
    /// its id must not dangle as an active reference.
    pub async fn delete_route(&mut self, id: &str) -> Result<(), EngineError> {
        self.routes.delete(id)?;
        if self.fsm.mission().active_route.as_deref() == Some(id) {
            info!(id, "active route deleted, stopping patrol");
            let _ = self.stop();
        }
        self.persist_routes().await;
        Ok(())
    }

    pub async fn duplicate_route(&mut self, id: &str, now_ms: u64) -> Result<Route, EngineError> {
        let route = self.routes.duplicate(id, now_ms)?;
        self.persist_routes().await;
        Ok(route)
    }

    pub async fn set_route_visible(&mut self, id: &str, visible: bool) -> Result<(), EngineError> {
        self.routes.set_visible(id, visible)?;
        self.persist_routes().await;
        Ok(())
    }

    pub fn list_routes(&mut self, key: SortKey) -> Vec<Route> {
        self.routes.list(key)
    }

    // ---- settings and policy ------------------------------------------

    pub async fn update_settings(&mut self, settings: PatrolSettings) {
        self.settings = settings;
        self.persist(keys::SETTINGS, &self.settings).await;
        self.push_watch_list();
    }

    pub async fn set_alert_policy(&mut self, policy: AlertPolicy) {
        self.alerts = policy;
        self.persist(keys::ALERTS, &self.alerts).await;
    }

    pub async fn set_schedule(&mut self, schedule: ScheduleConfig) {
        self.schedule = schedule;
        self.persist(keys::SCHEDULE, &self.schedule).await;
    }

    pub async fn set_home(&mut self, position: LatLng) {
        self.home = Some(position);
        self.persist(keys::HOME, &position).await;
    }

    pub async fn upsert_custom_target(&mut self, target: CustomTarget) -> Result<(), EngineError> {
        self.targets.add(target)?;
        self.persist(keys::CUSTOM_TARGETS, &self.targets.snapshot()).await;
        self.push_watch_list();
        Ok(())
    }

    pub async fn remove_custom_target(&mut self, id: &str) -> Result<(), EngineError> {
        self.targets.remove(id)?;
        self.persist(keys::CUSTOM_TARGETS, &self.targets.snapshot()).await;
        self.push_watch_list();
        Ok(())
    }

    pub async fn clear_detections(&mut self) {
        self.pipeline.clear();
        self.persist(keys::DETECTIONS, &self.pipeline.snapshot()).await;
    }

    // ---- read models --------------------------------------------------

    pub fn mission(&self) -> &Mission {
        self.fsm.mission()
    }

    pub fn status(&self) -> PatrolStatus {
        self.fsm.status()
    }

    pub fn settings(&self) -> &PatrolSettings {
        &self.settings
    }

    pub fn alert_policy(&self) -> &AlertPolicy {
        &self.alerts
    }

    pub fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    pub fn home(&self) -> Option<LatLng> {
        self.home
    }

    pub fn route(&self, id: &str) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn waypoint_display(&self) -> Vec<DisplayWaypoint> {
        self.tracker.display()
    }

    pub fn zone_coverage(&self) -> Option<f64> {
        self.tracker.coverage()
    }

    pub fn detections(&self) -> Vec<DetectionEvent> {
        self.pipeline.snapshot()
    }

    pub fn detection_count_for(&self, target: &str) -> u64 {
        self.pipeline.count_for(target)
    }

    // ---- internals ----------------------------------------------------

    /// Baseline watch list plus enabled custom targets
    fn watch_list(&self) -> Vec<String> {
        let mut list = self.settings.detection_targets.clone();
        for target in self.targets.iter().filter(|t| t.enabled) {
            if !list.contains(&target.label) {
                list.push(target.label.clone());
            }
        }
        list
    }

    fn push_watch_list(&self) {
        self.outbox.send(UnitCommand::UpdateDetectionTargets {
            targets: self.watch_list(),
            sensitivity: self.settings.detection_sensitivity,
        });
    }

    async fn apply_overrides(&mut self, overrides: StartOverrides) {
        let mut changed = false;
        if let Some(speed) = overrides.speed_percent {
            self.settings.speed_percent = speed;
            changed = true;
        }
        if let Some(mode) = overrides.mode {
            self.settings.mode = mode;
            changed = true;
        }
        if let Some(pattern) = overrides.pattern {
            self.settings.pattern = pattern;
            changed = true;
        }
        if let Some(targets) = overrides.detection_targets {
            self.settings.detection_targets = targets;
            changed = true;
        }
        if let Some(sensitivity) = overrides.detection_sensitivity {
            self.settings.detection_sensitivity = sensitivity;
            changed = true;
        }
        if changed {
            self.persist(keys::SETTINGS, &self.settings).await;
        }
    }

    fn notify_status(&self, from: PatrolStatus) {
        let to = self.fsm.status();
        if from != to {
            self.notify(EngineNotice::StatusChanged { from, to });
        }
    }

    fn notify(&self, notice: EngineNotice) {
        let _ = self.notices.send(notice);
    }

    async fn persist_routes(&self) {
        self.persist(keys::ROUTES, &self.routes.snapshot()).await;
    }

    async fn persist<T: Serialize>(&self, key: &str, value: &T) {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize state");
                return;
            }
        };
        if let Err(e) = self.store.set(key, json).await {
            warn!(key, error = %e, "failed to persist state");
        }
    }

    async fn read_key<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!(key, error = %e, "stored value malformed, using defaults");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "store read failed, using defaults");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStore;
    use patrol_shared::SweepPattern;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Rig {
        engine: MissionEngine,
        commands: UnboundedReceiver<UnitCommand>,
        notices: UnboundedReceiver<EngineNotice>,
    }

    fn rig() -> Rig {
        let (outbox, commands) = CommandOutbox::channel();
        let (notice_tx, notices) = mpsc::unbounded_channel();
        let engine = MissionEngine::new(outbox, notice_tx, Arc::new(MemoryStore::new()));
        Rig {
            engine,
            commands,
            notices,
        }
    }

    fn path(points: usize) -> Vec<LatLng> {
        (0..points).map(|i| LatLng::new(0.0, i as f64)).collect()
    }

    async fn with_route(rig: &mut Rig, points: usize) -> Route {
        rig.engine
            .create_route(
                RouteDraft {
                    name: "fence line".into(),
                    waypoints: path(points),
                    ..Default::default()
                },
                100,
            )
            .await
            .unwrap()
    }

    fn drain_commands(rig: &mut Rig) -> Vec<UnitCommand> {
        let mut out = Vec::new();
        while let Ok(cmd) = rig.commands.try_recv() {
            out.push(cmd);
        }
        out
    }

    fn detection(target: &str, confidence: f64) -> DetectionEvent {
        DetectionEvent {
            id: "det_1".into(),
            target: target.into(),
            confidence,
            position: LatLng::new(0.0, 0.0),
            timestamp_ms: 1_000,
            image_ref: None,
        }
    }

    #[tokio::test]
    async fn test_start_emits_geometry_and_settings() {
        let mut rig = rig();
        let route = with_route(&mut rig, 3).await;

        rig.engine
            .start(Some(&route.id), StartOrigin::Operator, StartOverrides::default(), 1_000)
            .await
            .unwrap();

        assert_eq!(rig.engine.status(), PatrolStatus::Running);
        let cmds = drain_commands(&mut rig);
        match cmds.last().unwrap() {
            UnitCommand::Start {
                route_id,
                waypoints,
                speed_percent,
                targets,
                ..
            } => {
                assert_eq!(route_id, &route.id);
                assert_eq!(waypoints.len(), 3);
                assert_eq!(*speed_percent, 50);
                assert_eq!(targets, &vec!["snail".to_string()]);
            }
            other => panic!("expected start command, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_start_unknown_route_fails_clean() {
        let mut rig = rig();
        let err = rig
            .engine
            .start(Some("route_404"), StartOrigin::Operator, StartOverrides::default(), 1)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::RouteNotFound("route_404".into()));
        assert_eq!(rig.engine.status(), PatrolStatus::Stopped);
        assert!(drain_commands(&mut rig).is_empty());
    }

    #[tokio::test]
    async fn test_start_without_id_needs_a_route() {
        let mut rig = rig();
        let err = rig
            .engine
            .start(None, StartOrigin::Operator, StartOverrides::default(), 1)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::NoRouteSelected);
    }

    #[tokio::test]
    async fn test_start_overrides_apply_to_settings() {
        let mut rig = rig();
        let route = with_route(&mut rig, 2).await;

        rig.engine
            .start(
                Some(&route.id),
                StartOrigin::Operator,
                StartOverrides {
                    speed_percent: Some(80),
                    pattern: Some(SweepPattern::Spiral),
                    ..Default::default()
                },
                1_000,
            )
            .await
            .unwrap();

        assert_eq!(rig.engine.settings().speed_percent, 80);
        assert_eq!(rig.engine.settings().pattern, SweepPattern::Spiral);
    }

    #[tokio::test]
    async fn test_double_stop_emits_one_stop_command() {
        let mut rig = rig();
        let route = with_route(&mut rig, 2).await;
        rig.engine
            .start(Some(&route.id), StartOrigin::Operator, StartOverrides::default(), 1)
            .await
            .unwrap();
        drain_commands(&mut rig);

        assert!(rig.engine.stop().is_ok());
        let second = rig.engine.stop();
        assert!(matches!(second, Err(EngineError::Transition(_))));

        let stops = drain_commands(&mut rig)
            .into_iter()
            .filter(|c| *c == UnitCommand::Stop)
            .count();
        assert_eq!(stops, 1);
    }

    #[tokio::test]
    async fn test_emergency_stop_always_emits() {
        let mut rig = rig();

        // Even from Stopped
        rig.engine.emergency_stop();
        assert_eq!(rig.engine.status(), PatrolStatus::Stopped);
        assert!(rig.engine.mission().active_route.is_none());
        assert_eq!(drain_commands(&mut rig), vec![UnitCommand::EmergencyStop]);
    }

    #[tokio::test]
    async fn test_detection_auto_pause_emits_one_pause() {
        let mut rig = rig();
        let route = with_route(&mut rig, 2).await;
        rig.engine
            .start(Some(&route.id), StartOrigin::Operator, StartOverrides::default(), 1)
            .await
            .unwrap();
        drain_commands(&mut rig);

        rig.engine
            .handle_event(InboundEvent::Detection(detection("snail", 0.9)), 1_000)
            .await;

        assert_eq!(rig.engine.status(), PatrolStatus::Paused);
        assert_eq!(rig.engine.mission().detection_count, 1);
        let pauses = drain_commands(&mut rig)
            .into_iter()
            .filter(|c| *c == UnitCommand::Pause)
            .count();
        assert_eq!(pauses, 1);

        let mut saw_pause_notice = false;
        while let Ok(notice) = rig.notices.try_recv() {
            if matches!(notice, EngineNotice::PausedOnDetection { .. }) {
                saw_pause_notice = true;
            }
        }
        assert!(saw_pause_notice);
    }

    #[tokio::test]
    async fn test_detection_while_paused_counts_without_commands() {
        let mut rig = rig();
        let route = with_route(&mut rig, 2).await;
        rig.engine
            .start(Some(&route.id), StartOrigin::Operator, StartOverrides::default(), 1)
            .await
            .unwrap();
        rig.engine.pause().unwrap();
        drain_commands(&mut rig);

        rig.engine
            .handle_event(InboundEvent::Detection(detection("snail", 0.9)), 60_000)
            .await;

        assert_eq!(rig.engine.status(), PatrolStatus::Paused);
        assert_eq!(rig.engine.mission().detection_count, 1);
        assert!(drain_commands(&mut rig).is_empty());
    }

    #[tokio::test]
    async fn test_lap_complete_in_once_mode_stops_and_goes_home() {
        let mut rig = rig();
        let route = with_route(&mut rig, 2).await;
        rig.engine.set_home(LatLng::new(48.0, 11.0)).await;
        rig.engine
            .start(
                Some(&route.id),
                StartOrigin::Operator,
                StartOverrides {
                    mode: Some(PatrolMode::Once),
                    ..Default::default()
                },
                1,
            )
            .await
            .unwrap();
        drain_commands(&mut rig);

        rig.engine.handle_event(InboundEvent::LapComplete, 2_000).await;

        assert_eq!(rig.engine.status(), PatrolStatus::Stopped);
        assert_eq!(rig.engine.mission().lap_count, 1);
        let cmds = drain_commands(&mut rig);
        assert!(cmds.contains(&UnitCommand::Stop));
        assert!(cmds
            .iter()
            .any(|c| matches!(c, UnitCommand::GoHome { position } if position.lat == 48.0)));
    }

    #[tokio::test]
    async fn test_lap_complete_in_loop_mode_continues() {
        let mut rig = rig();
        let route = with_route(&mut rig, 2).await;
        rig.engine
            .start(Some(&route.id), StartOrigin::Operator, StartOverrides::default(), 1)
            .await
            .unwrap();
        drain_commands(&mut rig);

        rig.engine.handle_event(InboundEvent::LapComplete, 2_000).await;
        assert_eq!(rig.engine.status(), PatrolStatus::Running);
        assert_eq!(rig.engine.mission().lap_count, 1);
        assert!(drain_commands(&mut rig).is_empty());
    }

    #[tokio::test]
    async fn test_low_battery_advises_go_home_once() {
        let mut rig = rig();
        let route = with_route(&mut rig, 2).await;
        rig.engine.set_home(LatLng::new(48.0, 11.0)).await;
        rig.engine
            .start(Some(&route.id), StartOrigin::Operator, StartOverrides::default(), 1)
            .await
            .unwrap();
        drain_commands(&mut rig);

        let low = InboundEvent::Telemetry {
            battery_percent: 15,
            heading_deg: 90.0,
            position: None,
            coverage: None,
        };
        rig.engine.handle_event(low.clone(), 1_000).await;
        rig.engine.handle_event(low, 2_000).await;

        // Mission keeps running; exactly one advisory emitted
        assert_eq!(rig.engine.status(), PatrolStatus::Running);
        let go_homes = drain_commands(&mut rig)
            .into_iter()
            .filter(|c| matches!(c, UnitCommand::GoHome { .. }))
            .count();
        assert_eq!(go_homes, 1);
    }

    #[tokio::test]
    async fn test_telemetry_accumulates_distance_while_running() {
        let mut rig = rig();
        let route = with_route(&mut rig, 2).await;
        rig.engine
            .start(Some(&route.id), StartOrigin::Operator, StartOverrides::default(), 1)
            .await
            .unwrap();

        let at = |lng: f64| InboundEvent::Telemetry {
            battery_percent: 90,
            heading_deg: 0.0,
            position: Some(LatLng::new(0.0, lng)),
            coverage: None,
        };
        rig.engine.handle_event(at(0.0), 1_000).await;
        rig.engine.handle_event(at(0.001), 2_000).await;

        let traveled = rig.engine.mission().distance_m;
        assert!(traveled > 100.0 && traveled < 130.0, "traveled = {traveled}");
    }

    #[tokio::test]
    async fn test_waypoint_progress_flows_to_tracker() {
        let mut rig = rig();
        let route = with_route(&mut rig, 3).await;
        rig.engine
            .start(Some(&route.id), StartOrigin::Operator, StartOverrides::default(), 1)
            .await
            .unwrap();

        rig.engine
            .handle_event(InboundEvent::WaypointReached { index: 1 }, 2_000)
            .await;

        assert_eq!(rig.engine.mission().current_waypoint, 1);
        let display = rig.engine.waypoint_display();
        assert_eq!(display.len(), 3);
        assert_eq!(display[1].state, crate::waypoints::WaypointState::Current);
    }

    #[tokio::test]
    async fn test_deleting_active_route_stops_mission() {
        let mut rig = rig();
        let route = with_route(&mut rig, 2).await;
        rig.engine
            .start(Some(&route.id), StartOrigin::Operator, StartOverrides::default(), 1)
            .await
            .unwrap();
        drain_commands(&mut rig);

        rig.engine.delete_route(&route.id).await.unwrap();
        assert_eq!(rig.engine.status(), PatrolStatus::Stopped);
        assert!(drain_commands(&mut rig).contains(&UnitCommand::Stop));
    }

    #[tokio::test]
    async fn test_schedule_tick_starts_and_stops_by_provenance() {
        let mut rig = rig();
        with_route(&mut rig, 2).await;
        rig.engine
            .set_schedule(ScheduleConfig {
                enabled: true,
                ..Default::default()
            })
            .await;

        // In window on an active day
        rig.engine
            .handle_schedule_tick(2, TimeOfDay::new(9, 0), 1_000)
            .await;
        assert_eq!(rig.engine.status(), PatrolStatus::Running);
        assert_eq!(rig.engine.mission().origin, StartOrigin::Schedule);

        // Window closes: schedule-initiated mission stops
        rig.engine
            .handle_schedule_tick(2, TimeOfDay::new(19, 0), 2_000)
            .await;
        assert_eq!(rig.engine.status(), PatrolStatus::Stopped);

        // Operator restarts after hours; the schedule must leave it alone
        rig.engine
            .start(None, StartOrigin::Operator, StartOverrides::default(), 3_000)
            .await
            .unwrap();
        rig.engine
            .handle_schedule_tick(2, TimeOfDay::new(20, 0), 4_000)
            .await;
        assert_eq!(rig.engine.status(), PatrolStatus::Running);
    }

    #[tokio::test]
    async fn test_state_survives_reload_through_store() {
        let store = Arc::new(MemoryStore::new());

        let (outbox, _commands) = CommandOutbox::channel();
        let (notice_tx, _notices) = mpsc::unbounded_channel();
        let mut engine = MissionEngine::new(outbox, notice_tx, store.clone());
        engine
            .create_route(
                RouteDraft {
                    name: "fence line".into(),
                    waypoints: path(2),
                    ..Default::default()
                },
                100,
            )
            .await
            .unwrap();
        engine.set_home(LatLng::new(48.0, 11.0)).await;

        let (outbox, _commands) = CommandOutbox::channel();
        let (notice_tx, _notices) = mpsc::unbounded_channel();
        let mut reloaded = MissionEngine::new(outbox, notice_tx, store);
        reloaded.load().await;

        assert_eq!(reloaded.list_routes(SortKey::Name).len(), 1);
        assert_eq!(reloaded.home(), Some(LatLng::new(48.0, 11.0)));
    }

    #[tokio::test]
    async fn test_unrecognized_event_is_ignored() {
        let mut rig = rig();
        rig.engine
            .handle_event(
                InboundEvent::Unrecognized {
                    kind: "set_disco_mode".into(),
                },
                1_000,
            )
            .await;
        assert_eq!(rig.engine.status(), PatrolStatus::Stopped);
        assert!(drain_commands(&mut rig).is_empty());
    }
}
