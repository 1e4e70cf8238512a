//! Core patrol data model
//!
//! Every type here crosses the JSON persistence boundary, so all of them
//! derive serde traits.

use crate::limits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A geographic coordinate in WGS-84 degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Whether a stored geometry is an open path or a closed area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    /// Open path traversed waypoint by waypoint
    Polyline,
    /// Closed area covered by a sweep pattern
    Polygon,
}

impl RouteKind {
    /// Minimum vertex count for a valid geometry of this kind
    pub fn min_vertices(self) -> usize {
        match self {
            RouteKind::Polyline => 2,
            RouteKind::Polygon => 3,
        }
    }
}

/// Operator-assigned route priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Priority {
    /// Numeric rank, higher means more urgent
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Normal => 1,
            Priority::High => 2,
        }
    }
}

/// How a route mission proceeds once the path is exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatrolMode {
    /// Restart from the first waypoint
    Loop,
    /// Walk the path back in reverse
    Bounce,
    /// Single pass, mission stops on completion
    Once,
    /// Visit waypoints in random order
    Random,
}

/// Coverage strategy used to sweep a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepPattern {
    Lawnmower,
    Spiral,
    Perimeter,
    Random,
}

impl SweepPattern {
    /// Multiplier applied to the effective sweep distance of a zone
    pub fn coefficient(self) -> f64 {
        match self {
            SweepPattern::Lawnmower => 1.0,
            SweepPattern::Spiral => 0.9,
            SweepPattern::Perimeter => 0.2,
            SweepPattern::Random => 1.2,
        }
    }
}

/// A stored patrol route (open polyline) or zone (closed polygon)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: RouteKind,
    pub color: String,
    pub priority: Priority,
    pub waypoints: Vec<LatLng>,
    pub visible: bool,
    pub created_at_ms: u64,
}

impl Route {
    pub fn is_zone(&self) -> bool {
        self.kind == RouteKind::Polygon
    }

    /// Length in meters for polylines, area in square meters for polygons.
    /// Used as the comparison key for size-ordered listings.
    pub fn size_metric(&self) -> f64 {
        match self.kind {
            RouteKind::Polyline => crate::geo::route_length(&self.waypoints),
            RouteKind::Polygon => crate::geo::polygon_area(&self.waypoints),
        }
    }
}

/// Current execution state of the patrol mission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatrolStatus {
    Stopped,
    Running,
    Paused,
}

/// Who initiated the current mission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartOrigin {
    Operator,
    Schedule,
}

/// One patrol execution with its counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub status: PatrolStatus,
    pub active_route: Option<String>,
    pub origin: StartOrigin,
    pub started_at_ms: Option<u64>,
    pub distance_m: f64,
    pub lap_count: u32,
    pub detection_count: u32,
    /// Only meaningful for polyline missions; stays 0 for zones
    pub current_waypoint: usize,
}

impl Default for Mission {
    fn default() -> Self {
        Self {
            status: PatrolStatus::Stopped,
            active_route: None,
            origin: StartOrigin::Operator,
            started_at_ms: None,
            distance_m: 0.0,
            lap_count: 0,
            detection_count: 0,
            current_waypoint: 0,
        }
    }
}

/// A classified observation reported by the perception stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub id: String,
    pub target: String,
    /// Classifier confidence in [0, 1]
    pub confidence: f64,
    pub position: LatLng,
    pub timestamp_ms: u64,
    pub image_ref: Option<String>,
}

/// What a custom detection target is bound to.
///
/// A target references exactly one source at a time; switching the source
/// kind replaces the binding wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DetectionSource {
    /// One of the fixed baseline classifier classes
    Baseline { class: String },
    /// An uploaded model artifact
    Model { artifact: String },
}

/// An operator-defined detection target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomTarget {
    pub id: String,
    pub label: String,
    pub icon: String,
    pub enabled: bool,
    /// Per-target confidence threshold in [0, 1]
    pub threshold: f64,
    pub source: DetectionSource,
}

/// Which side effects fire when a detection is recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPolicy {
    pub sound: bool,
    pub notification: bool,
    pub photo: bool,
    pub auto_pause: bool,
    /// Minimum seconds between repeated alerts for the same target type
    pub cooldown_secs: u64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            sound: true,
            notification: true,
            photo: true,
            auto_pause: true,
            cooldown_secs: limits::DEFAULT_COOLDOWN_SECS,
        }
    }
}

/// Operator-tunable patrol behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatrolSettings {
    /// Percent of the reference top speed, 0-100
    pub speed_percent: u8,
    pub mode: PatrolMode,
    pub pattern: SweepPattern,
    pub waypoint_pause_secs: u32,
    pub detection_targets: Vec<String>,
    /// Global confidence threshold as a percentage, 0-100
    pub detection_sensitivity: u8,
    pub auto_return_home: bool,
    pub low_battery_percent: u8,
}

impl Default for PatrolSettings {
    fn default() -> Self {
        Self {
            speed_percent: 50,
            mode: PatrolMode::Loop,
            pattern: SweepPattern::Lawnmower,
            waypoint_pause_secs: 2,
            detection_targets: vec!["snail".into()],
            detection_sensitivity: 70,
            auto_return_home: true,
            low_battery_percent: limits::DEFAULT_LOW_BATTERY_PERCENT,
        }
    }
}

/// A wall-clock time of day, persisted as "HH:MM"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

#[derive(Debug, Error, PartialEq)]
#[error("invalid time of day: {0:?} (expected HH:MM)")]
pub struct TimeOfDayParseError(String);

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }

    /// Minutes since midnight
    pub fn minutes(self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = TimeOfDayParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (h, m) = value
            .split_once(':')
            .ok_or_else(|| TimeOfDayParseError(value.clone()))?;
        let hour: u8 = h.parse().map_err(|_| TimeOfDayParseError(value.clone()))?;
        let minute: u8 = m.parse().map_err(|_| TimeOfDayParseError(value.clone()))?;
        if hour > 23 || minute > 59 {
            return Err(TimeOfDayParseError(value));
        }
        Ok(Self { hour, minute })
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> String {
        format!("{:02}:{:02}", t.hour, t.minute)
    }
}

/// Weekly auto-start/stop window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub enabled: bool,
    /// Active weekdays, 0 = Monday .. 6 = Sunday
    pub days: Vec<u8>,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            days: (0..=6).collect(),
            start: TimeOfDay::new(8, 0),
            end: TimeOfDay::new(18, 0),
            interval_secs: limits::DEFAULT_SCHEDULE_INTERVAL_SECS,
        }
    }
}
