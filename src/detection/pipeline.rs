//! Detection recording and alert evaluation

use patrol_shared::{limits, AlertPolicy, DetectionEvent};
use std::collections::{HashMap, VecDeque};

/// One alert side-effect requested by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum AlertIntent {
    /// Play the audible alert
    Sound,
    /// Surface a visual notification
    Notify { target: String, confidence: f64 },
    /// Archive the capture that triggered the detection
    PhotoArchived { image_ref: String },
}

/// Result of ingesting one detection event
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOutcome {
    pub alerts: Vec<AlertIntent>,
    /// Whether the alert policy asks the mission to pause. The engine owns
    /// mission status and decides if a pause actually applies.
    pub wants_pause: bool,
}

/// Bounded detection history with per-type counts and alert gating
#[derive(Debug, Default)]
pub struct DetectionPipeline {
    /// Most recent first, capped at `DETECTION_HISTORY_CAP`
    history: VecDeque<DetectionEvent>,
    counts: HashMap<String, u64>,
    /// Last time alert side-effects fired, per target type
    last_alert_ms: HashMap<String, u64>,
}

impl DetectionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the history from persistence (stored most recent first)
    pub fn load(&mut self, events: Vec<DetectionEvent>) {
        self.history = events.into_iter().take(limits::DETECTION_HISTORY_CAP).collect();
        self.counts.clear();
        for event in &self.history {
            *self.counts.entry(event.target.clone()).or_default() += 1;
        }
    }

    /// Record a detection and evaluate the alert policy.
    ///
    /// Recording is unconditional. Alert side-effects are skipped when
    /// `threshold` gates the event out (below threshold, or a disabled
    /// custom target passed as `None`) and while the per-type cooldown
    /// window is open; the cooldown never suppresses recording itself.
    pub fn on_detection(
        &mut self,
        event: DetectionEvent,
        policy: &AlertPolicy,
        threshold: Option<f64>,
        now_ms: u64,
    ) -> DetectionOutcome {
        self.history.push_front(event.clone());
        self.history.truncate(limits::DETECTION_HISTORY_CAP);
        *self.counts.entry(event.target.clone()).or_default() += 1;

        let gated_out = match threshold {
            Some(min) => event.confidence < min,
            None => true,
        };
        if gated_out || self.in_cooldown(&event.target, policy, now_ms) {
            return DetectionOutcome {
                alerts: Vec::new(),
                wants_pause: false,
            };
        }

        let mut alerts = Vec::new();
        if policy.sound {
            alerts.push(AlertIntent::Sound);
        }
        if policy.notification {
            alerts.push(AlertIntent::Notify {
                target: event.target.clone(),
                confidence: event.confidence,
            });
        }
        if policy.photo {
            if let Some(image_ref) = &event.image_ref {
                alerts.push(AlertIntent::PhotoArchived {
                    image_ref: image_ref.clone(),
                });
            }
        }

        if !alerts.is_empty() || policy.auto_pause {
            self.last_alert_ms.insert(event.target.clone(), now_ms);
        }

        DetectionOutcome {
            alerts,
            wants_pause: policy.auto_pause,
        }
    }

    /// Recorded events, most recent first
    pub fn history(&self) -> impl Iterator<Item = &DetectionEvent> {
        self.history.iter()
    }

    /// Snapshot of the history for persistence
    pub fn snapshot(&self) -> Vec<DetectionEvent> {
        self.history.iter().cloned().collect()
    }

    /// Running count per target type
    pub fn count_for(&self, target: &str) -> u64 {
        self.counts.get(target).copied().unwrap_or(0)
    }

    pub fn total_recorded(&self) -> usize {
        self.history.len()
    }

    /// Drop all recorded detections and counts; cooldown state survives
    pub fn clear(&mut self) {
        self.history.clear();
        self.counts.clear();
    }

    fn in_cooldown(&self, target: &str, policy: &AlertPolicy, now_ms: u64) -> bool {
        if policy.cooldown_secs == 0 {
            return false;
        }
        match self.last_alert_ms.get(target) {
            Some(last) => now_ms.saturating_sub(*last) < policy.cooldown_secs * 1_000,
            None => false,
        }
    }
}
