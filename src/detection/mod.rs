//! Detection ingestion and alerting
//!
//! Detections arrive already classified; this module records them, applies
//! the operator's alert policy with cooldown suppression, and maintains the
//! custom target registry. All side effects are expressed as intents for
//! the presentation and command layers.

mod pipeline;
mod targets;

pub use pipeline::{AlertIntent, DetectionOutcome, DetectionPipeline};
pub use targets::{TargetRegistry, TargetRegistryError};
