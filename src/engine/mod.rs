//! Patrol orchestration engine
//!
//! [`MissionEngine`] is the single owner of mission, route, and detection
//! state; [`EngineRuntime`] serializes every intent and inbound event
//! through it on one task.

mod mission;
mod runtime;

pub use mission::{EngineError, EngineNotice, InboundEvent, MissionEngine, StartOverrides};
pub use runtime::{EngineHandle, EngineRuntime, OperatorIntent};
