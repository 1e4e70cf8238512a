//! Outbound command channel
//!
//! The engine never talks to the physical unit directly. Every transition
//! emits a [`UnitCommand`] into an unbounded queue; the external command
//! channel drains it and owns delivery, retries, and timeouts.

use patrol_shared::{LatLng, PatrolMode, RouteKind, SweepPattern};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

/// One message toward the physical unit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum UnitCommand {
    /// Begin traversing a route or sweeping a zone
    Start {
        route_id: String,
        kind: RouteKind,
        waypoints: Vec<LatLng>,
        mode: PatrolMode,
        pattern: SweepPattern,
        speed_percent: u8,
        targets: Vec<String>,
        sensitivity: u8,
    },
    Pause,
    Resume,
    Stop,
    /// Immediate halt, bypassing normal motion ramp-down
    EmergencyStop,
    /// Advisory: navigate back to the home position
    GoHome { position: LatLng },
    /// Push the current watch list to the perception stack
    UpdateDetectionTargets { targets: Vec<String>, sensitivity: u8 },
}

/// Fire-and-forget sender toward the command channel.
///
/// Emitting is put-and-continue: a dropped receiver is logged and otherwise
/// ignored so no transition ever blocks on delivery.
#[derive(Clone)]
pub struct CommandOutbox {
    tx: mpsc::UnboundedSender<UnitCommand>,
}

impl CommandOutbox {
    /// Create an outbox and the receiving half for the channel adapter
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UnitCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a command toward the unit
    pub fn send(&self, command: UnitCommand) {
        if self.tx.send(command).is_err() {
            warn!("command channel closed, outbound command dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commands_arrive_in_order() {
        let (outbox, mut rx) = CommandOutbox::channel();
        outbox.send(UnitCommand::Pause);
        outbox.send(UnitCommand::Resume);
        assert_eq!(rx.recv().await, Some(UnitCommand::Pause));
        assert_eq!(rx.recv().await, Some(UnitCommand::Resume));
    }

    #[tokio::test]
    async fn test_send_survives_dropped_receiver() {
        let (outbox, rx) = CommandOutbox::channel();
        drop(rx);
        outbox.send(UnitCommand::Stop);
    }
}
