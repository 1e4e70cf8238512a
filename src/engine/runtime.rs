//! Serialized engine runtime
//!
//! Intents and inbound events from any number of producers (command
//! channel listener, schedule ticker, operator surface) funnel through one
//! queue into the engine task, so no two transitions ever race. The
//! emergency path has its own channel and is polled first: an emergency
//! stop overtakes whatever is still queued.

use super::mission::{EngineError, InboundEvent, MissionEngine, StartOverrides};
use anyhow::anyhow;
use chrono::{Datelike, Local, Timelike};
use patrol_shared::{now_ms, Mission, StartOrigin, TimeOfDay};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::info;

/// Operator-facing mission intents
#[derive(Debug)]
pub enum OperatorIntent {
    Start {
        route_id: Option<String>,
        overrides: StartOverrides,
    },
    Pause,
    Resume,
    Stop,
}

enum Request {
    Intent {
        intent: OperatorIntent,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Event(InboundEvent),
    Query(oneshot::Sender<Mission>),
}

/// Cloneable sender surface for the engine task
#[derive(Clone)]
pub struct EngineHandle {
    requests: mpsc::UnboundedSender<Request>,
    emergency: mpsc::UnboundedSender<()>,
}

impl EngineHandle {
    /// Apply an operator intent and wait for the engine's verdict
    pub async fn apply(&self, intent: OperatorIntent) -> anyhow::Result<()> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request::Intent { intent, reply })
            .map_err(|_| anyhow!("engine task stopped"))?;
        rx.await.map_err(|_| anyhow!("engine task stopped"))??;
        Ok(())
    }

    /// Enqueue an inbound event; fire-and-forget
    pub fn send_event(&self, event: InboundEvent) {
        let _ = self.requests.send(Request::Event(event));
    }

    /// Request an immediate emergency stop. Never fails; the dedicated
    /// channel is drained ahead of all queued work.
    pub fn emergency_stop(&self) {
        let _ = self.emergency.send(());
    }

    /// Snapshot of the current mission record
    pub async fn mission(&self) -> anyhow::Result<Mission> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request::Query(reply))
            .map_err(|_| anyhow!("engine task stopped"))?;
        rx.await.map_err(|_| anyhow!("engine task stopped"))
    }
}

/// Spawns and owns the single engine task
pub struct EngineRuntime;

impl EngineRuntime {
    /// Move the engine onto its own task and return the handle to it
    pub fn spawn(mut engine: MissionEngine) -> (EngineHandle, JoinHandle<()>) {
        let (req_tx, mut req_rx) = mpsc::unbounded_channel();
        let (emg_tx, mut emg_rx) = mpsc::unbounded_channel();

        let tick_secs = engine.schedule().interval_secs.max(1);
        let task = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(tick_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    maybe = emg_rx.recv() => match maybe {
                        Some(()) => engine.emergency_stop(),
                        None => break,
                    },
                    maybe = req_rx.recv() => match maybe {
                        Some(request) => Self::handle(&mut engine, request).await,
                        None => break,
                    },
                    _ = ticker.tick() => {
                        let (weekday, now) = wall_clock();
                        engine.handle_schedule_tick(weekday, now, now_ms()).await;
                    }
                }
            }

            info!("engine task stopped");
        });

        (
            EngineHandle {
                requests: req_tx,
                emergency: emg_tx,
            },
            task,
        )
    }

    async fn handle(engine: &mut MissionEngine, request: Request) {
        match request {
            Request::Intent { intent, reply } => {
                let result = match intent {
                    OperatorIntent::Start { route_id, overrides } => engine
                        .start(route_id.as_deref(), StartOrigin::Operator, overrides, now_ms())
                        .await
                        .map(|_| ()),
                    OperatorIntent::Pause => engine.pause(),
                    OperatorIntent::Resume => engine.resume(),
                    OperatorIntent::Stop => engine.stop(),
                };
                let _ = reply.send(result);
            }
            Request::Event(event) => engine.handle_event(event, now_ms()).await,
            Request::Query(reply) => {
                let _ = reply.send(engine.mission().clone());
            }
        }
    }
}

// Local weekday (0 = Monday) and time of day for schedule evaluation
fn wall_clock() -> (u8, TimeOfDay) {
    let now = Local::now();
    (
        now.weekday().num_days_from_monday() as u8,
        TimeOfDay::new(now.hour() as u8, now.minute() as u8),
    )
}
