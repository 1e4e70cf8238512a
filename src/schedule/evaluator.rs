//! Schedule window evaluation
//!
//! Pure condition scan in the style of a safety check: given the clock and
//! the mission status, produce the intent the engine should apply. The
//! evaluator holds no state of its own; whether a mission was started by
//! the schedule lives on the mission record as its start origin.

use patrol_shared::{PatrolStatus, ScheduleConfig, StartOrigin, TimeOfDay};

/// Intent produced by a schedule tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleIntent {
    /// Auto-start the patrol on the default route
    Start,
    /// Auto-stop a schedule-initiated patrol at window end
    Stop,
}

/// Evaluate the schedule against the current clock and mission state.
///
/// Start fires only from Stopped inside the active window; Stop fires only
/// outside the window and only for missions the schedule itself started,
/// so an operator-initiated patrol is never cut short.
pub fn evaluate(
    config: &ScheduleConfig,
    weekday: u8,
    now: TimeOfDay,
    status: PatrolStatus,
    origin: StartOrigin,
) -> Option<ScheduleIntent> {
    if !config.enabled {
        return None;
    }

    let in_window = config.days.contains(&weekday) && within(config.start, config.end, now);

    match (in_window, status) {
        (true, PatrolStatus::Stopped) => Some(ScheduleIntent::Start),
        (false, PatrolStatus::Running | PatrolStatus::Paused)
            if origin == StartOrigin::Schedule =>
        {
            Some(ScheduleIntent::Stop)
        }
        _ => None,
    }
}

// Half-open [start, end); an end at or before the start spans midnight.
fn within(start: TimeOfDay, end: TimeOfDay, now: TimeOfDay) -> bool {
    let (s, e, n) = (start.minutes(), end.minutes(), now.minutes());
    if s == e {
        return false;
    }
    if s < e {
        s <= n && n < e
    } else {
        n >= s || n < e
    }
}
