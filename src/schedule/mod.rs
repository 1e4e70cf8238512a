//! Weekly patrol scheduling

mod evaluator;

pub use evaluator::{evaluate, ScheduleIntent};
