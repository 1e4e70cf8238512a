//! Persistence boundary
//!
//! The engine treats storage as an opaque get/set-by-key interface with
//! JSON values: state is read once at startup and written after every
//! mutating operation. A missing or corrupt key falls back to documented
//! defaults and never fails startup.

mod file;
mod store;

pub use file::JsonFileStore;
pub use store::{KvStore, MemoryStore};

/// Well-known storage keys
pub mod keys {
    pub const ROUTES: &str = "patrol_routes";
    pub const SETTINGS: &str = "patrol_settings";
    pub const ALERTS: &str = "patrol_alerts";
    pub const SCHEDULE: &str = "patrol_schedule";
    pub const CUSTOM_TARGETS: &str = "patrol_custom_targets";
    pub const HOME: &str = "patrol_home";
    pub const DETECTIONS: &str = "patrol_detections";
}
