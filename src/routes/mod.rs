//! Route and zone ownership
//!
//! The store holds the canonical route list; everything else (presentation,
//! the engine) works with id handles and clone-out snapshots.

mod store;

pub use store::{RouteDraft, RoutePatch, RouteStore, RouteStoreError, SortKey};
