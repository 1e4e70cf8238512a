//! Canonical route list with derived metrics
//!
//! Metrics (length, area, estimates) are derived on demand through the
//! geometry module rather than cached here, so edits can never leave a
//! stale figure behind.

use patrol_shared::{LatLng, Priority, Route, RouteKind};
use thiserror::Error;

/// Errors from route store operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteStoreError {
    #[error("route not found: {0}")]
    NotFound(String),

    #[error("invalid geometry: need at least {need} vertices, got {got}")]
    InvalidGeometry { need: usize, got: usize },
}

/// Fields for a new route; unset fields take the original defaults
#[derive(Debug, Clone)]
pub struct RouteDraft {
    pub name: String,
    pub description: String,
    pub kind: RouteKind,
    pub color: String,
    pub priority: Priority,
    pub waypoints: Vec<LatLng>,
}

impl Default for RouteDraft {
    fn default() -> Self {
        Self {
            name: "New Route".into(),
            description: String::new(),
            kind: RouteKind::Polyline,
            color: "#4fc3f7".into(),
            priority: Priority::Normal,
            waypoints: Vec::new(),
        }
    }
}

/// Partial update; `None` fields keep their current value
#[derive(Debug, Clone, Default)]
pub struct RoutePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<RouteKind>,
    pub color: Option<String>,
    pub priority: Option<Priority>,
    pub waypoints: Option<Vec<LatLng>>,
    pub visible: Option<bool>,
}

/// Keys a listing can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    CreatedAt,
    Size,
    Priority,
}

impl SortKey {
    /// Whether this key lists ascending by default
    fn default_ascending(self) -> bool {
        match self {
            SortKey::Name => true,
            // Newest, largest, and most urgent first
            SortKey::CreatedAt | SortKey::Size | SortKey::Priority => false,
        }
    }
}

/// Exclusive owner of the route/zone list
#[derive(Debug, Default)]
pub struct RouteStore {
    routes: Vec<Route>,
    last_sort: Option<(SortKey, bool)>,
    last_id_stamp: u64,
}

impl RouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from persisted routes, replacing current contents
    pub fn load(&mut self, routes: Vec<Route>) {
        self.last_id_stamp = routes.iter().map(|r| r.created_at_ms).max().unwrap_or(0);
        self.routes = routes;
    }

    /// Validate and append a new route, returning the stored record
    pub fn create(&mut self, draft: RouteDraft, now_ms: u64) -> Result<Route, RouteStoreError> {
        Self::validate_geometry(draft.kind, &draft.waypoints)?;

        let route = Route {
            id: self.alloc_id(now_ms),
            name: draft.name,
            description: draft.description,
            kind: draft.kind,
            color: draft.color,
            priority: draft.priority,
            waypoints: draft.waypoints,
            visible: true,
            created_at_ms: now_ms,
        };
        self.routes.push(route.clone());
        Ok(route)
    }

    /// Merge a partial update into an existing route.
    ///
    /// Geometry is re-validated against the (possibly updated) kind before
    /// anything is stored, so a failed update changes nothing.
    pub fn update(&mut self, id: &str, patch: RoutePatch) -> Result<Route, RouteStoreError> {
        let idx = self.index_of(id)?;

        let kind = patch.kind.unwrap_or(self.routes[idx].kind);
        let waypoints = patch
            .waypoints
            .as_ref()
            .unwrap_or(&self.routes[idx].waypoints);
        Self::validate_geometry(kind, waypoints)?;

        let route = &mut self.routes[idx];
        route.kind = kind;
        if let Some(name) = patch.name {
            route.name = name;
        }
        if let Some(description) = patch.description {
            route.description = description;
        }
        if let Some(color) = patch.color {
            route.color = color;
        }
        if let Some(priority) = patch.priority {
            route.priority = priority;
        }
        if let Some(waypoints) = patch.waypoints {
            route.waypoints = waypoints;
        }
        if let Some(visible) = patch.visible {
            route.visible = visible;
        }
        Ok(route.clone())
    }

    /// Remove a route. Callers holding the id as an active reference are
    /// responsible for reacting to the removal.
    pub fn delete(&mut self, id: &str) -> Result<(), RouteStoreError> {
        let idx = self.index_of(id)?;
        self.routes.remove(idx);
        Ok(())
    }

    /// Deep-copy a route under a fresh id and a suffixed name
    pub fn duplicate(&mut self, id: &str, now_ms: u64) -> Result<Route, RouteStoreError> {
        let original = self.get(id).ok_or_else(|| RouteStoreError::NotFound(id.into()))?;

        let mut copy = original.clone();
        copy.id = self.alloc_id(now_ms);
        copy.name = format!("{} (copy)", copy.name);
        copy.visible = true;
        copy.created_at_ms = now_ms;
        self.routes.push(copy.clone());
        Ok(copy)
    }

    pub fn set_visible(&mut self, id: &str, visible: bool) -> Result<(), RouteStoreError> {
        let idx = self.index_of(id)?;
        self.routes[idx].visible = visible;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Unordered clone of the full list, for persistence snapshots and
    /// concurrent readers
    pub fn snapshot(&self) -> Vec<Route> {
        self.routes.clone()
    }

    /// Most recently created visible route, the schedule auto-start default
    pub fn newest_visible(&self) -> Option<&Route> {
        self.routes
            .iter()
            .filter(|r| r.visible)
            .max_by_key(|r| r.created_at_ms)
    }

    /// Ordered clone-out listing.
    ///
    /// Selecting the key already in effect flips the direction; selecting a
    /// different key restores that key's default direction.
    pub fn list(&mut self, key: SortKey) -> Vec<Route> {
        let ascending = match self.last_sort {
            Some((last, asc)) if last == key => !asc,
            _ => key.default_ascending(),
        };
        self.last_sort = Some((key, ascending));

        let mut out = self.routes.clone();
        out.sort_by(|a, b| {
            let ord = match key {
                SortKey::Name => a.name.cmp(&b.name),
                SortKey::CreatedAt => a.created_at_ms.cmp(&b.created_at_ms),
                SortKey::Size => a.size_metric().total_cmp(&b.size_metric()),
                SortKey::Priority => a.priority.rank().cmp(&b.priority.rank()),
            };
            if ascending { ord } else { ord.reverse() }
        });
        out
    }

    fn validate_geometry(kind: RouteKind, waypoints: &[LatLng]) -> Result<(), RouteStoreError> {
        let need = kind.min_vertices();
        if waypoints.len() < need {
            return Err(RouteStoreError::InvalidGeometry {
                need,
                got: waypoints.len(),
            });
        }
        Ok(())
    }

    fn index_of(&self, id: &str) -> Result<usize, RouteStoreError> {
        self.routes
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| RouteStoreError::NotFound(id.into()))
    }

    // Ids are time-based; bump past the previous stamp when two creations
    // land on the same millisecond.
    fn alloc_id(&mut self, now_ms: u64) -> String {
        let stamp = now_ms.max(self.last_id_stamp + 1);
        self.last_id_stamp = stamp;
        format!("route_{stamp}")
    }
}
