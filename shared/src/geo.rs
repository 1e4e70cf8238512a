//! Geographic math over coordinate sequences
//!
//! Pure functions on a spherical-Earth approximation. Route metrics and
//! traversal estimates are derived on demand, never cached.

use crate::limits;
use crate::types::{LatLng, RouteKind, SweepPattern};

/// Great-circle distance between two coordinates in meters (haversine)
pub fn distance(a: LatLng, b: LatLng) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    limits::EARTH_RADIUS_M * c
}

/// Total length of an open path in meters; 0 for fewer than 2 vertices
pub fn route_length(vertices: &[LatLng]) -> f64 {
    vertices.windows(2).map(|w| distance(w[0], w[1])).sum()
}

/// Perimeter of a closed ring in meters, including the last-to-first edge;
/// 0 for fewer than 2 vertices
pub fn polygon_perimeter(vertices: &[LatLng]) -> f64 {
    if vertices.len() < 2 {
        return 0.0;
    }
    let closing = distance(vertices[vertices.len() - 1], vertices[0]);
    route_length(vertices) + closing
}

/// Enclosed area of a simple polygon in square meters.
///
/// Spherical-excess approximation: accumulates
/// `(lng2 - lng1) * (2 + sin(lat1) + sin(lat2))` over the closed ring and
/// scales by R^2 / 2. Self-intersecting input yields a deterministic but
/// meaningless value; vertex-count validation happens at the store.
pub fn polygon_area(vertices: &[LatLng]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }

    let mut sum = 0.0;
    for i in 0..vertices.len() {
        let p1 = vertices[i];
        let p2 = vertices[(i + 1) % vertices.len()];
        sum += (p2.lng - p1.lng).to_radians()
            * (2.0 + p1.lat.to_radians().sin() + p2.lat.to_radians().sin());
    }

    (sum * limits::EARTH_RADIUS_M * limits::EARTH_RADIUS_M / 2.0).abs()
}

/// Estimated seconds to traverse a route or cover a zone.
///
/// `measure` is a length in meters for polylines and an area in square
/// meters for polygons. Zones are converted to an effective sweep distance
/// via the fixed row spacing and the pattern coefficient. The speed
/// percentage is floored at `MIN_SPEED_PERCENT` so a zero setting cannot
/// divide by zero.
pub fn estimate_traversal_secs(
    measure: f64,
    speed_percent: u8,
    kind: RouteKind,
    pattern: SweepPattern,
) -> f64 {
    let pct = speed_percent.max(limits::MIN_SPEED_PERCENT) as f64;
    let speed = limits::MAX_LINEAR_SPEED_MPS * pct / 100.0;

    let effective = match kind {
        RouteKind::Polyline => measure,
        RouteKind::Polygon => measure / limits::SWEEP_ROW_SPACING_M * pattern.coefficient(),
    };

    effective / speed
}
