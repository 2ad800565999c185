//! Simplified land avoidance.
//!
//! Land is a handful of closed polygons. Crossing tests only use each
//! polygon's bounding rectangle, and detours go around that rectangle's
//! corners. This is an approximation: it knows nothing of real coastlines,
//! and a detour leg may still clip another rectangle on a crowded coast.

use geo::{BoundingRect, Contains, Coord, Intersects, Line, Point, Polygon, Rect};
use log::debug;

use crate::engine::models::GeoPoint;

/// Upper bound on detour refinement passes in [`LandConstraint::correct_route`].
const MAX_DETOUR_PASSES: usize = 4;

// Cohen-Sutherland outcodes
const INSIDE: u8 = 0;
const WEST: u8 = 1;
const EAST: u8 = 2;
const SOUTH: u8 = 4;
const NORTH: u8 = 8;

#[derive(Debug, Clone)]
pub struct LandPolygon {
    pub name: String,
    /// x = longitude, y = latitude
    pub polygon: Polygon<f64>,
    bounds: Rect<f64>,
}

impl LandPolygon {
    /// Builds a polygon from (lat, lon) vertices. Returns `None` for an empty ring.
    pub fn new(name: &str, vertices: &[(f64, f64)]) -> Option<Self> {
        let exterior: Vec<Coord<f64>> = vertices.iter().map(|(lat, lon)| Coord { x: *lon, y: *lat }).collect();
        let polygon = Polygon::new(exterior.into(), vec![]);
        let bounds = polygon.bounding_rect()?;
        Some(Self { name: name.to_string(), polygon, bounds })
    }

    pub fn bounds(&self) -> Rect<f64> {
        self.bounds
    }

    pub fn central_latitude(&self) -> f64 {
        self.bounds.center().y
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.polygon.contains(&Point::new(point.lon, point.lat))
    }

    fn outcode(&self, point: &GeoPoint) -> u8 {
        let min = self.bounds.min();
        let max = self.bounds.max();
        let mut code = INSIDE;
        if point.lon < min.x { code |= WEST; } else if point.lon > max.x { code |= EAST; }
        if point.lat < min.y { code |= SOUTH; } else if point.lat > max.y { code |= NORTH; }
        code
    }

    /// True when the segment passes through this polygon's bounding
    /// rectangle from one side to another. A segment starting or ending
    /// inside the rectangle does not cross it.
    pub fn segment_crosses(&self, start: &GeoPoint, end: &GeoPoint) -> bool {
        let code_start = self.outcode(start);
        let code_end = self.outcode(end);
        if code_start == INSIDE || code_end == INSIDE {
            return false;
        }
        // Both endpoints beyond the same edge
        if code_start & code_end != 0 {
            return false;
        }
        line_intersects_rect(start, end, &self.bounds)
    }

    /// True when the segment touches the polygon itself.
    pub fn segment_touches(&self, start: &GeoPoint, end: &GeoPoint) -> bool {
        let line = Line::new(Coord { x: start.lon, y: start.lat }, Coord { x: end.lon, y: end.lat });
        self.polygon.intersects(&line)
    }
}

/// Slope/intercept test of segment `start`-`end` against the four edges of `rect`.
fn line_intersects_rect(start: &GeoPoint, end: &GeoPoint, rect: &Rect<f64>) -> bool {
    let (x1, y1, x2, y2) = (start.lon, start.lat, end.lon, end.lat);
    let min = rect.min();
    let max = rect.max();
    let within = |v: f64, a: f64, b: f64| v >= a.min(b) && v <= a.max(b);

    if x1 == x2 {
        // Vertical: no slope
        return within(x1, min.x, max.x) && y1.max(y2) >= min.y && y1.min(y2) <= max.y;
    }

    let slope = (y2 - y1) / (x2 - x1);
    let intercept = y1 - slope * x1;

    for edge_x in [min.x, max.x] {
        if within(edge_x, x1, x2) {
            let y = slope * edge_x + intercept;
            if within(y, min.y, max.y) {
                return true;
            }
        }
    }

    if slope != 0.0 {
        for edge_y in [min.y, max.y] {
            let x = (edge_y - intercept) / slope;
            if within(x, x1, x2) && within(x, min.x, max.x) {
                return true;
            }
        }
    }

    false
}

#[derive(Debug, Clone, Default)]
pub struct LandConstraint {
    polygons: Vec<LandPolygon>,
    /// Clearance kept from a rectangle when detouring, degrees
    margin_deg: f64,
}

impl LandConstraint {
    pub fn new(polygons: Vec<LandPolygon>, margin_deg: f64) -> Self {
        Self { polygons, margin_deg }
    }

    /// Open sea: nothing to avoid.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Corsica, Sardinia and Mallorca as coarse outlines.
    pub fn western_mediterranean(margin_deg: f64) -> Self {
        let islands = [
            ("Corsica", &CORSICA[..]),
            ("Sardinia", &SARDINIA[..]),
            ("Mallorca", &MALLORCA[..]),
        ];
        let polygons = islands
            .iter()
            .filter_map(|(name, outline)| LandPolygon::new(name, outline))
            .collect();
        Self::new(polygons, margin_deg)
    }

    pub fn polygons(&self) -> &[LandPolygon] {
        &self.polygons
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.containing(point).is_some()
    }

    /// The polygon `point` lies inside, if any.
    pub fn containing(&self, point: &GeoPoint) -> Option<&LandPolygon> {
        self.polygons.iter().find(|p| p.contains(point))
    }

    pub fn crosses(&self, segment_start: &GeoPoint, segment_end: &GeoPoint) -> bool {
        self.first_crossed(segment_start, segment_end).is_some()
    }

    /// Exact polygon test, for legs that start or end near an island where
    /// the rectangle test does not apply.
    pub fn touches_land(&self, segment_start: &GeoPoint, segment_end: &GeoPoint) -> bool {
        self.polygons.iter().any(|p| p.segment_touches(segment_start, segment_end))
    }

    fn first_crossed(&self, start: &GeoPoint, end: &GeoPoint) -> Option<&LandPolygon> {
        self.polygons.iter().find(|p| p.segment_crosses(start, end))
    }

    /// Two corner waypoints taking the segment around the first rectangle it
    /// crosses, on the north side if the segment's mid-latitude is at or
    /// above the rectangle's centre, else on the south side. Empty when the
    /// segment is clear.
    pub fn detour(&self, segment_start: &GeoPoint, segment_end: &GeoPoint) -> Vec<GeoPoint> {
        let Some(land) = self.first_crossed(segment_start, segment_end) else {
            return Vec::new();
        };

        let min = land.bounds.min();
        let max = land.bounds.max();
        let mid_lat = (segment_start.lat + segment_end.lat) / 2.0;

        let bypass_lat = if mid_lat >= land.central_latitude() {
            max.y + self.margin_deg
        } else {
            min.y - self.margin_deg
        };
        let west = GeoPoint::new(bypass_lat, min.x - self.margin_deg);
        let east = GeoPoint::new(bypass_lat, max.x + self.margin_deg);

        debug!("Detouring around {} at latitude {:.3}", land.name, bypass_lat);

        if segment_start.lon <= segment_end.lon {
            vec![west, east]
        } else {
            vec![east, west]
        }
    }

    /// Inserts detours wherever consecutive points cross land. Newly
    /// inserted legs are re-checked for a bounded number of passes.
    /// Consecutive repeated points are collapsed.
    pub fn correct_route(&self, route: &[GeoPoint]) -> Vec<GeoPoint> {
        let mut corrected = route.to_vec();
        corrected.dedup();

        for _ in 0..MAX_DETOUR_PASSES {
            let mut changed = false;
            let mut next = Vec::with_capacity(corrected.len());

            for (i, point) in corrected.iter().enumerate() {
                next.push(*point);
                if let Some(following) = corrected.get(i + 1) {
                    let detour = self.detour(point, following);
                    if !detour.is_empty() {
                        changed = true;
                        next.extend(detour);
                    }
                }
            }

            next.dedup();
            corrected = next;
            if !changed {
                break;
            }
        }

        corrected
    }
}

// (lat, lon)
const CORSICA: [(f64, f64); 10] = [
    (43.1, 9.45), (42.7, 9.6), (42.1, 9.8), (41.5, 9.4), (41.3, 9.2),
    (41.6, 8.8), (42.1, 8.5), (42.4, 8.6), (42.8, 9.0), (43.0, 9.3),
];

const SARDINIA: [(f64, f64); 9] = [
    (41.25, 9.2), (40.9, 9.75), (40.0, 9.8), (39.1, 9.55), (38.9, 8.6),
    (39.3, 8.4), (40.3, 8.4), (40.9, 8.2), (41.1, 8.7),
];

const MALLORCA: [(f64, f64); 6] = [
    (39.95, 3.2), (39.7, 3.45), (39.3, 3.1), (39.35, 2.7), (39.6, 2.35), (39.9, 2.8),
];
