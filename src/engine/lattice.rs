use log::debug;

use crate::engine::geodesy::{distance_nm, EARTH_RADIUS_KM, KM_PER_NM};
use crate::engine::models::GeoPoint;

/// Fraction of the larger bounding-box span added on every side.
const MARGIN_FRACTION: f64 = 0.2;

/// Evenly spaced candidate waypoints covering the passage area.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchLattice {
    points: Vec<GeoPoint>,
    lat_step: f64,
    lon_step: f64,
    mid_lat: f64,
}

impl SearchLattice {
    /// `density` x `density` points over the start/goal box plus margin.
    pub fn build(start: &GeoPoint, goal: &GeoPoint, density: usize) -> Self {
        Self::covering(&[*start, *goal], density)
    }

    /// Same as [`Self::build`], but the box covers every point of `shape`
    /// (e.g. a base route). The last point of `shape` is always a lattice
    /// point so the goal can be hit exactly.
    pub fn covering(shape: &[GeoPoint], density: usize) -> Self {
        let density = density.max(2);
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lon = f64::MAX;
        let mut max_lon = f64::MIN;
        for p in shape {
            min_lat = min_lat.min(p.lat);
            max_lat = max_lat.max(p.lat);
            min_lon = min_lon.min(p.lon);
            max_lon = max_lon.max(p.lon);
        }
        if shape.is_empty() {
            return Self { points: Vec::new(), lat_step: 0.0, lon_step: 0.0, mid_lat: 0.0 };
        }

        // A box that is flat on one axis still gets room to manoeuvre on it.
        let margin = MARGIN_FRACTION * (max_lat - min_lat).max(max_lon - min_lon);
        min_lat -= margin;
        max_lat += margin;
        min_lon -= margin;
        max_lon += margin;

        let lat_step = (max_lat - min_lat) / (density - 1) as f64;
        let lon_step = (max_lon - min_lon) / (density - 1) as f64;

        let mut points = Vec::with_capacity(density * density + 1);
        for row in 0..density {
            for col in 0..density {
                points.push(GeoPoint::new(min_lat + row as f64 * lat_step, min_lon + col as f64 * lon_step));
            }
        }
        if let Some(goal) = shape.last() {
            if !points.contains(goal) {
                points.push(*goal);
            }
        }

        debug!("Built lattice of {} points ({:.4} x {:.4} deg cells)", points.len(), lat_step, lon_step);

        Self { points, lat_step, lon_step, mid_lat: (min_lat + max_lat) / 2.0 }
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Larger of the two cell sides, in nautical miles.
    pub fn spacing_nm(&self) -> f64 {
        let lat_km = self.lat_step.to_radians() * EARTH_RADIUS_KM;
        let lon_km = self.lon_step.to_radians() * EARTH_RADIUS_KM * self.mid_lat.to_radians().cos();
        lat_km.max(lon_km) / KM_PER_NM
    }

    /// Lattice points within `radius_nm` of `point`, excluding `point` itself.
    /// No particular order.
    pub fn neighbors(&self, point: &GeoPoint, radius_nm: f64) -> Vec<GeoPoint> {
        self.points
            .iter()
            .filter(|candidate| *candidate != point && distance_nm(point, candidate) <= radius_nm)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_covers_box_with_margin() {
        let start = GeoPoint::new(43.0, 5.0);
        let goal = GeoPoint::new(44.0, 7.0);
        let lattice = SearchLattice::build(&start, &goal, 11);

        // 11 x 11 grid, goal not on it
        assert_eq!(lattice.len(), 122);
        let min_lat = lattice.points().iter().map(|p| p.lat).fold(f64::MAX, f64::min);
        let max_lon = lattice.points().iter().map(|p| p.lon).fold(f64::MIN, f64::max);
        assert!((min_lat - 42.6).abs() < 1e-9);
        assert!((max_lon - 7.4).abs() < 1e-9);
        assert!(lattice.points().contains(&goal));
    }

    #[test]
    fn test_flat_box_still_has_height() {
        let lattice = SearchLattice::build(&GeoPoint::new(0.0, 0.0), &GeoPoint::new(0.0, 1.0), 5);
        let lats: Vec<f64> = lattice.points().iter().map(|p| p.lat).collect();
        let span = lats.iter().cloned().fold(f64::MIN, f64::max) - lats.iter().cloned().fold(f64::MAX, f64::min);
        assert!((span - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_neighbors_respect_radius_and_exclude_self() {
        let lattice = SearchLattice::build(&GeoPoint::new(0.0, 0.0), &GeoPoint::new(0.0, 1.0), 21);
        let center = lattice.points()[10 * 21 + 10];
        let radius = lattice.spacing_nm() * 1.5;
        let neighbors = lattice.neighbors(&center, radius);

        assert!(!neighbors.is_empty());
        assert!(!neighbors.contains(&center));
        for n in &neighbors {
            assert!(distance_nm(&center, n) <= radius);
        }
        // All points not returned are further away
        let outside = lattice.points().iter().filter(|p| **p != center && !neighbors.contains(p));
        for p in outside {
            assert!(distance_nm(&center, p) > radius);
        }
    }

    #[test]
    fn test_spacing_matches_lattice_step() {
        let lattice = SearchLattice::build(&GeoPoint::new(0.0, 0.0), &GeoPoint::new(0.0, 1.0), 15);
        let a = lattice.points()[7 * 15 + 3];
        let b = lattice.points()[7 * 15 + 4];
        assert!((lattice.spacing_nm() - distance_nm(&a, &b)).abs() < 0.01);
    }

    #[test]
    fn test_empty_shape() {
        let lattice = SearchLattice::covering(&[], 10);
        assert!(lattice.is_empty());
        assert!(lattice.neighbors(&GeoPoint::new(0.0, 0.0), 100.0).is_empty());
    }
}
