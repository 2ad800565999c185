//! Environmental data sources consumed by the cost model.
//!
//! The engine never fetches weather itself. It asks an [`EnvironmentProvider`]
//! for the sample valid at a point and instant. [`SampleGrid`] holds
//! pre-fetched samples in memory and can be filled in parallel from any
//! other provider before a search starts.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::engine::error::EnvironmentError;
use crate::engine::models::{EnvironmentalSample, GeoPoint};

pub trait EnvironmentProvider {
    fn sample_at(&self, point: &GeoPoint, time: DateTime<Utc>) -> Result<EnvironmentalSample, EnvironmentError>;
}

impl<F> EnvironmentProvider for F
where
    F: Fn(&GeoPoint, DateTime<Utc>) -> Result<EnvironmentalSample, EnvironmentError>,
{
    fn sample_at(&self, point: &GeoPoint, time: DateTime<Utc>) -> Result<EnvironmentalSample, EnvironmentError> {
        self(point, time)
    }
}

/// Same conditions everywhere, at every instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformEnvironment(pub EnvironmentalSample);

impl EnvironmentProvider for UniformEnvironment {
    fn sample_at(&self, _point: &GeoPoint, _time: DateTime<Utc>) -> Result<EnvironmentalSample, EnvironmentError> {
        Ok(self.0)
    }
}

type Chunks = HashMap<(i32, i32), Vec<(GeoPoint, EnvironmentalSample)>>;

/// Time-sliced sample store. Each slice is split into 1x1 degree chunks
/// keyed by (lon.floor(), lat.floor()); lookups take the nearest slice in
/// time, then the nearest stored point in the surrounding chunks.
#[derive(Debug, Clone, Default)]
pub struct SampleGrid {
    slices: BTreeMap<i64, Chunks>,
}

impl SampleGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, time: DateTime<Utc>, coord: GeoPoint, sample: EnvironmentalSample) {
        let chunk_x = coord.lon.floor() as i32;
        let chunk_y = coord.lat.floor() as i32;
        self.slices
            .entry(time.timestamp())
            .or_default()
            .entry((chunk_x, chunk_y))
            .or_default()
            .push((coord, sample));
    }

    pub fn len(&self) -> usize {
        self.slices.values().flat_map(|chunks| chunks.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (min_lat, max_lat, min_lon, max_lon) over every stored point.
    pub fn get_bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self
            .slices
            .values()
            .flat_map(|chunks| chunks.values())
            .flatten()
            .map(|(coord, _)| coord)
            .peekable();
        points.peek()?;

        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lon = f64::MAX;
        let mut max_lon = f64::MIN;

        for coord in points {
            if coord.lat < min_lat { min_lat = coord.lat; }
            if coord.lat > max_lat { max_lat = coord.lat; }
            if coord.lon < min_lon { min_lon = coord.lon; }
            if coord.lon > max_lon { max_lon = coord.lon; }
        }

        Some((min_lat, max_lat, min_lon, max_lon))
    }

    fn nearest_slice(&self, time: DateTime<Utc>) -> Option<&Chunks> {
        let t = time.timestamp();
        let before = self.slices.range(..=t).next_back();
        let after = self.slices.range(t..).next();
        match (before, after) {
            (Some((tb, b)), Some((ta, a))) => Some(if t - tb <= ta - t { b } else { a }),
            (Some((_, b)), None) => Some(b),
            (None, Some((_, a))) => Some(a),
            (None, None) => None,
        }
    }

    /// Fills a grid by querying `provider` for every (point, time) pair.
    /// Queries run in parallel; failed lookups are skipped and counted.
    pub fn prefetch<P>(provider: &P, points: &[GeoPoint], times: &[DateTime<Utc>]) -> (Self, usize)
    where
        P: EnvironmentProvider + Sync,
    {
        info!("Prefetching {} environmental samples", points.len() * times.len());

        let results: Vec<(DateTime<Utc>, GeoPoint, Result<EnvironmentalSample, EnvironmentError>)> = times
            .par_iter()
            .flat_map(|time| {
                points
                    .par_iter()
                    .map(move |point| (*time, *point, provider.sample_at(point, *time)))
            })
            .collect();

        let mut grid = Self::new();
        let mut failures = 0;
        for (time, point, result) in results {
            match result {
                Ok(sample) => grid.insert(time, point, sample),
                Err(err) => {
                    failures += 1;
                    debug!("Prefetch skipped: {}", err);
                }
            }
        }
        if failures > 0 {
            warn!("{} environmental lookups failed during prefetch", failures);
        }

        (grid, failures)
    }
}

impl EnvironmentProvider for SampleGrid {
    fn sample_at(&self, point: &GeoPoint, time: DateTime<Utc>) -> Result<EnvironmentalSample, EnvironmentError> {
        let unavailable = || EnvironmentError::Unavailable { lat: point.lat, lon: point.lon, time };
        let chunks = self.nearest_slice(time).ok_or_else(unavailable)?;

        let chunk_x = point.lon.floor() as i32;
        let chunk_y = point.lat.floor() as i32;

        let mut best_dist = f64::MAX;
        let mut best_sample = None;

        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(chunk) = chunks.get(&(chunk_x + dx, chunk_y + dy)) else {
                    continue;
                };
                for (p_coord, sample) in chunk {
                    let d_lat = p_coord.lat - point.lat;
                    let d_lon = p_coord.lon - point.lon;
                    let dist_sq = d_lat * d_lat + d_lon * d_lon;

                    if dist_sq < best_dist {
                        best_dist = dist_sq;
                        best_sample = Some(*sample);
                    }
                }
            }
        }

        best_sample.ok_or_else(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(wind_speed: f64) -> EnvironmentalSample {
        EnvironmentalSample { wind_speed, ..EnvironmentalSample::neutral() }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_closure_is_a_provider() {
        let provider = |_: &GeoPoint, _: DateTime<Utc>| Ok::<_, EnvironmentError>(sample(12.0));
        let got = provider.sample_at(&GeoPoint::new(0.0, 0.0), t0()).unwrap();
        assert_eq!(got.wind_speed, 12.0);
    }

    #[test]
    fn test_grid_nearest_point_and_time() {
        let mut grid = SampleGrid::new();
        grid.insert(t0(), GeoPoint::new(43.1, 5.1), sample(5.0));
        grid.insert(t0(), GeoPoint::new(43.9, 5.9), sample(8.0));
        grid.insert(t0() + chrono::Duration::hours(6), GeoPoint::new(43.1, 5.1), sample(20.0));

        let near_first = grid.sample_at(&GeoPoint::new(43.2, 5.2), t0()).unwrap();
        assert_eq!(near_first.wind_speed, 5.0);

        let near_second = grid.sample_at(&GeoPoint::new(43.8, 5.8), t0() + chrono::Duration::hours(1)).unwrap();
        assert_eq!(near_second.wind_speed, 8.0);

        let later = grid.sample_at(&GeoPoint::new(43.2, 5.2), t0() + chrono::Duration::hours(5)).unwrap();
        assert_eq!(later.wind_speed, 20.0);
    }

    #[test]
    fn test_grid_looks_into_adjacent_chunks() {
        let mut grid = SampleGrid::new();
        grid.insert(t0(), GeoPoint::new(43.99, 5.5), sample(9.0));

        let got = grid.sample_at(&GeoPoint::new(44.01, 5.5), t0()).unwrap();
        assert_eq!(got.wind_speed, 9.0);
    }

    #[test]
    fn test_grid_outside_coverage_is_unavailable() {
        let mut grid = SampleGrid::new();
        grid.insert(t0(), GeoPoint::new(43.5, 5.5), sample(9.0));

        let err = grid.sample_at(&GeoPoint::new(10.0, -30.0), t0()).unwrap_err();
        assert!(matches!(err, EnvironmentError::Unavailable { .. }));

        let empty = SampleGrid::new();
        assert!(empty.sample_at(&GeoPoint::new(43.5, 5.5), t0()).is_err());
        assert_eq!(empty.get_bounds(), None);
    }

    #[test]
    fn test_prefetch_counts_failures() {
        let provider = |p: &GeoPoint, time: DateTime<Utc>| {
            if p.lat > 44.0 {
                Err(EnvironmentError::Unavailable { lat: p.lat, lon: p.lon, time })
            } else {
                Ok(sample(p.lat))
            }
        };
        let points = vec![GeoPoint::new(43.0, 5.0), GeoPoint::new(43.5, 5.0), GeoPoint::new(44.5, 5.0)];
        let times = vec![t0(), t0() + chrono::Duration::hours(3)];

        let (grid, failures) = SampleGrid::prefetch(&provider, &points, &times);
        assert_eq!(failures, 2);
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.get_bounds(), Some((43.0, 43.5, 5.0, 5.0)));
    }
}
