//! Heuristic and edge costs for the route search.
//!
//! Costs are elapsed hours. The heuristic is a distance in nautical miles
//! scaled by how favourable the wind is towards the goal; the search turns
//! it into hours with the vessel's top speed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::engine::environment::EnvironmentProvider;
use crate::engine::geodesy::{angle_between, distance_nm, initial_bearing};
use crate::engine::models::{EnvironmentalSample, GeoPoint};
use crate::engine::performance::PerformanceModel;
use crate::engine::route::{LegMode, RouteLeg};
use crate::engine::vessel::VesselProfile;

/// Wind speed (knots) at which the heuristic scaling saturates.
const HEURISTIC_FULL_WIND: f64 = 20.0;
/// Headings within this many degrees of dead downwind / upwind count as following / head wind.
const WIND_SECTOR_DEG: f64 = 45.0;
/// Lowest fraction of the distance a following wind can scale the heuristic to.
const HEURISTIC_FLOOR: f64 = 0.5;
const HEAD_WIND_PENALTY: f64 = 0.25;

/// Current may change the wind-only speed by at most this fraction either way.
const CURRENT_CLAMP: f64 = 0.5;

/// Coordinates are keyed at micro-degree resolution.
const KEY_SCALE: f64 = 1e6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeEstimate {
    pub distance_nm: f64,
    pub hours: f64,
    pub heading: f64,
    pub boat_speed: f64,
    pub speed_over_ground: f64,
    pub mode: LegMode,
    pub fuel_burn_rate: f64,
    pub conditions: EnvironmentalSample,
}

impl EdgeEstimate {
    pub fn to_leg(&self, from: GeoPoint, to: GeoPoint) -> RouteLeg {
        RouteLeg {
            from,
            to,
            heading: self.heading,
            boat_speed: self.boat_speed,
            speed_over_ground: self.speed_over_ground,
            mode: self.mode,
            conditions: self.conditions,
            duration_hours: self.hours,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CostStats {
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub environment_fallbacks: usize,
}

pub type PointKey = (i64, i64);

pub fn point_key(point: &GeoPoint) -> PointKey {
    ((point.lat * KEY_SCALE).round() as i64, (point.lon * KEY_SCALE).round() as i64)
}

type EdgeKey = (PointKey, PointKey, i64);

pub struct CostModel<'a> {
    vessel: &'a VesselProfile,
    performance: &'a PerformanceModel,
    environment: &'a dyn EnvironmentProvider,
    /// Upper bound on speed over ground, knots
    speed_bound: f64,
    bucket_seconds: i64,
    cache: HashMap<EdgeKey, Option<EdgeEstimate>>,
    last_good: Option<EnvironmentalSample>,
    pub stats: CostStats,
}

impl<'a> CostModel<'a> {
    pub fn new(
        vessel: &'a VesselProfile,
        performance: &'a PerformanceModel,
        environment: &'a dyn EnvironmentProvider,
        time_bucket_minutes: u32,
    ) -> Self {
        Self {
            vessel,
            performance,
            environment,
            speed_bound: performance.top_speed(vessel) * (1.0 + CURRENT_CLAMP),
            bucket_seconds: (i64::from(time_bucket_minutes) * 60).max(1),
            cache: HashMap::new(),
            last_good: None,
            stats: CostStats::default(),
        }
    }

    /// Optimistic remaining distance (nautical miles) from `point` to `goal`.
    ///
    /// Calm wind gives the plain great-circle distance. A following wind
    /// shrinks it (never below half), a head wind inflates it. The inflated
    /// case can overestimate, so the search is best-effort rather than
    /// provably optimal.
    pub fn heuristic(point: &GeoPoint, goal: &GeoPoint, wind_estimate: &EnvironmentalSample) -> f64 {
        let distance = distance_nm(point, goal);
        if wind_estimate.wind_speed <= 0.0 {
            return distance;
        }

        let strength = (wind_estimate.wind_speed / HEURISTIC_FULL_WIND).min(1.0);
        let bearing = initial_bearing(point, goal);
        let downwind = wind_estimate.wind_direction + 180.0;

        let factor = if angle_between(bearing, downwind) <= WIND_SECTOR_DEG {
            (1.0 - (1.0 - HEURISTIC_FLOOR) * strength).max(HEURISTIC_FLOOR)
        } else if angle_between(bearing, wind_estimate.wind_direction) <= WIND_SECTOR_DEG {
            1.0 + HEAD_WIND_PENALTY * strength
        } else {
            1.0
        };

        distance * factor
    }

    /// [`Self::heuristic`] expressed in hours at the fastest speed over
    /// ground the vessel could make: top speed plus the most a fair
    /// current may add.
    pub fn heuristic_hours(&self, point: &GeoPoint, goal: &GeoPoint, wind_estimate: &EnvironmentalSample) -> f64 {
        if self.speed_bound <= 0.0 {
            return 0.0;
        }
        Self::heuristic(point, goal, wind_estimate) / self.speed_bound
    }

    /// Sample at `point`, or the last good one (else calm) when the provider fails.
    pub fn sample(&mut self, point: &GeoPoint, time: DateTime<Utc>) -> EnvironmentalSample {
        match self.environment.sample_at(point, time) {
            Ok(sample) => {
                self.last_good = Some(sample);
                sample
            }
            Err(err) => {
                self.stats.environment_fallbacks += 1;
                if self.stats.environment_fallbacks == 1 {
                    warn!("{}; falling back to last known conditions", err);
                } else {
                    debug!("{}", err);
                }
                self.last_good.unwrap_or_else(EnvironmentalSample::neutral)
            }
        }
    }

    /// Time to sail `from` -> `to` leaving at `current_time`, or `None` when
    /// the leg cannot be made (no speed at all, or seas beyond the vessel's limit).
    pub fn edge_cost(&mut self, from: &GeoPoint, to: &GeoPoint, current_time: DateTime<Utc>) -> Option<EdgeEstimate> {
        let key = (point_key(from), point_key(to), current_time.timestamp().div_euclid(self.bucket_seconds));
        if let Some(cached) = self.cache.get(&key) {
            self.stats.cache_hits += 1;
            return *cached;
        }
        self.stats.cache_misses += 1;

        let sample = self.sample(from, current_time);
        let estimate = self.price(from, to, &sample);
        self.cache.insert(key, estimate);
        estimate
    }

    fn price(&self, from: &GeoPoint, to: &GeoPoint, sample: &EnvironmentalSample) -> Option<EdgeEstimate> {
        if sample.wave_height > self.vessel.max_safe_wave_height {
            return None;
        }

        let distance = distance_nm(from, to);
        let heading = initial_bearing(from, to);
        let relative = PerformanceModel::relative_wind_angle(sample.wind_direction, heading);
        let propulsion = self.performance.attainable(sample.wind_speed, relative, self.vessel);

        if distance == 0.0 {
            return Some(EdgeEstimate {
                distance_nm: 0.0,
                hours: 0.0,
                heading,
                boat_speed: propulsion.boat_speed,
                speed_over_ground: propulsion.boat_speed,
                mode: propulsion.mode,
                fuel_burn_rate: propulsion.fuel_burn_rate,
                conditions: *sample,
            });
        }
        if propulsion.boat_speed <= 0.0 {
            return None;
        }

        let boat_speed = propulsion.boat_speed;
        let drift = sample.current_speed * angle_between(sample.current_direction, heading).to_radians().cos();
        let effective = (boat_speed + drift)
            .clamp(boat_speed * (1.0 - CURRENT_CLAMP), boat_speed * (1.0 + CURRENT_CLAMP));

        Some(EdgeEstimate {
            distance_nm: distance,
            hours: distance / effective,
            heading,
            boat_speed,
            speed_over_ground: effective,
            mode: propulsion.mode,
            fuel_burn_rate: propulsion.fuel_burn_rate,
            conditions: *sample,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::environment::UniformEnvironment;
    use crate::engine::error::EnvironmentError;
    use crate::parsers::polars::PolarData;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn departure() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 6, 0, 0).unwrap()
    }

    fn wind(speed: f64, direction: f64) -> EnvironmentalSample {
        EnvironmentalSample { wind_speed: speed, wind_direction: direction, ..EnvironmentalSample::neutral() }
    }

    #[test]
    fn test_heuristic_is_distance_in_calm() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let p = GeoPoint::new(rng.random_range(-60.0..60.0), rng.random_range(-179.0..179.0));
            let goal = GeoPoint::new(rng.random_range(-60.0..60.0), rng.random_range(-179.0..179.0));
            let direction = rng.random_range(0.0..360.0);
            assert_eq!(CostModel::heuristic(&p, &goal, &wind(0.0, direction)), distance_nm(&p, &goal));
        }
    }

    #[test]
    fn test_heuristic_never_exceeds_calm_cost() {
        let vessel = VesselProfile::cruiser_40();
        let performance = PerformanceModel::for_vessel(&vessel);

        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let p = GeoPoint::new(rng.random_range(30.0..50.0), rng.random_range(-10.0..20.0));
            let goal = GeoPoint::new(rng.random_range(30.0..50.0), rng.random_range(-10.0..20.0));
            let environment = UniformEnvironment(EnvironmentalSample {
                current_speed: rng.random_range(0.0..6.0),
                current_direction: rng.random_range(0.0..360.0),
                ..EnvironmentalSample::neutral()
            });
            let mut model = CostModel::new(&vessel, &performance, &environment, 30);

            let h = model.heuristic_hours(&p, &goal, &EnvironmentalSample::neutral());
            let actual = model.edge_cost(&p, &goal, departure()).unwrap().hours;
            assert!(h <= actual + 1e-9, "h {} > actual {}", h, actual);
        }
    }

    #[test]
    fn test_heuristic_allows_for_fair_current() {
        let vessel = VesselProfile::cruiser_40();
        let performance = PerformanceModel::for_vessel(&vessel);
        let environment = UniformEnvironment(EnvironmentalSample {
            current_speed: 3.0,
            current_direction: 90.0,
            ..EnvironmentalSample::neutral()
        });
        let mut model = CostModel::new(&vessel, &performance, &environment, 30);

        let from = GeoPoint::new(0.0, 0.0);
        let to = GeoPoint::new(0.0, 1.0);
        let h = model.heuristic_hours(&from, &to, &EnvironmentalSample::neutral());
        let actual = model.edge_cost(&from, &to, departure()).unwrap().hours;
        assert!(h <= actual, "h {} > actual {}", h, actual);
    }

    #[test]
    fn test_heuristic_allows_for_polar_above_max_speed() {
        let polar = PolarData {
            tws: vec![0.0, 10.0, 20.0],
            twa: vec![0.0, 90.0, 180.0],
            speeds: vec![vec![12.0; 3]; 3],
        };
        let vessel = VesselProfile::cruiser_40().with_polar(polar);
        let performance = PerformanceModel::for_vessel(&vessel);
        let environment = UniformEnvironment(wind(10.0, 0.0));
        let mut model = CostModel::new(&vessel, &performance, &environment, 30);

        let from = GeoPoint::new(0.0, 0.0);
        let to = GeoPoint::new(0.0, 1.0);
        let actual = model.edge_cost(&from, &to, departure()).unwrap();
        assert_eq!(actual.boat_speed, 12.0);
        let h = model.heuristic_hours(&from, &to, &EnvironmentalSample::neutral());
        assert!(h <= actual.hours);
    }

    #[test]
    fn test_heuristic_following_and_head_wind() {
        let p = GeoPoint::new(0.0, 0.0);
        let goal = GeoPoint::new(0.0, 1.0); // due East
        let d = distance_nm(&p, &goal);

        // Wind from the West pushes towards the goal
        let following = CostModel::heuristic(&p, &goal, &wind(20.0, 270.0));
        assert!((following - d * HEURISTIC_FLOOR).abs() < 1e-9);

        let light_following = CostModel::heuristic(&p, &goal, &wind(10.0, 270.0));
        assert!(light_following < d && light_following > following);

        let head = CostModel::heuristic(&p, &goal, &wind(20.0, 90.0));
        assert!((head - d * (1.0 + HEAD_WIND_PENALTY)).abs() < 1e-9);

        let beam = CostModel::heuristic(&p, &goal, &wind(20.0, 0.0));
        assert_eq!(beam, d);
    }

    #[test]
    fn test_edge_cost_motoring_in_calm() {
        let vessel = VesselProfile::cruiser_40();
        let performance = PerformanceModel::for_vessel(&vessel);
        let environment = UniformEnvironment(EnvironmentalSample::neutral());
        let mut model = CostModel::new(&vessel, &performance, &environment, 30);

        let from = GeoPoint::new(0.0, 0.0);
        let to = GeoPoint::new(0.0, 1.0);
        let edge = model.edge_cost(&from, &to, departure()).unwrap();

        assert_eq!(edge.mode, LegMode::Motoring);
        assert!((edge.hours - distance_nm(&from, &to) / vessel.cruising_speed).abs() < 1e-9);
    }

    #[test]
    fn test_current_is_clamped() {
        let vessel = VesselProfile::cruiser_40();
        let performance = PerformanceModel::for_vessel(&vessel);
        let from = GeoPoint::new(0.0, 0.0);
        let to = GeoPoint::new(0.0, 1.0);

        // 20 knot current straight along the leg
        let fair = UniformEnvironment(EnvironmentalSample {
            current_speed: 20.0,
            current_direction: 90.0,
            ..EnvironmentalSample::neutral()
        });
        let mut model = CostModel::new(&vessel, &performance, &fair, 30);
        let edge = model.edge_cost(&from, &to, departure()).unwrap();
        assert!((edge.speed_over_ground - vessel.cruising_speed * 1.5).abs() < 1e-9);

        let foul = UniformEnvironment(EnvironmentalSample {
            current_speed: 20.0,
            current_direction: 270.0,
            ..EnvironmentalSample::neutral()
        });
        let mut model = CostModel::new(&vessel, &performance, &foul, 30);
        let edge = model.edge_cost(&from, &to, departure()).unwrap();
        assert!((edge.speed_over_ground - vessel.cruising_speed * 0.5).abs() < 1e-9);

        // Cross current leaves the speed unchanged
        let cross = UniformEnvironment(EnvironmentalSample {
            current_speed: 2.0,
            current_direction: 0.0,
            ..EnvironmentalSample::neutral()
        });
        let mut model = CostModel::new(&vessel, &performance, &cross, 30);
        let edge = model.edge_cost(&from, &to, departure()).unwrap();
        assert!((edge.speed_over_ground - vessel.cruising_speed).abs() < 1e-9);
    }

    #[test]
    fn test_rough_sea_is_impassable() {
        let vessel = VesselProfile::cruiser_40();
        let performance = PerformanceModel::for_vessel(&vessel);
        let environment =
            UniformEnvironment(EnvironmentalSample { wave_height: 6.0, ..EnvironmentalSample::neutral() });
        let mut model = CostModel::new(&vessel, &performance, &environment, 30);

        assert!(model.edge_cost(&GeoPoint::new(0.0, 0.0), &GeoPoint::new(0.0, 1.0), departure()).is_none());
    }

    #[test]
    fn test_edge_cost_is_cached_per_time_bucket() {
        let vessel = VesselProfile::cruiser_40();
        let performance = PerformanceModel::for_vessel(&vessel);
        let environment = UniformEnvironment(wind(12.0, 0.0));
        let mut model = CostModel::new(&vessel, &performance, &environment, 30);

        let from = GeoPoint::new(43.0, 5.0);
        let to = GeoPoint::new(43.1, 5.2);
        let first = model.edge_cost(&from, &to, departure());
        let again = model.edge_cost(&from, &to, departure() + chrono::Duration::minutes(10));
        let later = model.edge_cost(&from, &to, departure() + chrono::Duration::hours(2));

        assert_eq!(first, again);
        assert_eq!(first, later);
        assert_eq!(model.stats.cache_hits, 1);
        assert_eq!(model.stats.cache_misses, 2);
    }

    #[test]
    fn test_failed_lookup_reuses_last_good_sample() {
        let vessel = VesselProfile::cruiser_40();
        let performance = PerformanceModel::for_vessel(&vessel);
        let environment = |p: &GeoPoint, time: DateTime<Utc>| {
            if p.lon > 6.0 {
                Err(EnvironmentError::Unavailable { lat: p.lat, lon: p.lon, time })
            } else {
                Ok(wind(14.0, 200.0))
            }
        };
        let mut model = CostModel::new(&vessel, &performance, &environment, 30);

        // Nothing known yet: calm
        let first = model.sample(&GeoPoint::new(43.0, 7.0), departure());
        assert_eq!(first, EnvironmentalSample::neutral());

        model.sample(&GeoPoint::new(43.0, 5.0), departure());
        let recovered = model.sample(&GeoPoint::new(43.0, 7.0), departure());
        assert_eq!(recovered.wind_speed, 14.0);
        assert_eq!(model.stats.environment_fallbacks, 2);
    }
}
