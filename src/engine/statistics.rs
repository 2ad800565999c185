use serde::{Deserialize, Serialize};

use crate::engine::geodesy::{interpolate, path_length_nm};
use crate::engine::models::GeoPoint;
use crate::engine::performance::PerformanceModel;
use crate::engine::route::{Route, RouteLeg};
use crate::engine::vessel::VesselProfile;

/// Slack allowed between a leg's recorded speed and what the sails give
/// before the leg counts as motoring.
const SPEED_EPSILON: f64 = 1e-6;

/// Summary of a finished route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteStatistics {
    pub total_distance_nm: f64,
    pub total_hours: f64,
    /// knots
    pub average_speed: f64,
    /// litres
    pub fuel_consumed: f64,
    pub sailing_hours: f64,
    pub motoring_hours: f64,
    pub sailing_percent: f64,
    pub motoring_percent: f64,
}

impl RouteStatistics {
    pub fn compute(route: &Route, vessel: &VesselProfile, performance: &PerformanceModel) -> Self {
        let total_distance_nm = path_length_nm(&route.positions());
        let total_hours = route.total_hours();

        let mut fuel_consumed = 0.0;
        let mut sailing_hours = 0.0;
        let mut motoring_hours = 0.0;
        for leg in route.legs() {
            if is_motoring(leg, vessel, performance) {
                let throttle = PerformanceModel::throttle_for_speed(leg.boat_speed, vessel);
                let motor = PerformanceModel::motor_speed_for(throttle, vessel);
                fuel_consumed += motor.fuel_burn_rate * leg.duration_hours;
                motoring_hours += leg.duration_hours;
            } else {
                sailing_hours += leg.duration_hours;
            }
        }

        let underway = sailing_hours + motoring_hours;
        let percent = |hours: f64| if underway > 0.0 { 100.0 * hours / underway } else { 0.0 };

        Self {
            total_distance_nm,
            total_hours,
            average_speed: if total_hours > 0.0 { total_distance_nm / total_hours } else { 0.0 },
            fuel_consumed,
            sailing_hours,
            motoring_hours,
            sailing_percent: percent(sailing_hours),
            motoring_percent: percent(motoring_hours),
        }
    }
}

/// A leg motors when its speed is more than the sails alone could give in
/// the wind recorded for it.
pub fn is_motoring(leg: &RouteLeg, vessel: &VesselProfile, performance: &PerformanceModel) -> bool {
    let relative = PerformanceModel::relative_wind_angle(leg.conditions.wind_direction, leg.heading);
    let sail_speed = performance.speed_for(leg.conditions.wind_speed, relative, vessel);
    leg.boat_speed > sail_speed + SPEED_EPSILON
}

/// Positions reached at the same elapsed time, one per route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Isochrone {
    pub elapsed_hours: f64,
    pub frontier_points: Vec<GeoPoint>,
}

/// Where the boat is `elapsed_hours` after departure, interpolating
/// linearly in time along the current leg. Clamped to the route's ends.
pub fn position_at(route: &Route, elapsed_hours: f64) -> Option<GeoPoint> {
    let waypoints = route.waypoints();
    let first = waypoints.first()?;
    if elapsed_hours <= first.elapsed_hours {
        return Some(first.position);
    }

    for pair in waypoints.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        if elapsed_hours <= to.elapsed_hours {
            let span = to.elapsed_hours - from.elapsed_hours;
            if span <= 0.0 {
                return Some(to.position);
            }
            let fraction = (elapsed_hours - from.elapsed_hours) / span;
            return Some(interpolate(&from.position, &to.position, fraction));
        }
    }

    waypoints.last().map(|w| w.position)
}

/// Splits the longest route's duration into `slices` equal steps and
/// samples every route at each step boundary, so `slices + 1` isochrones
/// come back, the first at departure. Routes that have already arrived
/// contribute their final position.
pub fn isochrones(routes: &[Route], slices: usize) -> Vec<Isochrone> {
    if slices == 0 || routes.iter().all(Route::is_empty) {
        return Vec::new();
    }
    let horizon = routes.iter().map(Route::total_hours).fold(0.0, f64::max);

    (0..=slices)
        .map(|k| {
            let elapsed_hours = horizon * k as f64 / slices as f64;
            Isochrone {
                elapsed_hours,
                frontier_points: routes.iter().filter_map(|r| position_at(r, elapsed_hours)).collect(),
            }
        })
        .collect()
}
