use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::geodesy;
use crate::engine::models::{EnvironmentalSample, GeoPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegMode {
    Sailing,
    Motoring,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteWaypoint {
    pub position: GeoPoint,
    pub arrival_time: DateTime<Utc>,
    /// Hours since departure
    pub elapsed_hours: f64,
}

/// One straight leg between consecutive waypoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub from: GeoPoint,
    pub to: GeoPoint,
    /// Initial true bearing of the leg, degrees
    pub heading: f64,
    /// Speed through water, knots
    pub boat_speed: f64,
    /// Speed made good along the leg after current, knots
    pub speed_over_ground: f64,
    pub mode: LegMode,
    /// Conditions at the start of the leg
    pub conditions: EnvironmentalSample,
    pub duration_hours: f64,
}

impl RouteLeg {
    pub fn distance_nm(&self) -> f64 {
        geodesy::distance_nm(&self.from, &self.to)
    }
}

/// A planned passage. Built once and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    waypoints: Vec<RouteWaypoint>,
    legs: Vec<RouteLeg>,
}

impl Route {
    /// Chains legs from `departure`, deriving each waypoint's arrival time
    /// from the leg durations.
    pub fn from_legs(start: GeoPoint, departure: DateTime<Utc>, legs: Vec<RouteLeg>) -> Self {
        let mut waypoints = Vec::with_capacity(legs.len() + 1);
        waypoints.push(RouteWaypoint { position: start, arrival_time: departure, elapsed_hours: 0.0 });

        let mut elapsed = 0.0;
        for leg in &legs {
            elapsed += leg.duration_hours.max(0.0);
            waypoints.push(RouteWaypoint {
                position: leg.to,
                arrival_time: departure + hours_to_duration(elapsed),
                elapsed_hours: elapsed,
            });
        }

        Self { waypoints, legs }
    }

    pub fn waypoints(&self) -> &[RouteWaypoint] {
        &self.waypoints
    }

    pub fn legs(&self) -> &[RouteLeg] {
        &self.legs
    }

    pub fn positions(&self) -> Vec<GeoPoint> {
        self.waypoints.iter().map(|w| w.position).collect()
    }

    pub fn departure_time(&self) -> Option<DateTime<Utc>> {
        self.waypoints.first().map(|w| w.arrival_time)
    }

    pub fn arrival_time(&self) -> Option<DateTime<Utc>> {
        self.waypoints.last().map(|w| w.arrival_time)
    }

    pub fn total_hours(&self) -> f64 {
        match (self.waypoints.first(), self.waypoints.last()) {
            (Some(first), Some(last)) => last.elapsed_hours - first.elapsed_hours,
            _ => 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

pub fn hours_to_duration(hours: f64) -> chrono::Duration {
    chrono::Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}
