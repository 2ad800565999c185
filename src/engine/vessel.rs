use serde::{Deserialize, Serialize};

use crate::parsers::polars::PolarData;

/// Hull and rig figures used to synthesize a polar when none is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HullParameters {
    pub displacement_kg: f64,
    pub sail_area_m2: f64,
}

impl HullParameters {
    /// Sail area / displacement ratio (SA / V^(2/3), V in cubic metres of seawater).
    pub fn sail_area_displacement_ratio(&self) -> f64 {
        let volume_m3 = self.displacement_kg / 1025.0;
        if volume_m3 <= 0.0 {
            return 0.0;
        }
        self.sail_area_m2 / volume_m3.powf(2.0 / 3.0)
    }
}

/// Fuel burn in litres/hour for each throttle regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnginePerformance {
    /// Speed through water at full throttle, knots
    pub max_speed: f64,
    pub idle_burn: f64,
    pub slow_burn: f64,
    pub cruising_burn: f64,
    pub full_burn: f64,
}

/// Everything the router needs to know about a boat. Supplied by the
/// caller and never modified by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselProfile {
    pub name: String,
    /// knots
    pub cruising_speed: f64,
    /// knots
    pub max_speed: f64,
    /// Below this sailing speed (knots) the boat motors instead.
    pub min_steerage_speed: f64,
    /// knots
    pub max_safe_wind_speed: f64,
    /// metres
    pub max_safe_wave_height: f64,
    pub polar: Option<PolarData>,
    pub hull: Option<HullParameters>,
    pub engine: Option<EnginePerformance>,
}

impl VesselProfile {
    /// A 40 ft cruising sloop without a polar table; its polar is derived from the hull.
    pub fn cruiser_40() -> Self {
        Self {
            name: "Cruiser 40".to_string(),
            cruising_speed: 6.0,
            max_speed: 8.5,
            min_steerage_speed: 2.0,
            max_safe_wind_speed: 35.0,
            max_safe_wave_height: 4.0,
            polar: None,
            hull: Some(HullParameters {
                displacement_kg: 8_500.0,
                sail_area_m2: 75.0,
            }),
            engine: Some(EnginePerformance {
                max_speed: 8.0,
                idle_burn: 0.8,
                slow_burn: 2.0,
                cruising_burn: 4.5,
                full_burn: 9.0,
            }),
        }
    }

    pub fn with_polar(mut self, polar: PolarData) -> Self {
        self.polar = Some(polar);
        self
    }
}
