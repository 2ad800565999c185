//! Attainable boat speed under sail and under power.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::geodesy::angle_between;
use crate::engine::route::LegMode;
use crate::engine::vessel::VesselProfile;
use crate::parsers::polars::PolarData;

const SYNTH_TWS: [f64; 9] = [0.0, 6.0, 8.0, 10.0, 12.0, 16.0, 20.0, 25.0, 30.0];
const WIND_FACTOR: [f64; 9] = [0.0, 0.45, 0.58, 0.7, 0.8, 0.92, 1.0, 1.0, 0.95];

// No-go zone up to 30 degrees off the wind
const SYNTH_TWA: [f64; 13] = [0.0, 30.0, 40.0, 52.0, 60.0, 75.0, 90.0, 110.0, 120.0, 135.0, 150.0, 165.0, 180.0];
const ANGLE_FACTOR: [f64; 13] = [0.0, 0.0, 0.5, 0.72, 0.8, 0.9, 0.95, 1.0, 0.98, 0.92, 0.85, 0.78, 0.74];

/// SA/D ratio of a typical cruiser; the synthesized polar scales around it.
const REFERENCE_SA_D: f64 = 18.0;

/// Throttle upper bounds for the idle, slow and cruising regimes.
const IDLE_THROTTLE: f64 = 0.15;
const SLOW_THROTTLE: f64 = 0.5;
const CRUISING_THROTTLE: f64 = 0.85;

/// How a vessel's sailing speed is obtained. Chosen once per vessel.
#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceModel {
    /// The vessel's own polar table.
    TableBased(PolarData),
    /// A polar derived from hull displacement and sail area.
    SynthesizedTable(PolarData),
    /// Neither polar nor hull figures: cruising speed scaled by wind angle and strength.
    SimplifiedAngleModel { cruising_speed: f64, max_speed: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineRegime {
    Idle,
    Slow,
    Cruising,
    Full,
}

impl EngineRegime {
    pub fn for_throttle(throttle: f64) -> Self {
        if throttle < IDLE_THROTTLE {
            EngineRegime::Idle
        } else if throttle < SLOW_THROTTLE {
            EngineRegime::Slow
        } else if throttle < CRUISING_THROTTLE {
            EngineRegime::Cruising
        } else {
            EngineRegime::Full
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorPerformance {
    /// knots
    pub speed: f64,
    /// litres/hour
    pub fuel_burn_rate: f64,
    pub regime: EngineRegime,
}

/// Speed through water actually used on a leg and how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Propulsion {
    pub boat_speed: f64,
    pub mode: LegMode,
    pub fuel_burn_rate: f64,
}

impl PerformanceModel {
    pub fn for_vessel(vessel: &VesselProfile) -> Self {
        if let Some(polar) = vessel.polar.as_ref().filter(|p| !p.is_empty()) {
            return PerformanceModel::TableBased(polar.clone());
        }
        if let Some(hull) = vessel.hull {
            debug!("Synthesizing polar for {} from hull parameters", vessel.name);
            return PerformanceModel::SynthesizedTable(synthesize_polar(
                hull.sail_area_displacement_ratio(),
                vessel.max_speed,
            ));
        }
        PerformanceModel::SimplifiedAngleModel {
            cruising_speed: vessel.cruising_speed,
            max_speed: vessel.max_speed,
        }
    }

    /// Relative angle between where the wind comes from and the heading, in [0, 180].
    pub fn relative_wind_angle(wind_direction: f64, heading: f64) -> f64 {
        angle_between(wind_direction, heading)
    }

    /// Sailing speed (knots) for a true wind speed and relative wind angle.
    ///
    /// Zero when there is no wind or the wind is beyond what the vessel
    /// may sail in.
    pub fn speed_for(&self, wind_speed: f64, relative_angle: f64, vessel: &VesselProfile) -> f64 {
        if wind_speed <= 0.0 || wind_speed > vessel.max_safe_wind_speed {
            return 0.0;
        }
        let angle = angle_between(relative_angle, 0.0);

        match self {
            PerformanceModel::TableBased(polar) | PerformanceModel::SynthesizedTable(polar) => {
                polar.get_speed(wind_speed, angle)
            }
            PerformanceModel::SimplifiedAngleModel { cruising_speed, max_speed } => {
                let wind_factor = (wind_speed / 12.0).min(1.25);
                let angle_factor = piecewise_linear(&SYNTH_TWA, &ANGLE_FACTOR, angle);
                (cruising_speed * wind_factor * angle_factor).min(*max_speed)
            }
        }
    }

    /// Engine speed and fuel burn for a throttle setting. Fuel burn follows
    /// the regime the throttle falls in; it is not interpolated.
    pub fn motor_speed_for(throttle: f64, vessel: &VesselProfile) -> MotorPerformance {
        let throttle = throttle.clamp(0.0, 1.0);
        let regime = EngineRegime::for_throttle(throttle);

        match vessel.engine {
            Some(engine) => MotorPerformance {
                speed: throttle * engine.max_speed,
                fuel_burn_rate: match regime {
                    EngineRegime::Idle => engine.idle_burn,
                    EngineRegime::Slow => engine.slow_burn,
                    EngineRegime::Cruising => engine.cruising_burn,
                    EngineRegime::Full => engine.full_burn,
                },
                regime,
            },
            None => MotorPerformance { speed: 0.0, fuel_burn_rate: 0.0, regime },
        }
    }

    /// Throttle that makes the engine deliver the vessel's cruising speed.
    pub fn powered_throttle(vessel: &VesselProfile) -> f64 {
        match vessel.engine {
            Some(engine) if engine.max_speed > 0.0 => (vessel.cruising_speed / engine.max_speed).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    /// Throttle needed for a given speed through water.
    pub fn throttle_for_speed(speed: f64, vessel: &VesselProfile) -> f64 {
        match vessel.engine {
            Some(engine) if engine.max_speed > 0.0 => (speed / engine.max_speed).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    /// Fastest speed through water the vessel can reach under sail or power.
    pub fn top_speed(&self, vessel: &VesselProfile) -> f64 {
        let sail = match self {
            PerformanceModel::TableBased(polar) | PerformanceModel::SynthesizedTable(polar) => {
                polar.speeds.iter().flatten().copied().fold(0.0, f64::max)
            }
            PerformanceModel::SimplifiedAngleModel { max_speed, .. } => *max_speed,
        };
        let engine = vessel.engine.map_or(0.0, |e| e.max_speed);
        sail.max(engine).max(vessel.max_speed).max(vessel.cruising_speed)
    }

    /// Sails when the polar gives at least steerage way, otherwise motors
    /// at cruising throttle if the vessel has an engine.
    pub fn attainable(&self, wind_speed: f64, relative_angle: f64, vessel: &VesselProfile) -> Propulsion {
        let sail_speed = self.speed_for(wind_speed, relative_angle, vessel);
        if sail_speed >= vessel.min_steerage_speed {
            return Propulsion { boat_speed: sail_speed, mode: LegMode::Sailing, fuel_burn_rate: 0.0 };
        }

        let motor = Self::motor_speed_for(Self::powered_throttle(vessel), vessel);
        if motor.speed > sail_speed {
            Propulsion { boat_speed: motor.speed, mode: LegMode::Motoring, fuel_burn_rate: motor.fuel_burn_rate }
        } else {
            Propulsion { boat_speed: sail_speed, mode: LegMode::Sailing, fuel_burn_rate: 0.0 }
        }
    }
}

/// Builds a polar on the reference TWS/TWA grid. A higher sail-area to
/// displacement ratio raises every cell.
pub fn synthesize_polar(sa_d_ratio: f64, max_speed: f64) -> PolarData {
    let ratio_factor = (sa_d_ratio / REFERENCE_SA_D).clamp(0.6, 1.25);

    let speeds = ANGLE_FACTOR
        .iter()
        .map(|angle_f| {
            WIND_FACTOR
                .iter()
                .map(|wind_f| (max_speed * wind_f * angle_f * ratio_factor).min(max_speed))
                .collect()
        })
        .collect();

    PolarData {
        tws: SYNTH_TWS.to_vec(),
        twa: SYNTH_TWA.to_vec(),
        speeds,
    }
}

fn piecewise_linear(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let x = x.clamp(xs[0], xs[xs.len() - 1]);
    for i in 0..xs.len() - 1 {
        if x >= xs[i] && x <= xs[i + 1] {
            let span = xs[i + 1] - xs[i];
            let frac = if span == 0.0 { 0.0 } else { (x - xs[i]) / span };
            return ys[i] + (ys[i + 1] - ys[i]) * frac;
        }
    }
    ys[ys.len() - 1]
}
