use serde::{Deserialize, Serialize};

/// Knots per metre/second.
pub const MS_TO_KNOTS: f64 = 1.94384;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Wind at a point as grid components (m/s), GRIB convention:
/// u > 0 blows towards the East, v > 0 blows towards the North.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindData {
    pub u: f64,
    pub v: f64,
}

impl WindData {
    pub fn speed(&self) -> f64 {
        (self.u.powi(2) + self.v.powi(2)).sqrt()
    }

    /// Meteorological direction the wind blows FROM, in [0, 360).
    pub fn direction(&self) -> f64 {
        let angle = self.v.atan2(self.u).to_degrees();
        let mut dir = 270.0 - angle;
        if dir < 0.0 { dir += 360.0; }
        if dir >= 360.0 { dir -= 360.0; }
        dir
    }
}

/// Ocean current components (m/s), same axes as [`WindData`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentData {
    pub u: f64,
    pub v: f64,
}

impl CurrentData {
    pub fn speed(&self) -> f64 {
        (self.u.powi(2) + self.v.powi(2)).sqrt()
    }

    /// Oceanographic direction the current sets TOWARDS, in [0, 360).
    pub fn direction(&self) -> f64 {
        let mut dir = self.u.atan2(self.v).to_degrees();
        if dir < 0.0 { dir += 360.0; }
        if dir >= 360.0 { dir -= 360.0; }
        dir
    }
}

/// Weather and sea conditions valid at one location and instant.
///
/// Speeds are in knots. `wind_direction` is where the wind comes from,
/// `current_direction` is where the water flows to. Wave height in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalSample {
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub current_speed: f64,
    pub current_direction: f64,
    pub wave_height: f64,
}

impl EnvironmentalSample {
    /// Flat calm with slack water. Used when no real sample can be had.
    pub fn neutral() -> Self {
        Self {
            wind_speed: 0.0,
            wind_direction: 0.0,
            current_speed: 0.0,
            current_direction: 0.0,
            wave_height: 0.0,
        }
    }

    pub fn from_components(wind: &WindData, current: &CurrentData, wave_height: f64) -> Self {
        Self {
            wind_speed: wind.speed() * MS_TO_KNOTS,
            wind_direction: wind.direction(),
            current_speed: current.speed() * MS_TO_KNOTS,
            current_direction: current.direction(),
            wave_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wind_direction_conventions() {
        // u > 0 is Eastward, v > 0 is Northward.
        // Wind FROM North blows southwards: u=0, v=-5 => atan2 = -90, dir = 360 = 0.
        let north_wind = WindData { u: 0.0, v: -5.0 };
        assert_eq!(north_wind.direction(), 0.0);

        let east_wind = WindData { u: -5.0, v: 0.0 };
        assert_eq!(east_wind.direction(), 90.0);

        let south_wind = WindData { u: 0.0, v: 5.0 };
        assert_eq!(south_wind.direction(), 180.0);

        let west_wind = WindData { u: 5.0, v: 0.0 };
        assert_eq!(west_wind.direction(), 270.0);
    }

    #[test]
    fn test_current_direction_is_towards() {
        let eastward = CurrentData { u: 1.0, v: 0.0 };
        assert!((eastward.direction() - 90.0).abs() < 1e-9);

        let southward = CurrentData { u: 0.0, v: -1.0 };
        assert!((southward.direction() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_from_components_converts_to_knots() {
        // 10 knots from the North
        let wind = WindData { u: 0.0, v: -10.0 / MS_TO_KNOTS };
        let current = CurrentData { u: 0.0, v: 0.0 };
        let sample = EnvironmentalSample::from_components(&wind, &current, 1.5);

        assert!((sample.wind_speed - 10.0).abs() < 1e-9);
        assert_eq!(sample.wind_direction, 0.0);
        assert_eq!(sample.current_speed, 0.0);
        assert_eq!(sample.wave_height, 1.5);
    }
}
