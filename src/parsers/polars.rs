//! Sail boat polar tables.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolarError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polar table is empty")]
    Empty,

    #[error("Invalid polar format at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Polar row at line {line} does not match the header width")]
    Ragged { line: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolarData {
    /// True Wind Speeds (knots), ascending
    pub tws: Vec<f64>,
    /// True Wind Angles (degrees), ascending within [0, 180]
    pub twa: Vec<f64>,
    /// Boat speeds in knots: speeds[twa_idx][tws_idx]
    pub speeds: Vec<Vec<f64>>,
}

impl PolarData {
    pub fn load_from_csv<P: AsRef<Path>>(path: P) -> Result<Self, PolarError> {
        info!("Loading polar data from CSV: {:?}", path.as_ref());
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn parse_csv(content: &str) -> Result<Self, PolarError> {
        Self::from_reader(content.as_bytes())
    }

    /// Reads the "twa/tws,5,10,..." layout: one header of wind speeds,
    /// then one row per wind angle.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PolarError> {
        let mut lines = BufReader::new(reader).lines();

        let header = match lines.next() {
            Some(line) => line?,
            None => return Err(PolarError::Empty),
        };
        let tws = header
            .split(',')
            .skip(1)
            .map(|val| parse_cell(val, 1))
            .collect::<Result<Vec<f64>, _>>()?;
        if tws.is_empty() {
            return Err(PolarError::Empty);
        }

        let mut twa = Vec::new();
        let mut speeds = Vec::new();

        for (idx, line_result) in lines.enumerate() {
            let line_no = idx + 2;
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let mut row_parts = line.split(',');
            let twa_val = parse_cell(row_parts.next().unwrap_or_default(), line_no)?;

            let row_speeds = row_parts
                .map(|val| parse_cell(val, line_no))
                .collect::<Result<Vec<f64>, _>>()?;
            if row_speeds.len() != tws.len() {
                return Err(PolarError::Ragged { line: line_no });
            }
            twa.push(twa_val);
            speeds.push(row_speeds);
        }

        if twa.is_empty() {
            return Err(PolarError::Empty);
        }

        Ok(Self { tws, twa, speeds })
    }

    pub fn is_empty(&self) -> bool {
        self.tws.is_empty() || self.twa.is_empty()
    }

    /// Bilinear interpolation to find the boat speed (in knots) for a given TWS and TWA.
    ///
    /// Inputs outside the table are clamped to its edges. At an exact grid
    /// node the stored value is returned unchanged.
    pub fn get_speed(&self, target_tws: f64, target_twa: f64) -> f64 {
        if self.is_empty() {
            return 0.0;
        }

        // 1. Clamp bounds
        let tws_clamped = target_tws.clamp(self.tws[0], self.tws[self.tws.len() - 1]);
        let twa_clamped = target_twa.clamp(self.twa[0], self.twa[self.twa.len() - 1]);

        // 2. Bounding indices
        let (tws_idx0, tws_idx1) = bracket(&self.tws, tws_clamped);
        let (twa_idx0, twa_idx1) = bracket(&self.twa, twa_clamped);

        // 3. Extract 4 points
        let tws0 = self.tws[tws_idx0];
        let tws1 = self.tws[tws_idx1];
        let twa0 = self.twa[twa_idx0];
        let twa1 = self.twa[twa_idx1];

        let val00 = self.speeds[twa_idx0][tws_idx0];
        let val01 = self.speeds[twa_idx0][tws_idx1];
        let val10 = self.speeds[twa_idx1][tws_idx0];
        let val11 = self.speeds[twa_idx1][tws_idx1];

        // 4. Bilinear Interpolation
        if tws_idx0 == tws_idx1 && twa_idx0 == twa_idx1 {
            return val00;
        }

        let tws_frac = if tws0 == tws1 { 0.0 } else { (tws_clamped - tws0) / (tws1 - tws0) };
        let twa_frac = if twa0 == twa1 { 0.0 } else { (twa_clamped - twa0) / (twa1 - twa0) };

        let val0 = val00 * (1.0 - tws_frac) + val01 * tws_frac; // across TWS at TWA 0
        let val1 = val10 * (1.0 - tws_frac) + val11 * tws_frac; // across TWS at TWA 1

        val0 * (1.0 - twa_frac) + val1 * twa_frac
    }
}

fn parse_cell(val: &str, line: usize) -> Result<f64, PolarError> {
    val.trim().parse().map_err(|_| PolarError::Parse {
        line,
        message: format!("'{}' is not a number", val.trim()),
    })
}

/// Indices of the two axis entries enclosing `value`. A single-entry axis
/// brackets with itself.
fn bracket(axis: &[f64], value: f64) -> (usize, usize) {
    if axis.len() == 1 {
        return (0, 0);
    }
    for i in 0..axis.len() - 1 {
        if value >= axis[i] && value <= axis[i + 1] {
            return (i, i + 1);
        }
    }
    (0, axis.len() - 1)
}
