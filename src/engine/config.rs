use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::error::RoutingError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Lattice points per side
    pub lattice_density: usize,
    /// Neighbour search radius. Derived from the lattice spacing when unset.
    pub exploration_radius_nm: Option<f64>,
    pub goal_tolerance_km: f64,
    /// Open-list size that triggers pruning down to a tenth of it
    pub max_nodes: usize,
    pub max_iterations: Option<usize>,
    pub time_limit: Option<Duration>,
    /// Pops between budget checks
    pub budget_check_interval: usize,
    /// Pops between progress callbacks
    pub progress_interval: usize,
    /// Width of the time buckets keying the edge cost cache
    pub time_bucket_minutes: u32,
    /// Intermediate points of the synthesized straight-line base route
    pub base_route_points: usize,
    /// Clearance kept from land rectangles when detouring
    pub detour_margin_deg: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            lattice_density: 21,
            exploration_radius_nm: None,
            goal_tolerance_km: 5.0,
            max_nodes: 1000,
            max_iterations: None,
            time_limit: None,
            budget_check_interval: 64,
            progress_interval: 32,
            time_bucket_minutes: 30,
            base_route_points: 10,
            detour_margin_deg: 0.15,
        }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> Result<(), RoutingError> {
        if self.lattice_density < 2 {
            return Err(RoutingError::InvalidConfig("lattice_density must be at least 2".to_string()));
        }
        if !(self.goal_tolerance_km > 0.0) {
            return Err(RoutingError::InvalidConfig("goal_tolerance_km must be positive".to_string()));
        }
        if let Some(radius) = self.exploration_radius_nm {
            if !(radius > 0.0) {
                return Err(RoutingError::InvalidConfig("exploration_radius_nm must be positive".to_string()));
            }
        }
        if self.time_bucket_minutes == 0 {
            return Err(RoutingError::InvalidConfig("time_bucket_minutes must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RouterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = RouterConfig { lattice_density: 1, ..RouterConfig::default() };
        assert!(matches!(config.validate(), Err(RoutingError::InvalidConfig(_))));

        let config = RouterConfig { goal_tolerance_km: 0.0, ..RouterConfig::default() };
        assert!(config.validate().is_err());

        let config = RouterConfig { exploration_radius_nm: Some(-1.0), ..RouterConfig::default() };
        assert!(config.validate().is_err());
    }
}
