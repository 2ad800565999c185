use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    Goal,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Start => write!(f, "start"),
            Endpoint::Goal => write!(f, "goal"),
        }
    }
}

/// Failures surfaced by `RoutingContext::find_route`. Search exhaustion and
/// budget expiry are not errors; they degrade to the base route.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    #[error("{endpoint} ({lat:.4}, {lon:.4}) lies on land ({land})")]
    InvalidInput {
        endpoint: Endpoint,
        lat: f64,
        lon: f64,
        land: String,
    },

    #[error("Invalid router configuration: {0}")]
    InvalidConfig(String),
}

/// Failure of an environmental data lookup. Recovered inside the cost model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvironmentError {
    #[error("No environmental sample for ({lat:.4}, {lon:.4}) at {time}")]
    Unavailable { lat: f64, lon: f64, time: DateTime<Utc> },

    #[error("Environmental lookup for ({lat:.4}, {lon:.4}) timed out")]
    Timeout { lat: f64, lon: f64 },
}
