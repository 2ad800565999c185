pub mod config;
pub mod cost;
pub mod environment;
pub mod error;
pub mod geodesy;
pub mod land;
pub mod lattice;
pub mod models;
pub mod performance;
pub mod route;
pub mod router;
pub mod statistics;
pub mod vessel;
