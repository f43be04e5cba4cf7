pub mod config;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod optimizer;
pub mod simulation;
pub mod sizing;
pub mod telemetry;
