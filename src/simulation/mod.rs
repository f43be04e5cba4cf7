//! # Microgrid Simulation
//!
//! Replays a facility over N days at a fixed 6-hour resolution. Each step
//! resolves weather, PV, consumption and dispatch, preferring the external
//! predictor and falling back to the deterministic models whenever it is
//! unavailable or returns something implausible.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use hospital_microgrid::domain::{EstablishmentProfile, EstablishmentType};
//! use hospital_microgrid::forecast::NoWeatherData;
//! use hospital_microgrid::ml::OfflineGateway;
//! use hospital_microgrid::simulation::SimulationEngine;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let engine = SimulationEngine::new(Arc::new(OfflineGateway), Arc::new(NoWeatherData));
//! let profile = EstablishmentProfile::new(EstablishmentType::Chu, 120).with_surface(800.0);
//! let start = chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let result = engine.simulate(&profile, start, 7, 2_000.0, 1_000.0, 1.2).await?;
//! println!("autonomy: {:.1} %", result.average_autonomy_percent());
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod export;

pub use engine::{
    EngineSettings, SimulationEngine, SimulationRequest, DEFAULT_BATTERY_CAPACITY_KWH, DEFAULT_INITIAL_SOC_FRACTION,
    MAX_SIMULATION_DAYS, STEPS_PER_DAY, STEP_HOURS,
};
pub use export::write_steps_csv;
