use serde::{Deserialize, Serialize};

/// Energy allocation for one step, whichever dispatcher produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchDecision {
    pub grid_import_kwh: f64,
    pub battery_charge_kwh: f64,
    pub battery_discharge_kwh: f64,
    pub soc_next_kwh: f64,
    #[serde(default)]
    pub note: Option<String>,
}
