use serde::{Deserialize, Serialize};
use validator::Validate;

const PANEL_UNIT_KWC: f64 = 0.4;
const BATTERY_UNIT_KWH: f64 = 10.0;

/// Catalogue prices for a concrete equipment choice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquipmentSelection {
    /// Price of one 400 W panel.
    pub panel_unit_price: f64,
    /// Price of one 10 kWh battery module.
    pub battery_unit_price: f64,
    pub inverter_price: f64,
    #[serde(default)]
    pub controller_price: Option<f64>,
}

/// Average-market installation cost estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct InstallationCostModel {
    #[validate(range(min = 0.0))]
    pub pv_cost_per_kwc: f64,
    #[validate(range(min = 0.0))]
    pub battery_cost_per_kwh: f64,
    #[validate(range(min = 0.0))]
    pub inverter_cost_per_kwc: f64,
    /// Labour and balance of system, as a fraction of equipment cost.
    #[validate(range(min = 0.0, max = 5.0))]
    pub installation_overhead: f64,
}

impl Default for InstallationCostModel {
    fn default() -> Self {
        Self {
            pv_cost_per_kwc: 2500.0,
            battery_cost_per_kwh: 4500.0,
            inverter_cost_per_kwc: 2000.0,
            installation_overhead: 0.20,
        }
    }
}

impl InstallationCostModel {
    pub fn estimate(&self, pv_kwc: f64, battery_kwh: f64) -> f64 {
        let equipment = pv_kwc * self.pv_cost_per_kwc
            + battery_kwh * self.battery_cost_per_kwh
            + pv_kwc * self.inverter_cost_per_kwc;
        self.with_overhead(equipment)
    }

    /// Cost using the selected catalogue items; panels and battery modules are
    /// rounded up to whole units.
    pub fn estimate_with_selection(&self, pv_kwc: f64, battery_kwh: f64, selection: &EquipmentSelection) -> f64 {
        let panels = (pv_kwc / PANEL_UNIT_KWC).ceil();
        let modules = (battery_kwh / BATTERY_UNIT_KWH).ceil();
        let equipment = panels * selection.panel_unit_price
            + modules * selection.battery_unit_price
            + selection.inverter_price
            + selection.controller_price.unwrap_or(0.0);
        self.with_overhead(equipment)
    }

    fn with_overhead(&self, equipment: f64) -> f64 {
        equipment * (1.0 + self.installation_overhead)
    }
}
