use super::DispatchDecision;
use crate::domain::{BatteryParameters, DEFAULT_SOC_MAX_FRACTION, DEFAULT_SOC_MIN_FRACTION};

pub const FALLBACK_NOTE: &str = "Simple dispatch calculation";

/// Self-consumption-first dispatcher used whenever the predictor's schedule
/// is missing or rejected:
/// - PV serves the load first
/// - surplus PV charges the battery up to the max SOC fraction
/// - any shortfall drains the battery down to the min SOC fraction
/// - the rest is imported from the grid
///
/// Never charges and discharges in the same step.
pub struct GreedyDispatcher;

impl GreedyDispatcher {
    pub fn dispatch(demand_kwh: f64, pv_kwh: f64, soc_kwh: f64, battery: &BatteryParameters) -> DispatchDecision {
        let demand = demand_kwh.max(0.0);
        let pv = pv_kwh.max(0.0);
        let capacity = battery.capacity_kwh;
        let soc_floor = battery.soc_min_kwh();

        let pv_used = demand.min(pv);
        let mut remaining = demand - pv_used;
        let surplus = pv - pv_used;

        let (charge, discharge, next) = if surplus > 0.0 {
            let room = (battery.soc_max_kwh() - soc_kwh).max(0.0);
            let charge = surplus.min(room);
            (charge, 0.0, soc_kwh + charge)
        } else {
            let room = (soc_kwh - soc_floor).max(0.0);
            let discharge = remaining.min(room);
            remaining -= discharge;
            (0.0, discharge, soc_kwh - discharge)
        };

        DispatchDecision {
            grid_import_kwh: remaining.max(0.0),
            battery_charge_kwh: charge,
            battery_discharge_kwh: discharge,
            soc_next_kwh: next.clamp(soc_floor, capacity),
            note: Some(FALLBACK_NOTE.to_string()),
        }
    }

    /// Same as [`GreedyDispatcher::dispatch`] with the default 15 %/95 % window.
    pub fn dispatch_kwh(demand_kwh: f64, pv_kwh: f64, soc_kwh: f64, capacity_kwh: f64) -> DispatchDecision {
        let battery = BatteryParameters {
            capacity_kwh,
            soc_min_fraction: DEFAULT_SOC_MIN_FRACTION,
            soc_max_fraction: DEFAULT_SOC_MAX_FRACTION,
            charge_max_kw: crate::domain::DEFAULT_CHARGE_MAX_KW,
            discharge_max_kw: crate::domain::DEFAULT_DISCHARGE_MAX_KW,
        };
        Self::dispatch(demand_kwh, pv_kwh, soc_kwh, &battery)
    }
}
