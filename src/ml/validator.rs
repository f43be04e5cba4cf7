//! Plausibility checks for predictor output.

use thiserror::Error;

use crate::domain::BatteryParameters;
use crate::optimizer::DispatchDecision;

pub const MAX_CONSUMPTION_KWH: f64 = 10_000.0;
pub const MAX_GRID_IMPORT_KWH: f64 = 5_000.0;
pub const MAX_BATTERY_CHARGE_KWH: f64 = 2_000.0;
pub const MAX_BATTERY_DISCHARGE_KWH: f64 = 2_000.0;
/// Rounding slack allowed above nominal capacity.
pub const SOC_SLACK_FACTOR: f64 = 1.05;
/// Charge and discharge above this in one step are considered simultaneous.
pub const SIMULTANEOUS_FLOW_EPSILON_KWH: f64 = 0.01;

/// First rule a predicted dispatch broke.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchRejection {
    #[error("non-finite value in dispatch")]
    NonFinite,
    #[error("grid import {0} kWh outside [0, 5000]")]
    GridImportOutOfRange(f64),
    #[error("battery charge {0} kWh outside [0, 2000]")]
    ChargeOutOfRange(f64),
    #[error("battery discharge {0} kWh outside [0, 2000]")]
    DischargeOutOfRange(f64),
    #[error("next SOC {0} kWh outside [0, 1.05 x capacity]")]
    SocOutOfRange(f64),
    #[error("charge {charge} kWh and discharge {discharge} kWh in the same step")]
    SimultaneousChargeDischarge { charge: f64, discharge: f64 },
}

pub struct ResultValidator;

impl ResultValidator {
    fn consumption_bound(daily_kwh: f64) -> f64 {
        (daily_kwh * 2.0).max(MAX_CONSUMPTION_KWH)
    }

    /// Accepts finite non-negative values up to the larger of twice the daily demand and 10 MWh.
    pub fn is_valid_consumption(predicted_kwh: f64, daily_kwh: f64) -> bool {
        predicted_kwh.is_finite() && predicted_kwh >= 0.0 && predicted_kwh <= Self::consumption_bound(daily_kwh)
    }

    /// NaN or negative becomes a quarter of the daily demand; excess is capped.
    pub fn correct_consumption(predicted_kwh: f64, daily_kwh: f64) -> f64 {
        if predicted_kwh.is_nan() || predicted_kwh < 0.0 {
            return daily_kwh / 4.0;
        }
        predicted_kwh.min(Self::consumption_bound(daily_kwh))
    }

    /// Up to 5% above capacity is tolerated.
    pub fn is_valid_soc(soc_kwh: f64, capacity_kwh: f64) -> bool {
        soc_kwh.is_finite() && soc_kwh >= 0.0 && soc_kwh <= capacity_kwh * SOC_SLACK_FACTOR
    }

    /// Pulls any SOC into the battery's operating window.
    pub fn correct_soc(soc_kwh: f64, battery: &BatteryParameters) -> f64 {
        let (floor, ceiling) = (battery.soc_min_kwh(), battery.soc_max_kwh());
        if soc_kwh.is_nan() || soc_kwh < 0.0 {
            floor
        } else if soc_kwh > battery.capacity_kwh * SOC_SLACK_FACTOR {
            ceiling
        } else {
            soc_kwh.clamp(floor, ceiling)
        }
    }

    /// Returns the first broken rule, checked in `DispatchRejection` order.
    pub fn validate_dispatch(decision: &DispatchDecision, capacity_kwh: f64) -> Result<(), DispatchRejection> {
        let DispatchDecision {
            grid_import_kwh: grid,
            battery_charge_kwh: charge,
            battery_discharge_kwh: discharge,
            soc_next_kwh: soc,
            ..
        } = *decision;

        if ![grid, charge, discharge, soc].iter().all(|v| v.is_finite()) {
            return Err(DispatchRejection::NonFinite);
        }
        if !(0.0..=MAX_GRID_IMPORT_KWH).contains(&grid) {
            return Err(DispatchRejection::GridImportOutOfRange(grid));
        }
        if !(0.0..=MAX_BATTERY_CHARGE_KWH).contains(&charge) {
            return Err(DispatchRejection::ChargeOutOfRange(charge));
        }
        if !(0.0..=MAX_BATTERY_DISCHARGE_KWH).contains(&discharge) {
            return Err(DispatchRejection::DischargeOutOfRange(discharge));
        }
        if !Self::is_valid_soc(soc, capacity_kwh) {
            return Err(DispatchRejection::SocOutOfRange(soc));
        }
        if charge > SIMULTANEOUS_FLOW_EPSILON_KWH && discharge > SIMULTANEOUS_FLOW_EPSILON_KWH {
            return Err(DispatchRejection::SimultaneousChargeDischarge { charge, discharge });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decision(grid: f64, charge: f64, discharge: f64, soc: f64) -> DispatchDecision {
        DispatchDecision {
            grid_import_kwh: grid,
            battery_charge_kwh: charge,
            battery_discharge_kwh: discharge,
            soc_next_kwh: soc,
            note: None,
        }
    }

    #[test]
    fn test_negative_consumption_corrected_to_quarter_day() {
        assert!(!ResultValidator::is_valid_consumption(-5.0, 800.0));
        assert_eq!(ResultValidator::correct_consumption(-5.0, 800.0), 200.0);
    }

    #[test]
    fn test_consumption_upper_bound() {
        // 2 x daily is below the absolute ceiling here
        assert!(ResultValidator::is_valid_consumption(9_999.0, 800.0));
        assert!(!ResultValidator::is_valid_consumption(10_001.0, 800.0));
        assert_eq!(ResultValidator::correct_consumption(12_000.0, 800.0), 10_000.0);

        // and above it here
        assert!(ResultValidator::is_valid_consumption(15_000.0, 8_000.0));
        assert_eq!(ResultValidator::correct_consumption(20_000.0, 8_000.0), 16_000.0);
        assert_eq!(ResultValidator::correct_consumption(300.0, 800.0), 300.0);
    }

    #[test]
    fn test_soc_check_allows_rounding_slack() {
        assert!(ResultValidator::is_valid_soc(520.0, 500.0));
        assert!(!ResultValidator::is_valid_soc(530.0, 500.0));
        assert!(!ResultValidator::is_valid_soc(-0.1, 500.0));
    }

    #[test]
    fn test_correct_soc_biases_out_of_range_values() {
        let b = BatteryParameters::new(500.0).unwrap();
        assert!((ResultValidator::correct_soc(-10.0, &b) - 75.0).abs() < 1e-9);
        assert!((ResultValidator::correct_soc(600.0, &b) - 475.0).abs() < 1e-9);
        assert!((ResultValidator::correct_soc(500.0, &b) - 475.0).abs() < 1e-9);
        assert!((ResultValidator::correct_soc(10.0, &b) - 75.0).abs() < 1e-9);
        assert_eq!(ResultValidator::correct_soc(300.0, &b), 300.0);
    }

    #[test]
    fn test_dispatch_rules() {
        assert!(ResultValidator::validate_dispatch(&decision(100.0, 0.0, 50.0, 200.0), 500.0).is_ok());
        assert_eq!(
            ResultValidator::validate_dispatch(&decision(6_000.0, 0.0, 0.0, 200.0), 500.0),
            Err(DispatchRejection::GridImportOutOfRange(6_000.0))
        );
        assert_eq!(
            ResultValidator::validate_dispatch(&decision(0.0, -1.0, 0.0, 200.0), 500.0),
            Err(DispatchRejection::ChargeOutOfRange(-1.0))
        );
        assert_eq!(
            ResultValidator::validate_dispatch(&decision(0.0, 0.0, 2_500.0, 200.0), 500.0),
            Err(DispatchRejection::DischargeOutOfRange(2_500.0))
        );
        assert_eq!(
            ResultValidator::validate_dispatch(&decision(0.0, 0.0, 0.0, 600.0), 500.0),
            Err(DispatchRejection::SocOutOfRange(600.0))
        );
        assert!(matches!(
            ResultValidator::validate_dispatch(&decision(0.0, 5.0, 5.0, 200.0), 500.0),
            Err(DispatchRejection::SimultaneousChargeDischarge { .. })
        ));
        assert_eq!(
            ResultValidator::validate_dispatch(&decision(f64::NAN, 0.0, 0.0, 200.0), 500.0),
            Err(DispatchRejection::NonFinite)
        );
        // tiny simultaneous flows are tolerated
        assert!(ResultValidator::validate_dispatch(&decision(0.0, 0.005, 3.0, 200.0), 500.0).is_ok());
    }

    proptest! {
        #[test]
        fn prop_corrected_consumption_is_valid(predicted in -1e6f64..1e6, daily in 0.0f64..20_000.0) {
            let corrected = ResultValidator::correct_consumption(predicted, daily);
            prop_assert!(ResultValidator::is_valid_consumption(corrected, daily));
        }

        #[test]
        fn prop_corrected_soc_within_window(soc in -1e4f64..1e4, capacity in 1.0f64..5_000.0) {
            let b = BatteryParameters::new(capacity).unwrap();
            let corrected = ResultValidator::correct_soc(soc, &b);
            prop_assert!(corrected >= b.soc_min_kwh() - 1e-9);
            prop_assert!(corrected <= b.soc_max_kwh() + 1e-9);
        }
    }
}
