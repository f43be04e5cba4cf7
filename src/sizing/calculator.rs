use crate::domain::{IrradiationClass, RoiYears};
use crate::forecast::{PvModel, DAYS_PER_MONTH, PANEL_EFFICIENCY, PERFORMANCE_FACTOR};

pub const AUTONOMY_DAYS: f64 = 2.0;
pub const SAFETY_FACTOR: f64 = 1.3;
const ZERO_SAVINGS_EPSILON: f64 = 1e-9;

pub struct SizingCalculator;

impl SizingCalculator {
    /// Peak power covering average daily demand, with the safety margin.
    pub fn recommended_pv_power_kwc(monthly_consumption_kwh: f64, class: IrradiationClass) -> f64 {
        let daily = monthly_consumption_kwh / DAYS_PER_MONTH;
        let yield_per_m2 = PvModel::average_irradiance(class) * PANEL_EFFICIENCY * PERFORMANCE_FACTOR;
        daily / yield_per_m2 * SAFETY_FACTOR
    }

    /// Panel area for the recommended peak power.
    pub fn recommended_pv_surface_m2(monthly_consumption_kwh: f64, class: IrradiationClass) -> f64 {
        PvModel::power_to_surface_m2(Self::recommended_pv_power_kwc(monthly_consumption_kwh, class))
    }

    /// Two days of storage with margin.
    pub fn recommended_battery_capacity_kwh(daily_consumption_kwh: f64) -> f64 {
        daily_consumption_kwh * AUTONOMY_DAYS * SAFETY_FACTOR
    }

    pub fn recommended_battery_capacity_from_monthly_kwh(monthly_consumption_kwh: f64) -> f64 {
        Self::recommended_battery_capacity_kwh(monthly_consumption_kwh / DAYS_PER_MONTH)
    }

    /// Share of monthly demand covered by PV, capped at 100.
    pub fn energy_autonomy_percent(surface_m2: f64, monthly_consumption_kwh: f64, class: IrradiationClass) -> f64 {
        if !monthly_consumption_kwh.is_finite() || monthly_consumption_kwh <= 0.0 || !surface_m2.is_finite() {
            return 0.0;
        }
        let pv = PvModel::monthly_production_kwh(surface_m2, class);
        (pv / monthly_consumption_kwh * 100.0).min(100.0)
    }

    /// Yearly grid spend avoided at the given autonomy.
    pub fn annual_savings(monthly_consumption_kwh: f64, autonomy_percent: f64, price_per_kwh: f64) -> f64 {
        monthly_consumption_kwh * 12.0 * (autonomy_percent / 100.0) * price_per_kwh
    }

    /// Payback period; `NoPayback` when nothing is saved.
    pub fn roi_years(installation_cost: f64, annual_savings: f64) -> RoiYears {
        if annual_savings.abs() < ZERO_SAVINGS_EPSILON {
            RoiYears::NoPayback
        } else {
            RoiYears::Years(installation_cost / annual_savings)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_pv_power_for_class_c() {
        // 1000 kWh/day / (4.5 x 0.20 x 0.80) x 1.3
        let kwc = SizingCalculator::recommended_pv_power_kwc(30_000.0, IrradiationClass::C);
        assert!((kwc - 1_000.0 / 0.72 * 1.3).abs() < 1e-6, "{kwc}");
        assert!((kwc - 1_805.56).abs() < 0.01);
    }

    #[rstest]
    #[case(IrradiationClass::A)]
    #[case(IrradiationClass::B)]
    #[case(IrradiationClass::C)]
    #[case(IrradiationClass::D)]
    fn test_surface_is_five_m2_per_kwc(#[case] class: IrradiationClass) {
        let kwc = SizingCalculator::recommended_pv_power_kwc(12_000.0, class);
        let m2 = SizingCalculator::recommended_pv_surface_m2(12_000.0, class);
        assert!((m2 - kwc * 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_battery_capacity() {
        assert!((SizingCalculator::recommended_battery_capacity_kwh(1_000.0) - 2_600.0).abs() < 1e-9);
        assert!((SizingCalculator::recommended_battery_capacity_from_monthly_kwh(30_000.0) - 2_600.0).abs() < 1e-9);
    }

    #[test]
    fn test_autonomy_guards_and_caps() {
        assert_eq!(SizingCalculator::energy_autonomy_percent(100.0, 0.0, IrradiationClass::A), 0.0);
        assert_eq!(SizingCalculator::energy_autonomy_percent(100.0, f64::NAN, IrradiationClass::A), 0.0);
        assert_eq!(SizingCalculator::energy_autonomy_percent(f64::NAN, 1_000.0, IrradiationClass::A), 0.0);
        assert_eq!(
            SizingCalculator::energy_autonomy_percent(100.0, f64::INFINITY, IrradiationClass::A),
            0.0
        );
        assert_eq!(SizingCalculator::energy_autonomy_percent(1e6, 1_000.0, IrradiationClass::A), 100.0);
        // 100 m² in class C makes 72 kWh/day, 2160 kWh/month
        let pct = SizingCalculator::energy_autonomy_percent(100.0, 4_320.0, IrradiationClass::C);
        assert!((pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_savings_and_roi() {
        let savings = SizingCalculator::annual_savings(10_000.0, 50.0, 1.2);
        assert!((savings - 72_000.0).abs() < 1e-9);
        assert_eq!(SizingCalculator::roi_years(144_000.0, savings), RoiYears::Years(2.0));
        assert_eq!(SizingCalculator::roi_years(144_000.0, 0.0), RoiYears::NoPayback);
    }
}
