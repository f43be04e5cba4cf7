use crate::domain::IrradiationClass;

use super::consumption::DAYS_PER_MONTH;

pub const PANEL_EFFICIENCY: f64 = 0.20;
pub const PERFORMANCE_FACTOR: f64 = 0.80;
/// 1 kWc needs 5 m² of panels.
pub const PANEL_POWER_DENSITY_KWC_PER_M2: f64 = 0.2;

/// Surface and irradiance to PV energy. Everything here is pure.
pub struct PvModel;

impl PvModel {
    /// Class-average irradiance, kWh/m²/day.
    pub fn average_irradiance(class: IrradiationClass) -> f64 {
        match class {
            IrradiationClass::A => 6.5,
            IrradiationClass::B => 5.5,
            IrradiationClass::C => 4.5,
            IrradiationClass::D => 3.5,
        }
    }

    pub fn surface_to_power_kwc(surface_m2: f64) -> f64 {
        surface_m2 * PANEL_POWER_DENSITY_KWC_PER_M2
    }

    pub fn power_to_surface_m2(power_kwc: f64) -> f64 {
        power_kwc / PANEL_POWER_DENSITY_KWC_PER_M2
    }

    /// Production on an average day for the class.
    pub fn daily_production_kwh(surface_m2: f64, class: IrradiationClass) -> f64 {
        Self::instantaneous_production_kwh(surface_m2, Self::average_irradiance(class))
    }

    pub fn production_for_period_kwh(surface_m2: f64, class: IrradiationClass, days: u32) -> f64 {
        Self::daily_production_kwh(surface_m2, class) * f64::from(days)
    }

    /// Thirty average days.
    pub fn monthly_production_kwh(surface_m2: f64, class: IrradiationClass) -> f64 {
        Self::daily_production_kwh(surface_m2, class) * DAYS_PER_MONTH
    }

    /// Energy for one irradiance sample rather than the class average.
    pub fn instantaneous_production_kwh(surface_m2: f64, irradiance_kwh_m2: f64) -> f64 {
        surface_m2 * irradiance_kwh_m2 * PANEL_EFFICIENCY * PERFORMANCE_FACTOR
    }
}
