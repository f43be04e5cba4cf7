//! PV and storage sizing for a facility.

pub mod calculator;
pub mod cost;

pub use calculator::*;
pub use cost::*;

use serde::Serialize;
use tracing::debug;

use crate::domain::{EstablishmentProfile, EstablishmentType, IrradiationClass, SizingRecommendation};
use crate::error::DomainValidationError;
use crate::forecast::{ConsumptionModel, PvModel};

pub const DEFAULT_PRICE_PER_KWH: f64 = 1.2;

#[derive(Debug, Clone, PartialEq)]
pub struct SizingOptions {
    pub price_per_kwh: f64,
    pub cost_model: InstallationCostModel,
    pub equipment: Option<EquipmentSelection>,
    /// Surface actually available; autonomy falls back to the recommended one when absent.
    pub installable_surface_m2: Option<f64>,
}

impl Default for SizingOptions {
    fn default() -> Self {
        Self {
            price_per_kwh: DEFAULT_PRICE_PER_KWH,
            cost_model: InstallationCostModel::default(),
            equipment: None,
            installable_surface_m2: None,
        }
    }
}

/// Recommendation with default price and average-market costs.
pub fn size(monthly_consumption_kwh: f64, class: IrradiationClass) -> Result<SizingRecommendation, DomainValidationError> {
    size_with(monthly_consumption_kwh, class, &SizingOptions::default())
}

/// Rejects a negative or non-finite consumption, price or surface before sizing.
pub fn size_with(
    monthly_consumption_kwh: f64,
    class: IrradiationClass,
    options: &SizingOptions,
) -> Result<SizingRecommendation, DomainValidationError> {
    DomainValidationError::check_non_negative("monthly_consumption_kwh", monthly_consumption_kwh)?;
    DomainValidationError::check_non_negative("price_per_kwh", options.price_per_kwh)?;
    if let Some(surface) = options.installable_surface_m2 {
        DomainValidationError::check_non_negative("installable_surface_m2", surface)?;
    }

    let power = SizingCalculator::recommended_pv_power_kwc(monthly_consumption_kwh, class);
    let surface = PvModel::power_to_surface_m2(power);
    let battery = SizingCalculator::recommended_battery_capacity_from_monthly_kwh(monthly_consumption_kwh);

    let autonomy_surface = options
        .installable_surface_m2
        .filter(|s| *s > 0.0)
        .unwrap_or(surface);
    let autonomy = SizingCalculator::energy_autonomy_percent(autonomy_surface, monthly_consumption_kwh, class);
    let annual_savings = SizingCalculator::annual_savings(monthly_consumption_kwh, autonomy, options.price_per_kwh);

    let installation_cost = match &options.equipment {
        Some(selection) => options.cost_model.estimate_with_selection(power, battery, selection),
        None => options.cost_model.estimate(power, battery),
    };

    Ok(SizingRecommendation {
        recommended_pv_power_kwc: power,
        recommended_pv_surface_m2: surface,
        recommended_battery_capacity_kwh: battery,
        autonomy_percent: autonomy,
        annual_savings,
        installation_cost,
        roi_years: SizingCalculator::roi_years(installation_cost, annual_savings),
    })
}

/// What the facility's current PV, if any, already covers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExistingPvBaseline {
    pub power_kwc: f64,
    pub surface_m2: f64,
    pub monthly_production_kwh: f64,
    pub autonomy_percent: f64,
}

/// Sizing for a full facility profile, with the consumption figures it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSizing {
    pub establishment_type: EstablishmentType,
    pub irradiation_class: IrradiationClass,
    pub monthly_consumption_kwh: f64,
    pub daily_consumption_kwh: f64,
    pub daily_critical_consumption_kwh: f64,
    pub daily_non_critical_consumption_kwh: f64,
    pub estimated_patients: f64,
    pub recommendation: SizingRecommendation,
    pub existing_pv: Option<ExistingPvBaseline>,
}

pub fn size_for_profile(
    profile: &EstablishmentProfile,
    options: &SizingOptions,
) -> Result<ProfileSizing, DomainValidationError> {
    profile.validate()?;

    let kind = profile.establishment_type;
    let beds = profile.bed_count;
    let class = profile.resolved_class();
    let monthly = profile
        .monthly_consumption_kwh
        .unwrap_or_else(|| ConsumptionModel::monthly_consumption_kwh(kind, beds));

    let ratios = ConsumptionModel::ratios(kind);
    let daily = monthly / crate::forecast::DAYS_PER_MONTH;

    let mut opts = options.clone();
    if opts.installable_surface_m2.is_none() {
        opts.installable_surface_m2 = profile.installable_surface_m2;
    }
    let recommendation = size_with(monthly, class, &opts)?;

    let existing_pv = profile.existing_pv_power_kwc.filter(|p| *p > 0.0).map(|power_kwc| {
        let surface_m2 = PvModel::power_to_surface_m2(power_kwc);
        ExistingPvBaseline {
            power_kwc,
            surface_m2,
            monthly_production_kwh: PvModel::production_for_period_kwh(surface_m2, class, 30),
            autonomy_percent: SizingCalculator::energy_autonomy_percent(surface_m2, monthly, class),
        }
    });

    debug!(
        establishment_type = %kind,
        %class,
        monthly_kwh = monthly,
        pv_kwc = recommendation.recommended_pv_power_kwc,
        "profile sized"
    );

    Ok(ProfileSizing {
        establishment_type: kind,
        irradiation_class: class,
        monthly_consumption_kwh: monthly,
        daily_consumption_kwh: daily,
        daily_critical_consumption_kwh: daily * ratios.critical_ratio,
        daily_non_critical_consumption_kwh: daily * ratios.non_critical_ratio,
        estimated_patients: ConsumptionModel::estimated_patients(beds),
        recommendation,
        existing_pv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RoiYears;

    #[test]
    fn test_size_is_idempotent() {
        assert_eq!(size(30_000.0, IrradiationClass::C), size(30_000.0, IrradiationClass::C));
        assert!(size(30_000.0, IrradiationClass::C).is_ok());
    }

    #[test]
    fn test_recommended_surface_covers_demand() {
        let rec = size(30_000.0, IrradiationClass::B).unwrap();
        assert_eq!(rec.autonomy_percent, 100.0);
        assert!((rec.recommended_battery_capacity_kwh - 2_600.0).abs() < 1e-9);
        let expected_cost = InstallationCostModel::default().estimate(rec.recommended_pv_power_kwc, 2_600.0);
        assert!((rec.installation_cost - expected_cost).abs() < 1e-6);
        assert!(matches!(rec.roi_years, RoiYears::Years(y) if y > 0.0));
    }

    #[test]
    fn test_zero_consumption_has_no_payback() {
        let rec = size(0.0, IrradiationClass::A).unwrap();
        assert_eq!(rec.autonomy_percent, 0.0);
        assert_eq!(rec.annual_savings, 0.0);
        assert_eq!(rec.roi_years, RoiYears::NoPayback);
    }

    #[test]
    fn test_negative_or_nan_consumption_rejected() {
        assert_eq!(
            size(f64::NAN, IrradiationClass::C),
            Err(DomainValidationError::NonFiniteValue {
                field: "monthly_consumption_kwh"
            })
        );
        assert_eq!(
            size(-3_000.0, IrradiationClass::C),
            Err(DomainValidationError::NegativeValue {
                field: "monthly_consumption_kwh",
                value: -3_000.0
            })
        );
        assert!(size(f64::INFINITY, IrradiationClass::C).is_err());
    }

    #[test]
    fn test_negative_price_or_surface_rejected() {
        let negative_price = SizingOptions {
            price_per_kwh: -1.2,
            ..SizingOptions::default()
        };
        assert!(size_with(10_000.0, IrradiationClass::B, &negative_price).is_err());

        let negative_surface = SizingOptions {
            installable_surface_m2: Some(-50.0),
            ..SizingOptions::default()
        };
        assert!(size_with(10_000.0, IrradiationClass::B, &negative_surface).is_err());
    }

    #[test]
    fn test_profile_uses_installable_surface_for_autonomy() {
        // CHU x 10 beds = 200 kWh/day, 6000 kWh/month; 100 m² in C makes 2160 kWh/month
        let profile = EstablishmentProfile::new(EstablishmentType::Chu, 10).with_surface(100.0);
        let sized = size_for_profile(&profile, &SizingOptions::default()).unwrap();
        assert!((sized.monthly_consumption_kwh - 6_000.0).abs() < 1e-9);
        assert!((sized.recommendation.autonomy_percent - 36.0).abs() < 1e-9);
        assert!((sized.daily_critical_consumption_kwh - 120.0).abs() < 1e-9);
        assert!((sized.estimated_patients - 8.0).abs() < 1e-9);
        assert!(sized.existing_pv.is_none());
    }

    #[test]
    fn test_profile_reports_existing_pv_baseline() {
        let profile = EstablishmentProfile::new(EstablishmentType::Umh, 20)
            .with_monthly_consumption(4_320.0)
            .with_irradiation_class(IrradiationClass::C)
            .with_existing_pv(20.0);
        let sized = size_for_profile(&profile, &SizingOptions::default()).unwrap();
        let baseline = sized.existing_pv.unwrap();
        assert!((baseline.surface_m2 - 100.0).abs() < 1e-9);
        assert!((baseline.autonomy_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_profile_validation_is_enforced() {
        let profile = EstablishmentProfile::new(EstablishmentType::Umh, 0);
        assert_eq!(
            size_for_profile(&profile, &SizingOptions::default()),
            Err(DomainValidationError::NonPositiveBedCount)
        );
    }
}
