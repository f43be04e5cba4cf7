use serde::Serialize;

use crate::domain::EstablishmentType;

pub const DAYS_PER_MONTH: f64 = 30.0;
pub const OCCUPANCY_FACTOR: f64 = 0.80;

/// Per-type consumption intensity and critical/non-critical split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConsumptionRatios {
    pub kwh_per_bed_per_day: f64,
    pub critical_ratio: f64,
    pub non_critical_ratio: f64,
}

impl ConsumptionRatios {
    const fn new(kwh_per_bed_per_day: f64, critical_ratio: f64, non_critical_ratio: f64) -> Self {
        Self {
            kwh_per_bed_per_day,
            critical_ratio,
            non_critical_ratio,
        }
    }
}

/// Used for categories with no dedicated entry.
pub const DEFAULT_RATIOS: ConsumptionRatios = ConsumptionRatios::new(12.0, 0.50, 0.50);

pub struct ConsumptionModel;

impl ConsumptionModel {
    pub fn ratios(kind: EstablishmentType) -> ConsumptionRatios {
        use EstablishmentType::*;
        match kind {
            Chu => ConsumptionRatios::new(20.0, 0.60, 0.40),
            HopitalRegional => ConsumptionRatios::new(16.0, 0.55, 0.45),
            HopitalProvincial => ConsumptionRatios::new(14.0, 0.50, 0.50),
            CentreRegionalOncologie => ConsumptionRatios::new(18.0, 0.65, 0.35),
            CentreHemodialyse => ConsumptionRatios::new(22.0, 0.70, 0.30),
            CentreReeducation => ConsumptionRatios::new(12.0, 0.45, 0.55),
            CentreAddictologie => ConsumptionRatios::new(10.0, 0.40, 0.60),
            Umh => ConsumptionRatios::new(15.0, 0.60, 0.40),
            Ump => ConsumptionRatios::new(12.0, 0.50, 0.50),
            Uph => ConsumptionRatios::new(10.0, 0.45, 0.55),
            CentreSantePrimaire => ConsumptionRatios::new(7.5, 0.40, 0.60),
            CliniquePrivee => ConsumptionRatios::new(11.5, 0.45, 0.55),
            HopitalPrefectoral | CentreSoinsPalliatifs => DEFAULT_RATIOS,
        }
    }

    pub fn daily_consumption_kwh(kind: EstablishmentType, beds: u32) -> f64 {
        Self::ratios(kind).kwh_per_bed_per_day * f64::from(beds)
    }

    pub fn daily_critical_consumption_kwh(kind: EstablishmentType, beds: u32) -> f64 {
        Self::daily_consumption_kwh(kind, beds) * Self::ratios(kind).critical_ratio
    }

    pub fn daily_non_critical_consumption_kwh(kind: EstablishmentType, beds: u32) -> f64 {
        Self::daily_consumption_kwh(kind, beds) * Self::ratios(kind).non_critical_ratio
    }

    pub fn monthly_consumption_kwh(kind: EstablishmentType, beds: u32) -> f64 {
        Self::daily_consumption_kwh(kind, beds) * DAYS_PER_MONTH
    }

    pub fn estimated_patients(beds: u32) -> f64 {
        f64::from(beds) * OCCUPANCY_FACTOR
    }
}
