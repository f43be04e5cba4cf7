use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::DomainValidationError;

/// Healthcare facility categories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum EstablishmentType {
    Chu,
    HopitalRegional,
    HopitalPrefectoral,
    HopitalProvincial,
    CentreRegionalOncologie,
    CentreHemodialyse,
    CentreReeducation,
    CentreAddictologie,
    CentreSoinsPalliatifs,
    Umh,
    Ump,
    Uph,
    CentreSantePrimaire,
    CliniquePrivee,
}

/// Solar resource tier, `A` being the sunniest.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum IrradiationClass {
    A,
    B,
    #[default]
    C,
    D,
}

/// Facility description consumed by sizing and simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstablishmentProfile {
    pub establishment_type: EstablishmentType,
    pub bed_count: u32,
    #[serde(default)]
    pub installable_surface_m2: Option<f64>,
    #[serde(default)]
    pub monthly_consumption_kwh: Option<f64>,
    #[serde(default)]
    pub irradiation_class: Option<IrradiationClass>,
    #[serde(default)]
    pub existing_pv_power_kwc: Option<f64>,
}

impl EstablishmentProfile {
    pub fn new(establishment_type: EstablishmentType, bed_count: u32) -> Self {
        Self {
            establishment_type,
            bed_count,
            installable_surface_m2: None,
            monthly_consumption_kwh: None,
            irradiation_class: None,
            existing_pv_power_kwc: None,
        }
    }

    pub fn with_surface(mut self, m2: f64) -> Self {
        self.installable_surface_m2 = Some(m2);
        self
    }

    pub fn with_monthly_consumption(mut self, kwh: f64) -> Self {
        self.monthly_consumption_kwh = Some(kwh);
        self
    }

    pub fn with_irradiation_class(mut self, class: IrradiationClass) -> Self {
        self.irradiation_class = Some(class);
        self
    }

    pub fn with_existing_pv(mut self, kwc: f64) -> Self {
        self.existing_pv_power_kwc = Some(kwc);
        self
    }

    /// Irradiation class, defaulting to `C` when unknown.
    pub fn resolved_class(&self) -> IrradiationClass {
        self.irradiation_class.unwrap_or_default()
    }

    /// Installable surface, `0` when absent.
    pub fn surface_m2(&self) -> f64 {
        self.installable_surface_m2.unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<(), DomainValidationError> {
        if self.bed_count == 0 {
            return Err(DomainValidationError::NonPositiveBedCount);
        }
        if let Some(v) = self.installable_surface_m2 {
            DomainValidationError::check_non_negative("installable_surface_m2", v)?;
        }
        if let Some(v) = self.monthly_consumption_kwh {
            DomainValidationError::check_non_negative("monthly_consumption_kwh", v)?;
        }
        if let Some(v) = self.existing_pv_power_kwc {
            DomainValidationError::check_non_negative("existing_pv_power_kwc", v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_type_names_round_trip_through_strum_and_serde() {
        assert_eq!(EstablishmentType::HopitalRegional.to_string(), "HOPITAL_REGIONAL");
        assert_eq!(
            EstablishmentType::from_str("centre_hemodialyse").unwrap(),
            EstablishmentType::CentreHemodialyse
        );
        let json = serde_json::to_string(&EstablishmentType::Chu).unwrap();
        assert_eq!(json, "\"CHU\"");
    }

    #[test]
    fn test_class_defaults_to_c() {
        let profile = EstablishmentProfile::new(EstablishmentType::Umh, 10);
        assert_eq!(profile.resolved_class(), IrradiationClass::C);
        assert_eq!(IrradiationClass::from_str("a").unwrap(), IrradiationClass::A);
    }

    #[test]
    fn test_validate_rejects_bad_profiles() {
        let zero_beds = EstablishmentProfile::new(EstablishmentType::Chu, 0);
        assert_eq!(zero_beds.validate(), Err(DomainValidationError::NonPositiveBedCount));

        let negative_surface = EstablishmentProfile::new(EstablishmentType::Chu, 5).with_surface(-1.0);
        assert!(matches!(
            negative_surface.validate(),
            Err(DomainValidationError::NegativeValue { field: "installable_surface_m2", .. })
        ));

        let ok = EstablishmentProfile::new(EstablishmentType::Chu, 5)
            .with_surface(0.0)
            .with_monthly_consumption(1000.0);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_profile_deserializes_with_missing_optionals() {
        let profile: EstablishmentProfile =
            serde_json::from_str(r#"{"establishment_type":"UPH","bed_count":12}"#).unwrap();
        assert_eq!(profile.establishment_type, EstablishmentType::Uph);
        assert_eq!(profile.installable_surface_m2, None);
    }
}
