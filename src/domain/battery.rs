use serde::{Deserialize, Serialize};

use crate::error::DomainValidationError;

pub const DEFAULT_SOC_MIN_FRACTION: f64 = 0.15;
pub const DEFAULT_SOC_MAX_FRACTION: f64 = 0.95;
pub const DEFAULT_CHARGE_MAX_KW: f64 = 200.0;
pub const DEFAULT_DISCHARGE_MAX_KW: f64 = 200.0;

/// Storage bank seen by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryParameters {
    pub capacity_kwh: f64,
    pub soc_min_fraction: f64,
    pub soc_max_fraction: f64,
    pub charge_max_kw: f64,
    pub discharge_max_kw: f64,
}

impl BatteryParameters {
    /// Battery with the default SOC window and rate limits.
    pub fn new(capacity_kwh: f64) -> Result<Self, DomainValidationError> {
        let params = Self {
            capacity_kwh,
            soc_min_fraction: DEFAULT_SOC_MIN_FRACTION,
            soc_max_fraction: DEFAULT_SOC_MAX_FRACTION,
            charge_max_kw: DEFAULT_CHARGE_MAX_KW,
            discharge_max_kw: DEFAULT_DISCHARGE_MAX_KW,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_soc_window(mut self, min: f64, max: f64) -> Result<Self, DomainValidationError> {
        self.soc_min_fraction = min;
        self.soc_max_fraction = max;
        self.validate()?;
        Ok(self)
    }

    pub fn with_rate_limits(
        mut self,
        charge_max_kw: f64,
        discharge_max_kw: f64,
    ) -> Result<Self, DomainValidationError> {
        self.charge_max_kw = charge_max_kw;
        self.discharge_max_kw = discharge_max_kw;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), DomainValidationError> {
        if !self.capacity_kwh.is_finite() || self.capacity_kwh <= 0.0 {
            return Err(DomainValidationError::NonPositiveCapacity(self.capacity_kwh));
        }
        let (min, max) = (self.soc_min_fraction, self.soc_max_fraction);
        if !(min.is_finite() && max.is_finite()) || min < 0.0 || min >= max || max > 1.0 {
            return Err(DomainValidationError::InvalidSocWindow { min, max });
        }
        for (field, value) in [
            ("charge_max_kw", self.charge_max_kw),
            ("discharge_max_kw", self.discharge_max_kw),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DomainValidationError::NonPositiveRatePower { field, value });
            }
        }
        Ok(())
    }

    pub fn soc_min_kwh(&self) -> f64 {
        self.capacity_kwh * self.soc_min_fraction
    }

    pub fn soc_max_kwh(&self) -> f64 {
        self.capacity_kwh * self.soc_max_fraction
    }
}
