use thiserror::Error;

/// Malformed establishment or battery input, rejected before any step runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainValidationError {
    #[error("bed count must be positive")]
    NonPositiveBedCount,
    #[error("{field} must be >= 0 (got {value})")]
    NegativeValue { field: &'static str, value: f64 },
    #[error("{field} must be a finite number")]
    NonFiniteValue { field: &'static str },
    #[error("battery capacity must be positive (got {0} kWh)")]
    NonPositiveCapacity(f64),
    #[error("invalid SOC window: min fraction {min} must be >= 0, < max fraction {max}, and max <= 1")]
    InvalidSocWindow { min: f64, max: f64 },
    #[error("{field} must be positive (got {value} kW)")]
    NonPositiveRatePower { field: &'static str, value: f64 },
    #[error("simulation horizon must be at least one day")]
    ZeroDays,
    #[error("simulation horizon of {days} days exceeds the {max} day limit")]
    HorizonTooLong { days: u32, max: u32 },
    #[error("simulation horizon runs past the representable calendar")]
    HorizonOutOfRange,
}

impl DomainValidationError {
    /// Checks that `value` is finite and not negative.
    pub(crate) fn check_non_negative(field: &'static str, value: f64) -> Result<(), Self> {
        if !value.is_finite() {
            return Err(Self::NonFiniteValue { field });
        }
        if value < 0.0 {
            return Err(Self::NegativeValue { field, value });
        }
        Ok(())
    }
}

/// Any failure talking to the external predictor.
///
/// Timeouts, refused connections, non-2xx responses and malformed payloads
/// all land here; callers only ever care that the call did not produce a value.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed: {message}")]
pub struct ExternalServiceError {
    pub operation: &'static str,
    pub message: String,
}

impl ExternalServiceError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }

    pub fn transport(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::new(operation, format!("transport error: {err}"))
    }

    pub fn status(operation: &'static str, status: u16, body: &str) -> Self {
        Self::new(operation, format!("HTTP {status}: {body}"))
    }

    pub fn decode(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::new(operation, format!("malformed payload: {err}"))
    }

    pub fn disabled(operation: &'static str) -> Self {
        Self::new(operation, "predictor disabled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_negative_check() {
        assert!(DomainValidationError::check_non_negative("x", 0.0).is_ok());
        assert_eq!(
            DomainValidationError::check_non_negative("x", -1.0),
            Err(DomainValidationError::NegativeValue { field: "x", value: -1.0 })
        );
        assert_eq!(
            DomainValidationError::check_non_negative("x", f64::NAN),
            Err(DomainValidationError::NonFiniteValue { field: "x" })
        );
    }

    #[test]
    fn test_external_error_display() {
        let err = ExternalServiceError::status("predict_consumption", 503, "busy");
        assert_eq!(err.to_string(), "predict_consumption failed: HTTP 503: busy");
    }
}
