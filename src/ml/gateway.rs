use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{AnomalyTag, BatteryParameters};
use crate::error::ExternalServiceError;
use crate::optimizer::DispatchDecision;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionContext {
    pub datetime: NaiveDateTime,
    pub temperature_c: f64,
    pub irradiance_kwh_m2: f64,
    pub pv_kwh: f64,
    pub patients: f64,
    pub soc_kwh: Option<f64>,
    pub event: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PvContext {
    pub datetime: NaiveDateTime,
    pub irradiance_kwh_m2: f64,
    pub temperature_c: f64,
    pub surface_m2: f64,
    /// PV of earlier steps in this run, oldest first.
    pub historical_pv: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchContext {
    pub pred_kwh: f64,
    pub pv_kwh: f64,
    pub soc_kwh: f64,
    pub battery: BatteryParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyContext {
    pub consumption: f64,
    pub predicted_consumption: f64,
    pub pv_production: f64,
    pub expected_pv: f64,
    pub soc: f64,
    pub temperature_c: f64,
    pub irradiance_kwh_m2: f64,
}

/// External predictor capabilities. Each call either yields a value or fails;
/// callers pick the fallback.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PredictionGateway: Send + Sync {
    async fn predict_consumption(&self, ctx: &ConsumptionContext) -> Result<f64, ExternalServiceError>;

    async fn predict_pv_production(&self, ctx: &PvContext) -> Result<f64, ExternalServiceError>;

    async fn optimize_dispatch(&self, ctx: &DispatchContext) -> Result<DispatchDecision, ExternalServiceError>;

    async fn detect_anomaly(&self, ctx: &AnomalyContext) -> Result<AnomalyTag, ExternalServiceError>;
}

/// Anomaly tagging is advisory; a failed call becomes [`AnomalyTag::unavailable`].
pub async fn detect_anomaly_or_degraded(gateway: &dyn PredictionGateway, ctx: &AnomalyContext) -> AnomalyTag {
    match gateway.detect_anomaly(ctx).await {
        Ok(tag) => tag,
        Err(e) => {
            warn!(error = %e, "anomaly detection unavailable");
            AnomalyTag::unavailable()
        }
    }
}

/// Gateway used when no predictor is configured. Every call fails, so the
/// deterministic models carry the whole simulation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGateway;

#[async_trait]
impl PredictionGateway for OfflineGateway {
    async fn predict_consumption(&self, _ctx: &ConsumptionContext) -> Result<f64, ExternalServiceError> {
        Err(ExternalServiceError::disabled("predict_consumption"))
    }

    async fn predict_pv_production(&self, _ctx: &PvContext) -> Result<f64, ExternalServiceError> {
        Err(ExternalServiceError::disabled("predict_pv_production"))
    }

    async fn optimize_dispatch(&self, _ctx: &DispatchContext) -> Result<DispatchDecision, ExternalServiceError> {
        Err(ExternalServiceError::disabled("optimize_dispatch"))
    }

    async fn detect_anomaly(&self, _ctx: &AnomalyContext) -> Result<AnomalyTag, ExternalServiceError> {
        Err(ExternalServiceError::disabled("detect_anomaly"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anomaly_ctx() -> AnomalyContext {
        AnomalyContext {
            consumption: 200.0,
            predicted_consumption: 200.0,
            pv_production: 40.0,
            expected_pv: 42.0,
            soc: 250.0,
            temperature_c: 25.0,
            irradiance_kwh_m2: 1.1,
        }
    }

    #[tokio::test]
    async fn test_offline_anomaly_degrades() {
        let tag = detect_anomaly_or_degraded(&OfflineGateway, &anomaly_ctx()).await;
        assert_eq!(tag, AnomalyTag::unavailable());
    }

    #[tokio::test]
    async fn test_detected_anomaly_passes_through() {
        let mut mock = MockPredictionGateway::new();
        mock.expect_detect_anomaly().times(1).returning(|_| {
            Ok(AnomalyTag {
                is_anomaly: true,
                anomaly_type: "pv_drop".to_string(),
                score: 0.9,
                recommendation: "inspect panels".to_string(),
            })
        });
        let tag = detect_anomaly_or_degraded(&mock, &anomaly_ctx()).await;
        assert!(tag.is_anomaly);
        assert_eq!(tag.anomaly_type, "pv_drop");
    }
}
