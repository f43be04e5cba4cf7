use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::gateway::{AnomalyContext, ConsumptionContext, DispatchContext, PredictionGateway, PvContext};
use crate::domain::AnomalyTag;
use crate::error::ExternalServiceError;
use crate::optimizer::DispatchDecision;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-over-HTTP predictor client. Single attempt per call, no retries.
#[derive(Clone)]
pub struct HttpPredictionGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpPredictionGateway {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_timeouts(base_url, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }

    pub fn with_timeouts(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("hospital-microgrid/0.2"));
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B, R>(&self, operation: &'static str, path: &str, body: &B) -> Result<R, ExternalServiceError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ExternalServiceError::transport(operation, e))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ExternalServiceError::transport(operation, e))?;
        if !status.is_success() {
            return Err(ExternalServiceError::status(operation, status.as_u16(), &text));
        }
        debug!(operation, %status, "predictor responded");
        serde_json::from_str(&text).map_err(|e| ExternalServiceError::decode(operation, e))
    }

    /// Probes `GET /health`.
    pub async fn health_check(&self) -> Result<PredictorHealth, ExternalServiceError> {
        const OP: &str = "health_check";
        let resp = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| ExternalServiceError::transport(OP, e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExternalServiceError::status(OP, status.as_u16(), &body));
        }
        resp.json().await.map_err(|e| ExternalServiceError::decode(OP, e))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictorHealth {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
}

// Wire formats of the predictor service.

#[derive(Serialize)]
struct PredictRequest<'a> {
    datetime: NaiveDateTime,
    #[serde(rename = "temperature_C")]
    temperature_c: f64,
    #[serde(rename = "irradiance_kWh_m2")]
    irradiance_kwh_m2: f64,
    #[serde(rename = "pv_prod_kWh")]
    pv_prod_kwh: f64,
    patients: f64,
    #[serde(rename = "soc_batterie_kWh", skip_serializing_if = "Option::is_none")]
    soc_batterie_kwh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<&'a str>,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(rename = "pred_kWh", alias = "predicted_consumption_kWh")]
    pred_kwh: f64,
}

#[derive(Serialize)]
struct PvPredictRequest<'a> {
    datetime: NaiveDateTime,
    #[serde(rename = "irradiance_kWh_m2")]
    irradiance_kwh_m2: f64,
    #[serde(rename = "temperature_C")]
    temperature_c: f64,
    surface_m2: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    historical_pv: Option<&'a [f64]>,
}

#[derive(Deserialize)]
struct PvPredictResponse {
    #[serde(rename = "predicted_pv_kWh")]
    predicted_pv_kwh: f64,
}

#[derive(Serialize)]
#[allow(non_snake_case)]
struct OptimizeRequest {
    pred_kWh: f64,
    pv_kWh: f64,
    soc_kwh: f64,
    BATTERY_CAP_KWH: f64,
    SOC_MIN: f64,
    SOC_MAX: f64,
    CHARGE_MAX_KW: f64,
    DISCHARGE_MAX_KW: f64,
}

#[derive(Deserialize)]
struct OptimizeResponse {
    #[serde(rename = "grid_import_kWh")]
    grid_import_kwh: f64,
    #[serde(rename = "battery_charge_kWh")]
    battery_charge_kwh: f64,
    #[serde(rename = "battery_discharge_kWh")]
    battery_discharge_kwh: f64,
    soc_next: f64,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Serialize)]
struct AnomalyRequest {
    consumption: f64,
    predicted_consumption: f64,
    pv_production: f64,
    expected_pv: f64,
    soc: f64,
    #[serde(rename = "temperature_C")]
    temperature_c: f64,
    #[serde(rename = "irradiance_kWh_m2")]
    irradiance_kwh_m2: f64,
}

#[derive(Deserialize)]
struct AnomalyResponse {
    #[serde(default)]
    is_anomaly: bool,
    #[serde(default)]
    anomaly_score: f64,
    #[serde(default = "normal_type")]
    anomaly_type: String,
    #[serde(default = "no_action")]
    recommendation: String,
}

fn normal_type() -> String {
    "normal".to_string()
}

fn no_action() -> String {
    "No action needed".to_string()
}

#[async_trait]
impl PredictionGateway for HttpPredictionGateway {
    async fn predict_consumption(&self, ctx: &ConsumptionContext) -> Result<f64, ExternalServiceError> {
        let body = PredictRequest {
            datetime: ctx.datetime,
            temperature_c: ctx.temperature_c,
            irradiance_kwh_m2: ctx.irradiance_kwh_m2,
            pv_prod_kwh: ctx.pv_kwh,
            patients: ctx.patients,
            soc_batterie_kwh: ctx.soc_kwh,
            event: ctx.event.as_deref(),
        };
        let resp: PredictResponse = self.post("predict_consumption", "/predict", &body).await?;
        Ok(resp.pred_kwh)
    }

    async fn predict_pv_production(&self, ctx: &PvContext) -> Result<f64, ExternalServiceError> {
        let body = PvPredictRequest {
            datetime: ctx.datetime,
            irradiance_kwh_m2: ctx.irradiance_kwh_m2,
            temperature_c: ctx.temperature_c,
            surface_m2: ctx.surface_m2,
            historical_pv: (!ctx.historical_pv.is_empty()).then_some(ctx.historical_pv.as_slice()),
        };
        let resp: PvPredictResponse = self.post("predict_pv_production", "/predict/pv", &body).await?;
        Ok(resp.predicted_pv_kwh)
    }

    async fn optimize_dispatch(&self, ctx: &DispatchContext) -> Result<DispatchDecision, ExternalServiceError> {
        let b = &ctx.battery;
        let body = OptimizeRequest {
            pred_kWh: ctx.pred_kwh,
            pv_kWh: ctx.pv_kwh,
            soc_kwh: ctx.soc_kwh,
            BATTERY_CAP_KWH: b.capacity_kwh,
            SOC_MIN: b.soc_min_fraction,
            SOC_MAX: b.soc_max_fraction,
            CHARGE_MAX_KW: b.charge_max_kw,
            DISCHARGE_MAX_KW: b.discharge_max_kw,
        };
        let resp: OptimizeResponse = self.post("optimize_dispatch", "/optimize", &body).await?;
        Ok(DispatchDecision {
            grid_import_kwh: resp.grid_import_kwh,
            battery_charge_kwh: resp.battery_charge_kwh,
            battery_discharge_kwh: resp.battery_discharge_kwh,
            soc_next_kwh: resp.soc_next,
            note: resp.note,
        })
    }

    async fn detect_anomaly(&self, ctx: &AnomalyContext) -> Result<AnomalyTag, ExternalServiceError> {
        let body = AnomalyRequest {
            consumption: ctx.consumption,
            predicted_consumption: ctx.predicted_consumption,
            pv_production: ctx.pv_production,
            expected_pv: ctx.expected_pv,
            soc: ctx.soc,
            temperature_c: ctx.temperature_c,
            irradiance_kwh_m2: ctx.irradiance_kwh_m2,
        };
        let resp: AnomalyResponse = self.post("detect_anomaly", "/detect/anomalies", &body).await?;
        Ok(AnomalyTag {
            is_anomaly: resp.is_anomaly,
            anomaly_type: resp.anomaly_type,
            score: resp.anomaly_score,
            recommendation: resp.recommendation,
        })
    }
}
