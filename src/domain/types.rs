use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// Simulation Output
// ============================================================================

/// Advisory anomaly classification for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyTag {
    pub is_anomaly: bool,
    pub anomaly_type: String,
    pub score: f64,
    pub recommendation: String,
}

impl AnomalyTag {
    /// Tag used when the anomaly detector could not be reached.
    pub fn unavailable() -> Self {
        Self {
            is_anomaly: false,
            anomaly_type: "normal".to_string(),
            score: 0.0,
            recommendation: "Anomaly detection service unavailable".to_string(),
        }
    }
}

/// Where a step quantity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Predictor,
    Corrected,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherOrigin {
    Recorded,
    Synthesized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSources {
    pub weather: WeatherOrigin,
    pub pv: ValueSource,
    pub consumption: ValueSource,
    pub dispatch: ValueSource,
}

/// One 6-hour bucket of the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationStep {
    pub timestamp: NaiveDateTime,
    pub predicted_consumption_kwh: f64,
    pub pv_production_kwh: f64,
    pub soc_kwh: f64,
    pub grid_import_kwh: f64,
    pub battery_charge_kwh: f64,
    pub battery_discharge_kwh: f64,
    pub anomaly: Option<AnomalyTag>,
    pub sources: StepSources,
    pub note: String,
}

/// Ordered step series plus aggregates derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    steps: Vec<SimulationStep>,
    total_consumption: f64,
    total_pv_production: f64,
    total_grid_import: f64,
    average_autonomy_percent: f64,
    total_savings: f64,
}

impl SimulationResult {
    pub fn from_steps(steps: Vec<SimulationStep>, price_per_kwh: f64) -> Self {
        let total_consumption: f64 = steps.iter().map(|s| s.predicted_consumption_kwh).sum();
        let total_pv_production: f64 = steps.iter().map(|s| s.pv_production_kwh).sum();
        let total_grid_import: f64 = steps.iter().map(|s| s.grid_import_kwh).sum();

        let average_autonomy_percent = if total_consumption > 0.0 {
            (total_pv_production / total_consumption * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        Self {
            total_savings: total_pv_production * price_per_kwh,
            steps,
            total_consumption,
            total_pv_production,
            total_grid_import,
            average_autonomy_percent,
        }
    }

    pub fn steps(&self) -> &[SimulationStep] {
        &self.steps
    }

    pub fn total_consumption(&self) -> f64 {
        self.total_consumption
    }

    pub fn total_pv_production(&self) -> f64 {
        self.total_pv_production
    }

    pub fn total_grid_import(&self) -> f64 {
        self.total_grid_import
    }

    pub fn average_autonomy_percent(&self) -> f64 {
        self.average_autonomy_percent
    }

    pub fn total_savings(&self) -> f64 {
        self.total_savings
    }

    pub fn anomaly_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.anomaly.as_ref().is_some_and(|a| a.is_anomaly))
            .count()
    }

    pub fn fallback_dispatch_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.sources.dispatch == ValueSource::Fallback)
            .count()
    }
}

// ============================================================================
// Sizing Output
// ============================================================================

/// Payback period. Serialized as a number, or `null` when savings are zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum RoiYears {
    Years(f64),
    NoPayback,
}

impl RoiYears {
    pub fn years(&self) -> Option<f64> {
        match self {
            RoiYears::Years(y) => Some(*y),
            RoiYears::NoPayback => None,
        }
    }
}

impl From<Option<f64>> for RoiYears {
    fn from(v: Option<f64>) -> Self {
        v.map_or(RoiYears::NoPayback, RoiYears::Years)
    }
}

impl From<RoiYears> for Option<f64> {
    fn from(v: RoiYears) -> Self {
        v.years()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingRecommendation {
    pub recommended_pv_power_kwc: f64,
    pub recommended_pv_surface_m2: f64,
    pub recommended_battery_capacity_kwh: f64,
    pub autonomy_percent: f64,
    pub annual_savings: f64,
    pub installation_cost: f64,
    pub roi_years: RoiYears,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn step(consumption: f64, pv: f64, grid: f64, dispatch: ValueSource) -> SimulationStep {
        SimulationStep {
            timestamp: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            predicted_consumption_kwh: consumption,
            pv_production_kwh: pv,
            soc_kwh: 100.0,
            grid_import_kwh: grid,
            battery_charge_kwh: 0.0,
            battery_discharge_kwh: 0.0,
            anomaly: None,
            sources: StepSources {
                weather: WeatherOrigin::Synthesized,
                pv: ValueSource::Fallback,
                consumption: ValueSource::Fallback,
                dispatch,
            },
            note: String::new(),
        }
    }

    #[test]
    fn test_aggregates_follow_steps() {
        let result = SimulationResult::from_steps(
            vec![
                step(200.0, 50.0, 150.0, ValueSource::Fallback),
                step(200.0, 30.0, 170.0, ValueSource::Predictor),
            ],
            1.2,
        );
        assert_eq!(result.total_consumption(), 400.0);
        assert_eq!(result.total_pv_production(), 80.0);
        assert_eq!(result.total_grid_import(), 320.0);
        assert!((result.average_autonomy_percent() - 20.0).abs() < 1e-9);
        assert!((result.total_savings() - 96.0).abs() < 1e-9);
        assert_eq!(result.fallback_dispatch_count(), 1);
    }

    #[test]
    fn test_empty_consumption_gives_zero_autonomy() {
        let result = SimulationResult::from_steps(vec![step(0.0, 10.0, 0.0, ValueSource::Fallback)], 1.2);
        assert_eq!(result.average_autonomy_percent(), 0.0);
    }

    #[test]
    fn test_roi_serializes_no_payback_as_null() {
        assert_eq!(serde_json::to_string(&RoiYears::NoPayback).unwrap(), "null");
        assert_eq!(serde_json::to_string(&RoiYears::Years(4.5)).unwrap(), "4.5");
        let back: RoiYears = serde_json::from_str("null").unwrap();
        assert_eq!(back, RoiYears::NoPayback);
    }
}
