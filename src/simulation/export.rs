use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::io::Write;

use crate::domain::{SimulationResult, ValueSource, WeatherOrigin};

/// Flat CSV row for one step.
#[derive(Debug, Serialize)]
struct StepRecord<'a> {
    timestamp: NaiveDateTime,
    predicted_consumption_kwh: f64,
    pv_production_kwh: f64,
    soc_kwh: f64,
    grid_import_kwh: f64,
    battery_charge_kwh: f64,
    battery_discharge_kwh: f64,
    is_anomaly: bool,
    anomaly_type: &'a str,
    anomaly_score: f64,
    weather: WeatherOrigin,
    pv_source: ValueSource,
    consumption_source: ValueSource,
    dispatch_source: ValueSource,
    note: &'a str,
}

pub fn write_steps_csv<W: Write>(result: &SimulationResult, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for step in result.steps() {
        let (is_anomaly, anomaly_type, anomaly_score) = step
            .anomaly
            .as_ref()
            .map_or((false, "", 0.0), |a| (a.is_anomaly, a.anomaly_type.as_str(), a.score));
        writer
            .serialize(StepRecord {
                timestamp: step.timestamp,
                predicted_consumption_kwh: step.predicted_consumption_kwh,
                pv_production_kwh: step.pv_production_kwh,
                soc_kwh: step.soc_kwh,
                grid_import_kwh: step.grid_import_kwh,
                battery_charge_kwh: step.battery_charge_kwh,
                battery_discharge_kwh: step.battery_discharge_kwh,
                is_anomaly,
                anomaly_type,
                anomaly_score,
                weather: step.sources.weather,
                pv_source: step.sources.pv,
                consumption_source: step.sources.consumption,
                dispatch_source: step.sources.dispatch,
                note: &step.note,
            })
            .context("failed to write step row")?;
    }
    writer.flush().context("failed to flush step CSV")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EstablishmentProfile, EstablishmentType};
    use crate::forecast::NoWeatherData;
    use crate::ml::OfflineGateway;
    use crate::simulation::SimulationEngine;
    use chrono::NaiveDate;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_writes_header_and_one_row_per_step() {
        let engine = SimulationEngine::new(Arc::new(OfflineGateway), Arc::new(NoWeatherData));
        let profile = EstablishmentProfile::new(EstablishmentType::Ump, 10).with_surface(50.0);
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let result = engine.simulate(&profile, start, 1, 200.0, 100.0, 1.2).await.unwrap();

        let mut out = Vec::new();
        write_steps_csv(&result, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("timestamp,predicted_consumption_kwh"));
        assert!(lines[1].starts_with("2024-01-01T00:00:00,"));
        assert!(lines[1].contains("synthesized,fallback,fallback,fallback"));
    }
}
