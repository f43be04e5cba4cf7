use chrono::{Duration, NaiveDateTime};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::domain::{
    AnomalyTag, BatteryParameters, EstablishmentProfile, SimulationResult, SimulationStep, StepSources,
    ValueSource, WeatherOrigin, DEFAULT_CHARGE_MAX_KW, DEFAULT_DISCHARGE_MAX_KW, DEFAULT_SOC_MAX_FRACTION,
    DEFAULT_SOC_MIN_FRACTION,
};
use crate::error::DomainValidationError;
use crate::forecast::{
    bucket_start, synthesize_weather, ConsumptionModel, PvModel, WeatherSample, WeatherSource, DAYS_PER_MONTH,
};
use crate::ml::{
    detect_anomaly_or_degraded, AnomalyContext, ConsumptionContext, DispatchContext, PredictionGateway, PvContext,
    ResultValidator,
};
use crate::optimizer::{DispatchDecision, GreedyDispatcher};
use crate::sizing::DEFAULT_PRICE_PER_KWH;

pub const STEPS_PER_DAY: u32 = 4;
pub const STEP_HOURS: i64 = 6;
/// Ten years of 6-hour steps.
pub const MAX_SIMULATION_DAYS: u32 = 3_660;
pub const DEFAULT_BATTERY_CAPACITY_KWH: f64 = 500.0;
pub const DEFAULT_INITIAL_SOC_FRACTION: f64 = 0.5;

/// Battery operating limits applied to every simulated bank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub soc_min_fraction: f64,
    pub soc_max_fraction: f64,
    pub charge_max_kw: f64,
    pub discharge_max_kw: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            soc_min_fraction: DEFAULT_SOC_MIN_FRACTION,
            soc_max_fraction: DEFAULT_SOC_MAX_FRACTION,
            charge_max_kw: DEFAULT_CHARGE_MAX_KW,
            discharge_max_kw: DEFAULT_DISCHARGE_MAX_KW,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRequest {
    pub profile: EstablishmentProfile,
    pub start: NaiveDateTime,
    pub days: u32,
    pub battery_capacity_kwh: f64,
    pub initial_soc_kwh: f64,
    pub price_per_kwh: f64,
}

impl SimulationRequest {
    pub fn new(
        profile: EstablishmentProfile,
        start: NaiveDateTime,
        days: u32,
        battery_capacity_kwh: f64,
        initial_soc_kwh: f64,
    ) -> Self {
        Self {
            profile,
            start,
            days,
            battery_capacity_kwh,
            initial_soc_kwh,
            price_per_kwh: DEFAULT_PRICE_PER_KWH,
        }
    }

    /// Fills a missing capacity with 500 kWh and a missing initial SOC with
    /// half of the capacity in use.
    pub fn with_battery_defaults(
        profile: EstablishmentProfile,
        start: NaiveDateTime,
        days: u32,
        battery_capacity_kwh: Option<f64>,
        initial_soc_kwh: Option<f64>,
    ) -> Self {
        let capacity = battery_capacity_kwh.unwrap_or(DEFAULT_BATTERY_CAPACITY_KWH);
        let initial = initial_soc_kwh.unwrap_or(capacity * DEFAULT_INITIAL_SOC_FRACTION);
        Self::new(profile, start, days, capacity, initial)
    }

    pub fn with_price(mut self, price_per_kwh: f64) -> Self {
        self.price_per_kwh = price_per_kwh;
        self
    }
}

/// Stepped 6-hour simulation over a shared predictor and weather source.
///
/// The engine holds no per-run state; the running SOC lives in each
/// `simulate` call, so one engine can serve concurrent runs.
#[derive(Clone)]
pub struct SimulationEngine {
    gateway: Arc<dyn PredictionGateway>,
    weather: Arc<dyn WeatherSource>,
    settings: EngineSettings,
}

/// Per-run inputs that stay fixed across steps.
struct RunContext<'a> {
    profile: &'a EstablishmentProfile,
    battery: BatteryParameters,
    daily_consumption_kwh: f64,
    patients: f64,
}

impl SimulationEngine {
    pub fn new(gateway: Arc<dyn PredictionGateway>, weather: Arc<dyn WeatherSource>) -> Self {
        Self {
            gateway,
            weather,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub async fn run(&self, request: &SimulationRequest) -> Result<SimulationResult, DomainValidationError> {
        self.simulate(
            &request.profile,
            request.start,
            request.days,
            request.battery_capacity_kwh,
            request.initial_soc_kwh,
            request.price_per_kwh,
        )
        .await
    }

    pub async fn simulate(
        &self,
        profile: &EstablishmentProfile,
        start: NaiveDateTime,
        days: u32,
        battery_capacity_kwh: f64,
        initial_soc_kwh: f64,
        price_per_kwh: f64,
    ) -> Result<SimulationResult, DomainValidationError> {
        profile.validate()?;
        let battery = BatteryParameters {
            capacity_kwh: battery_capacity_kwh,
            soc_min_fraction: self.settings.soc_min_fraction,
            soc_max_fraction: self.settings.soc_max_fraction,
            charge_max_kw: self.settings.charge_max_kw,
            discharge_max_kw: self.settings.discharge_max_kw,
        };
        battery.validate()?;
        if days == 0 {
            return Err(DomainValidationError::ZeroDays);
        }
        if days > MAX_SIMULATION_DAYS {
            return Err(DomainValidationError::HorizonTooLong {
                days,
                max: MAX_SIMULATION_DAYS,
            });
        }
        let first_bucket = bucket_start(start);
        let total_steps = days * STEPS_PER_DAY;
        first_bucket
            .checked_add_signed(Duration::hours(STEP_HOURS * i64::from(total_steps)))
            .ok_or(DomainValidationError::HorizonOutOfRange)?;
        DomainValidationError::check_non_negative("initial_soc_kwh", initial_soc_kwh)?;
        DomainValidationError::check_non_negative("price_per_kwh", price_per_kwh)?;

        let daily_consumption_kwh = profile
            .monthly_consumption_kwh
            .map(|m| m / DAYS_PER_MONTH)
            .unwrap_or_else(|| ConsumptionModel::daily_consumption_kwh(profile.establishment_type, profile.bed_count));

        let run = RunContext {
            profile,
            battery,
            daily_consumption_kwh,
            patients: ConsumptionModel::estimated_patients(profile.bed_count),
        };

        let span = info_span!(
            "simulation",
            establishment_type = %profile.establishment_type,
            days,
            capacity_kwh = battery_capacity_kwh
        );
        let steps = self
            .run_steps(&run, first_bucket, total_steps as usize, initial_soc_kwh)
            .instrument(span)
            .await;

        let result = SimulationResult::from_steps(steps, price_per_kwh);
        info!(
            steps = result.steps().len(),
            total_consumption_kwh = result.total_consumption(),
            total_pv_kwh = result.total_pv_production(),
            total_grid_import_kwh = result.total_grid_import(),
            autonomy_percent = result.average_autonomy_percent(),
            fallback_dispatches = result.fallback_dispatch_count(),
            "simulation complete"
        );
        Ok(result)
    }

    async fn run_steps(
        &self,
        run: &RunContext<'_>,
        first_bucket: NaiveDateTime,
        total: usize,
        initial_soc_kwh: f64,
    ) -> Vec<SimulationStep> {
        let mut steps = Vec::with_capacity(total);
        let mut pv_history: Vec<f64> = Vec::with_capacity(total);
        let mut soc = initial_soc_kwh;
        let mut bucket = first_bucket;

        for index in 0..total {
            let step = self.step(run, index, bucket, soc, &pv_history).await;
            debug!(
                step = index,
                timestamp = %step.timestamp,
                consumption_kwh = step.predicted_consumption_kwh,
                pv_kwh = step.pv_production_kwh,
                soc_kwh = step.soc_kwh,
                grid_kwh = step.grid_import_kwh,
                "step"
            );
            soc = step.soc_kwh;
            pv_history.push(step.pv_production_kwh);
            steps.push(step);
            bucket += Duration::hours(STEP_HOURS);
        }
        steps
    }

    async fn step(
        &self,
        run: &RunContext<'_>,
        index: usize,
        bucket: NaiveDateTime,
        soc: f64,
        pv_history: &[f64],
    ) -> SimulationStep {
        let class = run.profile.resolved_class();
        let mut notes: Vec<String> = Vec::new();

        let (weather, weather_origin) = match self.weather.sample(bucket, class).await {
            Some(sample) => (sample, WeatherOrigin::Recorded),
            None => (synthesize_weather(index, bucket, class), WeatherOrigin::Synthesized),
        };

        let (pv, pv_source) = self.resolve_pv(run, bucket, &weather, pv_history).await;
        let (consumption, consumption_source) =
            self.resolve_consumption(run, bucket, &weather, pv, soc, &mut notes).await;
        let (dispatch, dispatch_source) = self.resolve_dispatch(run, consumption, pv, soc, &mut notes).await;

        let expected_pv = PvModel::instantaneous_production_kwh(run.profile.surface_m2(), weather.irradiance_kwh_m2);
        // No metered consumption exists in a simulation, so the prediction stands in for it.
        let anomaly_ctx = AnomalyContext {
            consumption,
            predicted_consumption: consumption,
            pv_production: pv,
            expected_pv,
            soc,
            temperature_c: weather.temperature_c,
            irradiance_kwh_m2: weather.irradiance_kwh_m2,
        };
        let anomaly: AnomalyTag = detect_anomaly_or_degraded(self.gateway.as_ref(), &anomaly_ctx).await;
        if anomaly.is_anomaly {
            warn!(timestamp = %bucket, anomaly_type = %anomaly.anomaly_type, score = anomaly.score, "anomaly detected");
            notes.push(format!(
                "Anomaly detected: {} - {}",
                anomaly.anomaly_type, anomaly.recommendation
            ));
        }

        if let Some(note) = dispatch.note.as_deref().filter(|n| !n.is_empty()) {
            notes.insert(0, note.to_string());
        }

        SimulationStep {
            timestamp: bucket,
            predicted_consumption_kwh: consumption,
            pv_production_kwh: pv,
            soc_kwh: dispatch.soc_next_kwh,
            grid_import_kwh: dispatch.grid_import_kwh,
            battery_charge_kwh: dispatch.battery_charge_kwh,
            battery_discharge_kwh: dispatch.battery_discharge_kwh,
            anomaly: Some(anomaly),
            sources: StepSources {
                weather: weather_origin,
                pv: pv_source,
                consumption: consumption_source,
                dispatch: dispatch_source,
            },
            note: notes.join(" | "),
        }
    }

    async fn resolve_pv(
        &self,
        run: &RunContext<'_>,
        bucket: NaiveDateTime,
        weather: &WeatherSample,
        pv_history: &[f64],
    ) -> (f64, ValueSource) {
        let surface = run.profile.surface_m2();
        if surface <= 0.0 {
            return (0.0, ValueSource::Fallback);
        }

        let ctx = PvContext {
            datetime: bucket,
            irradiance_kwh_m2: weather.irradiance_kwh_m2,
            temperature_c: weather.temperature_c,
            surface_m2: surface,
            historical_pv: pv_history.to_vec(),
        };
        match self.gateway.predict_pv_production(&ctx).await {
            Ok(pv) if pv.is_finite() && pv >= 0.0 => (pv, ValueSource::Predictor),
            outcome => {
                match outcome {
                    Ok(pv) => warn!(pv_kwh = pv, "implausible PV prediction, using panel model"),
                    Err(e) => warn!(error = %e, "PV prediction failed, using panel model"),
                }
                (
                    PvModel::instantaneous_production_kwh(surface, weather.irradiance_kwh_m2),
                    ValueSource::Fallback,
                )
            }
        }
    }

    async fn resolve_consumption(
        &self,
        run: &RunContext<'_>,
        bucket: NaiveDateTime,
        weather: &WeatherSample,
        pv: f64,
        soc: f64,
        notes: &mut Vec<String>,
    ) -> (f64, ValueSource) {
        let daily = run.daily_consumption_kwh;
        let ctx = ConsumptionContext {
            datetime: bucket,
            temperature_c: weather.temperature_c,
            irradiance_kwh_m2: weather.irradiance_kwh_m2,
            pv_kwh: pv,
            patients: run.patients,
            soc_kwh: Some(soc),
            event: None,
        };
        match self.gateway.predict_consumption(&ctx).await {
            Ok(predicted) if ResultValidator::is_valid_consumption(predicted, daily) => {
                (predicted, ValueSource::Predictor)
            }
            Ok(predicted) => {
                let corrected = ResultValidator::correct_consumption(predicted, daily);
                warn!(predicted_kwh = predicted, corrected_kwh = corrected, "consumption prediction corrected");
                notes.push(format!("consumption corrected: {predicted:.2} -> {corrected:.2}"));
                (corrected, ValueSource::Corrected)
            }
            Err(e) => {
                warn!(error = %e, "consumption prediction failed, using daily average");
                (daily / STEPS_PER_DAY as f64, ValueSource::Fallback)
            }
        }
    }

    async fn resolve_dispatch(
        &self,
        run: &RunContext<'_>,
        consumption: f64,
        pv: f64,
        soc: f64,
        notes: &mut Vec<String>,
    ) -> (DispatchDecision, ValueSource) {
        let battery = &run.battery;
        let ctx = DispatchContext {
            pred_kwh: consumption,
            pv_kwh: pv,
            soc_kwh: soc,
            battery: *battery,
        };

        let (mut decision, mut source) = match self.gateway.optimize_dispatch(&ctx).await {
            Ok(decision) => match ResultValidator::validate_dispatch(&decision, battery.capacity_kwh) {
                Ok(()) => (decision, ValueSource::Predictor),
                Err(rejection) => {
                    warn!(reason = %rejection, "dispatch rejected, using greedy fallback");
                    notes.push(format!("dispatch rejected: {rejection}"));
                    (GreedyDispatcher::dispatch(consumption, pv, soc, battery), ValueSource::Fallback)
                }
            },
            Err(e) => {
                warn!(error = %e, "dispatch optimization failed, using greedy fallback");
                (GreedyDispatcher::dispatch(consumption, pv, soc, battery), ValueSource::Fallback)
            }
        };

        let normalized = ResultValidator::correct_soc(decision.soc_next_kwh, battery);
        if (normalized - decision.soc_next_kwh).abs() > 1e-9 {
            debug!(soc_kwh = decision.soc_next_kwh, corrected_kwh = normalized, "SOC pulled into operating window");
            notes.push(format!(
                "soc corrected: {:.2} -> {:.2}",
                decision.soc_next_kwh, normalized
            ));
            decision.soc_next_kwh = normalized;
            if source == ValueSource::Predictor {
                source = ValueSource::Corrected;
            }
        }
        (decision, source)
    }
}
