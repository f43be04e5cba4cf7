use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::Validate;

use crate::domain::{EstablishmentProfile, DEFAULT_CHARGE_MAX_KW, DEFAULT_DISCHARGE_MAX_KW, DEFAULT_SOC_MAX_FRACTION, DEFAULT_SOC_MIN_FRACTION};
use crate::ml::HttpPredictionGateway;
use crate::simulation::EngineSettings;
use crate::sizing::{InstallationCostModel, SizingOptions, DEFAULT_PRICE_PER_KWH};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub predictor: PredictorConfig,
    pub weather: WeatherConfig,
    #[validate(nested)]
    pub simulation: SimulationConfig,
    #[validate(nested)]
    pub sizing: SizingConfig,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct PredictorConfig {
    pub enabled: bool,
    #[validate(url)]
    pub base_url: String,
    #[validate(range(min = 1, max = 60))]
    pub connect_timeout_seconds: u64,
    #[validate(range(min = 1, max = 300))]
    pub read_timeout_seconds: u64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:8000".to_string(),
            connect_timeout_seconds: 5,
            read_timeout_seconds: 10,
        }
    }
}

impl PredictorConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }

    pub fn http_gateway(&self) -> Result<HttpPredictionGateway> {
        HttpPredictionGateway::with_timeouts(&self.base_url, self.connect_timeout(), self.read_timeout())
            .context("failed to build predictor client")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub data_dir: PathBuf,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/weather"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct SimulationConfig {
    #[validate(range(min = 0.0))]
    pub price_per_kwh: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub charge_max_kw: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub discharge_max_kw: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub soc_min_fraction: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub soc_max_fraction: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            price_per_kwh: DEFAULT_PRICE_PER_KWH,
            charge_max_kw: DEFAULT_CHARGE_MAX_KW,
            discharge_max_kw: DEFAULT_DISCHARGE_MAX_KW,
            soc_min_fraction: DEFAULT_SOC_MIN_FRACTION,
            soc_max_fraction: DEFAULT_SOC_MAX_FRACTION,
        }
    }
}

impl SimulationConfig {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            soc_min_fraction: self.soc_min_fraction,
            soc_max_fraction: self.soc_max_fraction,
            charge_max_kw: self.charge_max_kw,
            discharge_max_kw: self.discharge_max_kw,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct SizingConfig {
    #[validate(range(min = 0.0))]
    pub price_per_kwh: f64,
    #[serde(flatten)]
    #[validate(nested)]
    pub costs: InstallationCostModel,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            price_per_kwh: DEFAULT_PRICE_PER_KWH,
            costs: InstallationCostModel::default(),
        }
    }
}

impl SizingConfig {
    pub fn options(&self) -> SizingOptions {
        SizingOptions {
            price_per_kwh: self.price_per_kwh,
            cost_model: self.costs,
            ..SizingOptions::default()
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// File values first, then `MICROGRID__SECTION__KEY` environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(path.as_ref()))
                .merge(Env::prefixed("MICROGRID__").split("__")),
        )
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::from_figment(Figment::new().merge(Toml::string(toml)))
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Self = figment.extract().context("invalid configuration")?;
        cfg.validate().context("configuration out of range")?;
        Ok(cfg)
    }
}

/// Reads a facility profile from a `.toml` or `.json` file.
pub fn load_profile(path: impl AsRef<Path>) -> Result<EstablishmentProfile> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read profile {}", path.display()))?;
    let profile: EstablishmentProfile = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&raw).with_context(|| format!("invalid TOML profile {}", path.display()))?,
        Some("json") => serde_json::from_str(&raw).with_context(|| format!("invalid JSON profile {}", path.display()))?,
        other => anyhow::bail!("unsupported profile format {:?} for {}", other, path.display()),
    };
    profile
        .validate()
        .with_context(|| format!("profile {} rejected", path.display()))?;
    Ok(profile)
}
