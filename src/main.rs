use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use futures::future::try_join_all;
use hospital_microgrid::config::{load_profile, Config, DEFAULT_CONFIG_PATH};
use hospital_microgrid::domain::{IrradiationClass, SimulationResult};
use hospital_microgrid::forecast::CsvWeatherSource;
use hospital_microgrid::ml::{OfflineGateway, PredictionGateway};
use hospital_microgrid::simulation::{write_steps_csv, SimulationEngine, SimulationRequest};
use hospital_microgrid::sizing::{self, size_for_profile};
use hospital_microgrid::telemetry::{init_tracing, init_tracing_pretty};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "Hospital microgrid sizing and simulation", long_about = None)]
struct Cli {
    /// Configuration file, overridden by MICROGRID__* environment variables
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, env = "MICROGRID_CONFIG")]
    config: PathBuf,

    /// Human-readable logs instead of JSON
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Size PV and storage from a monthly consumption figure
    Size {
        #[arg(long)]
        monthly_kwh: f64,
        /// Irradiation class A-D
        #[arg(long, default_value_t = IrradiationClass::C)]
        class: IrradiationClass,
        /// Electricity price per kWh; defaults to the configured sizing price
        #[arg(long)]
        price: Option<f64>,
    },
    /// Size PV and storage for a facility profile (.toml or .json)
    Recommend {
        #[arg(long)]
        profile: PathBuf,
    },
    /// Run the 6-hour stepped simulation for one or more profiles
    Simulate {
        /// Facility profile (.toml or .json); repeat to simulate several concurrently
        #[arg(long = "profile", required = true)]
        profiles: Vec<PathBuf>,
        /// Start timestamp, e.g. 2024-06-01T00:00:00
        #[arg(long)]
        start: NaiveDateTime,
        #[arg(long, default_value_t = 1)]
        days: u32,
        /// Battery capacity in kWh [default: 500]
        #[arg(long)]
        battery_kwh: Option<f64>,
        /// Starting charge in kWh [default: half the capacity]
        #[arg(long)]
        initial_soc_kwh: Option<f64>,
        /// Electricity price per kWh; defaults to the configured simulation price
        #[arg(long)]
        price: Option<f64>,
        /// Skip the predictor and run on the deterministic models only
        #[arg(long)]
        offline: bool,
        /// Directory receiving one step CSV per profile
        #[arg(long)]
        csv_out: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct ProfileRun {
    profile: PathBuf,
    result: SimulationResult,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.pretty {
        init_tracing_pretty();
    } else {
        init_tracing();
    }

    let cfg = Config::load_from(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    match cli.command {
        Command::Size {
            monthly_kwh,
            class,
            price,
        } => {
            let mut options = cfg.sizing.options();
            if let Some(price) = price {
                options.price_per_kwh = price;
            }
            let rec = sizing::size_with(monthly_kwh, class, &options).context("invalid sizing input")?;
            info!(monthly_kwh, %class, pv_kwc = rec.recommended_pv_power_kwc, "sizing computed");
            print_json(&rec)
        }
        Command::Recommend { profile } => {
            let loaded = load_profile(&profile)?;
            let sized = size_for_profile(&loaded, &cfg.sizing.options())?;
            print_json(&sized)
        }
        Command::Simulate {
            profiles,
            start,
            days,
            battery_kwh,
            initial_soc_kwh,
            price,
            offline,
            csv_out,
        } => {
            let gateway = build_gateway(&cfg, offline).await?;
            let weather = Arc::new(CsvWeatherSource::new(&cfg.weather.data_dir));
            let engine =
                SimulationEngine::new(gateway, weather).with_settings(cfg.simulation.engine_settings());
            let price = price.unwrap_or(cfg.simulation.price_per_kwh);

            let runs = try_join_all(profiles.into_iter().map(|path| {
                let engine = engine.clone();
                async move {
                    let profile = load_profile(&path)?;
                    let request =
                        SimulationRequest::with_battery_defaults(profile, start, days, battery_kwh, initial_soc_kwh)
                            .with_price(price);
                    let result = engine
                        .run(&request)
                        .await
                        .with_context(|| format!("simulation rejected for {}", path.display()))?;
                    anyhow::Ok(ProfileRun { profile: path, result })
                }
            }))
            .await?;

            if let Some(dir) = csv_out {
                std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
                for run in &runs {
                    write_run_csv(&dir, run)?;
                }
            }

            print_json(&runs)
        }
    }
}

async fn build_gateway(cfg: &Config, offline: bool) -> Result<Arc<dyn PredictionGateway>> {
    if offline || !cfg.predictor.enabled {
        info!("predictor disabled, running on deterministic models");
        return Ok(Arc::new(OfflineGateway));
    }

    let client = cfg.predictor.http_gateway()?;
    match client.health_check().await {
        Ok(health) => info!(
            base_url = %cfg.predictor.base_url,
            status = %health.status,
            model_loaded = health.model_loaded,
            "predictor reachable"
        ),
        // Not fatal: each step falls back on its own.
        Err(e) => warn!(base_url = %cfg.predictor.base_url, error = %e, "predictor health check failed"),
    }
    Ok(Arc::new(client))
}

fn write_run_csv(dir: &Path, run: &ProfileRun) -> Result<()> {
    let stem = run
        .profile
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("profile");
    let path = dir.join(format!("{stem}.csv"));
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    write_steps_csv(&run.result, BufWriter::new(file))?;
    info!(path = %path.display(), steps = run.result.steps().len(), "step CSV written");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
