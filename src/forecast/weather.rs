//! Recorded 6-hour weather samples per irradiation zone.
//!
//! Samples come from one CSV file per irradiation class. Files are parsed on
//! first use and kept for the lifetime of the source.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::production::PvModel;
use crate::domain::IrradiationClass;

pub const BUCKET_HOURS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub temperature_c: f64,
    pub irradiance_kwh_m2: f64,
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Sample for the given 6-hour bucket, `None` when nothing is recorded.
    async fn sample(&self, bucket: NaiveDateTime, class: IrradiationClass) -> Option<WeatherSample>;
}

/// Source with no data; every step falls back to synthesized weather.
pub struct NoWeatherData;

#[async_trait]
impl WeatherSource for NoWeatherData {
    async fn sample(&self, _bucket: NaiveDateTime, _class: IrradiationClass) -> Option<WeatherSample> {
        None
    }
}

/// Rounds down to the enclosing 6-hour bucket.
pub fn bucket_start(ts: NaiveDateTime) -> NaiveDateTime {
    let hour = ts.hour() / BUCKET_HOURS * BUCKET_HOURS;
    ts.date().and_hms_opt(hour, 0, 0).unwrap_or(ts)
}

/// Diurnal stand-in used when no recorded sample exists.
pub fn synthesize_weather(step_index: usize, bucket: NaiveDateTime, class: IrradiationClass) -> WeatherSample {
    let temperature_c = 20.0 + 5.0 * (step_index as f64 * std::f64::consts::PI / 12.0).sin();
    let hour = bucket.hour();
    let irradiance_kwh_m2 = if (6..18).contains(&hour) {
        PvModel::average_irradiance(class) / 4.0
    } else {
        0.0
    };
    WeatherSample {
        temperature_c,
        irradiance_kwh_m2,
    }
}

pub fn weather_file_name(class: IrradiationClass) -> &'static str {
    match class {
        IrradiationClass::A => "zone_a_sahara_meteo_2024_6h.csv",
        IrradiationClass::B => "zone_b_centre_meteo_2024_6h.csv",
        IrradiationClass::C => "casablanca_meteo_2024_6h.csv",
        IrradiationClass::D => "zone_d_rif_meteo_2024_6h.csv",
    }
}

/// Parsed contents of one weather file.
#[derive(Debug, Default)]
pub struct WeatherTable {
    exact: HashMap<NaiveDateTime, WeatherSample>,
    // (month, day, hour) -> first sample seen, for lookups outside the recorded year
    seasonal: HashMap<(u32, u32, u32), WeatherSample>,
}

impl WeatherTable {
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    fn insert(&mut self, ts: NaiveDateTime, sample: WeatherSample) {
        let bucket = bucket_start(ts);
        self.exact.insert(bucket, sample);
        self.seasonal
            .entry((bucket.month(), bucket.day(), bucket.hour()))
            .or_insert(sample);
    }

    pub fn lookup(&self, bucket: NaiveDateTime) -> Option<WeatherSample> {
        let bucket = bucket_start(bucket);
        self.exact.get(&bucket).copied().or_else(|| {
            self.seasonal
                .get(&(bucket.month(), bucket.day(), bucket.hour()))
                .copied()
        })
    }

    /// Parses CSV text whose first three columns are datetime, temperature, irradiance.
    /// Rows that fail to parse are skipped.
    pub fn parse(data: &[u8], origin: &str) -> Self {
        let mut table = Self::default();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data);

        for (idx, record) in reader.records().enumerate() {
            let line = idx + 2;
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    debug!(file = origin, line, error = %e, "skipping unreadable weather row");
                    continue;
                }
            };
            let parsed = (|| {
                let ts = parse_datetime(record.get(0)?)?;
                let temperature_c = record.get(1)?.parse::<f64>().ok()?;
                let irradiance_kwh_m2 = record.get(2)?.parse::<f64>().ok()?;
                Some((ts, WeatherSample { temperature_c, irradiance_kwh_m2 }))
            })();
            match parsed {
                Some((ts, sample)) => table.insert(ts, sample),
                None => debug!(file = origin, line, "skipping invalid weather row"),
            }
        }
        table
    }
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_local());
    }
    // %m/%d/%Y also accepts unpadded months and days
    NaiveDate::parse_from_str(raw, "%m/%d/%Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// CSV-backed source with a per-class table cache.
///
/// Concurrent misses on the same class may both parse the file; the first
/// table inserted wins and the other is dropped.
#[derive(Clone)]
pub struct CsvWeatherSource {
    data_dir: PathBuf,
    cache: Arc<RwLock<HashMap<IrradiationClass, Arc<WeatherTable>>>>,
}

impl CsvWeatherSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn table(&self, class: IrradiationClass) -> Arc<WeatherTable> {
        let cached = self.cache.read().get(&class).cloned();
        if let Some(table) = cached {
            return table;
        }

        let loaded = Arc::new(self.load(class).await);

        let mut cache = self.cache.write();
        Arc::clone(cache.entry(class).or_insert(loaded))
    }

    async fn load(&self, class: IrradiationClass) -> WeatherTable {
        let path = self.data_dir.join(weather_file_name(class));
        let shown = path.display().to_string();
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let table = WeatherTable::parse(&bytes, &shown);
                if table.is_empty() {
                    warn!(file = %shown, "weather file has no usable rows");
                } else {
                    info!(file = %shown, rows = table.len(), "weather file loaded");
                }
                table
            }
            Err(e) => {
                warn!(file = %shown, error = %e, "weather file unavailable, steps will use synthesized weather");
                WeatherTable::default()
            }
        }
    }
}

#[async_trait]
impl WeatherSource for CsvWeatherSource {
    async fn sample(&self, bucket: NaiveDateTime, class: IrradiationClass) -> Option<WeatherSample> {
        self.table(class).await.lookup(bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_bucket_start_rounds_down() {
        let t = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(17, 45, 12).unwrap();
        assert_eq!(bucket_start(t), ts(2024, 3, 1, 12));
    }

    #[test]
    fn test_synthesized_weather_is_dark_at_night() {
        let night = synthesize_weather(0, ts(2024, 1, 1, 0), IrradiationClass::A);
        assert_eq!(night.irradiance_kwh_m2, 0.0);
        assert!((night.temperature_c - 20.0).abs() < 1e-9);

        let day = synthesize_weather(2, ts(2024, 1, 1, 12), IrradiationClass::A);
        assert!((day.irradiance_kwh_m2 - 6.5 / 4.0).abs() < 1e-9);
        assert!((day.temperature_c - 22.5).abs() < 1e-9);

        let evening = synthesize_weather(3, ts(2024, 1, 1, 18), IrradiationClass::A);
        assert_eq!(evening.irradiance_kwh_m2, 0.0);
    }

    #[test]
    fn test_parse_mixed_formats_and_skip_bad_rows() {
        let csv = "datetime,temperature_C,irradiance_kWh_m2\n\
                   2024-06-01 12:00:00,31.5,1.8\n\
                   2024-06-01T18:30:00,27.0,0.1\n\
                   6/2/2024,19.0,0.0\n\
                   garbage,1,2\n\
                   2024-06-03 06:00:00,not-a-number,1.0\n";
        let table = WeatherTable::parse(csv.as_bytes(), "test.csv");
        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup(ts(2024, 6, 1, 14)).unwrap().temperature_c, 31.5);
        assert_eq!(table.lookup(ts(2024, 6, 1, 18)).unwrap().irradiance_kwh_m2, 0.1);
        assert_eq!(table.lookup(ts(2024, 6, 2, 0)).unwrap().temperature_c, 19.0);
        assert!(table.lookup(ts(2024, 6, 3, 6)).is_none());
    }

    #[test]
    fn test_lookup_ignores_year_when_no_exact_match() {
        let csv = "datetime,temperature,irradiance\n2024-06-01 12:00:00,30.0,1.5\n";
        let table = WeatherTable::parse(csv.as_bytes(), "test.csv");
        assert_eq!(table.lookup(ts(2026, 6, 1, 12)).unwrap().temperature_c, 30.0);
        assert!(table.lookup(ts(2026, 6, 2, 12)).is_none());
    }

    #[tokio::test]
    async fn test_missing_file_yields_no_samples() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvWeatherSource::new(dir.path());
        assert!(source.sample(ts(2024, 1, 1, 0), IrradiationClass::C).await.is_none());
        assert!(source.table(IrradiationClass::C).await.is_empty());
    }

    #[tokio::test]
    async fn test_file_load_populates_table() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(weather_file_name(IrradiationClass::A)),
            "datetime,temperature,irradiance
2024-07-01 12:00:00,38.0,2.1
2024-07-01 18:00:00,33.0,0.3
",
        )
        .unwrap();
        let table = CsvWeatherSource::new(dir.path()).table(IrradiationClass::A).await;
        assert!(!table.is_empty());
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup(ts(2024, 7, 1, 12)).unwrap().temperature_c, 38.0);
    }

    #[tokio::test]
    async fn test_header_only_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(weather_file_name(IrradiationClass::D)), "datetime,temperature,irradiance
").unwrap();
        let table = CsvWeatherSource::new(dir.path()).table(IrradiationClass::D).await;
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_one_table() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(weather_file_name(IrradiationClass::B)),
            "datetime,temperature,irradiance\n2024-01-01 06:00:00,12.0,0.4\n",
        )
        .unwrap();
        let source = CsvWeatherSource::new(dir.path());

        let lookups = (0..16).map(|_| {
            let s = source.clone();
            tokio::spawn(async move { s.sample(ts(2024, 1, 1, 7), IrradiationClass::B).await })
        });
        for handle in futures::future::join_all(lookups).await {
            assert_eq!(handle.unwrap().unwrap().temperature_c, 12.0);
        }

        let first = source.table(IrradiationClass::B).await;
        let second = source.table(IrradiationClass::B).await;
        assert!(Arc::ptr_eq(&first, &second));
    }
}
