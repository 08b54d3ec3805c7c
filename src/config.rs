use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::detect::DEFAULT_ENDPOINT;
use crate::frame::DEFAULT_JPEG_QUALITY;
use crate::monitor::{MonitorConfig, OverlapPolicy, DEFAULT_INTERVAL};
use crate::present::DEFAULT_CHART_CAPACITY;

const DEFAULT_SOURCE: &str = "stub://camera";
const MAX_CHART_CAPACITY: usize = 10_000;

#[derive(Debug, Deserialize, Default)]
struct SentinelConfigFile {
    source: Option<String>,
    detection: Option<DetectionConfigFile>,
    sampling: Option<SamplingConfigFile>,
    chart: Option<ChartConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    endpoint: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct SamplingConfigFile {
    interval_ms: Option<u64>,
    overlap: Option<OverlapPolicy>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct ChartConfigFile {
    capacity: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub source: String,
    pub endpoint: String,
    pub sampling: SamplingSettings,
    pub chart_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct SamplingSettings {
    pub interval: Duration,
    pub overlap: OverlapPolicy,
    pub jpeg_quality: u8,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self::from_file(SentinelConfigFile::default())
    }
}

impl SentinelConfig {
    /// Optional file named by `FLARE_CONFIG`, then `FLARE_*` overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FLARE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentinelConfigFile) -> Self {
        let source = file.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string());
        let endpoint = file
            .detection
            .and_then(|detection| detection.endpoint)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let sampling = SamplingSettings {
            interval: file
                .sampling
                .as_ref()
                .and_then(|sampling| sampling.interval_ms)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_INTERVAL),
            overlap: file
                .sampling
                .as_ref()
                .and_then(|sampling| sampling.overlap)
                .unwrap_or_default(),
            jpeg_quality: file
                .sampling
                .as_ref()
                .and_then(|sampling| sampling.jpeg_quality)
                .unwrap_or(DEFAULT_JPEG_QUALITY),
        };
        let chart_capacity = file
            .chart
            .and_then(|chart| chart.capacity)
            .unwrap_or(DEFAULT_CHART_CAPACITY);
        Self {
            source,
            endpoint,
            sampling,
            chart_capacity,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(endpoint) = std::env::var("FLARE_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint;
            }
        }
        if let Ok(source) = std::env::var("FLARE_SOURCE") {
            if !source.trim().is_empty() {
                self.source = source;
            }
        }
        if let Ok(interval) = std::env::var("FLARE_INTERVAL_MS") {
            let millis: u64 = interval.trim().parse().map_err(|_| {
                anyhow!("FLARE_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.sampling.interval = Duration::from_millis(millis);
        }
        if let Ok(overlap) = std::env::var("FLARE_OVERLAP") {
            if !overlap.trim().is_empty() {
                self.sampling.overlap = overlap.parse()?;
            }
        }
        if let Ok(quality) = std::env::var("FLARE_JPEG_QUALITY") {
            self.sampling.jpeg_quality = quality
                .trim()
                .parse()
                .map_err(|_| anyhow!("FLARE_JPEG_QUALITY must be an integer between 1 and 100"))?;
        }
        if let Ok(capacity) = std::env::var("FLARE_CHART_CAPACITY") {
            self.chart_capacity = capacity
                .trim()
                .parse()
                .map_err(|_| anyhow!("FLARE_CHART_CAPACITY must be a positive integer"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sampling.interval.is_zero() {
            return Err(anyhow!("sampling interval must be greater than zero"));
        }
        if !(1..=100).contains(&self.sampling.jpeg_quality) {
            return Err(anyhow!(
                "jpeg quality must be between 1 and 100, got {}",
                self.sampling.jpeg_quality
            ));
        }
        if self.chart_capacity == 0 || self.chart_capacity > MAX_CHART_CAPACITY {
            return Err(anyhow!(
                "chart capacity must be between 1 and {}, got {}",
                MAX_CHART_CAPACITY,
                self.chart_capacity
            ));
        }
        let endpoint = url::Url::parse(&self.endpoint)
            .map_err(|e| anyhow!("invalid detection endpoint {}: {}", self.endpoint, e))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(anyhow!(
                "detection endpoint must be http or https, got {}",
                endpoint.scheme()
            ));
        }
        if self.source.trim().is_empty() {
            return Err(anyhow!("frame source must not be empty"));
        }
        Ok(())
    }

    pub fn monitor(&self) -> MonitorConfig {
        MonitorConfig {
            interval: self.sampling.interval,
            overlap: self.sampling.overlap,
        }
    }
}

fn read_config_file(path: &Path) -> Result<SentinelConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
