//! Configuration management for the tone generator daemon

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::tone::indicator::{Standard, INDICATOR_STREAM};
use crate::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub audio: AudioConfig,
    pub indicator: IndicatorConfig,
    pub control: ControlConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Length of one render cycle in milliseconds.
    pub buffer_ms: u32,
    /// Directory receiving raw PCM per stream; output is discarded when unset.
    pub output_dir: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            buffer_ms: 20,
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub standard: Standard,
    /// Percentage applied to every indicator volume.
    pub volume_scale: u32,
    pub stream: String,
    /// Stream properties, `key=value` pairs separated by commas.
    pub properties: Option<String>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            standard: Standard::Cept,
            volume_scale: 100,
            stream: INDICATOR_STREAM.to_string(),
            properties: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1".to_string(),
            port: 5577,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: LogFormat::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "compact")]
    Compact,
    #[serde(rename = "full")]
    Full,
}

impl DaemonConfig {
    pub fn default_config() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&contents)
            .map_err(|e| Error::parse(format!("Invalid TOML: {}", e)))?;
        Ok(config)
    }

    /// Defaults overlaid with `TONEGEND_<SECTION>__<KEY>` environment variables.
    pub fn load_from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default_config())?)
            .add_source(
                config::Environment::with_prefix("TONEGEND")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let daemon_config = settings.try_deserialize()?;
        Ok(daemon_config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(8000..=192_000).contains(&self.audio.sample_rate) {
            return Err(Error::parse(format!(
                "Invalid sample rate {}",
                self.audio.sample_rate
            )));
        }

        if self.audio.buffer_ms == 0 || self.audio.buffer_ms > 1000 {
            return Err(Error::parse("Buffer length must be 1-1000 ms"));
        }

        if self.indicator.stream.is_empty() {
            return Err(Error::parse("Indicator stream name is empty"));
        }

        if let Some(props) = &self.indicator.properties {
            props.parse::<crate::audio::StreamProperties>()?;
        }

        if self.control.enabled && self.control.port == 0 {
            return Err(Error::parse("Invalid control port"));
        }

        crate::utils::logger::parse_log_level(&self.logging.level)?;

        Ok(())
    }

    /// Samples per render cycle.
    pub fn frames_per_buffer(&self) -> usize {
        (self.audio.sample_rate as u64 * self.audio.buffer_ms as u64 / 1000) as usize
    }
}
