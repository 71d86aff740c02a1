use crate::prelude::*;

use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_devices_path")]
    pub devices_path: String,

    #[serde(default = "Vec::new")]
    pub custom_device_paths: Vec<String>,

    #[serde(default = "Config::default_device_filter")]
    pub device_filter: String,

    #[serde(default)]
    pub serial: Serial,

    #[serde(default)]
    pub key_policy: KeyPolicy,

    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub report_interval: Option<Duration>,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// Serial {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Serial {
    #[serde(default = "Config::default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "Config::default_max_line_length")]
    pub max_line_length: usize,
}

impl Default for Serial {
    fn default() -> Self {
        Self {
            baud_rate: Config::default_baud_rate(),
            max_line_length: Config::default_max_line_length(),
        }
    }
}

impl Serial {
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }
} // }}}

// KeyPolicy {{{
/// How a stream's device key is chosen after its first frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Resolve on the first complete frame and keep that key for the
    /// lifetime of the stream.
    #[default]
    Locked,
    /// Resolve again for every frame.
    PerFrame,
}

impl std::fmt::Display for KeyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPolicy::Locked => write!(f, "locked"),
            KeyPolicy::PerFrame => write!(f, "per_frame"),
        }
    }
} // }}}

pub struct ConfigWrapper {
    config: Arc<Mutex<Config>>,
}

impl Clone for ConfigWrapper {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
        }
    }
}

impl ConfigWrapper {
    pub fn new(file: String) -> Result<Self> {
        let config = Config::new(file)?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Config> {
        // a poisoned lock still holds a readable config
        self.config.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn devices_path(&self) -> String {
        self.lock().devices_path.clone()
    }

    pub fn custom_device_paths(&self) -> Vec<String> {
        self.lock().custom_device_paths.clone()
    }

    pub fn set_custom_device_paths(&self, new: Vec<String>) {
        self.lock().custom_device_paths = new;
    }

    pub fn device_filter(&self) -> String {
        self.lock().device_filter.clone()
    }

    pub fn serial(&self) -> Serial {
        self.lock().serial.clone()
    }

    pub fn key_policy(&self) -> KeyPolicy {
        self.lock().key_policy
    }

    pub fn report_interval(&self) -> Option<Duration> {
        self.lock().report_interval
    }

    pub fn loglevel(&self) -> String {
        self.lock().loglevel.clone()
    }

    pub fn log_summary(&self) {
        self.lock().log_summary()
    }
}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| file_error!("error reading {}: {}", file, err))?;

        let config = Self::from_yaml(&content)?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        if self.custom_device_paths.is_empty() {
            info!("  Devices path: {}", self.devices_path);
            info!("  Device filter: {}", self.device_filter);
        } else {
            info!("  Custom device paths: {} configured", self.custom_device_paths.len());
            for (i, path) in self.custom_device_paths.iter().enumerate() {
                info!("    Device[{}]: {}", i, path);
            }
        }
        info!("  Serial:");
        info!("    Baud rate: {}", self.serial.baud_rate);
        info!("    Max line length: {}", self.serial.max_line_length);
        info!("  Key policy: {}", self.key_policy);
        match self.report_interval {
            Some(interval) => info!("  Report interval: {}s", interval.as_secs()),
            None => info!("  Report interval: disabled"),
        }
        info!("  Log Level: {}", self.loglevel);
    }

    fn validate(&self) -> Result<()> {
        if self.custom_device_paths.is_empty() {
            if self.devices_path.is_empty() {
                bail!("devices_path cannot be empty when no custom_device_paths are given");
            }
            if self.device_filter.is_empty() {
                bail!("device_filter cannot be empty");
            }
        }

        if let Some(path) = self.custom_device_paths.iter().find(|p| p.is_empty()) {
            bail!("custom_device_paths contains an empty path: {:?}", path);
        }

        if self.serial.baud_rate == 0 {
            bail!("serial.baud_rate must be greater than 0");
        }
        if self.serial.max_line_length == 0 {
            bail!("serial.max_line_length must be greater than 0");
        }

        if self.report_interval.is_some_and(|i| i.is_zero()) {
            bail!("report_interval must be greater than 0");
        }

        Ok(())
    }

    fn default_devices_path() -> String {
        "/dev/serial/by-id/".to_string()
    }

    fn default_device_filter() -> String {
        "VE_Direct".to_string()
    }

    fn default_baud_rate() -> u32 {
        19200
    }

    fn default_max_line_length() -> usize {
        crate::vedirect::line_codec::DEFAULT_MAX_LINE_LENGTH
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}
