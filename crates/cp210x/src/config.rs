//! Link and logging configuration
//!
//! Stored as TOML:
//!
//! ```toml
//! [link]
//! baud_rate = 115200
//! interface = 0
//! read_timeout_ms = 1000
//! write_timeout_ms = 500
//! control_timeout_ms = 1000
//! flow_poll_interval_ms = 40
//! read_wait_slice_ms = 500
//! release_on_close = false
//!
//! [line]
//! data_bits = "eight"
//! parity = "none"
//! stop_bits = "one"
//! flow_control = "off"
//!
//! [logging]
//! level = "info"
//! traffic = false
//! ```

use common::{Error, Result};
use protocol::{DataBits, FlowControl, Parity, StopBits};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub line: LineSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Settings for one [`SerialLink`](crate::SerialLink)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Baud rate programmed on open
    pub baud_rate: u32,
    /// USB interface number, also sent as `wIndex` of every control transfer
    pub interface: u8,
    /// Timeout of a single bulk-in read by the read pump
    pub read_timeout_ms: u64,
    /// Timeout of a single bulk-out write, and the write pump's idle wait
    pub write_timeout_ms: u64,
    pub control_timeout_ms: u64,
    /// Period of the modem/comm status poll under hardware flow control
    pub flow_poll_interval_ms: u64,
    /// Longest single wait inside the blocking read calls
    pub read_wait_slice_ms: u64,
    /// Release the interface on close instead of re-claiming it
    pub release_on_close: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: protocol::DEFAULT_BAUD_RATE,
            interface: 0,
            read_timeout_ms: 1000,
            write_timeout_ms: 500,
            control_timeout_ms: 1000,
            flow_poll_interval_ms: 40,
            read_wait_slice_ms: 500,
            release_on_close: false,
        }
    }
}

impl LinkConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    pub fn flow_poll_interval(&self) -> Duration {
        Duration::from_millis(self.flow_poll_interval_ms)
    }

    pub fn read_wait_slice(&self) -> Duration {
        Duration::from_millis(self.read_wait_slice_ms)
    }

    /// Reject values that would make the link spin or never time out
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(Error::Config("baud_rate must be greater than zero".into()));
        }

        let timeouts = [
            ("read_timeout_ms", self.read_timeout_ms),
            ("write_timeout_ms", self.write_timeout_ms),
            ("control_timeout_ms", self.control_timeout_ms),
            ("flow_poll_interval_ms", self.flow_poll_interval_ms),
            ("read_wait_slice_ms", self.read_wait_slice_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }

        Ok(())
    }
}

/// Character framing and flow control applied after open
///
/// See [`SerialLink::apply_line_settings`](crate::SerialLink::apply_line_settings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSettings {
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::Off,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// Log raw RX/TX traffic (`cp210x::rxtx` at trace)
    pub traffic: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            traffic: false,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => expand_path(&p),
            None => {
                let default = Self::default_path();
                if !default.exists() {
                    return Err(Error::Config(format!(
                        "No configuration file at {}",
                        default.display()
                    )));
                }
                default
            }
        };

        let content = fs::read_to_string(&config_path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {}",
                config_path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file {}: {}",
                config_path.display(),
                e
            ))
        })?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let path = expand_path(path);
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize configuration: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("cp210x").join("config.toml")
        } else {
            PathBuf::from(".config/cp210x/config.toml")
        }
    }

    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(Error::Config(format!(
                "Invalid log level '{}', must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        self.link.validate()
    }
}

fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).as_ref()),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.link.baud_rate, 9600);
        assert_eq!(config.link.interface, 0);
        assert_eq!(config.link.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.link.write_timeout(), Duration::from_millis(500));
        assert_eq!(config.link.flow_poll_interval(), Duration::from_millis(40));
        assert!(!config.link.release_on_close);
        assert_eq!(config.line.data_bits, DataBits::Eight);
        assert_eq!(config.line.flow_control, FlowControl::Off);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.traffic);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.link.baud_rate = 115_200;
        config.link.release_on_close = true;
        config.line.parity = Parity::Even;
        config.line.flow_control = FlowControl::RtsCts;

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[link]\nbaud_rate = 57600\n").unwrap();
        assert_eq!(parsed.link.baud_rate, 57_600);
        assert_eq!(parsed.link.read_timeout_ms, 1000);
        assert_eq!(parsed.line, LineSettings::default());
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn test_line_settings_from_toml() {
        let parsed: Config = toml::from_str(
            "[line]\ndata_bits = \"seven\"\nparity = \"odd\"\n\
             stop_bits = \"one-point-five\"\nflow_control = \"xon-xoff\"\n",
        )
        .unwrap();
        assert_eq!(parsed.line.data_bits, DataBits::Seven);
        assert_eq!(parsed.line.parity, Parity::Odd);
        assert_eq!(parsed.line.stop_bits, StopBits::OnePointFive);
        assert_eq!(parsed.line.flow_control, FlowControl::XonXoff);

        assert!(toml::from_str::<Config>("[line]\nparity = \"sideways\"\n").is_err());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut link = LinkConfig {
            baud_rate: 0,
            ..LinkConfig::default()
        };
        assert!(link.validate().is_err());

        link.baud_rate = 9600;
        link.flow_poll_interval_ms = 0;
        let err = link.validate().unwrap_err();
        assert!(err.to_string().contains("flow_poll_interval_ms"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.link.baud_rate = 230_400;
        config.logging.level = "debug".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(Some(path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(dir.path().join("absent.toml"))).is_err());
    }
}
