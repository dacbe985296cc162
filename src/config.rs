//! Configuration loading from TOML files and environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Run in the foreground and log to stderr instead of the log file.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub saver: SaverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Input-device monitoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Input device paths to watch for activity (e.g. /dev/input/event0).
    #[serde(default)]
    pub devices: Vec<PathBuf>,
    /// Seconds of inactivity before the saver starts.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
    /// Whether a device-open failure after startup is fatal. When false,
    /// the cycle proceeds as long as at least one device opens.
    #[serde(default = "default_strict_reopen")]
    pub strict_reopen: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            timeout_seconds: default_timeout_seconds(),
            strict_reopen: default_strict_reopen(),
        }
    }
}

/// Display device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Framebuffer device path.
    #[serde(default = "default_fb_device")]
    pub device: PathBuf,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            device: default_fb_device(),
        }
    }
}

/// Screensaver program configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaverConfig {
    /// Program and arguments launched when the console goes idle.
    #[serde(default)]
    pub command: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Data directory for the diagnostic log and the cycle-event journal.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Returns the logs directory path.
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

// Default value functions
fn default_timeout_seconds() -> u32 {
    120
}

fn default_strict_reopen() -> bool {
    true
}

fn default_fb_device() -> PathBuf {
    PathBuf::from("/dev/fb0")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".consaver"))
        .unwrap_or_else(|| PathBuf::from(".consaver"))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            monitor: MonitorConfig::default(),
            display: DisplayConfig::default(),
            saver: SaverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::from_file(path)?
        } else {
            // Try default config locations
            let default_paths = [
                PathBuf::from("/etc/consaver/config.toml"),
                dirs::config_dir()
                    .map(|d| d.join("consaver/config.toml"))
                    .unwrap_or_default(),
            ];

            let mut loaded = None;
            for path in &default_paths {
                if path.exists() {
                    loaded = Some(Self::from_file(path)?);
                    break;
                }
            }
            loaded.unwrap_or_default()
        };

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Expand home directory in data_dir
        config.logging.data_dir = expand_tilde(&config.logging.data_dir);

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CONSAVER_TIMEOUT") {
            if let Ok(v) = val.parse() {
                self.monitor.timeout_seconds = v;
            }
        }
        if let Ok(val) = std::env::var("CONSAVER_DEVICES") {
            let devices: Vec<PathBuf> = val
                .split(',')
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
            if !devices.is_empty() {
                self.monitor.devices = devices;
            }
        }
        if let Ok(val) = std::env::var("CONSAVER_FBDEV") {
            self.display.device = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("CONSAVER_DEBUG") {
            if let Ok(v) = val.parse() {
                self.debug = v;
            }
        }
        if let Ok(val) = std::env::var("CONSAVER_DATA_DIR") {
            self.logging.data_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("CONSAVER_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.devices.is_empty() {
            anyhow::bail!("No input devices configured. Set [monitor] devices = [...]");
        }
        if self.monitor.timeout_seconds == 0 {
            anyhow::bail!("Idle timeout must be greater than 0");
        }
        if self.saver.command.is_empty() {
            anyhow::bail!("No saver command configured. Set [saver] command = [...]");
        }
        Ok(())
    }
}

/// Expand ~ to home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if path_str.starts_with('~') {
            if let Some(home) = dirs::home_dir() {
                return home.join(&path_str[2..]);
            }
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_values() {
        let config = Config::default();
        assert_eq!(config.monitor.timeout_seconds, 120);
        assert!(config.monitor.strict_reopen);
        assert_eq!(config.display.device, PathBuf::from("/dev/fb0"));
        assert!(!config.debug);
    }

    #[test]
    fn parses_full_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
debug = true

[monitor]
devices = ["/dev/input/event0", "/dev/input/event1"]
timeout_seconds = 30
strict_reopen = false

[display]
device = "/dev/fb1"

[saver]
command = ["cmatrix", "-b"]

[logging]
level = "debug"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.debug);
        assert_eq!(config.monitor.devices.len(), 2);
        assert_eq!(config.monitor.timeout_seconds, 30);
        assert!(!config.monitor.strict_reopen);
        assert_eq!(config.display.device, PathBuf::from("/dev/fb1"));
        assert_eq!(config.saver.command, vec!["cmatrix", "-b"]);
        assert_eq!(config.logging.level, "debug");
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_missing_devices_and_command() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.monitor.devices = vec![PathBuf::from("/dev/input/event0")];
        assert!(config.validate().is_err());

        config.saver.command = vec!["cmatrix".to_string()];
        config.validate().unwrap();

        config.monitor.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_take_precedence() {
        std::env::set_var("CONSAVER_TIMEOUT", "45");
        std::env::set_var("CONSAVER_DEVICES", "/dev/input/event3,/dev/input/mice");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.monitor.timeout_seconds, 45);
        assert_eq!(
            config.monitor.devices,
            vec![
                PathBuf::from("/dev/input/event3"),
                PathBuf::from("/dev/input/mice")
            ]
        );

        std::env::remove_var("CONSAVER_TIMEOUT");
        std::env::remove_var("CONSAVER_DEVICES");
    }
}
