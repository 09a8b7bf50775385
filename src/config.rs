//! Configuration for the u64stream client
//!
//! Loads configuration from a TOML file with the parameters the streaming
//! core consumes: device host, listen ports, palette selection, decode mode
//! and diagnostics.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub streaming: StreamingConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

/// Device control configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Ultimate 64 host name or IP for the TCP command interface.
    /// Empty string means "streaming only, no command channel".
    pub host: String,
    /// Send the start-stream command when the client starts
    pub start_stream_on_start: bool,
    /// Send the stop-stream command when the client exits
    pub stop_stream_on_exit: bool,
}

/// UDP stream listen configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// UDP listen port for video packets
    pub video_port: u16,
    /// UDP listen port for audio packets
    pub audio_port: u16,
    /// Disable the audio path entirely
    pub audio_enabled: bool,
}

/// Palette and decode configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    /// Palette scheme: "pal", "crt" or "user"
    pub palette: String,
    /// Custom palette: 16 comma-separated 6-hex-digit RGB triples.
    /// Required when `palette = "user"`.
    pub user_palette: Option<String>,
    /// Use the per-pixel draw-point path instead of packed buffer writes.
    /// Slower, but usable when scaling is handled externally per pixel.
    pub precise: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Report dropped packets and transfer totals
    pub diagnostics: bool,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Default configuration matching the device's factory stream settings
    pub fn u64_defaults() -> Self {
        Self {
            device: DeviceConfig {
                host: String::new(),
                start_stream_on_start: true,
                stop_stream_on_exit: true,
            },
            streaming: StreamingConfig {
                video_port: 11000,
                audio_port: 11001,
                audio_enabled: true,
            },
            display: DisplayConfig {
                palette: "pal".to_string(),
                user_palette: None,
                precise: false,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                diagnostics: false,
            },
        }
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::error::Error::Other(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::u64_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::u64_defaults();
        assert_eq!(config.streaming.video_port, 11000);
        assert_eq!(config.streaming.audio_port, 11001);
        assert!(config.streaming.audio_enabled);
        assert_eq!(config.display.palette, "pal");
        assert!(!config.display.precise);
        assert!(config.device.host.is_empty());
        assert!(config.device.stop_stream_on_exit);
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::u64_defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[device]"));
        assert!(toml_string.contains("[streaming]"));
        assert!(toml_string.contains("[display]"));
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("video_port = 11000"));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[device]
host = "192.168.1.64"
start_stream_on_start = false
stop_stream_on_exit = false

[streaming]
video_port = 12000
audio_port = 12001
audio_enabled = false

[display]
palette = "crt"
precise = true

[logging]
level = "debug"
diagnostics = true
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.device.host, "192.168.1.64");
        assert_eq!(config.streaming.video_port, 12000);
        assert!(!config.streaming.audio_enabled);
        assert_eq!(config.display.palette, "crt");
        assert!(config.display.precise);
        assert!(config.logging.diagnostics);
        assert!(config.display.user_palette.is_none());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u64stream.toml");

        let mut config = AppConfig::u64_defaults();
        config.device.host = "10.0.0.64".to_string();
        config.display.user_palette = Some(crate::palette::PAL.format());
        config.to_file(&path).unwrap();

        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded.device.host, "10.0.0.64");
        assert_eq!(loaded.streaming.video_port, config.streaming.video_port);
        assert_eq!(loaded.display.user_palette, config.display.user_palette);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::from_file("/nonexistent/u64stream.toml").is_err());
    }
}
