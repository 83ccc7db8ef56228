//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub odometry: OdometryConfig,

    #[serde(default)]
    pub record: RecordConfig,
}

/// Rover bridge connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_read_buffer_bytes")]
    pub read_buffer_bytes: usize,
}

/// Odometry source channel names
#[derive(Debug, Deserialize, Clone)]
pub struct OdometryConfig {
    #[serde(default = "default_left_channel")]
    pub left_channel: String,

    #[serde(default = "default_right_channel")]
    pub right_channel: String,

    #[serde(default = "default_heading_channel")]
    pub heading_channel: String,
}

/// Session recording configuration (JSONL with rotation)
#[derive(Debug, Deserialize, Clone)]
pub struct RecordConfig {
    #[serde(default = "default_record_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

// Default value functions
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 6789 }
fn default_reconnect_interval_ms() -> u64 { 500 }
fn default_read_buffer_bytes() -> usize { 4096 }

fn default_left_channel() -> String { "left_distance".to_string() }
fn default_right_channel() -> String { "right_distance".to_string() }
fn default_heading_channel() -> String { "imu_heading".to_string() }

fn default_record_enabled() -> bool { false }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            read_buffer_bytes: default_read_buffer_bytes(),
        }
    }
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            left_channel: default_left_channel(),
            right_channel: default_right_channel(),
            heading_channel: default_heading_channel(),
        }
    }
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            enabled: default_record_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rover_link::config::Config;
    ///
    /// let config = Config::load("rover-link.toml")?;
    /// # Ok::<(), rover_link::error::RoverLinkError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.connection.host.is_empty() {
            return Err(crate::error::RoverLinkError::Config(
                toml::de::Error::custom("connection host cannot be empty"),
            ));
        }

        if self.connection.port == 0 {
            return Err(crate::error::RoverLinkError::Config(
                toml::de::Error::custom("connection port cannot be 0"),
            ));
        }

        if self.connection.reconnect_interval_ms == 0
            || self.connection.reconnect_interval_ms > 60000
        {
            return Err(crate::error::RoverLinkError::Config(
                toml::de::Error::custom("reconnect_interval_ms must be between 1 and 60000"),
            ));
        }

        if self.connection.read_buffer_bytes == 0 {
            return Err(crate::error::RoverLinkError::Config(
                toml::de::Error::custom("read_buffer_bytes must be greater than 0"),
            ));
        }

        // Odometry needs three distinct, non-empty channel names
        let channels = [
            &self.odometry.left_channel,
            &self.odometry.right_channel,
            &self.odometry.heading_channel,
        ];
        if channels.iter().any(|name| name.is_empty()) {
            return Err(crate::error::RoverLinkError::Config(
                toml::de::Error::custom("odometry channel names cannot be empty"),
            ));
        }
        if channels[0] == channels[1] || channels[0] == channels[2] || channels[1] == channels[2] {
            return Err(crate::error::RoverLinkError::Config(
                toml::de::Error::custom("odometry channel names must be distinct"),
            ));
        }

        if self.record.enabled && self.record.log_dir.is_empty() {
            return Err(crate::error::RoverLinkError::Config(
                toml::de::Error::custom("record log_dir cannot be empty when enabled"),
            ));
        }

        if self.record.max_records_per_file == 0 {
            return Err(crate::error::RoverLinkError::Config(
                toml::de::Error::custom("max_records_per_file must be greater than 0"),
            ));
        }

        if self.record.max_files_to_keep == 0 {
            return Err(crate::error::RoverLinkError::Config(
                toml::de::Error::custom("max_files_to_keep must be greater than 0"),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.connection.host, "127.0.0.1");
        assert_eq!(config.connection.port, 6789);
        assert_eq!(config.odometry.left_channel, "left_distance");
        assert!(!config.record.enabled);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.connection.port, default_port());
        assert_eq!(config.record.max_files_to_keep, default_max_files_to_keep());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: Config = toml::from_str(
            r#"
            [connection]
            host = "rover.local"
            port = 9000

            [odometry]
            heading_channel = "compass"
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.host, "rover.local");
        assert_eq!(config.connection.port, 9000);
        // Unspecified fields keep their defaults
        assert_eq!(config.connection.reconnect_interval_ms, 500);
        assert_eq!(config.odometry.left_channel, "left_distance");
        assert_eq!(config.odometry.heading_channel, "compass");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\nport = 7000").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.connection.port, 7000);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = Config::load("/nonexistent/rover-link.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let config: Config = toml::from_str("[connection]\nport = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_odometry_channels() {
        let config: Config = toml::from_str(
            r#"
            [odometry]
            left_channel = "distance"
            right_channel = "distance"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_reconnect_interval() {
        let config: Config =
            toml::from_str("[connection]\nreconnect_interval_ms = 600000").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_record_limits() {
        let config: Config = toml::from_str("[record]\nmax_records_per_file = 0").unwrap();
        assert!(config.validate().is_err());
    }
}
