//! Configuration for the lewei-stream daemon
//!
//! Loads configuration from a TOML file. Every field has a default matching
//! the factory setup of the drone's access point, so an empty `[drone]`
//! section (or no file at all) yields a working configuration.

use crate::error::Result;
use crate::video::RepairPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub drone: DroneConfig,
    #[serde(default)]
    pub repair: RepairConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Drone network configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DroneConfig {
    /// Drone IP address on its own access point
    #[serde(default = "default_address")]
    pub address: IpAddr,
    /// UDP port the drone accepts commands on
    #[serde(default = "default_command_port")]
    pub command_port: u16,
    /// Local source port. The drone streams video back to whatever port the
    /// start command was sent from, so this must stay fixed for the session.
    #[serde(default = "default_local_port")]
    pub local_port: u16,
    /// Start/keep-alive command cadence in milliseconds
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_interval_ms: u64,
}

/// Corruption repair policy for frames the codec rejects
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepairConfig {
    /// Master switch for all salvage heuristics
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Fraction of the scan data kept by truncation salvage
    #[serde(default = "default_truncation_fraction")]
    pub truncation_fraction: f32,
    /// Override for the declared image height (scan lines actually received
    /// when fragment loss systematically shortens frames)
    #[serde(default)]
    pub height_override: Option<u16>,
}

/// Raw datagram capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// Write every received datagram, back to back, exactly as received
    #[serde(default)]
    pub enabled: bool,
    /// Capture file path
    #[serde(default = "default_capture_path")]
    pub path: PathBuf,
}

/// Decoded frame persistence configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Directory for `frame_NNNNNN.jpg` files; omit to keep frames in memory only
    #[serde(default)]
    pub frames_dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log output (stdout, stderr, or file path)
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1))
}

fn default_command_port() -> u16 {
    40000
}

fn default_local_port() -> u16 {
    54321
}

fn default_heartbeat_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_truncation_fraction() -> f32 {
    0.75
}

fn default_capture_path() -> PathBuf {
    PathBuf::from("drone_raw_capture.bin")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_output() -> String {
    "stdout".to_string()
}

impl DroneConfig {
    /// Socket address commands are sent to
    pub fn command_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.command_port)
    }

    /// Heartbeat cadence as a `Duration`
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

impl RepairConfig {
    /// Build the salvage policy applied by the frame sink
    pub fn policy(&self) -> RepairPolicy {
        RepairPolicy {
            enabled: self.enabled,
            truncation_fraction: self.truncation_fraction,
            height_override: self.height_override,
        }
    }
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            command_port: default_command_port(),
            local_port: default_local_port(),
            heartbeat_interval_ms: default_heartbeat_ms(),
        }
    }
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            truncation_fraction: default_truncation_fraction(),
            height_override: None,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_capture_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: default_log_output(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Default configuration for the U61W-family drones
    ///
    /// Matches the factory access-point setup (drone at 192.168.0.1,
    /// commands on port 40000). Suitable for direct use; production
    /// deployments can still pin everything down in a TOML file.
    pub fn u61w_defaults() -> Self {
        Self {
            drone: DroneConfig::default(),
            repair: RepairConfig::default(),
            capture: CaptureConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::u61w_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::u61w_defaults();
        assert_eq!(config.drone.address.to_string(), "192.168.0.1");
        assert_eq!(config.drone.command_port, 40000);
        assert_eq!(config.drone.local_port, 54321);
        assert_eq!(config.drone.heartbeat_interval(), Duration::from_secs(1));
        assert!(config.repair.enabled);
        assert_eq!(config.repair.truncation_fraction, 0.75);
        assert!(!config.capture.enabled);
        assert!(config.output.frames_dir.is_none());
    }

    #[test]
    fn test_toml_serialization() {
        let config = Config::u61w_defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[drone]"));
        assert!(toml_string.contains("[repair]"));
        assert!(toml_string.contains("[capture]"));
        assert!(toml_string.contains("[logging]"));

        assert!(toml_string.contains("address = \"192.168.0.1\""));
        assert!(toml_string.contains("command_port = 40000"));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[drone]
address = "192.168.10.1"
local_port = 50000
heartbeat_interval_ms = 500

[repair]
enabled = false
truncation_fraction = 0.5
height_override = 464

[capture]
enabled = true
path = "dump.bin"

[output]
frames_dir = "frames"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.drone.address.to_string(), "192.168.10.1");
        assert_eq!(config.drone.command_port, 40000); // default survives
        assert_eq!(config.drone.local_port, 50000);
        assert_eq!(config.drone.heartbeat_interval_ms, 500);
        assert!(!config.repair.enabled);
        assert_eq!(config.repair.height_override, Some(464));
        assert!(config.capture.enabled);
        assert_eq!(config.output.frames_dir, Some(PathBuf::from("frames")));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.drone.command_addr().to_string(), "192.168.0.1:40000");
        assert!(config.repair.enabled);
    }

    #[test]
    fn test_repair_policy_mapping() {
        let mut config = Config::u61w_defaults();
        config.repair.height_override = Some(464);
        let policy = config.repair.policy();
        assert!(policy.enabled);
        assert_eq!(policy.truncation_fraction, 0.75);
        assert_eq!(policy.height_override, Some(464));
    }
}
