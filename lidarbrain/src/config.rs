/*!
Configuration management for the lidar node.
*/

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use sweep::{HeadingWindow, RotationConfig, SyncConfig, WallConfig};

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub snapshots: SnapshotConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Reject settings the analysers cannot work with
    pub fn validate(&self) -> Result<()> {
        let range = self.analysis.range_window;
        if HeadingWindow::new(range.start, range.stop).is_none() {
            bail!("invalid range window [{}, {})", range.start, range.stop);
        }

        let rotation = self.analysis.rotation;
        if rotation.start >= rotation.stop || rotation.start < -180 || rotation.stop > 181 {
            bail!("invalid rotation window [{}, {})", rotation.start, rotation.stop);
        }

        let wall = self.analysis.wall;
        if wall.min_window < 2 || !(0.0..=1.0).contains(&wall.threshold) {
            bail!(
                "invalid wall detector settings: min_window {}, threshold {}",
                wall.min_window,
                wall.threshold
            );
        }

        if self.pipeline.queue_depth == 0 {
            bail!("pipeline queue depth must be at least 1");
        }
        if self.snapshots.seconds_per_snapshot <= 0.0 {
            bail!("seconds_per_snapshot must be positive");
        }
        Ok(())
    }
}

/// Serial link to the sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path, e.g. /dev/ttyUSB0
    pub port: String,

    pub baud_rate: u32,

    /// Timeout of a single read on the port
    pub read_timeout_ms: u64,

    /// Give up on one slice's header after this long
    pub sync_timeout_ms: u64,

    /// Give up on one slice's header after scanning this many bytes
    pub max_scan_bytes: usize,

    /// Wait before reopening a port that failed
    pub reconnect_delay_ms: u64,
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            timeout: Duration::from_millis(self.sync_timeout_ms),
            max_scan_bytes: self.max_scan_bytes,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        let sync = SyncConfig::default();
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            read_timeout_ms: 50,
            sync_timeout_ms: sync.timeout.as_millis() as u64,
            max_scan_bytes: sync.max_scan_bytes,
            reconnect_delay_ms: 1000,
        }
    }
}

/// Analyser parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Headings kept when assembling a rotation
    #[serde(default)]
    pub rotation: RotationConfig,

    /// Initial range-at-heading window; the robot may replace it at runtime
    #[serde(default)]
    pub range_window: HeadingWindow,

    #[serde(default)]
    pub wall: WallConfig,
}

/// Robot messaging over UDP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagingConfig {
    pub enabled: bool,

    /// Local address the node binds to
    pub bind_addr: String,

    /// Where documents are sent
    pub robot_addr: String,

    /// Poll interval for robot commands
    pub recv_timeout_ms: u64,

    pub send_buffer_bytes: usize,
}

impl MessagingConfig {
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: "0.0.0.0:5005".to_string(),
            robot_addr: "127.0.0.1:5006".to_string(),
            recv_timeout_ms: 100,
            send_buffer_bytes: 64 * 1024,
        }
    }
}

/// Rotation snapshot files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub enabled: bool,

    /// Each run writes into a timestamped subdirectory of this
    pub output_directory: String,

    /// Rotation time between two snapshots
    pub seconds_per_snapshot: f64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_directory: "./snapshots".to_string(),
            seconds_per_snapshot: 5.0,
        }
    }
}

/// Threading between acquisition and analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rotations buffered between acquisition and analysis
    pub queue_depth: usize,

    /// Statistics reporting interval in seconds
    pub stats_interval_seconds: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_depth: 4,
            stats_interval_seconds: 10,
        }
    }
}
