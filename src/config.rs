//! Application configuration
//!
//! A single TOML file, created with defaults on first start. Missing sections
//! and keys fall back to their defaults so older files keep loading.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::control::Property;
use crate::device::{Capability, DeviceCapabilities, DeviceId, SimulatedCamera};
use crate::hub::HubSettings;
use crate::input::GamepadSettings;

const CONFIG_DIR: &str = "openptz";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GestureConfig {
    pub long_press_ms: u64,
    pub repeat_interval_ms: u64,
    pub ack_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            long_press_ms: 1000,
            repeat_interval_ms: 50,
            ack_ms: 300,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GamepadConfig {
    pub enabled: bool,
    pub deadzone: f32,
    pub refresh_interval_ms: u64,
    pub idle_scan_interval_ms: u64,
    pub invert_pan: bool,
    pub invert_tilt: bool,
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            deadzone: 0.1,
            refresh_interval_ms: 16,
            idle_scan_interval_ms: 250,
            invert_pan: true,
            invert_tilt: true,
        }
    }
}

/// Range of one simulated axis
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
pub struct AxisConfig {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub value: Option<f64>,
}

/// A simulated camera; axes left out are not controllable
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub latency_ms: u64,
    /// Number of applies that fail right after start, for trying out error handling
    #[serde(default)]
    pub fail_first: u32,
    pub pan: Option<AxisConfig>,
    pub tilt: Option<AxisConfig>,
    pub zoom: Option<AxisConfig>,
}

impl CameraConfig {
    fn axis(&self, property: Property) -> Option<&AxisConfig> {
        match property {
            Property::Pan => self.pan.as_ref(),
            Property::Tilt => self.tilt.as_ref(),
            Property::Zoom => self.zoom.as_ref(),
        }
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        let mut capabilities = DeviceCapabilities::default();
        for property in Property::ALL {
            if let Some(axis) = self.axis(property) {
                let capability = Capability {
                    min: axis.min,
                    max: axis.max,
                    step: axis.step,
                };
                capabilities.insert(property, capability, axis.value);
            }
        }
        capabilities
    }

    pub fn build(&self) -> SimulatedCamera {
        let camera = SimulatedCamera::new(
            DeviceId::new(self.id.clone()),
            self.label.clone(),
            self.capabilities(),
            Duration::from_millis(self.latency_ms),
        );
        if self.fail_first > 0 {
            info!("{} will fail its first {} applies", self.id, self.fail_first);
            camera.fail_next(self.fail_first);
        }
        camera
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PtzConfig {
    pub gesture: GestureConfig,
    pub gamepad: GamepadConfig,
    pub cameras: Vec<CameraConfig>,
}

impl Default for PtzConfig {
    fn default() -> Self {
        let standard = AxisConfig {
            min: -180_000.0,
            max: 180_000.0,
            step: 3_600.0,
            value: Some(0.0),
        };
        Self {
            gesture: GestureConfig::default(),
            gamepad: GamepadConfig::default(),
            cameras: vec![CameraConfig {
                id: "sim-1".to_string(),
                label: "Simulated camera".to_string(),
                latency_ms: 80,
                fail_first: 0,
                pan: Some(standard),
                tilt: Some(standard),
                zoom: Some(AxisConfig {
                    min: 100.0,
                    max: 400.0,
                    step: 10.0,
                    value: Some(100.0),
                }),
            }],
        }
    }
}

impl PtzConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("Failed to parse config file: {}", e))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre!("Failed to serialize config: {}", e))
    }

    pub fn hub_settings(&self) -> HubSettings {
        HubSettings {
            long_press: Duration::from_millis(self.gesture.long_press_ms),
            repeat_interval: Duration::from_millis(self.gesture.repeat_interval_ms),
            ack: Duration::from_millis(self.gesture.ack_ms),
        }
    }

    pub fn gamepad_settings(&self) -> GamepadSettings {
        GamepadSettings {
            deadzone: self.gamepad.deadzone,
            refresh_interval: Duration::from_millis(self.gamepad.refresh_interval_ms),
            idle_scan_interval: Duration::from_millis(self.gamepad.idle_scan_interval_ms),
            invert_pan: self.gamepad.invert_pan,
            invert_tilt: self.gamepad.invert_tilt,
        }
    }

    /// `<config dir>/openptz/config.toml`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("No config directory found, using the working directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Reads the config at `path`, writing the defaults there first if it does not exist
    pub async fn load_or_init(path: &Path) -> Result<Self> {
        if tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| eyre!("Failed to read config file: {}", e))?;
            let config = Self::from_toml_str(&content)?;
            info!("Loaded config from {}", path.display());
            return Ok(config);
        }

        warn!("Config file {} does not exist, writing defaults", path.display());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        let config = Self::default();
        tokio::fs::write(path, config.to_toml_string()?)
            .await
            .map_err(|e| eyre!("Failed to write config file: {}", e))?;
        Ok(config)
    }
}
