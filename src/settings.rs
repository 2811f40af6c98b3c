use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DmxError, DmxResult};

const DEFAULT_FPS: f32 = 30.0;
const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Meters.
    pub saber_paint_radius: f32,
    /// Fraction of remaining brightness removed per second.
    pub saber_paint_decay_rate: f32,
    /// Empty means no scene.
    pub scene_file_path: String,
    pub output: OutputSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            saber_paint_radius: 0.05,
            saber_paint_decay_rate: 2.0,
            scene_file_path: String::new(),
            output: OutputSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub fps: f32,
    pub resolve_attempts: u32,
    pub resolve_backoff_ms: u64,
    pub discovery_interval_ms: u64,
    pub source_name: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            resolve_attempts: 10,
            resolve_backoff_ms: 1000,
            discovery_interval_ms: 10_000,
            source_name: "DMX Paint Source".to_string(),
        }
    }
}

impl OutputSettings {
    /// Period of the data loop. Non-positive rates fall back to 30 Hz and
    /// the period never drops below 1 ms.
    pub fn frame_interval(&self) -> Duration {
        let fps = if self.fps.is_finite() && self.fps > 0.0 {
            self.fps
        } else {
            DEFAULT_FPS
        };
        Duration::from_secs_f32(1.0 / fps).max(MIN_FRAME_INTERVAL)
    }

    pub fn resolve_backoff(&self) -> Duration {
        Duration::from_millis(self.resolve_backoff_ms)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms.max(1))
    }
}

impl Settings {
    /// Builds settings from string key/value pairs. Missing or unparsable
    /// values keep their defaults.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let defaults = Settings::default();
        let output = defaults.output.clone();

        Settings {
            saber_paint_radius: map
                .get("saber_paint_radius")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.saber_paint_radius),
            saber_paint_decay_rate: map
                .get("saber_paint_decay_rate")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.saber_paint_decay_rate),
            scene_file_path: map.get("scene_file_path").cloned().unwrap_or_default(),
            output: OutputSettings {
                fps: map
                    .get("fps")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(output.fps),
                resolve_attempts: map
                    .get("resolve_attempts")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(output.resolve_attempts),
                resolve_backoff_ms: map
                    .get("resolve_backoff_ms")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(output.resolve_backoff_ms),
                discovery_interval_ms: map
                    .get("discovery_interval_ms")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(output.discovery_interval_ms),
                source_name: map
                    .get("source_name")
                    .filter(|v| !v.is_empty())
                    .cloned()
                    .unwrap_or(output.source_name),
            },
        }
    }

    /// Reads a JSON settings file. A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> DmxResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("[scene] No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            DmxError::configuration(format!("malformed settings {}: {}", path.display(), e))
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> DmxResult<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| DmxError::configuration(format!("failed to encode settings: {}", e)))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn has_scene(&self) -> bool {
        !self.scene_file_path.trim().is_empty()
    }
}
