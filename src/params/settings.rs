//! Optional TOML settings file.
//!
//! Every key is optional; anything missing keeps its built-in default.
//!
//! ```toml
//! density = 1200
//! particle_size = 2.0
//! color_intensity = 80
//! connections = true
//! mode = "waveform"
//! source = "sample_clip"
//! clip = "loops/drums.wav"
//! audible = false
//! tone_hz = 330.0
//! device_timeout_secs = 3
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::audio::{AnalysisConfig, SourceSelection};
use super::field::{FieldSettings, VisualizationMode};
use crate::error::{FieldError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    pub density: Option<usize>,
    pub particle_size: Option<f32>,
    pub color_intensity: Option<u32>,
    pub connections: Option<bool>,
    pub mode: Option<VisualizationMode>,
    pub source: Option<SourceSelection>,
    pub clip: Option<PathBuf>,
    pub audible: Option<bool>,
    pub tone_hz: Option<f32>,
    pub device_timeout_secs: Option<u64>,
}

impl SettingsFile {
    /// Read and parse a settings file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            FieldError::validation(format!("cannot read {}: {}", path.display(), e))
        })?;
        let parsed = Self::parse(&text)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(parsed)
    }

    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| FieldError::validation(format!("settings file: {}", e)))
    }

    /// Overlay the file onto field settings; the result is validated
    pub fn field_settings(&self, base: &FieldSettings) -> Result<FieldSettings> {
        let settings = FieldSettings {
            density: self.density.unwrap_or(base.density),
            particle_size: self.particle_size.unwrap_or(base.particle_size),
            color_intensity: self.color_intensity.unwrap_or(base.color_intensity),
            connections_enabled: self.connections.unwrap_or(base.connections_enabled),
            visualization_mode: self.mode.unwrap_or(base.visualization_mode),
            source: self.source.unwrap_or(base.source),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Overlay the audio-related keys onto an analysis config
    pub fn analysis_config(&self, base: &AnalysisConfig) -> AnalysisConfig {
        AnalysisConfig {
            audible: self.audible.unwrap_or(base.audible),
            tone_hz: self.tone_hz.unwrap_or(base.tone_hz),
            device_timeout: self
                .device_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(base.device_timeout),
            ..base.clone()
        }
    }
}
