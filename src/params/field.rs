//! Particle field settings, bounds and connection parameters.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use super::audio::SourceSelection;
use crate::error::{FieldError, Result};

/// Allowed particle counts
pub const DENSITY_RANGE: RangeInclusive<usize> = 50..=2000;

/// Allowed particle sizes (world units)
pub const PARTICLE_SIZE_RANGE: RangeInclusive<f32> = 0.5..=5.0;

/// Allowed color intensities (HSL lightness percent)
pub const COLOR_INTENSITY_RANGE: RangeInclusive<u32> = 10..=100;

/// What the audio sample represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationMode {
    /// Frequency magnitudes, low to high
    #[default]
    Spectrum,
    /// Time-domain amplitude
    Waveform,
}

impl VisualizationMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Spectrum => Self::Waveform,
            Self::Waveform => Self::Spectrum,
        }
    }
}

/// User-facing field configuration, applied atomically before a frame
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSettings {
    /// Particle count
    pub density: usize,

    /// Rendered particle size (world units)
    pub particle_size: f32,

    /// Base HSL lightness (percent), floored at 50 when coloring
    pub color_intensity: u32,

    /// Draw proximity lines between particles
    pub connections_enabled: bool,

    pub visualization_mode: VisualizationMode,

    pub source: SourceSelection,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            density: 800,
            particle_size: 1.5,
            color_intensity: 70,
            connections_enabled: false,
            visualization_mode: VisualizationMode::Spectrum,
            source: SourceSelection::SyntheticTone,
        }
    }
}

impl FieldSettings {
    /// Check every bounded value
    pub fn validate(&self) -> Result<()> {
        validate_density(self.density)?;
        if !PARTICLE_SIZE_RANGE.contains(&self.particle_size) {
            return Err(FieldError::validation(format!(
                "particle size {} outside [{}, {}]",
                self.particle_size,
                PARTICLE_SIZE_RANGE.start(),
                PARTICLE_SIZE_RANGE.end()
            )));
        }
        if !COLOR_INTENSITY_RANGE.contains(&self.color_intensity) {
            return Err(FieldError::validation(format!(
                "color intensity {} outside [{}, {}]",
                self.color_intensity,
                COLOR_INTENSITY_RANGE.start(),
                COLOR_INTENSITY_RANGE.end()
            )));
        }
        Ok(())
    }
}

pub fn validate_density(density: usize) -> Result<()> {
    if DENSITY_RANGE.contains(&density) {
        Ok(())
    } else {
        Err(FieldError::validation(format!(
            "density {} outside [{}, {}]",
            density,
            DENSITY_RANGE.start(),
            DENSITY_RANGE.end()
        )))
    }
}

/// Sampling parameters for the proximity graph
#[derive(Debug, Clone, Copy)]
pub struct ConnectionParams {
    /// Index step for both loops
    pub stride: usize,

    /// How far ahead (in indices) a particle looks for neighbours
    pub window: usize,

    /// Pairs at or beyond this distance are dropped (world units)
    pub max_distance: f32,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            stride: 10,
            window: 50,
            max_distance: 15.0,
        }
    }
}

impl ConnectionParams {
    /// Upper bound on candidate pairs evaluated for `n` particles
    pub fn candidate_bound(&self, n: usize) -> usize {
        if self.stride == 0 || n < self.stride {
            return 0;
        }
        let outer = n.div_ceil(self.stride);
        let inner = self.window.saturating_sub(self.stride).div_ceil(self.stride);
        outer * inner
    }
}
