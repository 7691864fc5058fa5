//! Command-line argument parsing.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use pulsefield::params::{
    AnalysisConfig, FieldSettings, RenderConfig, SettingsFile, SourceSelection, VisualizationMode,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "Pulsefield")]
#[command(about = "Audio-reactive 3D particle field", long_about = None)]
pub struct Args {
    /// Number of particles (50-2000)
    #[arg(long, value_name = "COUNT")]
    pub density: Option<usize>,

    /// Particle size in world units (0.5-5)
    #[arg(long, value_name = "SIZE")]
    pub particle_size: Option<f32>,

    /// Base lightness percent (10-100)
    #[arg(long, value_name = "PERCENT")]
    pub color_intensity: Option<u32>,

    /// Draw lines between nearby particles
    #[arg(long)]
    pub connections: bool,

    /// What the audio drives: spectrum or waveform
    #[arg(long, value_enum)]
    pub mode: Option<VisualizationMode>,

    /// Audio source
    #[arg(long, value_enum)]
    pub source: Option<SourceSelection>,

    /// WAV file for the sample-clip source
    #[arg(long, value_name = "PATH")]
    pub clip: Option<PathBuf>,

    /// TOML settings file; flags given here override it
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Analyse generated sources without playing them
    #[arg(long)]
    pub mute: bool,

    /// Window width (pixels)
    #[arg(long, value_name = "PIXELS")]
    pub width: Option<u32>,

    /// Window height (pixels)
    #[arg(long, value_name = "PIXELS")]
    pub height: Option<u32>,

    /// Log available audio devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

/// Everything needed to start the visualizer
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub settings: FieldSettings,
    pub analysis: AnalysisConfig,
    pub render: RenderConfig,
    pub clip: Option<PathBuf>,
}

impl Args {
    /// Merge defaults, the settings file and command-line flags (in that order)
    pub fn resolve(&self) -> anyhow::Result<LaunchConfig> {
        let file = match &self.config {
            Some(path) => SettingsFile::load(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => SettingsFile::default(),
        };

        let base = file
            .field_settings(&FieldSettings::default())
            .context("Invalid settings file")?;

        let settings = FieldSettings {
            density: self.density.unwrap_or(base.density),
            particle_size: self.particle_size.unwrap_or(base.particle_size),
            color_intensity: self.color_intensity.unwrap_or(base.color_intensity),
            connections_enabled: self.connections || base.connections_enabled,
            visualization_mode: self.mode.unwrap_or(base.visualization_mode),
            source: self.source.unwrap_or(base.source),
        };
        settings.validate().context("Invalid command-line settings")?;

        let mut analysis = file.analysis_config(&AnalysisConfig::default());
        if self.mute {
            analysis.audible = false;
        }

        let mut render = RenderConfig::default();
        render.window_width = self.width.unwrap_or(render.window_width);
        render.window_height = self.height.unwrap_or(render.window_height);
        anyhow::ensure!(
            render.window_width > 0 && render.window_height > 0,
            "Window size must be non-zero"
        );

        Ok(LaunchConfig {
            settings,
            analysis,
            render,
            clip: self.clip.clone().or(file.clip),
        })
    }
}
