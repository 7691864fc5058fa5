//! Parameter definitions with units and documented semantics.
//!
//! All magic numbers are extracted here with:
//! - Units (world units, seconds, Hz, etc.)
//! - Documented ranges and meanings
//! - Validation at the configuration boundary

mod audio;
mod camera;
mod field;
mod render;
mod settings;

// Re-export all types
pub use audio::{audio_constants, band_ranges, AnalysisConfig, SourceSelection};
pub use camera::OrbitParams;
pub use field::{
    validate_density, ConnectionParams, FieldSettings, VisualizationMode,
    COLOR_INTENSITY_RANGE, DENSITY_RANGE, PARTICLE_SIZE_RANGE,
};
pub use render::RenderConfig;
pub use settings::SettingsFile;
