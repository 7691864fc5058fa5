//! Audio analysis configuration and constants.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Duration;

/// Audio source selection (mutually exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceSelection {
    /// Live capture from the default input device
    Microphone,
    /// Looped WAV clip
    SampleClip,
    /// Generated tone
    #[default]
    SyntheticTone,
    /// No source; the field runs on silence
    None,
}

impl SourceSelection {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Microphone => "microphone",
            Self::SampleClip => "sample clip",
            Self::SyntheticTone => "synthetic tone",
            Self::None => "none",
        }
    }
}

/// Spectral analysis configuration
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Sample rate used for generated sources (Hz)
    pub sample_rate_hz: usize,

    /// FFT window size (must be power of 2)
    /// 256 points = 128 frequency bins
    pub fft_size: usize,

    /// Temporal smoothing between consecutive spectra (0 = none, <1)
    pub smoothing: f32,

    /// Magnitude mapped to byte 0 (dB)
    pub min_decibels: f32,

    /// Magnitude mapped to byte 255 (dB)
    pub max_decibels: f32,

    /// Upper bound on a blocking `configure` call
    pub device_timeout: Duration,

    /// Frequency of the synthetic tone (Hz)
    pub tone_hz: f32,

    /// Play generated sources through the default output device
    pub audible: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44100,
            fft_size: 256,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            device_timeout: Duration::from_secs(5),
            tone_hz: 220.0,
            audible: true,
        }
    }
}

impl AnalysisConfig {
    /// Number of frequency bins produced per analysis window
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Validate configuration (FFT size must be power of 2, etc.)
    pub fn validate(&self) -> Result<(), String> {
        if !self.fft_size.is_power_of_two() || self.fft_size < 128 {
            return Err(format!(
                "FFT size must be a power of 2 and at least 128, got {}",
                self.fft_size
            ));
        }
        if self.sample_rate_hz == 0 {
            return Err("Sample rate must be > 0".to_string());
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(format!("Smoothing must be in [0, 1), got {}", self.smoothing));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(format!(
                "Decibel range is empty: [{}, {}]",
                self.min_decibels, self.max_decibels
            ));
        }
        Ok(())
    }
}

/// Audio constants (compile-time, match Glicol engine setup)
pub mod audio_constants {
    use std::ops::Range;

    /// Audio block size (samples per buffer)
    /// 128 = 2.9ms @ 44.1kHz
    pub const BLOCK_SIZE: usize = 128;

    /// Byte value of a silent waveform sample
    pub const WAVEFORM_CENTER: u8 = 128;

    /// Spectrum bins averaged into each band
    pub const BASS_BINS: Range<usize> = 0..8;
    pub const MID_BINS: Range<usize> = 8..32;
    pub const TREBLE_BINS: Range<usize> = 32..64;
}

/// Band bin ranges in (bass, mid, treble) order
pub fn band_ranges() -> [Range<usize>; 3] {
    [
        audio_constants::BASS_BINS,
        audio_constants::MID_BINS,
        audio_constants::TREBLE_BINS,
    ]
}
