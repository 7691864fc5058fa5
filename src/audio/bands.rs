//! Byte-valued audio samples and band reduction.

use std::ops::Range;

use crate::params::{audio_constants::WAVEFORM_CENTER, band_ranges, VisualizationMode};

/// One analysis window worth of byte values.
///
/// Spectrum mode holds magnitudes ordered low to high frequency; waveform
/// mode holds chronological amplitudes centered on 128.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSample {
    data: Vec<u8>,
}

impl AudioSample {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Neutral array representing silence in the given mode
    pub fn silence(mode: VisualizationMode, len: usize) -> Self {
        let value = match mode {
            VisualizationMode::Spectrum => 0,
            VisualizationMode::Waveform => WAVEFORM_CENTER,
        };
        Self {
            data: vec![value; len],
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `index`, or the silent value for this mode when out of range
    pub fn get_or(&self, index: usize, fallback: u8) -> u8 {
        self.data.get(index).copied().unwrap_or(fallback)
    }

    /// Whether every value equals the silence value of `mode`
    pub fn is_neutral(&self, mode: VisualizationMode) -> bool {
        let silent = match mode {
            VisualizationMode::Spectrum => 0,
            VisualizationMode::Waveform => WAVEFORM_CENTER,
        };
        self.data.iter().all(|&v| v == silent)
    }
}

/// Normalized band energies, all in [0, 1]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrequencyBands {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub total: f32,
}

/// Band levels rounded to whole percent for display
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BandPercentages {
    pub bass: u8,
    pub mid: u8,
    pub treble: u8,
    pub total: u8,
}

impl FrequencyBands {
    pub fn percentages(&self) -> BandPercentages {
        let pct = |v: f32| (v.clamp(0.0, 1.0) * 100.0).round() as u8;
        BandPercentages {
            bass: pct(self.bass),
            mid: pct(self.mid),
            treble: pct(self.treble),
            total: pct(self.total),
        }
    }
}

/// Average the bins of `range` scaled to [0, 1]; bins past the end count as 0
fn band_mean(bins: &[u8], range: Range<usize>) -> f32 {
    if range.is_empty() {
        return 0.0;
    }
    let len = range.len();
    let sum: u32 = range.map(|k| bins.get(k).copied().unwrap_or(0) as u32).sum();
    (sum as f32 / len as f32 / 255.0).clamp(0.0, 1.0)
}

/// Reduce a spectrum to bass/mid/treble/total levels
pub fn reduce_bands(sample: &AudioSample) -> FrequencyBands {
    let [bass_bins, mid_bins, treble_bins] = band_ranges();
    let bins = sample.as_slice();

    let bass = band_mean(bins, bass_bins);
    let mid = band_mean(bins, mid_bins);
    let treble = band_mean(bins, treble_bins);

    FrequencyBands {
        bass,
        mid,
        treble,
        total: (bass + mid + treble) / 3.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_all_zero() {
        let bands = reduce_bands(&AudioSample::new(vec![0; 128]));
        assert_eq!(bands, FrequencyBands::default());
    }

    #[test]
    fn test_reduce_all_max() {
        let bands = reduce_bands(&AudioSample::new(vec![255; 128]));
        assert_eq!(bands.bass, 1.0);
        assert_eq!(bands.mid, 1.0);
        assert_eq!(bands.treble, 1.0);
        assert_eq!(bands.total, 1.0);
    }

    #[test]
    fn test_reduce_separates_bands() {
        let mut bins = vec![0u8; 128];
        bins[..8].fill(255);
        let bands = reduce_bands(&AudioSample::new(bins));

        assert_eq!(bands.bass, 1.0);
        assert_eq!(bands.mid, 0.0);
        assert_eq!(bands.treble, 0.0);
        assert!((bands.total - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_reduce_short_and_empty_samples() {
        assert_eq!(
            reduce_bands(&AudioSample::new(vec![])),
            FrequencyBands::default()
        );

        // Only half the bass bins present
        let bands = reduce_bands(&AudioSample::new(vec![255; 4]));
        assert!((bands.bass - 0.5).abs() < 1e-6);
        assert_eq!(bands.treble, 0.0);
    }

    #[test]
    fn test_silence_per_mode() {
        let spectrum = AudioSample::silence(VisualizationMode::Spectrum, 128);
        assert!(spectrum.as_slice().iter().all(|&v| v == 0));
        assert!(spectrum.is_neutral(VisualizationMode::Spectrum));

        let waveform = AudioSample::silence(VisualizationMode::Waveform, 128);
        assert!(waveform.as_slice().iter().all(|&v| v == 128));
        assert!(!waveform.is_neutral(VisualizationMode::Spectrum));
    }

    #[test]
    fn test_percentages() {
        let bands = FrequencyBands {
            bass: 0.5,
            mid: 0.254,
            treble: 1.0,
            total: 0.0,
        };
        let pct = bands.percentages();
        assert_eq!(pct.bass, 50);
        assert_eq!(pct.mid, 25);
        assert_eq!(pct.treble, 100);
        assert_eq!(pct.total, 0);
    }
}
