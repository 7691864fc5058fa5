//! FFT spectrum and waveform extraction.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

use super::bands::AudioSample;
use crate::params::AnalysisConfig;

/// Converts the latest time-domain window into byte spectra and waveforms.
///
/// Magnitudes are smoothed against the previous call, converted to
/// decibels and mapped linearly from `[min_decibels, max_decibels]` onto
/// `[0, 255]`.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
}

impl SpectrumAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.fft_size);
        let window = (0..config.fft_size)
            .map(|i| hann_window(i, config.fft_size))
            .collect();

        Self {
            fft,
            fft_size: config.fft_size,
            window,
            buffer: vec![Complex::new(0.0, 0.0); config.fft_size],
            smoothed: vec![0.0; config.bin_count()],
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Forget smoothing history (used when the source changes)
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
    }

    /// Byte spectrum of the most recent `fft_size` samples.
    ///
    /// Shorter input is treated as preceded by silence.
    pub fn spectrum(&mut self, samples: &[f32]) -> AudioSample {
        let offset = self.fft_size.saturating_sub(samples.len());
        let recent = &samples[samples.len().saturating_sub(self.fft_size)..];

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let value = if i < offset { 0.0 } else { recent[i - offset] };
            *slot = Complex::new(value * self.window[i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        let scale = 1.0 / self.fft_size as f32;
        let min_db = self.min_decibels;
        let range = self.max_decibels - min_db;
        let tau = self.smoothing;

        let bins = self
            .smoothed
            .iter_mut()
            .zip(&self.buffer)
            .map(|(smoothed, c)| {
                let magnitude = c.norm() * scale;
                *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;

                if *smoothed <= 0.0 {
                    return 0;
                }
                let db = 20.0 * smoothed.log10();
                (255.0 * (db - min_db) / range).clamp(0.0, 255.0) as u8
            })
            .collect();

        AudioSample::new(bins)
    }

    /// Byte waveform of the most recent `bin_count` samples, centered on 128
    pub fn waveform(&self, samples: &[f32]) -> AudioSample {
        let len = self.bin_count();
        let offset = len.saturating_sub(samples.len());
        let recent = &samples[samples.len().saturating_sub(len)..];

        let data = (0..len)
            .map(|i| {
                let s = if i < offset { 0.0 } else { recent[i - offset] };
                (128.0 + s * 128.0).clamp(0.0, 255.0) as u8
            })
            .collect();

        AudioSample::new(data)
    }
}

/// Hann window function for FFT analysis
pub fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}
