//! Audio analysis pipeline: source lifecycle plus per-frame sampling.

use std::mem;
use std::path::PathBuf;
use std::sync::mpsc::{RecvTimeoutError, TryRecvError};
use std::sync::Arc;

use super::bands::{reduce_bands, AudioSample, FrequencyBands};
use super::capture::CaptureBuffer;
use super::device::{spawn_device, Acquisition, AudioBackend, CpalBackend, DeviceHandle, DeviceRequest};
use super::fft::SpectrumAnalyzer;
use crate::error::{FieldError, Result};
use crate::params::{AnalysisConfig, SourceSelection, VisualizationMode};

/// Spectrum and waveform taken from one capture snapshot
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub spectrum: AudioSample,
    pub waveform: AudioSample,
    pub bands: FrequencyBands,
}

/// Observable state of the current source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    Inactive,
    Pending(SourceSelection),
    Active(SourceSelection),
}

enum SourceState {
    Inactive {
        last_error: Option<FieldError>,
    },
    Pending {
        source: SourceSelection,
        acquisition: Acquisition,
        capture: CaptureBuffer,
    },
    Active {
        source: SourceSelection,
        handle: DeviceHandle,
        capture: CaptureBuffer,
    },
}

/// Owns the active audio source and turns its samples into spectra.
///
/// Device failures never escape `sample`/`frame`: the pipeline goes
/// inactive and serves silence until another source is selected.
pub struct AudioPipeline {
    config: AnalysisConfig,
    backend: Arc<dyn AudioBackend>,
    analyzer: SpectrumAnalyzer,
    state: SourceState,
    mode: VisualizationMode,
    clip_path: Option<PathBuf>,
    last_snapshot: Vec<f32>,
}

impl AudioPipeline {
    /// Create a pipeline on the default cpal host
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        Self::with_backend(config, Arc::new(CpalBackend))
    }

    pub fn with_backend(config: AnalysisConfig, backend: Arc<dyn AudioBackend>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| FieldError::validation(format!("analysis config: {}", e)))?;

        Ok(Self {
            analyzer: SpectrumAnalyzer::new(&config),
            config,
            backend,
            state: SourceState::Inactive { last_error: None },
            mode: VisualizationMode::default(),
            clip_path: None,
            last_snapshot: Vec::new(),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn mode(&self) -> VisualizationMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: VisualizationMode) {
        self.mode = mode;
    }

    /// WAV file used by `SourceSelection::SampleClip`
    pub fn set_clip_path(&mut self, path: Option<PathBuf>) {
        self.clip_path = path;
    }

    pub fn status(&self) -> SourceStatus {
        match &self.state {
            SourceState::Inactive { .. } => SourceStatus::Inactive,
            SourceState::Pending { source, .. } => SourceStatus::Pending(*source),
            SourceState::Active { source, .. } => SourceStatus::Active(*source),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SourceState::Active { .. })
    }

    /// Error that made the pipeline inactive, if any
    pub fn last_error(&self) -> Option<&FieldError> {
        match &self.state {
            SourceState::Inactive { last_error } => last_error.as_ref(),
            _ => None,
        }
    }

    /// Start acquiring `source` without waiting for it.
    ///
    /// The current source is released first; a pending acquisition is
    /// cancelled and its device dropped as soon as it resolves.
    pub fn select(&mut self, source: SourceSelection) {
        self.release_current();
        self.analyzer.reset();
        self.last_snapshot.clear();

        let request = match source {
            SourceSelection::None => return,
            SourceSelection::Microphone => DeviceRequest::Microphone,
            SourceSelection::SyntheticTone => DeviceRequest::Tone {
                hz: self.config.tone_hz,
                sample_rate: self.config.sample_rate_hz,
            },
            SourceSelection::SampleClip => match &self.clip_path {
                Some(path) => DeviceRequest::Clip { path: path.clone() },
                None => {
                    let error = FieldError::device("no sample clip configured");
                    log::warn!("Cannot select sample clip: {}", error);
                    self.state = SourceState::Inactive {
                        last_error: Some(error),
                    };
                    return;
                }
            },
        };

        log::info!("Requesting audio source: {}", source.label());
        let capture = CaptureBuffer::new(self.config.fft_size);
        let acquisition = spawn_device(
            request,
            Arc::clone(&self.backend),
            capture.clone(),
            self.config.fft_size,
            self.config.audible,
        );

        self.state = SourceState::Pending {
            source,
            acquisition,
            capture,
        };
    }

    /// Collect the outcome of a pending acquisition, if it has one
    pub fn poll(&mut self) {
        let outcome = match &self.state {
            SourceState::Pending { acquisition, .. } => match acquisition.outcome.try_recv() {
                Ok(outcome) => outcome,
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    Err(FieldError::device("device thread exited without reporting"))
                }
            },
            _ => return,
        };
        self.resolve(outcome);
    }

    /// Select `source` and wait (up to the device timeout) for it to open
    pub fn configure(&mut self, source: SourceSelection) -> Result<()> {
        self.select(source);

        let outcome = match &self.state {
            SourceState::Inactive { last_error } => {
                return match last_error {
                    Some(e) => Err(e.clone()),
                    None => Ok(()),
                }
            }
            SourceState::Active { .. } => return Ok(()),
            SourceState::Pending { acquisition, .. } => {
                match acquisition.outcome.recv_timeout(self.config.device_timeout) {
                    Ok(outcome) => outcome,
                    Err(RecvTimeoutError::Timeout) => Err(FieldError::device(format!(
                        "{} did not open within {:?}",
                        source.label(),
                        self.config.device_timeout
                    ))),
                    Err(RecvTimeoutError::Disconnected) => {
                        Err(FieldError::device("device thread exited without reporting"))
                    }
                }
            }
        };

        self.resolve(outcome.clone());
        outcome
    }

    fn resolve(&mut self, outcome: Result<()>) {
        let (source, mut acquisition, capture) =
            match mem::replace(&mut self.state, SourceState::Inactive { last_error: None }) {
                SourceState::Pending {
                    source,
                    acquisition,
                    capture,
                } => (source, acquisition, capture),
                other => {
                    self.state = other;
                    return;
                }
            };

        match outcome {
            Ok(()) => {
                log::info!("Audio source active: {}", source.label());
                self.state = SourceState::Active {
                    source,
                    handle: acquisition.handle,
                    capture,
                };
            }
            Err(error) => {
                log::warn!("Audio source {} unavailable: {}", source.label(), error);
                acquisition.cancel.cancel();
                acquisition.handle.abandon();
                self.state = SourceState::Inactive {
                    last_error: Some(error),
                };
            }
        }
    }

    fn release_current(&mut self) {
        match mem::replace(&mut self.state, SourceState::Inactive { last_error: None }) {
            SourceState::Active { mut handle, .. } => {
                if let Err(e) = handle.release() {
                    log::debug!("{}", e);
                }
            }
            SourceState::Pending {
                source,
                mut acquisition,
                ..
            } => {
                log::debug!("Cancelling pending {} acquisition", source.label());
                acquisition.cancel.cancel();
                acquisition.handle.abandon();
            }
            SourceState::Inactive { .. } => {}
        }
    }

    /// Latest samples without waiting; a contended buffer yields the previous snapshot
    fn snapshot(&mut self) -> Option<&[f32]> {
        let SourceState::Active { capture, .. } = &self.state else {
            return None;
        };
        if let Some(samples) = capture.try_snapshot() {
            self.last_snapshot = samples;
        }
        Some(&self.last_snapshot)
    }

    /// Current sample for the configured visualization mode
    pub fn sample(&mut self) -> AudioSample {
        self.sample_for(self.mode)
    }

    /// Current sample for `mode`, or silence when no source is active
    pub fn sample_for(&mut self, mode: VisualizationMode) -> AudioSample {
        let bins = self.config.bin_count();
        let Some(samples) = self.snapshot().map(<[f32]>::to_vec) else {
            return AudioSample::silence(mode, bins);
        };
        match mode {
            VisualizationMode::Spectrum => self.analyzer.spectrum(&samples),
            VisualizationMode::Waveform => self.analyzer.waveform(&samples),
        }
    }

    /// Spectrum, waveform and bands from a single snapshot
    pub fn frame(&mut self) -> AudioFrame {
        let bins = self.config.bin_count();
        let (spectrum, waveform) = match self.snapshot().map(<[f32]>::to_vec) {
            Some(samples) => (
                self.analyzer.spectrum(&samples),
                self.analyzer.waveform(&samples),
            ),
            None => (
                AudioSample::silence(VisualizationMode::Spectrum, bins),
                AudioSample::silence(VisualizationMode::Waveform, bins),
            ),
        };
        let bands = reduce_bands(&spectrum);

        AudioFrame {
            spectrum,
            waveform,
            bands,
        }
    }

    /// Release every device; safe to call repeatedly
    pub fn teardown(&mut self) {
        if matches!(self.state, SourceState::Inactive { .. }) {
            log::debug!("Audio pipeline already torn down");
        }
        self.release_current();
        self.last_snapshot.clear();
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        self.release_current();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::MockBackend;

    fn test_config() -> AnalysisConfig {
        AnalysisConfig {
            audible: false,
            ..AnalysisConfig::default()
        }
    }

    fn denying_pipeline() -> AudioPipeline {
        AudioPipeline::with_backend(test_config(), Arc::new(MockBackend::denying())).unwrap()
    }

    #[test]
    fn test_inactive_pipeline_serves_silence() {
        let mut pipeline = denying_pipeline();

        let spectrum = pipeline.sample_for(VisualizationMode::Spectrum);
        assert_eq!(spectrum.len(), 128);
        assert!(spectrum.is_neutral(VisualizationMode::Spectrum));

        let waveform = pipeline.sample_for(VisualizationMode::Waveform);
        assert!(waveform.is_neutral(VisualizationMode::Waveform));

        assert_eq!(pipeline.frame().bands, FrequencyBands::default());
    }

    #[test]
    fn test_denied_microphone_then_tone() {
        let mut pipeline = denying_pipeline();

        assert_eq!(
            pipeline.configure(SourceSelection::Microphone),
            Err(FieldError::PermissionDenied)
        );
        assert!(!pipeline.is_active());
        assert_eq!(pipeline.last_error(), Some(&FieldError::PermissionDenied));
        assert!(pipeline.sample().is_neutral(VisualizationMode::Spectrum));

        assert!(pipeline.configure(SourceSelection::SyntheticTone).is_ok());
        assert_eq!(
            pipeline.status(),
            SourceStatus::Active(SourceSelection::SyntheticTone)
        );
        assert!(!pipeline.sample().is_neutral(VisualizationMode::Spectrum));
        assert!(!pipeline
            .sample_for(VisualizationMode::Waveform)
            .is_neutral(VisualizationMode::Waveform));

        pipeline.teardown();
    }

    #[test]
    fn test_microphone_samples_reach_spectrum() {
        let samples: Vec<f32> = (0..256).map(|i| (i as f32 * 0.3).sin() * 0.5).collect();
        let mut pipeline =
            AudioPipeline::with_backend(test_config(), Arc::new(MockBackend::with_input(samples)))
                .unwrap();

        pipeline.configure(SourceSelection::Microphone).unwrap();
        let frame = pipeline.frame();
        assert!(frame.bands.total > 0.0);
        assert!(frame.bands.total <= 1.0);
    }

    #[test]
    fn test_clip_without_path_is_setup_failure() {
        let mut pipeline = denying_pipeline();
        let result = pipeline.configure(SourceSelection::SampleClip);
        assert!(matches!(result, Err(FieldError::DeviceSetupFailure(_))));
        assert_eq!(pipeline.status(), SourceStatus::Inactive);
    }

    #[test]
    fn test_select_none_is_inactive() {
        let mut pipeline = denying_pipeline();
        pipeline.configure(SourceSelection::SyntheticTone).unwrap();
        assert!(pipeline.configure(SourceSelection::None).is_ok());
        assert_eq!(pipeline.status(), SourceStatus::Inactive);
        assert!(pipeline.sample().is_neutral(VisualizationMode::Spectrum));
    }

    #[test]
    fn test_reselect_cancels_pending() {
        let mut pipeline = denying_pipeline();
        pipeline.select(SourceSelection::SyntheticTone);
        assert!(matches!(pipeline.status(), SourceStatus::Pending(_) | SourceStatus::Active(_)));

        // Switching again before polling abandons the first request
        pipeline.select(SourceSelection::None);
        assert_eq!(pipeline.status(), SourceStatus::Inactive);
        pipeline.poll();
        assert_eq!(pipeline.status(), SourceStatus::Inactive);
    }

    #[test]
    fn test_poll_eventually_activates() {
        let mut pipeline = denying_pipeline();
        pipeline.select(SourceSelection::SyntheticTone);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while !pipeline.is_active() && std::time::Instant::now() < deadline {
            pipeline.poll();
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(pipeline.is_active());
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut pipeline = denying_pipeline();
        pipeline.configure(SourceSelection::SyntheticTone).unwrap();

        pipeline.teardown();
        pipeline.teardown();
        assert_eq!(pipeline.status(), SourceStatus::Inactive);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalysisConfig {
            fft_size: 100,
            ..test_config()
        };
        let result = AudioPipeline::with_backend(config, Arc::new(MockBackend::denying()));
        assert!(matches!(result, Err(FieldError::Validation(_))));
    }
}
