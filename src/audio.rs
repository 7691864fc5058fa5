//! Audio sources and analysis.
//!
//! Device threads (microphone capture, Glicol tone, looped clips) feed a
//! shared ring buffer; the render thread snapshots it once per frame and
//! runs an FFT to produce byte spectra, waveforms and frequency bands.

mod bands;
mod capture;
mod device;
mod fft;
mod synthesis;
mod system;

#[cfg(test)]
pub(crate) mod testing;

pub use bands::{reduce_bands, AudioSample, BandPercentages, FrequencyBands};
pub use capture::CaptureBuffer;
pub use device::{
    classify_backend_error, list_devices, AudioBackend, CpalBackend, LiveStream, SharedGenerator,
};
pub use fft::{hann_window, SpectrumAnalyzer};
pub use synthesis::{ClipPlayer, SignalGenerator, ToneGenerator};
pub use system::{AudioFrame, AudioPipeline, SourceStatus};
