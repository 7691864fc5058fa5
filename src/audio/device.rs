//! Audio device access and per-source device threads.
//!
//! Every source runs on its own thread: the thread opens the device, reports
//! the outcome over a channel and then keeps the stream alive until told to
//! stop. cpal streams never leave the thread that built them.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    FromSample, Sample, SampleFormat, SampleRate, SizedSample, StreamConfig, SupportedStreamConfig,
    SupportedStreamConfigRange,
};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::capture::CaptureBuffer;
use super::synthesis::{ClipPlayer, SignalGenerator, ToneGenerator};
use crate::cancel::CancelToken;
use crate::error::{FieldError, Result};
use crate::params::audio_constants::BLOCK_SIZE;

/// Generator shared between an output callback and the silent fallback
pub type SharedGenerator = Arc<Mutex<Box<dyn SignalGenerator>>>;

/// Keeps a running device stream alive; dropped on the device thread
pub struct LiveStream {
    _stream: Option<cpal::Stream>,
}

impl LiveStream {
    pub fn from_stream(stream: cpal::Stream) -> Self {
        Self {
            _stream: Some(stream),
        }
    }

    /// A stream with no device behind it
    pub fn detached() -> Self {
        Self { _stream: None }
    }
}

/// Access to the platform audio devices
pub trait AudioBackend: Send + Sync {
    /// Start capturing the default input device into `capture`
    fn open_input(&self, capture: CaptureBuffer) -> Result<LiveStream>;

    /// Play `generator` on the default output device, mirroring into `capture`
    fn open_output(&self, generator: SharedGenerator, capture: CaptureBuffer)
        -> Result<LiveStream>;
}

/// Default backend on top of the cpal host
pub struct CpalBackend;

impl AudioBackend for CpalBackend {
    fn open_input(&self, capture: CaptureBuffer) -> Result<LiveStream> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| FieldError::device("No audio input device found"))?;

        let supported = device
            .default_input_config()
            .map_err(|e| classify_backend_error(e.to_string()))?;

        log::info!(
            "Capture: {} @ {}Hz ({})",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            supported.sample_rate().0,
            supported.sample_format()
        );

        let config = supported.config();
        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_capture_stream::<f32>(&device, &config, capture)?,
            SampleFormat::I16 => build_capture_stream::<i16>(&device, &config, capture)?,
            SampleFormat::U16 => build_capture_stream::<u16>(&device, &config, capture)?,
            other => {
                return Err(FieldError::device(format!(
                    "Unsupported capture format: {}",
                    other
                )))
            }
        };

        stream
            .play()
            .map_err(|e| classify_backend_error(e.to_string()))?;

        Ok(LiveStream::from_stream(stream))
    }

    fn open_output(
        &self,
        generator: SharedGenerator,
        capture: CaptureBuffer,
    ) -> Result<LiveStream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| FieldError::device("No audio output device found"))?;

        let rate = generator
            .lock()
            .map(|g| g.sample_rate() as u32)
            .unwrap_or(44100);
        let supported = output_config_for_rate(&device, rate)?;

        log::info!(
            "Playback: {} @ {}Hz ({})",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            supported.sample_rate().0,
            supported.sample_format()
        );
        if supported.sample_rate().0 != rate {
            log::warn!(
                "Output device cannot run at {}Hz; playback pitch will shift",
                rate
            );
        }

        let config = supported.config();
        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_playback_stream::<f32>(&device, &config, generator, capture)?,
            SampleFormat::I16 => build_playback_stream::<i16>(&device, &config, generator, capture)?,
            SampleFormat::U16 => build_playback_stream::<u16>(&device, &config, generator, capture)?,
            other => {
                return Err(FieldError::device(format!(
                    "Unsupported playback format: {}",
                    other
                )))
            }
        };

        stream
            .play()
            .map_err(|e| FieldError::device(format!("Failed to start audio stream: {}", e)))?;

        Ok(LiveStream::from_stream(stream))
    }
}

fn build_capture_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    capture: CaptureBuffer,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                capture.push_interleaved(data, channels);
            },
            |err| log::warn!("Audio capture error: {}", err),
            None,
        )
        .map_err(|e| classify_backend_error(e.to_string()))
}

fn build_playback_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    generator: SharedGenerator,
    capture: CaptureBuffer,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    let mut mono = vec![0.0f32; BLOCK_SIZE];

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames_needed = data.len() / channels;
                if mono.len() < frames_needed {
                    mono.resize(frames_needed, 0.0);
                }
                let block = &mut mono[..frames_needed];

                match generator.lock() {
                    Ok(mut generator) => generator.render(block),
                    Err(_) => block.fill(0.0),
                }

                write_limited(data, block, channels);
                capture.push_samples(block);
            },
            |err| log::warn!("Audio playback error: {}", err),
            None,
        )
        .map_err(|e| FieldError::device(format!("Failed to build audio stream: {}", e)))
}

/// Copy mono `block` to every channel of `data`
fn write_limited<T>(data: &mut [T], block: &[f32], channels: usize)
where
    T: Sample + FromSample<f32>,
{
    for (frame, &sample) in data.chunks_mut(channels).zip(block.iter()) {
        // Safety limiter: hard clip to ±0.5 to prevent ear damage
        frame.fill(sample.clamp(-0.5, 0.5).to_sample::<T>());
    }
}

/// Output config running at the generator's own rate when the device allows it
fn output_config_for_rate(device: &cpal::Device, rate: u32) -> Result<SupportedStreamConfig> {
    let ranges: Vec<SupportedStreamConfigRange> = device
        .supported_output_configs()
        .map(|configs| configs.collect())
        .unwrap_or_default();

    let candidates = ranges
        .iter()
        .map(|r| (r.sample_format(), r.min_sample_rate().0, r.max_sample_rate().0));
    if let Some(index) = preferred_output_range(candidates, rate) {
        return Ok(ranges[index].clone().with_sample_rate(SampleRate(rate)));
    }

    device
        .default_output_config()
        .map_err(|e| FieldError::device(format!("Failed to get audio config: {}", e)))
}

/// Index of the first range covering `rate`, float formats first
fn preferred_output_range(
    ranges: impl Iterator<Item = (SampleFormat, u32, u32)>,
    rate: u32,
) -> Option<usize> {
    let playable: Vec<(usize, SampleFormat)> = ranges
        .enumerate()
        .filter(|(_, (format, min, max))| {
            matches!(format, SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16)
                && (*min..=*max).contains(&rate)
        })
        .map(|(index, (format, _, _))| (index, format))
        .collect();

    playable
        .iter()
        .find(|(_, format)| *format == SampleFormat::F32)
        .or_else(|| playable.first())
        .map(|(index, _)| *index)
}

/// Map a backend error message onto the error taxonomy
pub fn classify_backend_error(message: String) -> FieldError {
    let lower = message.to_lowercase();
    let refused = ["permission", "denied", "not permitted", "unauthorized", "not authorized"]
        .iter()
        .any(|needle| lower.contains(needle));

    if refused {
        FieldError::PermissionDenied
    } else {
        FieldError::DeviceSetupFailure(message)
    }
}

/// Log every input and output device the host exposes
pub fn list_devices() {
    let host = cpal::default_host();
    log::info!("Audio host: {:?}", host.id());

    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Ok(name) = device.name() {
                log::info!("  {} (input)", name);
            }
        }
    }
    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            if let Ok(name) = device.name() {
                log::info!("  {} (output)", name);
            }
        }
    }
}

/// What a device thread should open
#[derive(Debug, Clone)]
pub enum DeviceRequest {
    Microphone,
    Tone { hz: f32, sample_rate: usize },
    Clip { path: PathBuf },
}

impl DeviceRequest {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Microphone => "microphone",
            Self::Tone { .. } => "synthetic tone",
            Self::Clip { .. } => "sample clip",
        }
    }

    fn build_generator(&self) -> Result<Option<Box<dyn SignalGenerator>>> {
        match self {
            Self::Microphone => Ok(None),
            Self::Tone { hz, sample_rate } => {
                Ok(Some(Box::new(ToneGenerator::new(*hz, *sample_rate)?)))
            }
            Self::Clip { path } => Ok(Some(Box::new(ClipPlayer::from_wav(path)?))),
        }
    }
}

/// Owning handle to a device thread.
///
/// `release` stops the thread and waits for it; releasing twice reports
/// `ResourceDisposal`, which callers treat as a no-op.
pub struct DeviceHandle {
    label: &'static str,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceHandle {
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_released(&self) -> bool {
        self.thread.is_none()
    }

    /// Stop the device thread and wait for it to drop its stream
    pub fn release(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Err(FieldError::ResourceDisposal(self.label.to_string()));
        };
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if thread.join().is_err() {
            log::warn!("{} device thread panicked", self.label);
        }
        log::debug!("Released {}", self.label);
        Ok(())
    }

    /// Signal the thread to stop without waiting (it may still be opening)
    pub fn abandon(&mut self) {
        self.stop.take();
        self.thread.take();
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        if !self.is_released() {
            let _ = self.release();
        }
    }
}

/// In-flight device acquisition
pub struct Acquisition {
    pub handle: DeviceHandle,
    pub outcome: Receiver<Result<()>>,
    pub cancel: CancelToken,
}

/// Spawn the device thread for `request`.
///
/// Generated sources prime `capture` with `prime_len` samples before
/// reporting success. They play through the output device when `audible`,
/// and otherwise (or when playback fails) render silently at real-time pace.
pub fn spawn_device(
    request: DeviceRequest,
    backend: Arc<dyn AudioBackend>,
    capture: CaptureBuffer,
    prime_len: usize,
    audible: bool,
) -> Acquisition {
    let (outcome_tx, outcome) = mpsc::channel();
    let (stop_tx, stop_rx) = mpsc::channel();
    let cancel = CancelToken::new();
    let thread_cancel = cancel.clone();
    let label = request.label();

    let spawned = thread::Builder::new()
        .name(format!("pulsefield-{}", label.replace(' ', "-")))
        .spawn(move || {
            let opened = open_source(&request, backend.as_ref(), &capture, prime_len, audible);

            if thread_cancel.is_cancelled() {
                log::debug!("Acquisition of {} cancelled", request.label());
                return;
            }

            match opened {
                Err(e) => {
                    let _ = outcome_tx.send(Err(e));
                }
                Ok(source) => {
                    let _ = outcome_tx.send(Ok(()));
                    hold(source, &stop_rx, &capture);
                }
            }
        });

    let thread = match spawned {
        Ok(thread) => Some(thread),
        Err(e) => {
            let (tx, rx) = mpsc::channel();
            let _ = tx.send(Err(FieldError::device(format!(
                "cannot spawn device thread: {}",
                e
            ))));
            return Acquisition {
                handle: DeviceHandle {
                    label,
                    stop: None,
                    thread: None,
                },
                outcome: rx,
                cancel,
            };
        }
    };

    Acquisition {
        handle: DeviceHandle {
            label,
            stop: Some(stop_tx),
            thread,
        },
        outcome,
        cancel,
    }
}

/// An opened source, alive for as long as the device thread holds it
enum OpenSource {
    Stream(LiveStream),
    Paced(SharedGenerator),
}

fn open_source(
    request: &DeviceRequest,
    backend: &dyn AudioBackend,
    capture: &CaptureBuffer,
    prime_len: usize,
    audible: bool,
) -> Result<OpenSource> {
    let Some(generator) = request.build_generator()? else {
        return backend.open_input(capture.clone()).map(OpenSource::Stream);
    };

    let generator: SharedGenerator = Arc::new(Mutex::new(generator));
    render_into(&generator, capture, prime_len);

    if audible {
        match backend.open_output(Arc::clone(&generator), capture.clone()) {
            Ok(stream) => return Ok(OpenSource::Stream(stream)),
            Err(e) => log::warn!("{}: playback unavailable ({}), rendering silently", request.label(), e),
        }
    }
    Ok(OpenSource::Paced(generator))
}

fn render_into(generator: &SharedGenerator, capture: &CaptureBuffer, len: usize) {
    let mut block = vec![0.0; len];
    if let Ok(mut generator) = generator.lock() {
        generator.render(&mut block);
    }
    capture.push_samples(&block);
}

/// Keep the source running until the stop channel fires or disconnects
fn hold(source: OpenSource, stop: &Receiver<()>, capture: &CaptureBuffer) {
    match source {
        OpenSource::Stream(stream) => {
            let _ = stop.recv();
            drop(stream);
        }
        OpenSource::Paced(generator) => {
            let chunk = BLOCK_SIZE * 4;
            let sample_rate = generator.lock().map(|g| g.sample_rate()).unwrap_or(44100);
            let period = Duration::from_secs_f64(chunk as f64 / sample_rate.max(1) as f64);

            loop {
                match stop.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => render_into(&generator, capture, chunk),
                    _ => break,
                }
            }
        }
    }
}
