//! Generated audio sources: Glicol tone and looped WAV clips.

use glicol::Engine;
use std::path::Path;

use crate::error::{FieldError, Result};
use crate::params::audio_constants::BLOCK_SIZE;

/// Glicol composition for the synthetic tone; `{hz}` is the base pitch
const TONE_COMPOSITION: &str = r#"
~amp: sin 0.3 >> mul 0.15 >> add 0.2
~mod: sin 0.2 >> mul 1300 >> add 1500
o: saw {hz} >> lpf ~mod 3.0 >> mul ~amp
"#;

/// A mono signal source rendered on demand
pub trait SignalGenerator: Send {
    fn sample_rate(&self) -> usize;

    /// Fill `out` with the next samples
    fn render(&mut self, out: &mut [f32]);
}

/// Band-limited saw tone with a slow filter sweep, rendered by Glicol
pub struct ToneGenerator {
    engine: Engine<BLOCK_SIZE>,
    sample_rate: usize,
    block: [f32; BLOCK_SIZE],
    cursor: usize,
}

impl ToneGenerator {
    pub fn new(tone_hz: f32, sample_rate: usize) -> Result<Self> {
        if !tone_hz.is_finite() || tone_hz <= 0.0 || sample_rate == 0 {
            return Err(FieldError::device(format!(
                "cannot synthesise {} Hz at {} Hz sample rate",
                tone_hz, sample_rate
            )));
        }
        let code = TONE_COMPOSITION.replace("{hz}", &format!("{:.2}", tone_hz));

        let mut engine = Engine::<BLOCK_SIZE>::new();
        engine.set_sr(sample_rate);
        engine.update_with_code(&code);

        Ok(Self {
            engine,
            sample_rate,
            block: [0.0; BLOCK_SIZE],
            cursor: BLOCK_SIZE,
        })
    }
}

impl SignalGenerator for ToneGenerator {
    fn sample_rate(&self) -> usize {
        self.sample_rate
    }

    fn render(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            if self.cursor == BLOCK_SIZE {
                let (buffers, _) = self.engine.next_block(vec![]);
                for i in 0..BLOCK_SIZE {
                    self.block[i] = buffers[0][i];
                }
                self.cursor = 0;
            }
            *sample = self.block[self.cursor];
            self.cursor += 1;
        }
    }
}

/// Looping playback of a decoded clip
pub struct ClipPlayer {
    samples: Vec<f32>,
    sample_rate: usize,
    position: usize,
}

impl ClipPlayer {
    pub fn from_samples(samples: Vec<f32>, sample_rate: usize) -> Result<Self> {
        if samples.is_empty() {
            return Err(FieldError::device("clip contains no samples"));
        }
        Ok(Self {
            samples,
            sample_rate,
            position: 0,
        })
    }

    /// Decode a WAV file, averaging channels to mono
    pub fn from_wav(path: &Path) -> Result<Self> {
        let reader = hound::WavReader::open(path)
            .map_err(|e| FieldError::device(format!("cannot open {}: {}", path.display(), e)))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| FieldError::device(format!("corrupt clip: {}", e)))?,
            hound::SampleFormat::Int => {
                let full_scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full_scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| FieldError::device(format!("corrupt clip: {}", e)))?
            }
        };

        let mono = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        log::info!(
            "Decoded clip {} ({} Hz, {} channel(s))",
            path.display(),
            spec.sample_rate,
            channels
        );
        Self::from_samples(mono, spec.sample_rate as usize)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SignalGenerator for ClipPlayer {
    fn sample_rate(&self) -> usize {
        self.sample_rate
    }

    fn render(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.samples[self.position];
            self.position = (self.position + 1) % self.samples.len();
        }
    }
}
