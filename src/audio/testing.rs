//! Device-free backend for tests.

use super::capture::CaptureBuffer;
use super::device::{AudioBackend, LiveStream, SharedGenerator};
use crate::error::{FieldError, Result};

/// Backend that never touches real hardware.
///
/// Input either fails with `PermissionDenied` or replays fixed samples;
/// output always fails, so generated sources render silently.
pub struct MockBackend {
    input: Option<Vec<f32>>,
}

impl MockBackend {
    pub fn denying() -> Self {
        Self { input: None }
    }

    pub fn with_input(samples: Vec<f32>) -> Self {
        Self {
            input: Some(samples),
        }
    }
}

impl AudioBackend for MockBackend {
    fn open_input(&self, capture: CaptureBuffer) -> Result<LiveStream> {
        match &self.input {
            Some(samples) => {
                capture.push_samples(samples);
                Ok(LiveStream::detached())
            }
            None => Err(FieldError::PermissionDenied),
        }
    }

    fn open_output(&self, _generator: SharedGenerator, _capture: CaptureBuffer) -> Result<LiveStream> {
        Err(FieldError::device("no output device in tests"))
    }
}
