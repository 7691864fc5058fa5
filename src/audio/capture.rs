//! Shared ring buffer between audio producers and the render thread.

use cpal::{FromSample, Sample};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

/// Mono sample ring buffer holding the most recent analysis window.
///
/// Producers (device callbacks, generator threads) append; the render thread
/// only ever takes a non-blocking snapshot.
#[derive(Clone)]
pub struct CaptureBuffer {
    samples: Arc<Mutex<VecDeque<f32>>>,
    capacity: usize,
}

impl CaptureBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // Poisoning is ignored: producers only ever append samples
    fn lock(&self) -> MutexGuard<'_, VecDeque<f32>> {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append mono samples, dropping the oldest beyond capacity
    pub fn push_samples(&self, samples: &[f32]) {
        let mut buffer = self.lock();
        for &sample in samples {
            if buffer.len() == self.capacity {
                buffer.pop_front();
            }
            buffer.push_back(sample);
        }
    }

    /// Append interleaved frames of any device format, averaging channels down to mono
    pub fn push_interleaved<T>(&self, data: &[T], channels: usize)
    where
        T: Sample,
        f32: FromSample<T>,
    {
        let channels = channels.max(1);
        let mut buffer = self.lock();
        for chunk in data.chunks(channels) {
            let sum: f32 = chunk.iter().map(|&s| s.to_sample::<f32>()).sum();
            let sample = sum / chunk.len() as f32;
            if buffer.len() == self.capacity {
                buffer.pop_front();
            }
            buffer.push_back(sample);
        }
    }

    /// Copy of the buffered samples, or `None` when a producer holds the lock
    pub fn try_snapshot(&self) -> Option<Vec<f32>> {
        match self.samples.try_lock() {
            Ok(buffer) => Some(buffer.iter().copied().collect()),
            Err(TryLockError::Poisoned(poisoned)) => {
                Some(poisoned.into_inner().iter().copied().collect())
            }
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_drops_oldest() {
        let buffer = CaptureBuffer::new(4);
        buffer.push_samples(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.try_snapshot().unwrap(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_interleaved_downmix() {
        let buffer = CaptureBuffer::new(8);
        buffer.push_interleaved(&[1.0f32, 0.0, 0.5, 0.5, -1.0, -1.0], 2);

        assert_eq!(buffer.try_snapshot().unwrap(), vec![0.5, 0.5, -1.0]);
    }

    #[test]
    fn test_integer_formats_normalised() {
        let buffer = CaptureBuffer::new(8);
        buffer.push_interleaved(&[i16::MIN, 0, 0, 0], 2);
        assert_eq!(buffer.try_snapshot().unwrap(), vec![-0.5, 0.0]);

        // Unsigned samples are centred on 32768
        buffer.clear();
        buffer.push_interleaved(&[32768u16, 32768, 0, 0], 2);
        assert_eq!(buffer.try_snapshot().unwrap(), vec![0.0, -1.0]);
    }

    #[test]
    fn test_snapshot_does_not_block() {
        let buffer = CaptureBuffer::new(4);
        buffer.push_samples(&[1.0]);

        let clone = buffer.clone();
        let _held = clone.samples.lock().unwrap();
        assert!(buffer.try_snapshot().is_none());
    }

    #[test]
    fn test_clear() {
        let buffer = CaptureBuffer::new(4);
        buffer.push_samples(&[1.0, 2.0]);
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
