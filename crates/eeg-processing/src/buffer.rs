//! Sliding sample buffer with overlap retention

use std::collections::VecDeque;

/// A full window copied out of the buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Dispatch order, starting at 0
    pub index: u64,
    pub samples: Vec<f64>,
}

impl Window {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Fixed-capacity buffer over the raw sample stream
///
/// Holds at most `window_size` samples. After each `take_window` only the
/// most recent `retain` samples are kept, so consecutive windows overlap by
/// exactly `retain` samples.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<f64>,
    window_size: usize,
    retain: usize,
    next_index: u64,
}

impl SampleBuffer {
    /// Create a buffer; `retain` is clamped below `window_size`
    pub fn new(window_size: usize, retain: usize) -> Self {
        SampleBuffer {
            samples: VecDeque::with_capacity(window_size),
            window_size,
            retain: retain.min(window_size.saturating_sub(1)),
            next_index: 0,
        }
    }

    /// Buffer with 50% overlap
    pub fn half_overlap(window_size: usize) -> Self {
        Self::new(window_size, window_size / 2)
    }

    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.window_size {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn is_ready(&self) -> bool {
        self.samples.len() >= self.window_size
    }

    /// Copy out the current window and slide forward
    pub fn take_window(&mut self) -> Option<Window> {
        if !self.is_ready() {
            return None;
        }

        let samples: Vec<f64> = self.samples.iter().copied().collect();
        let discard = self.samples.len() - self.retain;
        self.samples.drain(..discard);

        let window = Window {
            index: self.next_index,
            samples,
        };
        self.next_index += 1;
        Some(window)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn retained(&self) -> usize {
        self.retain
    }

    /// Samples still needed before the next window is ready
    pub fn remaining(&self) -> usize {
        self.window_size.saturating_sub(self.samples.len())
    }

    /// Number of windows handed out so far
    pub fn windows_taken(&self) -> u64 {
        self.next_index
    }

    /// Drop all samples and restart window numbering
    pub fn clear(&mut self) {
        self.samples.clear();
        self.next_index = 0;
    }
}
