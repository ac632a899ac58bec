//! # Ring Buffer for PCM Audio Samples
//!
//! Bounded circular buffer between a producer that may block (the decode
//! worker writing through a sink) and a real-time consumer that must not
//! (a device callback).
//!
//! ## Design
//!
//! - **Capacity**: fixed at creation, in samples
//! - **Full policy**: [`write_blocking`](RingBuffer::write_blocking) waits for
//!   space, so the device's consumption rate paces the producer
//! - **Consumer**: [`read`](RingBuffer::read) never blocks and returns what
//!   is available
//! - **Close**: wakes every waiting producer; later writes accept nothing
//!
//! ## Usage
//!
//! ```rust
//! use core_playback::ring_buffer::RingBuffer;
//!
//! // Half a second of stereo audio at 48 kHz
//! let buffer = RingBuffer::new(48_000);
//!
//! // Producer
//! buffer.write_blocking(&[0.1f32, -0.1, 0.2, -0.2]);
//!
//! // Consumer (device callback)
//! let mut output = vec![0.0f32; 1024];
//! let read = buffer.read(&mut output);
//! assert_eq!(read, 4);
//! ```

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

#[derive(Clone)]
pub struct RingBuffer {
    inner: Arc<RingBufferInner>,
}

struct RingBufferInner {
    state: Mutex<RingState>,
    /// Signalled when the consumer frees space or the buffer closes.
    space_available: Condvar,
    /// Signalled when the buffer becomes empty.
    drained: Condvar,
    capacity: usize,
}

struct RingState {
    buffer: Vec<f32>,
    read_pos: usize,
    len: usize,
    closed: bool,
}

impl RingState {
    fn push(&mut self, samples: &[f32], capacity: usize) -> usize {
        let count = samples.len().min(capacity - self.len);
        let write_pos = (self.read_pos + self.len) % capacity;
        for (i, &sample) in samples[..count].iter().enumerate() {
            self.buffer[(write_pos + i) % capacity] = sample;
        }
        self.len += count;
        count
    }
}

impl RingBuffer {
    /// Create a new ring buffer holding `capacity` samples (at least one).
    ///
    /// For stereo audio at 44.1 kHz with 1 second buffer: `capacity = 44100 * 2`
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(RingBufferInner {
                state: Mutex::new(RingState {
                    buffer: vec![0.0; capacity],
                    read_pos: 0,
                    len: 0,
                    closed: false,
                }),
                space_available: Condvar::new(),
                drained: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Write all of `samples`, waiting for space while the buffer is full.
    ///
    /// Returns the number of samples written, which is less than
    /// `samples.len()` only if the buffer was closed meanwhile.
    pub fn write_blocking(&self, samples: &[f32]) -> usize {
        let mut state = self.inner.state.lock();
        let mut written = 0;
        while written < samples.len() {
            if state.closed {
                break;
            }
            if state.len == self.inner.capacity {
                self.inner.space_available.wait(&mut state);
                continue;
            }
            written += state.push(&samples[written..], self.inner.capacity);
        }
        written
    }

    /// Write as many samples as fit without waiting.
    pub fn try_write(&self, samples: &[f32]) -> usize {
        let mut state = self.inner.state.lock();
        if state.closed {
            return 0;
        }
        state.push(samples, self.inner.capacity)
    }

    /// Read up to `output.len()` samples without blocking.
    ///
    /// Returns the number of samples actually read.
    pub fn read(&self, output: &mut [f32]) -> usize {
        let mut state = self.inner.state.lock();
        let to_read = state.len.min(output.len());
        for (i, slot) in output[..to_read].iter_mut().enumerate() {
            *slot = state.buffer[(state.read_pos + i) % self.inner.capacity];
        }
        state.read_pos = (state.read_pos + to_read) % self.inner.capacity;
        state.len -= to_read;

        if to_read > 0 {
            self.inner.space_available.notify_all();
        }
        if state.len == 0 {
            self.inner.drained.notify_all();
        }
        to_read
    }

    /// Block until the consumer has read everything, or the buffer closes.
    pub fn wait_until_empty(&self) {
        let mut state = self.inner.state.lock();
        while state.len > 0 && !state.closed {
            self.inner.drained.wait(&mut state);
        }
    }

    /// Returns the number of samples currently available to read.
    pub fn available(&self) -> usize {
        self.inner.state.lock().len
    }

    /// Returns the number of samples that can be written without waiting.
    pub fn free_space(&self) -> usize {
        self.inner.capacity - self.available()
    }

    /// Returns the total capacity of the buffer in samples.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Returns the buffer fill percentage (0.0 to 1.0).
    pub fn fill_level(&self) -> f32 {
        self.available() as f32 / self.inner.capacity as f32
    }

    /// Discard all queued samples and wake waiting producers.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        state.read_pos = 0;
        state.len = 0;
        self.inner.space_available.notify_all();
        self.inner.drained.notify_all();
    }

    /// Reject further writes and wake everyone waiting.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        state.closed = true;
        self.inner.space_available.notify_all();
        self.inner.drained.notify_all();
    }

    /// Accept writes again after [`close`](RingBuffer::close), starting empty.
    pub fn reopen(&self) {
        let mut state = self.inner.state.lock();
        state.closed = false;
        state.read_pos = 0;
        state.len = 0;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Returns `true` if the buffer has no samples available.
    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Returns `true` if the buffer is full.
    pub fn is_full(&self) -> bool {
        self.available() == self.inner.capacity
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RingBuffer")
            .field("capacity", &self.inner.capacity)
            .field("len", &state.len)
            .field("closed", &state.closed)
            .finish()
    }
}
