//! Ring buffers backing the render history.
//!
//! All four render rings (time-domain blocks, downsampled samples, power
//! spectra and complex spectra) share the same cursor arithmetic, kept in
//! [`RingIndex`]. The rings differ only in which direction their cursors
//! move; see `RenderDelayBuffer` for the sign convention.

use crate::block::Block;
use crate::common::FFT_LENGTH_BY_2_PLUS_1;
use crate::fft_data::FftData;

/// Circular buffer index state with `read` and `write` cursors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RingIndex {
    pub size: usize,
    pub write: usize,
    pub read: usize,
}

impl RingIndex {
    pub(crate) fn new(size: usize) -> Self {
        debug_assert!(size > 0);
        Self {
            size,
            write: 0,
            read: 0,
        }
    }

    pub(crate) fn inc_index(&self, index: usize) -> usize {
        if index < self.size - 1 { index + 1 } else { 0 }
    }

    pub(crate) fn dec_index(&self, index: usize) -> usize {
        if index > 0 { index - 1 } else { self.size - 1 }
    }

    /// Moves `index` by `offset` positions, wrapping in both directions.
    pub(crate) fn offset_index(&self, index: usize, offset: isize) -> usize {
        (index as isize + offset).rem_euclid(self.size as isize) as usize
    }

    pub(crate) fn inc_write(&mut self) {
        self.write = self.inc_index(self.write);
    }

    pub(crate) fn dec_write(&mut self) {
        self.write = self.dec_index(self.write);
    }

    pub(crate) fn update_write(&mut self, offset: isize) {
        self.write = self.offset_index(self.write, offset);
    }

    pub(crate) fn inc_read(&mut self) {
        self.read = self.inc_index(self.read);
    }

    pub(crate) fn dec_read(&mut self) {
        self.read = self.dec_index(self.read);
    }

    pub(crate) fn update_read(&mut self, offset: isize) {
        self.read = self.offset_index(self.read, offset);
    }
}

/// Fixed-capacity ring of `T` addressed through a [`RingIndex`].
#[derive(Debug, Clone)]
pub(crate) struct RingBuffer<T> {
    pub index: RingIndex,
    pub buffer: Vec<T>,
}

impl<T: Clone> RingBuffer<T> {
    /// Creates a ring of `size` slots, each initialized to `value`.
    pub(crate) fn new(size: usize, value: T) -> Self {
        Self {
            index: RingIndex::new(size),
            buffer: vec![value; size],
        }
    }
}

impl<T> RingBuffer<T> {
    pub(crate) fn len(&self) -> usize {
        self.buffer.len()
    }
}

/// Time-domain render blocks.
pub(crate) type BlockBuffer = RingBuffer<Block>;
/// Downsampled render samples, stored newest-first.
pub(crate) type DownsampledRenderBuffer = RingBuffer<f32>;
/// Render power spectra.
pub(crate) type SpectrumBuffer = RingBuffer<[f32; FFT_LENGTH_BY_2_PLUS_1]>;
/// Render complex spectra.
pub(crate) type FftBuffer = RingBuffer<FftData>;
