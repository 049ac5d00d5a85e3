//! Render delay buffer, buffers incoming render blocks for extraction with a
//! specified delay.
//!
//! Four rings are kept in lockstep: time-domain blocks (advancing forwards),
//! power spectra and complex spectra (advancing backwards), and the 4:1
//! downsampled signal used by the delay estimator (advancing backwards by one
//! sub-block per block). The read cursors of the block-rate rings trail the
//! write cursors by the applied delay.

use crate::aec3_fft::Aec3Fft;
use crate::block::Block;
use crate::circular_buffer::{BlockBuffer, DownsampledRenderBuffer, FftBuffer, SpectrumBuffer};
use crate::common::{
    DOWN_SAMPLING_FACTOR, FFT_LENGTH_BY_2_PLUS_1, FILTER_LENGTH_BLOCKS, NUM_MATCHED_FILTERS,
    SUB_BLOCK_SIZE, get_down_sampled_buffer_size, get_render_delay_buffer_size,
};
use crate::config::EchoCanceller3Config;
use crate::decimator::decimate_by_4;
use crate::fft_data::FftData;
use crate::render_buffer::RenderBuffer;

/// Events that can occur during buffer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BufferingEvent {
    None,
    RenderUnderrun,
    RenderOverrun,
}

/// Buffers incoming render blocks such that these may be extracted with a
/// specified delay.
#[derive(derive_more::Debug)]
pub(crate) struct RenderDelayBuffer {
    default_delay: usize,
    #[debug(skip)]
    blocks: BlockBuffer,
    #[debug(skip)]
    spectra: SpectrumBuffer,
    #[debug(skip)]
    ffts: FftBuffer,
    delay: Option<usize>,
    #[debug(skip)]
    low_rate: DownsampledRenderBuffer,
    #[debug(skip)]
    fft: Aec3Fft,
    #[debug(skip)]
    render_ds: [f32; SUB_BLOCK_SIZE],
    buffer_headroom: usize,
}

impl RenderDelayBuffer {
    pub(crate) fn new(config: &EchoCanceller3Config) -> Self {
        let buffer_size = get_render_delay_buffer_size(
            DOWN_SAMPLING_FACTOR,
            NUM_MATCHED_FILTERS,
            FILTER_LENGTH_BLOCKS,
        );
        let low_rate_size = get_down_sampled_buffer_size(DOWN_SAMPLING_FACTOR, NUM_MATCHED_FILTERS);

        let mut rdb = Self {
            default_delay: config.delay.default_delay,
            blocks: BlockBuffer::new(buffer_size, Block::default()),
            spectra: SpectrumBuffer::new(buffer_size, [0.0; FFT_LENGTH_BY_2_PLUS_1]),
            ffts: FftBuffer::new(buffer_size, FftData::default()),
            delay: None,
            low_rate: DownsampledRenderBuffer::new(low_rate_size, 0.0),
            fft: Aec3Fft::new(),
            render_ds: [0.0; SUB_BLOCK_SIZE],
            buffer_headroom: FILTER_LENGTH_BLOCKS,
        };
        rdb.reset();
        rdb
    }

    /// Resets the buffer alignment.
    pub(crate) fn reset(&mut self) {
        // Initialize the read index to one sub-block before the write index.
        self.low_rate.index.read = self
            .low_rate
            .index
            .offset_index(self.low_rate.index.write, SUB_BLOCK_SIZE as isize);
        self.apply_total_delay(self.default_delay);
        self.delay = None;
    }

    /// Inserts a block into the buffer.
    pub(crate) fn insert(&mut self, block: &Block) -> BufferingEvent {
        // Increase the write indices to where the new block should be written.
        let previous_write = self.blocks.index.write;
        self.increment_write_indices();

        // Allow overrun and do a reset when render overrun occurs due to more
        // render data being inserted than capture data is received.
        let event = if self.render_overrun() {
            BufferingEvent::RenderOverrun
        } else {
            BufferingEvent::None
        };

        self.insert_block(block, previous_write);

        if event != BufferingEvent::None {
            self.reset();
        }

        event
    }

    /// Prepares the render buffers for processing another capture block.
    pub(crate) fn prepare_capture_processing(&mut self) -> BufferingEvent {
        if self.render_underrun() {
            // Don't increment the read indices of the low rate buffer if there
            // is a render underrun.
            self.increment_read_indices();
            // Incrementing the buffer index without increasing the low rate
            // buffer index means that the delay is reduced by one.
            if let Some(d) = self.delay
                && d > 0
            {
                self.delay = Some(d - 1);
            }
            BufferingEvent::RenderUnderrun
        } else {
            // Increment the read indices in the render buffers to point to the
            // most recent block to use in the capture processing.
            self.low_rate.index.update_read(-(SUB_BLOCK_SIZE as isize));
            self.increment_read_indices();
            BufferingEvent::None
        }
    }

    /// Sets the buffer delay and returns a bool indicating whether the delay
    /// changed.
    pub(crate) fn align_from_delay(&mut self, delay: usize) -> bool {
        if self.delay == Some(delay) {
            return false;
        }
        self.delay = Some(delay);

        // Compute the total delay and limit the delay to the allowed range.
        let total_delay = (self.buffer_latency() + delay).min(self.max_delay());

        self.apply_total_delay(total_delay);
        true
    }

    /// Gets the delay most recently applied through `align_from_delay`.
    pub(crate) fn delay(&self) -> Option<usize> {
        self.delay
    }

    /// Gets the maximum delay.
    pub(crate) fn max_delay(&self) -> usize {
        self.blocks.len() - 1 - self.buffer_headroom
    }

    /// Returns a `RenderBuffer` view for the echo remover.
    pub(crate) fn render_buffer(&self) -> RenderBuffer<'_> {
        RenderBuffer::new(&self.blocks, &self.spectra, &self.ffts)
    }

    /// Returns a reference to the downsampled render buffer.
    pub(crate) fn downsampled_render_buffer(&self) -> &DownsampledRenderBuffer {
        &self.low_rate
    }

    fn apply_total_delay(&mut self, delay: usize) {
        let delay = delay as isize;
        self.blocks.index.read = self.blocks.index.offset_index(self.blocks.index.write, -delay);
        self.spectra.index.read = self
            .spectra
            .index
            .offset_index(self.spectra.index.write, delay);
        self.ffts.index.read = self.ffts.index.offset_index(self.ffts.index.write, delay);
    }

    fn insert_block(&mut self, block: &Block, previous_write: usize) {
        let write = self.blocks.index.write;
        self.blocks.buffer[write] = block.clone();

        decimate_by_4(block.view(), &mut self.render_ds);

        // The low-rate buffer is stored newest sample first.
        let lr_write = self.low_rate.index.write;
        for (i, &v) in self.render_ds.iter().rev().enumerate() {
            let idx = self.low_rate.index.offset_index(lr_write, i as isize);
            self.low_rate.buffer[idx] = v;
        }

        let fft_write = self.ffts.index.write;
        let spectrum_write = self.spectra.index.write;
        let x = *self.blocks.buffer[write].view();
        let x_old = *self.blocks.buffer[previous_write].view();
        self.fft
            .padded_fft(&x, &x_old, &mut self.ffts.buffer[fft_write]);
        self.ffts.buffer[fft_write].spectrum(&mut self.spectra.buffer[spectrum_write]);
    }

    /// Number of whole blocks the low-rate read cursor trails the write
    /// cursor.
    fn buffer_latency(&self) -> usize {
        let lr = &self.low_rate.index;
        let latency_samples = (lr.size + lr.read - lr.write) % lr.size;
        latency_samples / SUB_BLOCK_SIZE
    }

    fn increment_write_indices(&mut self) {
        self.low_rate.index.update_write(-(SUB_BLOCK_SIZE as isize));
        self.blocks.index.inc_write();
        self.spectra.index.dec_write();
        self.ffts.index.dec_write();
    }

    fn increment_read_indices(&mut self) {
        if self.blocks.index.read != self.blocks.index.write {
            self.blocks.index.inc_read();
            self.spectra.index.dec_read();
            self.ffts.index.dec_read();
        }
    }

    fn render_overrun(&self) -> bool {
        self.low_rate.index.read == self.low_rate.index.write
            || self.blocks.index.read == self.blocks.index.write
    }

    fn render_underrun(&self) -> bool {
        self.low_rate.index.read == self.low_rate.index.write
    }
}
