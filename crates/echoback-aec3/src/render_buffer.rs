//! Read-only view over the aligned render history.

use crate::block::Block;
use crate::circular_buffer::{BlockBuffer, FftBuffer, SpectrumBuffer};
use crate::common::FFT_LENGTH_BY_2_PLUS_1;

/// Provides a view into the render data buffers for the echo remover.
///
/// Offsets are expressed in blocks relative to the read cursor; positive
/// offsets reach further into the past in every ring.
pub(crate) struct RenderBuffer<'a> {
    block_buffer: &'a BlockBuffer,
    spectrum_buffer: &'a SpectrumBuffer,
    fft_buffer: &'a FftBuffer,
}

impl<'a> RenderBuffer<'a> {
    pub(crate) fn new(
        block_buffer: &'a BlockBuffer,
        spectrum_buffer: &'a SpectrumBuffer,
        fft_buffer: &'a FftBuffer,
    ) -> Self {
        debug_assert_eq!(block_buffer.len(), fft_buffer.len());
        debug_assert_eq!(spectrum_buffer.len(), fft_buffer.len());
        debug_assert_eq!(spectrum_buffer.index.read, fft_buffer.index.read);
        debug_assert_eq!(spectrum_buffer.index.write, fft_buffer.index.write);
        Self {
            block_buffer,
            spectrum_buffer,
            fft_buffer,
        }
    }

    /// Get a block at the given offset from the read position.
    pub(crate) fn get_block(&self, buffer_offset_blocks: isize) -> &Block {
        let position = self
            .block_buffer
            .index
            .offset_index(self.block_buffer.index.read, -buffer_offset_blocks);
        &self.block_buffer.buffer[position]
    }

    /// Get the power spectrum at the given offset from the read position.
    pub(crate) fn spectrum(&self, buffer_offset_ffts: isize) -> &[f32; FFT_LENGTH_BY_2_PLUS_1] {
        let position = self
            .spectrum_buffer
            .index
            .offset_index(self.spectrum_buffer.index.read, buffer_offset_ffts);
        &self.spectrum_buffer.buffer[position]
    }

    /// Returns the circular FFT buffer.
    pub(crate) fn get_fft_buffer(&self) -> &FftBuffer {
        self.fft_buffer
    }

    /// Returns the current read position in the circular buffer.
    pub(crate) fn position(&self) -> usize {
        debug_assert_eq!(self.spectrum_buffer.index.read, self.fft_buffer.index.read);
        self.fft_buffer.index.read
    }

    /// Sums `num_spectra` consecutive power spectra, starting at the read
    /// position and walking back in time.
    pub(crate) fn spectral_sum(&self, num_spectra: usize, x2: &mut [f32; FFT_LENGTH_BY_2_PLUS_1]) {
        x2.fill(0.0);
        let mut position = self.spectrum_buffer.index.read;
        for _ in 0..num_spectra {
            for (out, &val) in x2.iter_mut().zip(&self.spectrum_buffer.buffer[position]) {
                *out += val;
            }
            position = self.spectrum_buffer.index.inc_index(position);
        }
    }

    /// Returns a reference to the spectrum buffer.
    pub(crate) fn get_spectrum_buffer(&self) -> &SpectrumBuffer {
        self.spectrum_buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft_data::FftData;

    fn buffers(size: usize) -> (BlockBuffer, SpectrumBuffer, FftBuffer) {
        (
            BlockBuffer::new(size, Block::default()),
            SpectrumBuffer::new(size, [0.0; FFT_LENGTH_BY_2_PLUS_1]),
            FftBuffer::new(size, FftData::default()),
        )
    }

    #[test]
    fn spectral_sum_walks_forward_in_the_ring() {
        let (block_buffer, mut spectrum_buffer, mut fft_buffer) = buffers(4);
        spectrum_buffer.index.read = 3;
        fft_buffer.index.read = 3;
        spectrum_buffer.buffer[3].fill(1.0);
        spectrum_buffer.buffer[0].fill(2.0);
        spectrum_buffer.buffer[1].fill(100.0);

        let rb = RenderBuffer::new(&block_buffer, &spectrum_buffer, &fft_buffer);
        let mut x2 = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        rb.spectral_sum(2, &mut x2);
        assert!(x2.iter().all(|&v| (v - 3.0).abs() < 1e-6));
    }

    #[test]
    fn offsets_address_older_data_in_every_ring() {
        let (mut block_buffer, mut spectrum_buffer, mut fft_buffer) = buffers(5);
        block_buffer.index.read = 2;
        spectrum_buffer.index.read = 2;
        fft_buffer.index.read = 2;
        // Blocks advance forwards, spectra backwards.
        block_buffer.buffer[1] = Block::new_with_value(7.0);
        spectrum_buffer.buffer[3].fill(9.0);

        let rb = RenderBuffer::new(&block_buffer, &spectrum_buffer, &fft_buffer);
        assert_eq!(rb.get_block(1).view()[0], 7.0);
        assert_eq!(rb.spectrum(1)[0], 9.0);
        assert_eq!(rb.position(), 2);
    }
}
