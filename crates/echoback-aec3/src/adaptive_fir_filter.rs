//! Frequency-domain adaptive FIR filter.
//!
//! Implements a partitioned frequency-domain adaptive filter used for echo
//! subtraction. Partition `p` is multiplied with the render spectrum `p`
//! blocks older than the current read position.

use crate::aec3_fft::Aec3Fft;
use crate::common::{FFT_LENGTH, FFT_LENGTH_BY_2, FFT_LENGTH_BY_2_PLUS_1};
use crate::fft_data::FftData;
use crate::render_buffer::RenderBuffer;

/// Computes and stores the power response of each partition.
pub(crate) fn compute_frequency_response(
    h: &[FftData],
    h2: &mut [[f32; FFT_LENGTH_BY_2_PLUS_1]],
) {
    debug_assert_eq!(h.len(), h2.len());
    for (h_p, h2_p) in h.iter().zip(h2.iter_mut()) {
        h_p.spectrum(h2_p);
    }
}

/// Computes the echo return loss as the sum of the partition power responses.
pub(crate) fn compute_erl(
    h2: &[[f32; FFT_LENGTH_BY_2_PLUS_1]],
    erl: &mut [f32; FFT_LENGTH_BY_2_PLUS_1],
) {
    erl.fill(0.0);
    for h2_p in h2 {
        for (e, &v) in erl.iter_mut().zip(h2_p) {
            *e += v;
        }
    }
}

/// Adapts the filter partitions: H(t+1) = H(t) + G(t) * conj(X(t)).
pub(crate) fn adapt_partitions(render_buffer: &RenderBuffer<'_>, g: &FftData, h: &mut [FftData]) {
    let ffts = render_buffer.get_fft_buffer();
    let mut index = render_buffer.position();
    for h_p in h.iter_mut() {
        let x_p = &ffts.buffer[index];
        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            h_p.re[k] += x_p.re[k] * g.re[k] + x_p.im[k] * g.im[k];
            h_p.im[k] += x_p.re[k] * g.im[k] - x_p.im[k] * g.re[k];
        }
        index = ffts.index.inc_index(index);
    }
}

/// Produces the filter output: S = sum_p H[p] * X[p].
pub(crate) fn apply_filter(render_buffer: &RenderBuffer<'_>, h: &[FftData], s: &mut FftData) {
    s.clear();

    let ffts = render_buffer.get_fft_buffer();
    let mut index = render_buffer.position();
    for h_p in h {
        let x_p = &ffts.buffer[index];
        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            s.re[k] += x_p.re[k] * h_p.re[k] - x_p.im[k] * h_p.im[k];
            s.im[k] += x_p.re[k] * h_p.im[k] + x_p.im[k] * h_p.re[k];
        }
        index = ffts.index.inc_index(index);
    }
}

/// Frequency-domain adaptive FIR filter with partitioned convolution.
#[derive(derive_more::Debug)]
pub(crate) struct AdaptiveFirFilter {
    #[debug(skip)]
    fft: Aec3Fft,
    #[debug(skip)]
    h: Vec<FftData>,
    partition_to_constrain: usize,
}

impl AdaptiveFirFilter {
    pub(crate) fn new(size_partitions: usize) -> Self {
        debug_assert!(size_partitions > 0);
        Self {
            fft: Aec3Fft::new(),
            h: vec![FftData::default(); size_partitions],
            partition_to_constrain: 0,
        }
    }

    /// Produces the output of the filter.
    pub(crate) fn filter(&self, render_buffer: &RenderBuffer<'_>, s: &mut FftData) {
        apply_filter(render_buffer, &self.h, s);
    }

    /// Adapts the filter and constrains one partition to a causal,
    /// block-length impulse response.
    pub(crate) fn adapt(&mut self, render_buffer: &RenderBuffer<'_>, g: &FftData) {
        adapt_partitions(render_buffer, g, &mut self.h);
        self.constrain();
    }

    /// Receives reports that known echo path changes have occurred.
    pub(crate) fn handle_echo_path_change(&mut self) {
        for h_p in &mut self.h {
            h_p.clear();
        }
    }

    /// Returns the filter size in partitions.
    pub(crate) fn size_partitions(&self) -> usize {
        self.h.len()
    }

    /// Computes the frequency responses for the filter partitions.
    pub(crate) fn compute_frequency_response(&self, h2: &mut [[f32; FFT_LENGTH_BY_2_PLUS_1]]) {
        compute_frequency_response(&self.h, h2);
    }

    /// Gets a reference to the filter coefficients.
    #[cfg(test)]
    pub(crate) fn get_filter(&self) -> &[FftData] {
        &self.h
    }

    fn constrain(&mut self) {
        let mut h_td = [0.0f32; FFT_LENGTH];
        let h_p = &mut self.h[self.partition_to_constrain];
        self.fft.ifft(h_p, &mut h_td);

        const SCALE: f32 = 1.0 / FFT_LENGTH_BY_2 as f32;
        for v in &mut h_td[..FFT_LENGTH_BY_2] {
            *v *= SCALE;
        }
        h_td[FFT_LENGTH_BY_2..].fill(0.0);

        self.fft.fft(&mut h_td, h_p);

        self.partition_to_constrain = if self.partition_to_constrain < self.h.len() - 1 {
            self.partition_to_constrain + 1
        } else {
            0
        };
    }
}
