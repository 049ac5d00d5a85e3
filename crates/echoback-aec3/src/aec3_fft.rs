//! 128-point real FFT wrapper operating on [`FftData`].
//!
//! The forward transform is unnormalized and the inverse is scaled so that
//! `ifft(fft(x)) == 64 * x`. Every gain and scale factor in the engine
//! (the `1/64` in the subtractor and constraint, the `2/128` in the
//! synthesis filter) assumes this convention.

use std::f32::consts::PI;
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::common::{FFT_LENGTH, FFT_LENGTH_BY_2, FFT_LENGTH_BY_2_PLUS_1};
use crate::fft_data::FftData;

const INVERSE_SCALE: f32 = 0.5;

/// `sqrt(hanning(128))`, peaking at 1.0 in the middle of the frame.
pub(crate) fn sqrt_hanning_128() -> [f32; FFT_LENGTH] {
    std::array::from_fn(|n| (PI * n as f32 / FFT_LENGTH as f32).sin())
}

/// Wrapper providing a 128-point real-valued FFT with owned scratch space.
#[derive(derive_more::Debug)]
pub(crate) struct Aec3Fft {
    #[debug(skip)]
    forward: Arc<dyn RealToComplex<f32>>,
    #[debug(skip)]
    inverse: Arc<dyn ComplexToReal<f32>>,
    #[debug(skip)]
    bins: Vec<Complex<f32>>,
    #[debug(skip)]
    scratch: Vec<Complex<f32>>,
    #[debug(skip)]
    sqrt_hanning: [f32; FFT_LENGTH],
}

impl Aec3Fft {
    pub(crate) fn new() -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(FFT_LENGTH);
        let inverse = planner.plan_fft_inverse(FFT_LENGTH);
        let scratch_len = forward
            .get_scratch_len()
            .max(inverse.get_scratch_len());
        Self {
            forward,
            inverse,
            bins: vec![Complex::new(0.0, 0.0); FFT_LENGTH_BY_2_PLUS_1],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            sqrt_hanning: sqrt_hanning_128(),
        }
    }

    /// The analysis/synthesis window used by [`Self::padded_fft`].
    pub(crate) fn sqrt_hanning(&self) -> &[f32; FFT_LENGTH] {
        &self.sqrt_hanning
    }

    /// Computes the forward FFT. `x` is used as scratch and is clobbered.
    pub(crate) fn fft(&mut self, x: &mut [f32; FFT_LENGTH], x_out: &mut FftData) {
        if let Err(err) =
            self.forward
                .process_with_scratch(x, &mut self.bins, &mut self.scratch)
        {
            tracing::error!(%err, "forward FFT failed");
        }
        x_out.copy_from_complex(&self.bins);
    }

    /// Computes the inverse FFT, scaled so that `ifft(fft(x)) == 64 * x`.
    pub(crate) fn ifft(&mut self, x_in: &FftData, x: &mut [f32; FFT_LENGTH]) {
        x_in.copy_to_complex(&mut self.bins);
        if let Err(err) =
            self.inverse
                .process_with_scratch(&mut self.bins, x, &mut self.scratch)
        {
            tracing::error!(%err, "inverse FFT failed");
        }
        for v in x.iter_mut() {
            *v *= INVERSE_SCALE;
        }
    }

    /// Zero-pads the first half and applies a decaying half-Hanning window
    /// (the squared second half of the sqrt-Hanning window) to `x` before
    /// transforming.
    pub(crate) fn zero_padded_fft(&mut self, x: &[f32; FFT_LENGTH_BY_2], x_out: &mut FftData) {
        let mut fft_buf = [0.0f32; FFT_LENGTH];
        for ((dst, &src), &w) in fft_buf[FFT_LENGTH_BY_2..]
            .iter_mut()
            .zip(x)
            .zip(&self.sqrt_hanning[FFT_LENGTH_BY_2..])
        {
            *dst = src * w * w;
        }
        self.fft(&mut fft_buf, x_out);
    }

    /// Concatenates `x_old` and `x` (each 64 samples), applies the
    /// sqrt-Hanning window, then computes the FFT.
    pub(crate) fn padded_fft(
        &mut self,
        x: &[f32; FFT_LENGTH_BY_2],
        x_old: &[f32; FFT_LENGTH_BY_2],
        x_out: &mut FftData,
    ) {
        let mut fft_buf = [0.0f32; FFT_LENGTH];
        for ((dst, &src), &w) in fft_buf[..FFT_LENGTH_BY_2]
            .iter_mut()
            .zip(x_old)
            .zip(&self.sqrt_hanning[..FFT_LENGTH_BY_2])
        {
            *dst = src * w;
        }
        for ((dst, &src), &w) in fft_buf[FFT_LENGTH_BY_2..]
            .iter_mut()
            .zip(x)
            .zip(&self.sqrt_hanning[FFT_LENGTH_BY_2..])
        {
            *dst = src * w;
        }
        self.fft(&mut fft_buf, x_out);
    }
}
