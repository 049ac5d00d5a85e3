//! Suppression filter: applies the suppression gain in the frequency domain
//! and synthesizes the output using overlap-add with a sqrt-Hanning window.

use crate::aec3_fft::Aec3Fft;
use crate::common::{BLOCK_SIZE, FFT_LENGTH, FFT_LENGTH_BY_2, FFT_LENGTH_BY_2_PLUS_1};
use crate::fft_data::FftData;

const IFFT_NORMALIZATION: f32 = 2.0 / FFT_LENGTH as f32;

/// Applies the frequency-domain suppression gain and resynthesizes one
/// block of output. The output lags the analysed input by one block.
#[derive(derive_more::Debug)]
pub(crate) struct SuppressionFilter {
    #[debug(skip)]
    fft: Aec3Fft,
    #[debug(skip)]
    e_output_old: [f32; FFT_LENGTH_BY_2],
}

impl SuppressionFilter {
    pub(crate) fn new() -> Self {
        Self {
            fft: Aec3Fft::new(),
            e_output_old: [0.0; FFT_LENGTH_BY_2],
        }
    }

    /// Scales `e_lowest_band` by `suppression_gain` and writes the windowed
    /// overlap-add result to `e`.
    pub(crate) fn apply_gain(
        &mut self,
        suppression_gain: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        e_lowest_band: &FftData,
        e: &mut [f32; BLOCK_SIZE],
    ) {
        let mut e_freq = FftData::default();
        e_freq.assign(e_lowest_band);
        for (i, &g) in suppression_gain.iter().enumerate() {
            e_freq.re[i] *= g;
            e_freq.im[i] *= g;
        }

        let mut e_extended = [0.0f32; FFT_LENGTH];
        self.fft.ifft(&e_freq, &mut e_extended);

        // Window and add the first half of e_extended with the second half
        // of e_extended from the previous block.
        let window = self.fft.sqrt_hanning();
        for i in 0..FFT_LENGTH_BY_2 {
            let e0_i = self.e_output_old[i] * window[FFT_LENGTH_BY_2 + i]
                + e_extended[i] * window[i];
            e[i] = (e0_i * IFFT_NORMALIZATION).clamp(-32768.0, 32767.0);
        }

        self.e_output_old
            .copy_from_slice(&e_extended[FFT_LENGTH_BY_2..]);
    }
}
