//! Complex spectrum of a 128-point real FFT.

use realfft::num_complex::Complex;

use crate::common::{FFT_LENGTH_BY_2, FFT_LENGTH_BY_2_PLUS_1};

/// Holds the real and imaginary parts produced from a 128-point real-valued FFT.
///
/// The FFT of a real 128-sample signal produces 65 complex bins (DC through
/// Nyquist). The DC and Nyquist bins are always real-valued, so `im[0]` and
/// `im[64]` are kept at zero.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FftData {
    pub re: [f32; FFT_LENGTH_BY_2_PLUS_1],
    pub im: [f32; FFT_LENGTH_BY_2_PLUS_1],
}

impl Default for FftData {
    fn default() -> Self {
        Self {
            re: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            im: [0.0; FFT_LENGTH_BY_2_PLUS_1],
        }
    }
}

impl FftData {
    /// Copies data from `src`, forcing `im[0]` and `im[N/2]` to zero.
    pub(crate) fn assign(&mut self, src: &FftData) {
        self.re = src.re;
        self.im = src.im;
        self.im[0] = 0.0;
        self.im[FFT_LENGTH_BY_2] = 0.0;
    }

    /// Sets all bins to zero.
    pub(crate) fn clear(&mut self) {
        self.re.fill(0.0);
        self.im.fill(0.0);
    }

    /// Computes the power spectrum: `out[k] = re[k]^2 + im[k]^2`.
    pub(crate) fn spectrum(&self, power_spectrum: &mut [f32; FFT_LENGTH_BY_2_PLUS_1]) {
        for ((p, &re), &im) in power_spectrum.iter_mut().zip(&self.re).zip(&self.im) {
            *p = re * re + im * im;
        }
    }

    /// Loads the half spectrum produced by a real-to-complex transform.
    pub(crate) fn copy_from_complex(&mut self, v: &[Complex<f32>]) {
        debug_assert_eq!(v.len(), FFT_LENGTH_BY_2_PLUS_1);
        for (k, c) in v.iter().enumerate() {
            self.re[k] = c.re;
            self.im[k] = c.im;
        }
        self.im[0] = 0.0;
        self.im[FFT_LENGTH_BY_2] = 0.0;
    }

    /// Writes the half spectrum in the layout expected by a complex-to-real
    /// transform. DC and Nyquist are written as purely real.
    pub(crate) fn copy_to_complex(&self, v: &mut [Complex<f32>]) {
        debug_assert_eq!(v.len(), FFT_LENGTH_BY_2_PLUS_1);
        for (k, c) in v.iter_mut().enumerate() {
            *c = Complex::new(self.re[k], self.im[k]);
        }
        v[0].im = 0.0;
        v[FFT_LENGTH_BY_2].im = 0.0;
    }
}
