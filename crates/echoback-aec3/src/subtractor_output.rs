//! Subtractor output data structure.
//!
//! Stores the values returned from the echo subtractor for one capture
//! block: the linear echo prediction, the residual in both domains and the
//! time-domain energies used to judge filter convergence.

use crate::common::{BLOCK_SIZE, FFT_LENGTH_BY_2_PLUS_1};
use crate::fft_data::FftData;

/// Output from the echo subtractor.
#[derive(derive_more::Debug, Clone)]
pub(crate) struct SubtractorOutput {
    /// Predicted echo.
    #[debug(skip)]
    pub s: [f32; BLOCK_SIZE],
    /// Capture minus predicted echo.
    #[debug(skip)]
    pub e: [f32; BLOCK_SIZE],
    #[debug(skip)]
    pub e_fft: FftData,
    #[debug(skip)]
    pub e2_spectrum: [f32; FFT_LENGTH_BY_2_PLUS_1],
    pub e2: f32,
    pub y2: f32,
}

impl Default for SubtractorOutput {
    fn default() -> Self {
        Self {
            s: [0.0; BLOCK_SIZE],
            e: [0.0; BLOCK_SIZE],
            e_fft: FftData::default(),
            e2_spectrum: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            e2: 0.0,
            y2: 0.0,
        }
    }
}

impl SubtractorOutput {
    /// Resets all fields to zero.
    pub(crate) fn reset(&mut self) {
        self.s.fill(0.0);
        self.e.fill(0.0);
        self.e_fft.clear();
        self.e2_spectrum.fill(0.0);
        self.e2 = 0.0;
        self.y2 = 0.0;
    }

    /// Updates the power metrics from the signal data.
    pub(crate) fn compute_metrics(&mut self, y: &[f32]) {
        self.y2 = y.iter().map(|&v| v * v).sum();
        self.e2 = self.e.iter().map(|&v| v * v).sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_everything() {
        let mut out = SubtractorOutput::default();
        out.s.fill(1.0);
        out.e.fill(2.0);
        out.e_fft.re.fill(3.0);
        out.y2 = 42.0;
        out.e2 = 7.0;
        out.reset();
        assert_eq!(out.y2, 0.0);
        assert_eq!(out.e2, 0.0);
        assert!(out.s.iter().all(|&v| v == 0.0));
        assert!(out.e.iter().all(|&v| v == 0.0));
        assert!(out.e_fft.re.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn compute_metrics_sums_of_squares() {
        let mut out = SubtractorOutput::default();
        out.e.fill(1.0);
        out.e[0] = -3.0;

        let y = [4.0f32; BLOCK_SIZE];
        out.compute_metrics(&y);

        assert!((out.y2 - 16.0 * BLOCK_SIZE as f32).abs() < 1e-4);
        assert!((out.e2 - (BLOCK_SIZE as f32 - 1.0 + 9.0)).abs() < 1e-4);
    }
}
