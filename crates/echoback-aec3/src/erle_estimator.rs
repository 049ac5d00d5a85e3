//! ERLE (echo return loss enhancement) estimator.
//!
//! Produces a per-bin ratio between the capture power and the residual power
//! after linear echo subtraction.

use crate::common::FFT_LENGTH_BY_2_PLUS_1;
use crate::config::Erle;

const POWER_FLOOR: f32 = 1e-6;

/// Estimates the echo return loss enhancement per frequency bin.
#[derive(derive_more::Debug)]
pub(crate) struct ErleEstimator {
    startup_phase_length_blocks: usize,
    min_erle: f32,
    max_erle: f32,
    #[debug(skip)]
    erle: [f32; FFT_LENGTH_BY_2_PLUS_1],
    blocks_since_reset: usize,
}

impl ErleEstimator {
    pub(crate) fn new(config: &Erle) -> Self {
        let mut s = Self {
            startup_phase_length_blocks: config.startup_phase_blocks,
            min_erle: config.min,
            max_erle: config.max,
            erle: [config.min; FFT_LENGTH_BY_2_PLUS_1],
            blocks_since_reset: 0,
        };
        s.reset();
        s
    }

    /// Resets the estimates and restarts the startup phase.
    pub(crate) fn reset(&mut self) {
        self.erle.fill(self.min_erle);
        self.blocks_since_reset = 0;
    }

    /// Updates the ERLE estimates from the capture spectrum `Y2` and the
    /// residual spectrum `E2`.
    pub(crate) fn update(
        &mut self,
        capture_spectrum: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        subtractor_spectrum: &[f32; FFT_LENGTH_BY_2_PLUS_1],
    ) {
        self.blocks_since_reset += 1;
        if self.blocks_since_reset < self.startup_phase_length_blocks {
            return;
        }

        for ((erle, &y2), &e2) in self
            .erle
            .iter_mut()
            .zip(capture_spectrum)
            .zip(subtractor_spectrum)
        {
            *erle = (y2.max(POWER_FLOOR) / e2.max(POWER_FLOOR)).clamp(self.min_erle, self.max_erle);
        }
    }

    pub(crate) fn erle(&self) -> &[f32; FFT_LENGTH_BY_2_PLUS_1] {
        &self.erle
    }
}
