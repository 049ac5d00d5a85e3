//! Linear filter update gain computation.
//!
//! Computes the adaptive gain for the linear echo model using an NLMS-like
//! step size scaled by a per-bin estimate of the filter error.

use crate::common::FFT_LENGTH_BY_2_PLUS_1;
use crate::config::Filter;
use crate::echo_path_variability::EchoPathVariability;
use crate::fft_data::FftData;
use crate::subtractor_output::SubtractorOutput;

const H_ERROR_INITIAL: f32 = 10_000.0;
const POOR_EXCITATION_COUNTER_INITIAL: usize = 1000;

/// Computes the adaptive gain for the linear filter.
#[derive(derive_more::Debug)]
pub(crate) struct FilterUpdateGain {
    config: Filter,
    #[debug(skip)]
    h_error: [f32; FFT_LENGTH_BY_2_PLUS_1],
    poor_excitation_counter: usize,
    call_counter: usize,
}

impl FilterUpdateGain {
    pub(crate) fn new(config: &Filter) -> Self {
        Self {
            config: config.clone(),
            h_error: [H_ERROR_INITIAL; FFT_LENGTH_BY_2_PLUS_1],
            poor_excitation_counter: POOR_EXCITATION_COUNTER_INITIAL,
            call_counter: 0,
        }
    }

    /// Takes action in the case of a known echo path change.
    pub(crate) fn handle_echo_path_change(&mut self, echo_path_variability: &EchoPathVariability) {
        if echo_path_variability.delay_changed() {
            self.h_error.fill(H_ERROR_INITIAL);
        }
        self.poor_excitation_counter = POOR_EXCITATION_COUNTER_INITIAL;
        self.call_counter = 0;
    }

    /// Computes the gain `G` from the render power `X2`, the current
    /// subtractor output and the echo return loss of the filter.
    pub(crate) fn compute(
        &mut self,
        render_power: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        subtractor_output: &SubtractorOutput,
        erl: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        size_partitions: usize,
        gain_fft: &mut FftData,
    ) {
        let e = &subtractor_output.e_fft;
        let e2 = &subtractor_output.e2_spectrum;

        self.call_counter += 1;

        // Do not update the filter until the render history covers the
        // whole filter.
        self.poor_excitation_counter += 1;
        if self.poor_excitation_counter < size_partitions || self.call_counter <= size_partitions {
            gain_fft.clear();
        } else {
            // mu = H_error / (0.5 * H_error * X2 + n * E2).
            let mut mu = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
            for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
                if render_power[k] >= self.config.noise_gate {
                    mu[k] = self.h_error[k]
                        / (0.5 * self.h_error[k] * render_power[k]
                            + size_partitions as f32 * e2[k]);
                }
            }

            // H_error -= 0.5 * mu * X2 * H_error.
            for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
                self.h_error[k] -= 0.5 * mu[k] * render_power[k] * self.h_error[k];
            }

            // G = mu * E.
            for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
                gain_fft.re[k] = mu[k] * e.re[k];
                gain_fft.im[k] = mu[k] * e.im[k];
            }
        }

        // H_error += factor * erl.
        let filter_converged = subtractor_output.e2 <= 0.5 * subtractor_output.y2;
        let leakage = if filter_converged {
            self.config.leakage_converged
        } else {
            self.config.leakage_diverged
        };
        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            self.h_error[k] += leakage * erl[k];
            self.h_error[k] = self.h_error[k]
                .max(self.config.error_floor)
                .min(self.config.error_ceil);
        }
    }
}
