//! Residual echo power estimation.
//!
//! Estimates the echo power that remains after linear subtraction. When the
//! linear filter is trusted the estimate follows the linear echo prediction
//! scaled down by the ERLE; otherwise it falls back to the gated power of
//! the render signal around the echo path delay.

use crate::aec_state::AecState;
use crate::circular_buffer::SpectrumBuffer;
use crate::common::FFT_LENGTH_BY_2_PLUS_1;
use crate::config::{EchoCanceller3Config, EchoModel};
use crate::render_buffer::RenderBuffer;

/// `R2 = S2_linear / ERLE`.
fn linear_estimate(
    s2_linear: &[f32; FFT_LENGTH_BY_2_PLUS_1],
    erle: &[f32; FFT_LENGTH_BY_2_PLUS_1],
    r2: &mut [f32; FFT_LENGTH_BY_2_PLUS_1],
) {
    for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
        debug_assert!(erle[k] > 0.0);
        r2[k] = s2_linear[k] / erle[k];
    }
}

/// Pulls weak render bins further towards zero.
fn apply_noise_gate(config: &EchoModel, x2: &mut [f32; FFT_LENGTH_BY_2_PLUS_1]) {
    for v in x2.iter_mut() {
        if config.noise_gate_power > *v {
            *v = (*v - config.noise_gate_slope * (config.noise_gate_power - *v)).max(0.0);
        }
    }
}

/// Returns the first and one-past-last spectrum slots around the filter
/// delay.
fn get_render_indexes_to_analyze(
    spectrum_buffer: &SpectrumBuffer,
    echo_model: &EchoModel,
    filter_delay_blocks: usize,
) -> (usize, usize) {
    let window_start = filter_delay_blocks.saturating_sub(echo_model.render_pre_window_size);
    let window_end = filter_delay_blocks + echo_model.render_post_window_size;
    let idx_start = spectrum_buffer
        .index
        .offset_index(spectrum_buffer.index.read, window_start as isize);
    let idx_stop = spectrum_buffer
        .index
        .offset_index(spectrum_buffer.index.read, (window_end + 1) as isize);
    (idx_start, idx_stop)
}

/// Per-bin maximum of the render power within the analysis window.
fn echo_generating_power(
    spectrum_buffer: &SpectrumBuffer,
    echo_model: &EchoModel,
    filter_delay_blocks: usize,
    x2: &mut [f32; FFT_LENGTH_BY_2_PLUS_1],
) {
    let (idx_start, idx_stop) =
        get_render_indexes_to_analyze(spectrum_buffer, echo_model, filter_delay_blocks);

    x2.fill(0.0);
    let mut k = idx_start;
    while k != idx_stop {
        for (out, &power) in x2.iter_mut().zip(&spectrum_buffer.buffer[k]) {
            *out = out.max(power);
        }
        k = spectrum_buffer.index.inc_index(k);
    }
}

/// Estimates the residual echo power spectrum.
#[derive(derive_more::Debug)]
pub(crate) struct ResidualEchoEstimator {
    echo_model: EchoModel,
    #[debug(skip)]
    x2_noise_floor: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    x2_noise_floor_counter: [usize; FFT_LENGTH_BY_2_PLUS_1],
}

impl ResidualEchoEstimator {
    pub(crate) fn new(config: &EchoCanceller3Config) -> Self {
        let mut s = Self {
            echo_model: config.echo_model.clone(),
            x2_noise_floor: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            x2_noise_floor_counter: [0; FFT_LENGTH_BY_2_PLUS_1],
        };
        s.reset();
        s
    }

    /// Produces the residual echo power `R2` for the current block.
    pub(crate) fn estimate(
        &mut self,
        aec_state: &AecState,
        render_buffer: &RenderBuffer<'_>,
        s2_linear: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        r2: &mut [f32; FFT_LENGTH_BY_2_PLUS_1],
    ) {
        // Estimate the power of the stationary noise in the render signal.
        self.update_render_noise_power(render_buffer);

        if aec_state.usable_linear_estimate() {
            linear_estimate(s2_linear, aec_state.erle(), r2);
            return;
        }

        let mut x2 = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        echo_generating_power(
            render_buffer.get_spectrum_buffer(),
            &self.echo_model,
            aec_state.min_direct_path_filter_delay(),
            &mut x2,
        );

        apply_noise_gate(&self.echo_model, &mut x2);

        // Subtract the stationary noise power to avoid stationary noise
        // being treated as echo.
        for (v, &floor) in x2.iter_mut().zip(&self.x2_noise_floor) {
            *v = (*v - self.echo_model.stationary_gate_slope * floor).max(0.0);
        }

        r2.copy_from_slice(&x2);
    }

    /// Sets the noise floors to the minimum and restarts the hold counters.
    pub(crate) fn reset(&mut self) {
        self.x2_noise_floor_counter
            .fill(self.echo_model.noise_floor_hold);
        self.x2_noise_floor
            .fill(self.echo_model.min_noise_floor_power);
    }

    fn update_render_noise_power(&mut self, render_buffer: &RenderBuffer<'_>) {
        let render_power = render_buffer.spectrum(0);

        // Minimum statistics: fall immediately, rise slowly after a hold.
        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            if render_power[k] < self.x2_noise_floor[k] {
                self.x2_noise_floor[k] = render_power[k];
                self.x2_noise_floor_counter[k] = 0;
            } else if self.x2_noise_floor_counter[k] >= self.echo_model.noise_floor_hold {
                self.x2_noise_floor[k] =
                    (self.x2_noise_floor[k] * 1.1).max(self.echo_model.min_noise_floor_power);
            } else {
                self.x2_noise_floor_counter[k] += 1;
            }
        }
    }
}
