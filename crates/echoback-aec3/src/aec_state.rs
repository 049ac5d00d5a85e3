//! AEC state: tracks how far the linear echo model can be trusted.
//!
//! Coordinates the subtractor output analysis, ERLE estimation and the
//! filtering quality decision used by the residual echo estimator and the
//! suppressor.

use crate::common::{BLOCK_SIZE, FFT_LENGTH_BY_2_PLUS_1};
use crate::config::EchoCanceller3Config;
use crate::echo_path_variability::EchoPathVariability;
use crate::erle_estimator::ErleEstimator;
use crate::render_buffer::RenderBuffer;
use crate::subtractor_output::SubtractorOutput;
use crate::subtractor_output_analyzer::SubtractorOutputAnalyzer;

const STARTUP_BLOCKS: usize = 100;
const BLOCKS_AFTER_RESET: usize = 50;

/// Decides whether the linear filter output is good enough to be used.
#[derive(Debug, Default)]
struct FilteringQualityAnalyzer {
    usable_linear_estimate: bool,
    filter_update_blocks_since_reset: usize,
    filter_update_blocks_since_start: usize,
    convergence_seen: bool,
}

impl FilteringQualityAnalyzer {
    fn linear_filter_usable(&self) -> bool {
        self.usable_linear_estimate
    }

    /// Restarts the post-reset counting. Convergence seen earlier in the
    /// call is kept.
    fn reset(&mut self) {
        self.usable_linear_estimate = false;
        self.filter_update_blocks_since_reset = 0;
    }

    fn update(&mut self, active_render: bool, filter_converged: bool) {
        if active_render {
            self.filter_update_blocks_since_reset += 1;
            self.filter_update_blocks_since_start += 1;
        }

        self.convergence_seen = self.convergence_seen || filter_converged;

        self.usable_linear_estimate = self.filter_update_blocks_since_start > STARTUP_BLOCKS
            && self.filter_update_blocks_since_reset > BLOCKS_AFTER_RESET
            && self.convergence_seen;
    }
}

/// Handles the state and the conditions for the echo removal functionality.
#[derive(derive_more::Debug)]
pub(crate) struct AecState {
    active_render_limit: f32,
    active_render: bool,
    filter_quality_state: FilteringQualityAnalyzer,
    erle_estimator: ErleEstimator,
    subtractor_output_analyzer: SubtractorOutputAnalyzer,
}

impl AecState {
    pub(crate) fn new(config: &EchoCanceller3Config) -> Self {
        let limit = config.render_levels.active_render_limit;
        Self {
            active_render_limit: limit * limit * BLOCK_SIZE as f32,
            active_render: false,
            filter_quality_state: FilteringQualityAnalyzer::default(),
            erle_estimator: ErleEstimator::new(&config.erle),
            subtractor_output_analyzer: SubtractorOutputAnalyzer::default(),
        }
    }

    /// Returns whether the echo subtractor can be used to determine the
    /// residual echo.
    pub(crate) fn usable_linear_estimate(&self) -> bool {
        self.filter_quality_state.linear_filter_usable()
    }

    pub(crate) fn erle(&self) -> &[f32; FFT_LENGTH_BY_2_PLUS_1] {
        self.erle_estimator.erle()
    }

    /// Delay of the direct path within the linear filter, in blocks.
    pub(crate) fn min_direct_path_filter_delay(&self) -> usize {
        0
    }

    /// Takes appropriate action at an echo path change.
    pub(crate) fn handle_echo_path_change(&mut self, echo_path_variability: &EchoPathVariability) {
        if echo_path_variability.delay_changed() {
            self.erle_estimator.reset();
            self.filter_quality_state.reset();
        }
        self.subtractor_output_analyzer.handle_echo_path_change();
    }

    /// Updates the state from the aligned render data and the capture and
    /// residual spectra of the current block.
    pub(crate) fn update(
        &mut self,
        render_buffer: &RenderBuffer<'_>,
        residual_spectrum: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        capture_spectrum: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        subtractor_output: &SubtractorOutput,
    ) {
        self.subtractor_output_analyzer.update(subtractor_output);

        let render_energy = render_buffer.get_block(0).energy();
        self.active_render = render_energy > self.active_render_limit;

        self.erle_estimator
            .update(capture_spectrum, residual_spectrum);

        self.filter_quality_state.update(
            self.active_render,
            self.subtractor_output_analyzer.converged_filter(),
        );
    }
}
