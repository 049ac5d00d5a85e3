//! Echo path delay estimator.
//!
//! Estimates the delay of the echo path using matched filtering and lag
//! aggregation.

use crate::block::Block;
use crate::circular_buffer::DownsampledRenderBuffer;
use crate::common::{DOWN_SAMPLING_FACTOR, SUB_BLOCK_SIZE};
use crate::config::EchoCanceller3Config;
use crate::decimator::decimate_by_4;
use crate::matched_filter::MatchedFilter;
use crate::matched_filter_lag_aggregator::MatchedFilterLagAggregator;

/// Estimates the delay of the echo path.
pub(crate) struct EchoPathDelayEstimator {
    matched_filter: MatchedFilter,
    matched_filter_lag_aggregator: MatchedFilterLagAggregator,
    old_aggregated_lag: Option<usize>,
    consistent_estimate_counter: usize,
    stale_estimate_blocks: usize,
}

impl EchoPathDelayEstimator {
    pub(crate) fn new(config: &EchoCanceller3Config) -> Self {
        let matched_filter = MatchedFilter::new(config);
        let matched_filter_lag_aggregator =
            MatchedFilterLagAggregator::new(matched_filter.max_filter_lag(), &config.delay);

        Self {
            matched_filter,
            matched_filter_lag_aggregator,
            old_aggregated_lag: None,
            consistent_estimate_counter: 0,
            stale_estimate_blocks: config.delay.stale_estimate_blocks,
        }
    }

    /// Resets the estimation as if the call is restarted.
    pub(crate) fn reset(&mut self) {
        self.reset_internal();
    }

    /// Produces a delay estimate in samples if one is available.
    pub(crate) fn estimate_delay(
        &mut self,
        render_buffer: &DownsampledRenderBuffer,
        capture: &Block,
    ) -> Option<usize> {
        let mut downsampled_capture = [0.0f32; SUB_BLOCK_SIZE];
        decimate_by_4(capture.view(), &mut downsampled_capture);

        self.matched_filter
            .update(render_buffer, &downsampled_capture);

        // Return the detected delay in samples as the aggregated matched filter
        // lag compensated by the down sampling factor.
        let aggregated_matched_filter_lag = self
            .matched_filter_lag_aggregator
            .aggregate(self.matched_filter.best_lag_estimate())
            .map(|lag| lag * DOWN_SAMPLING_FACTOR);

        if aggregated_matched_filter_lag.is_some()
            && self.old_aggregated_lag == aggregated_matched_filter_lag
        {
            self.consistent_estimate_counter += 1;
        } else {
            self.consistent_estimate_counter = 0;
        }
        self.old_aggregated_lag = aggregated_matched_filter_lag;

        if self.consistent_estimate_counter > self.stale_estimate_blocks {
            tracing::debug!(
                delay_samples = ?aggregated_matched_filter_lag,
                "delay estimate unchanged for too long; resetting estimator"
            );
            self.reset_internal();
        }

        aggregated_matched_filter_lag
    }

    fn reset_internal(&mut self) {
        self.matched_filter_lag_aggregator.reset(true);
        self.matched_filter.reset();
        self.old_aggregated_lag = None;
        self.consistent_estimate_counter = 0;
    }
}
