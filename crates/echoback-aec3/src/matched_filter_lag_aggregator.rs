//! Aggregates lag estimates from the matched filter into a single reliable
//! combined lag estimate.

use crate::common::DOWN_SAMPLING_FACTOR;
use crate::config::{Delay, DelaySelectionThresholds};

const HISTOGRAM_DATA_SIZE: usize = 250;

/// Histogram over the most recent lags; the candidate is the most frequent
/// lag.
struct HighestPeakAggregator {
    histogram: Vec<i32>,
    histogram_data: [usize; HISTOGRAM_DATA_SIZE],
    histogram_data_index: usize,
    candidate: usize,
}

impl HighestPeakAggregator {
    fn new(max_filter_lag: usize) -> Self {
        Self {
            histogram: vec![0i32; max_filter_lag + 1],
            histogram_data: [0; HISTOGRAM_DATA_SIZE],
            histogram_data_index: 0,
            candidate: 0,
        }
    }

    fn reset(&mut self) {
        self.histogram.fill(0);
        self.histogram_data.fill(0);
        self.histogram_data_index = 0;
    }

    fn aggregate(&mut self, lag: usize) {
        debug_assert!(
            lag < self.histogram.len(),
            "lag {lag} outside histogram of {} bins",
            self.histogram.len()
        );

        let old_val = self.histogram_data[self.histogram_data_index];
        self.histogram[old_val] -= 1;
        self.histogram_data[self.histogram_data_index] = lag;
        self.histogram[lag] += 1;
        self.histogram_data_index = (self.histogram_data_index + 1) % self.histogram_data.len();

        // First index holding the maximum count.
        let mut best = 0;
        for (i, &count) in self.histogram.iter().enumerate() {
            if count > self.histogram[best] {
                best = i;
            }
        }
        self.candidate = best;
    }

    fn candidate(&self) -> usize {
        self.candidate
    }

    fn histogram(&self) -> &[i32] {
        &self.histogram
    }
}

/// Aggregates lag estimates produced by the MatchedFilter class into a single
/// reliable combined lag estimate.
pub(crate) struct MatchedFilterLagAggregator {
    significant_candidate_found: bool,
    thresholds: DelaySelectionThresholds,
    headroom: usize,
    highest_peak_aggregator: HighestPeakAggregator,
}

impl MatchedFilterLagAggregator {
    pub(crate) fn new(max_filter_lag: usize, delay_config: &Delay) -> Self {
        debug_assert!(
            delay_config.delay_selection_thresholds.initial
                <= delay_config.delay_selection_thresholds.converged
        );

        Self {
            significant_candidate_found: false,
            thresholds: delay_config.delay_selection_thresholds,
            headroom: delay_config.delay_headroom_samples / DOWN_SAMPLING_FACTOR,
            highest_peak_aggregator: HighestPeakAggregator::new(max_filter_lag),
        }
    }

    /// Clears the histogram. A hard reset also forgets that a significant
    /// candidate was ever found.
    pub(crate) fn reset(&mut self, hard_reset: bool) {
        self.highest_peak_aggregator.reset();
        if hard_reset {
            self.significant_candidate_found = false;
        }
    }

    /// Aggregates the provided lag estimate, returning the combined lag in
    /// downsampled samples once a candidate is sufficiently dominant.
    pub(crate) fn aggregate(&mut self, lag_estimate: Option<usize>) -> Option<usize> {
        let lag = lag_estimate?;
        self.highest_peak_aggregator
            .aggregate(lag.saturating_sub(self.headroom));
        let histogram = self.highest_peak_aggregator.histogram();
        let candidate = self.highest_peak_aggregator.candidate();
        let count = histogram[candidate];

        self.significant_candidate_found =
            self.significant_candidate_found || count > self.thresholds.converged as i32;

        if count > self.thresholds.converged as i32
            || (count > self.thresholds.initial as i32 && !self.significant_candidate_found)
        {
            return Some(candidate);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EchoCanceller3Config;
    use crate::matched_filter::MatchedFilter;

    const NUM_LAGS_BEFORE_DETECTION: usize = 26;

    #[test]
    fn lag_estimate_invariance_required_for_aggregated_lag() {
        let delay_config = Delay::default();
        let mut aggregator = MatchedFilterLagAggregator::new(120, &delay_config);

        let mut aggregated_lag = None;
        for _ in 0..NUM_LAGS_BEFORE_DETECTION {
            aggregated_lag = aggregator.aggregate(Some(10));
        }
        assert!(aggregated_lag.is_some());

        for k in 0..NUM_LAGS_BEFORE_DETECTION * 100 {
            aggregated_lag = aggregator.aggregate(Some(10 + k % 100));
        }
        assert!(aggregated_lag.is_none());

        for k in 0..NUM_LAGS_BEFORE_DETECTION * 100 {
            aggregated_lag = aggregator.aggregate(Some(10 + k % 100));
            assert!(aggregated_lag.is_none());
        }
    }

    #[test]
    fn headroom_is_subtracted() {
        let mut aggregator = MatchedFilterLagAggregator::new(2432, &Delay::default());
        let mut aggregated_lag = None;
        for _ in 0..NUM_LAGS_BEFORE_DETECTION {
            aggregated_lag = aggregator.aggregate(Some(100));
        }
        assert_eq!(aggregated_lag, Some(92));

        // Lags inside the headroom saturate at zero.
        let mut aggregator = MatchedFilterLagAggregator::new(2432, &Delay::default());
        for _ in 0..NUM_LAGS_BEFORE_DETECTION {
            aggregated_lag = aggregator.aggregate(Some(3));
        }
        assert_eq!(aggregated_lag, Some(0));
    }

    #[test]
    fn initial_threshold_applies_until_significant_candidate() {
        let mut aggregator = MatchedFilterLagAggregator::new(2432, &Delay::default());
        let results: Vec<_> = (0..25).map(|_| aggregator.aggregate(Some(50))).collect();
        // Reported once the count exceeds 5.
        assert!(results[..5].iter().all(Option::is_none));
        assert!(results[5..].iter().all(|r| *r == Some(42)));

        // After a soft reset only the converged threshold applies.
        aggregator.reset(false);
        for _ in 0..20 {
            assert_eq!(aggregator.aggregate(Some(50)), None);
        }
        assert_eq!(aggregator.aggregate(Some(50)), Some(42));

        // A hard reset brings back the initial threshold.
        aggregator.reset(true);
        for _ in 0..5 {
            assert_eq!(aggregator.aggregate(Some(50)), None);
        }
        assert_eq!(aggregator.aggregate(Some(50)), Some(42));
    }

    #[test]
    fn missing_estimate_reports_nothing() {
        let mut aggregator = MatchedFilterLagAggregator::new(2432, &Delay::default());
        for _ in 0..30 {
            aggregator.aggregate(Some(50));
        }
        assert_eq!(aggregator.aggregate(None), None);
    }

    #[test]
    fn largest_matched_filter_lag_fits_the_histogram() {
        let config = EchoCanceller3Config::default();
        let max_filter_lag = MatchedFilter::new(&config).max_filter_lag();
        let mut aggregator = MatchedFilterLagAggregator::new(max_filter_lag, &config.delay);
        let headroom = config.delay.delay_headroom_samples / DOWN_SAMPLING_FACTOR;
        let mut last = None;
        for _ in 0..NUM_LAGS_BEFORE_DETECTION {
            last = aggregator.aggregate(Some(max_filter_lag + headroom));
        }
        assert_eq!(last, Some(max_filter_lag));
    }

    #[test]
    #[should_panic]
    fn lag_beyond_the_histogram_is_a_bug() {
        let delay_config = Delay::default();
        let headroom = delay_config.delay_headroom_samples / DOWN_SAMPLING_FACTOR;
        let mut aggregator = MatchedFilterLagAggregator::new(120, &delay_config);
        aggregator.aggregate(Some(121 + headroom));
    }

    #[test]
    fn ties_resolve_to_smallest_lag() {
        let mut aggregator = MatchedFilterLagAggregator::new(2432, &Delay::default());
        let mut last = None;
        for _ in 0..30 {
            aggregator.aggregate(Some(60));
            last = aggregator.aggregate(Some(40));
        }
        assert_eq!(last, Some(32));
    }
}
