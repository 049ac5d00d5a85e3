//! Matched filter for delay estimation via cross-correlation.
//!
//! Produces recursively updated cross-correlation estimates for several signal
//! shifts where the intra-shift spacing is uniform. The core algorithm is NLMS
//! (Normalized Least Mean Squares) on the 4:1 downsampled signals.

use crate::circular_buffer::DownsampledRenderBuffer;
use crate::common::{
    MATCHED_FILTER_ALIGNMENT_SHIFT_SIZE_SUB_BLOCKS, MATCHED_FILTER_WINDOW_SIZE_SUB_BLOCKS,
    NUM_MATCHED_FILTERS, SUB_BLOCK_SIZE,
};
use crate::config::EchoCanceller3Config;

/// Applies the matched filter `h` to the render signal `x` for every capture
/// sample in `y`, adapting `h` whenever the render window carries enough
/// energy.
///
/// `x_start_index` points at the render sample aligned with tap 0 for the
/// first capture sample and moves one step back per capture sample.
#[allow(
    clippy::too_many_arguments,
    reason = "filter state is owned by the caller and updated in place"
)]
pub(crate) fn matched_filter_core(
    mut x_start_index: usize,
    x2_sum_threshold: f32,
    smoothing: f32,
    x: &[f32],
    y: &[f32],
    h: &mut [f32],
    filters_updated: &mut bool,
    error_sum: &mut f32,
) {
    let x_size = x.len();

    for &y_i in y {
        // Apply the matched filter as filter * x, and compute x * x.
        let mut x2_sum = 0.0f32;
        let mut s = 0.0f32;
        let mut x_index = x_start_index;
        for &h_k in h.iter() {
            let x_k = x[x_index];
            x2_sum += x_k * x_k;
            s += h_k * x_k;
            x_index = if x_index < x_size - 1 { x_index + 1 } else { 0 };
        }

        let e = y_i - s;
        *error_sum += e * e;

        // Update the matched filter estimate in an NLMS manner.
        if x2_sum > x2_sum_threshold {
            debug_assert!(x2_sum > 0.0);
            let alpha = smoothing * e / x2_sum;

            // filter = filter + smoothing * (y - filter * x) * x / (x * x)
            let mut x_index = x_start_index;
            for h_k in h.iter_mut() {
                *h_k += alpha * x[x_index];
                x_index = if x_index < x_size - 1 { x_index + 1 } else { 0 };
            }
            *filters_updated = true;
        }

        x_start_index = if x_start_index > 0 {
            x_start_index - 1
        } else {
            x_size - 1
        };
    }
}

/// Find the index of the element with the largest squared value.
///
/// Even and odd positions are tracked separately. Equal values keep the
/// earlier index within each parity, and an even index beats an odd one.
pub(crate) fn max_square_peak_index(h: &[f32]) -> usize {
    if h.len() < 2 {
        return 0;
    }

    let mut max_element1 = h[0] * h[0];
    let mut max_element2 = h[1] * h[1];
    let mut lag_estimate1: usize = 0;
    let mut lag_estimate2: usize = 1;
    let last_index = h.len() - 1;

    let mut k = 2;
    while k < last_index {
        let element1 = h[k] * h[k];
        let element2 = h[k + 1] * h[k + 1];
        if element1 > max_element1 {
            max_element1 = element1;
            lag_estimate1 = k;
        }
        if element2 > max_element2 {
            max_element2 = element2;
            lag_estimate2 = k + 1;
        }
        k += 2;
    }

    if max_element2 > max_element1 {
        max_element1 = max_element2;
        lag_estimate1 = lag_estimate2;
    }

    // In case of odd h size, check the last element.
    let last_element = h[last_index] * h[last_index];
    if last_element > max_element1 {
        return last_index;
    }
    lag_estimate1
}

/// Bank of matched filters covering consecutive, overlapping lag ranges.
#[derive(derive_more::Debug)]
pub(crate) struct MatchedFilter {
    filter_intra_lag_shift: usize,
    #[debug(skip)]
    filters: Vec<Vec<f32>>,
    winner_lag: Option<usize>,
    excitation_limit: f32,
    smoothing: f32,
    matching_filter_threshold: f32,
}

impl MatchedFilter {
    pub(crate) fn new(config: &EchoCanceller3Config) -> Self {
        let filter_size = MATCHED_FILTER_WINDOW_SIZE_SUB_BLOCKS * SUB_BLOCK_SIZE;
        Self {
            filter_intra_lag_shift: MATCHED_FILTER_ALIGNMENT_SHIFT_SIZE_SUB_BLOCKS * SUB_BLOCK_SIZE,
            filters: vec![vec![0.0f32; filter_size]; NUM_MATCHED_FILTERS],
            winner_lag: None,
            excitation_limit: config.delay.excitation_limit,
            smoothing: config.delay.delay_estimate_smoothing,
            matching_filter_threshold: config.delay.delay_candidate_detection_threshold,
        }
    }

    /// Zeroes all filters and forgets the last lag.
    pub(crate) fn reset(&mut self) {
        for f in &mut self.filters {
            f.fill(0.0);
        }
        self.winner_lag = None;
    }

    /// Updates the correlation with the values in the capture buffer.
    pub(crate) fn update(&mut self, render_buffer: &DownsampledRenderBuffer, capture: &[f32]) {
        debug_assert_eq!(SUB_BLOCK_SIZE, capture.len());

        let x2_sum_threshold =
            self.filters[0].len() as f32 * self.excitation_limit * self.excitation_limit;

        // Compute anchor for the matched filter error.
        let error_sum_anchor: f32 = capture.iter().map(|&y| y * y).sum();

        // Apply all matched filters.
        let mut winner_error_sum = error_sum_anchor;
        self.winner_lag = None;
        let mut alignment_shift: usize = 0;
        let mut previous_lag_estimate: Option<usize> = None;

        for filter in self.filters.iter_mut() {
            let mut error_sum = 0.0f32;
            let mut filters_updated = false;

            let x_start_index = (render_buffer.index.read + alignment_shift + SUB_BLOCK_SIZE - 1)
                % render_buffer.len();

            matched_filter_core(
                x_start_index,
                x2_sum_threshold,
                self.smoothing,
                &render_buffer.buffer,
                capture,
                filter,
                &mut filters_updated,
                &mut error_sum,
            );

            // Estimate the lag as the peak of the matched filter.
            let lag_estimate = max_square_peak_index(filter);
            let reliable = lag_estimate > 2
                && lag_estimate < filter.len() - 10
                && error_sum < self.matching_filter_threshold * error_sum_anchor;

            let lag = lag_estimate + alignment_shift;
            if filters_updated && reliable && error_sum < winner_error_sum {
                winner_error_sum = error_sum;
                // In case 2 matched filters return the same winner candidate
                // (overlap region), choose the one with the smaller index.
                if previous_lag_estimate == Some(lag) {
                    self.winner_lag = previous_lag_estimate;
                } else {
                    self.winner_lag = Some(lag);
                }
            }
            previous_lag_estimate = Some(lag);
            alignment_shift += self.filter_intra_lag_shift;
        }
    }

    /// Returns the lag of the winning filter, in downsampled samples.
    pub(crate) fn best_lag_estimate(&self) -> Option<usize> {
        self.winner_lag
    }

    /// Returns the maximum filter lag.
    pub(crate) fn max_filter_lag(&self) -> usize {
        self.filters.len() * self.filter_intra_lag_shift + self.filters[0].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::get_down_sampled_buffer_size;
    use crate::test_random::{DelayLine, TestRandom};

    /// Verifies that max_square_peak_index finds the correct peak for
    /// various lengths and positions.
    #[test]
    fn max_square_peak_index_correctness() {
        assert_eq!(max_square_peak_index(&[5.0]), 0);

        assert_eq!(max_square_peak_index(&[1.0, 2.0]), 1);
        assert_eq!(max_square_peak_index(&[3.0, 2.0]), 0);
        assert_eq!(max_square_peak_index(&[-3.0, 2.0]), 0);

        for length in 3..130 {
            for peak_pos in 0..length {
                let mut h = vec![1.0f32; length];
                h[peak_pos] = 100.0;
                assert_eq!(
                    max_square_peak_index(&h),
                    peak_pos,
                    "length={length}, peak_pos={peak_pos}"
                );
                h[peak_pos] = -100.0;
                assert_eq!(
                    max_square_peak_index(&h),
                    peak_pos,
                    "length={length}, peak_pos={peak_pos} (negative)"
                );
            }
        }
    }

    #[test]
    fn max_square_peak_index_tie_breaking() {
        let h = [0.0, 0.0, 4.0, 0.0, -4.0, 0.0, 0.0];
        assert_eq!(max_square_peak_index(&h), 2);
        let h = [0.0, 0.0, 0.0, 4.0, 4.0, 0.0, 0.0];
        assert_eq!(max_square_peak_index(&h), 4);
    }

    #[test]
    fn max_square_peak_index_random() {
        let mut rng = TestRandom::new(42);

        for length in 1..128 {
            let mut y = vec![0.0f32; length];
            for _ in 0..64 {
                rng.fill(&mut y);
                for (i, v) in y.iter_mut().enumerate() {
                    *v += i as f32 * 0.001;
                }

                let result = max_square_peak_index(&y);
                let result_sq = y[result] * y[result];
                for (i, &v) in y.iter().enumerate() {
                    assert!(
                        result_sq >= v * v,
                        "length={length}, result_idx={result}, idx={i}"
                    );
                }
            }
        }
    }

    /// Creates a scenario where y[i] = x[(x_start_index + delay)] for each
    /// sample, and verifies the filter peak converges to the delay tap.
    #[test]
    fn matched_filter_core_converges() {
        let mut rng = TestRandom::new(42);
        let h_size = 64;
        let x_size = 200;
        let sub_block_size = 16;
        let delay = 10usize;

        let mut x = vec![0.0f32; x_size];
        rng.fill(&mut x);

        let mut h = vec![0.0f32; h_size];
        let x2_sum_threshold = h_size as f32;

        let mut x_start_index = 50usize;
        for _ in 0..500 {
            // At tap k the core reads x[(x_start_index - i + k) % x_size] for
            // capture sample i.
            let mut y = vec![0.0f32; sub_block_size];
            for (i, sample) in y.iter_mut().enumerate() {
                let idx = (x_start_index + x_size - i + delay) % x_size;
                *sample = x[idx];
            }

            let mut filters_updated = false;
            let mut error_sum = 0.0f32;
            matched_filter_core(
                x_start_index,
                x2_sum_threshold,
                0.5,
                &x,
                &y,
                &mut h,
                &mut filters_updated,
                &mut error_sum,
            );
            assert!(filters_updated);

            x_start_index = (x_start_index + sub_block_size) % x_size;
        }

        assert_eq!(max_square_peak_index(&h), delay);
    }

    #[test]
    fn weak_render_does_not_adapt() {
        let x = vec![1.0f32; 200];
        let y = vec![1.0f32; 16];
        let mut h = vec![0.0f32; 64];
        let mut filters_updated = false;
        let mut error_sum = 0.0f32;
        matched_filter_core(
            0,
            64.0 * 150.0 * 150.0,
            0.7,
            &x,
            &y,
            &mut h,
            &mut filters_updated,
            &mut error_sum,
        );
        assert!(!filters_updated);
        assert!(h.iter().all(|&v| v == 0.0));
        assert_eq!(error_sum, 16.0);
    }

    /// Feeds a downsampled ring the way the render delay buffer does and
    /// checks that the bank reports the downsampled delay as its lag.
    #[test]
    fn matched_filter_finds_lag_in_second_filter() {
        let config = EchoCanceller3Config::default();
        let mut mf = MatchedFilter::new(&config);
        let size = get_down_sampled_buffer_size(4, NUM_MATCHED_FILTERS);
        let mut ring = DownsampledRenderBuffer::new(size, 0.0);
        let mut rng = TestRandom::new(7);
        let mut history = DelayLine::new();
        let delay = 700usize;

        let mut x = [0.0f32; SUB_BLOCK_SIZE];
        let mut y = [0.0f32; SUB_BLOCK_SIZE];
        let mut lag = None;
        for _ in 0..600 {
            rng.fill_scaled(&mut x, 5000.0);
            history.push(&x);
            ring.index.update_write(-(SUB_BLOCK_SIZE as isize));
            let write = ring.index.write;
            for (i, &v) in x.iter().rev().enumerate() {
                let idx = ring.index.offset_index(write, i as isize);
                ring.buffer[idx] = v;
            }
            ring.index.read = ring.index.write;
            history.read_delayed(delay, &mut y);

            mf.update(&ring, &y);
            lag = mf.best_lag_estimate();
        }
        assert_eq!(lag, Some(delay));
    }

    #[test]
    fn matched_filter_reset() {
        let mut mf = MatchedFilter::new(&EchoCanceller3Config::default());
        mf.filters[0][0] = 42.0;
        mf.filters[4][100] = 99.0;
        mf.winner_lag = Some(42);

        mf.reset();

        for f in &mf.filters {
            assert!(f.iter().all(|&v| v == 0.0));
        }
        assert!(mf.best_lag_estimate().is_none());
    }

    #[test]
    fn matched_filter_max_lag() {
        let mf = MatchedFilter::new(&EchoCanceller3Config::default());
        // 5 * 384 + 512
        assert_eq!(mf.max_filter_lag(), 2432);
    }
}
