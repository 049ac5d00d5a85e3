//! Engine geometry constants and buffer-size helpers.
//!
//! Everything here is fixed for 16 kHz mono audio processed in 64-sample
//! blocks.

pub(crate) const NUM_BLOCKS_PER_SECOND: usize = 250;

pub(crate) const FFT_LENGTH_BY_2: usize = 64;
pub(crate) const FFT_LENGTH_BY_2_PLUS_1: usize = FFT_LENGTH_BY_2 + 1;
pub(crate) const FFT_LENGTH_BY_2_MINUS_1: usize = FFT_LENGTH_BY_2 - 1;
pub(crate) const FFT_LENGTH: usize = 2 * FFT_LENGTH_BY_2;
pub(crate) const FFT_LENGTH_BY_2_LOG2: usize = 6;

/// Number of samples in one processing block (4 ms at 16 kHz).
pub const BLOCK_SIZE: usize = FFT_LENGTH_BY_2;
pub(crate) const BLOCK_SIZE_LOG2: usize = FFT_LENGTH_BY_2_LOG2;

/// Sample rate the engine operates at.
pub const SAMPLE_RATE_HZ: usize = 16_000;

/// Number of pending render blocks the engine keeps before dropping the
/// oldest one.
pub const RENDER_TRANSFER_QUEUE_SIZE_BLOCKS: usize = 100;

pub(crate) const MATCHED_FILTER_WINDOW_SIZE_SUB_BLOCKS: usize = 32;
pub(crate) const MATCHED_FILTER_ALIGNMENT_SHIFT_SIZE_SUB_BLOCKS: usize =
    MATCHED_FILTER_WINDOW_SIZE_SUB_BLOCKS * 3 / 4;

pub(crate) const DOWN_SAMPLING_FACTOR: usize = 4;
pub(crate) const SUB_BLOCK_SIZE: usize = BLOCK_SIZE / DOWN_SAMPLING_FACTOR;
pub(crate) const NUM_MATCHED_FILTERS: usize = 5;

/// Number of frequency-domain partitions in the linear echo model.
pub(crate) const FILTER_LENGTH_BLOCKS: usize = 13;

/// Returns the required downsampled buffer size for matched filtering.
pub(crate) const fn get_down_sampled_buffer_size(
    down_sampling_factor: usize,
    num_matched_filters: usize,
) -> usize {
    BLOCK_SIZE / down_sampling_factor
        * (MATCHED_FILTER_ALIGNMENT_SHIFT_SIZE_SUB_BLOCKS * num_matched_filters
            + MATCHED_FILTER_WINDOW_SIZE_SUB_BLOCKS
            + 1)
}

/// Returns the render delay buffer size in blocks.
pub(crate) const fn get_render_delay_buffer_size(
    down_sampling_factor: usize,
    num_matched_filters: usize,
    filter_length_blocks: usize,
) -> usize {
    get_down_sampled_buffer_size(down_sampling_factor, num_matched_filters)
        / (BLOCK_SIZE / down_sampling_factor)
        + filter_length_blocks
        + 1
}
