//! Echo canceller engine for 16 kHz mono audio.
//!
//! Audio is processed in blocks of 64 samples. Render (far-end) blocks are
//! buffered through [`BlockProcessor::buffer_render`] and each capture
//! (near-end) block is cleaned in place by [`BlockProcessor::process_capture`].
//!
//! The engine estimates the render-to-capture delay with a bank of matched
//! filters, models the echo path with a partitioned frequency-domain adaptive
//! filter and masks the remaining echo with a spectral suppression gain.

pub(crate) mod adaptive_fir_filter;
pub(crate) mod aec3_fft;
pub(crate) mod aec_state;
pub(crate) mod block;
pub(crate) mod block_processor;
pub(crate) mod circular_buffer;
pub(crate) mod common;
pub(crate) mod config;
pub(crate) mod decimator;
pub(crate) mod echo_path_delay_estimator;
pub(crate) mod echo_path_variability;
pub(crate) mod echo_remover;
pub(crate) mod echo_remover_metrics;
pub(crate) mod erle_estimator;
pub(crate) mod fft_data;
pub(crate) mod filter_update_gain;
pub(crate) mod matched_filter;
pub(crate) mod matched_filter_lag_aggregator;
pub(crate) mod moving_average;
pub(crate) mod render_buffer;
pub(crate) mod render_delay_buffer;
pub(crate) mod residual_echo_estimator;
pub(crate) mod subtractor;
pub(crate) mod subtractor_output;
pub(crate) mod subtractor_output_analyzer;
pub(crate) mod suppression_filter;
pub(crate) mod suppression_gain;

#[cfg(test)]
pub(crate) mod test_random;

pub use block::Block;
pub use block_processor::{BlockProcessor, ProcessingModes};
pub use common::{BLOCK_SIZE, RENDER_TRANSFER_QUEUE_SIZE_BLOCKS, SAMPLE_RATE_HZ};
pub use config::{
    Delay, DelaySelectionThresholds, EchoAudibility, EchoCanceller3Config, EchoModel, Erle,
    Filter, MaskingThresholds, RenderLevels, Suppressor, Tuning,
};
pub use echo_remover_metrics::EchoRemoverMetrics;
