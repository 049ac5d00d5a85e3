//! Block processor: block-level echo cancellation.
//!
//! Connects the render delay buffer, the echo path delay estimator and the
//! echo remover. Render blocks are buffered as they arrive and each capture
//! block is processed against the render signal aligned by the most recent
//! delay estimate.

use crate::block::Block;
use crate::common::BLOCK_SIZE_LOG2;
use crate::config::EchoCanceller3Config;
use crate::echo_path_delay_estimator::EchoPathDelayEstimator;
use crate::echo_path_variability::{DelayAdjustment, EchoPathVariability};
use crate::echo_remover::EchoRemover;
use crate::echo_remover_metrics::EchoRemoverMetrics;
use crate::render_delay_buffer::{BufferingEvent, RenderDelayBuffer};

/// Selects which stages of the echo remover run.
///
/// With both stages disabled the capture signal passes through unchanged.
/// With only the linear filter enabled the output is the raw filter
/// residual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingModes {
    pub linear_filter: bool,
    pub nonlinear_suppressor: bool,
}

impl Default for ProcessingModes {
    fn default() -> Self {
        Self {
            linear_filter: true,
            nonlinear_suppressor: true,
        }
    }
}

/// Block-level echo cancellation processor.
#[derive(derive_more::Debug)]
pub struct BlockProcessor {
    capture_properly_started: bool,
    render_properly_started: bool,
    #[debug(skip)]
    render_buffer: RenderDelayBuffer,
    #[debug(skip)]
    delay_estimator: EchoPathDelayEstimator,
    echo_remover: EchoRemover,
    render_event: BufferingEvent,
    modes: ProcessingModes,
    estimated_delay_blocks: Option<usize>,
}

impl BlockProcessor {
    pub fn new(config: &EchoCanceller3Config) -> Self {
        Self {
            capture_properly_started: false,
            render_properly_started: false,
            render_buffer: RenderDelayBuffer::new(config),
            delay_estimator: EchoPathDelayEstimator::new(config),
            echo_remover: EchoRemover::new(config),
            render_event: BufferingEvent::None,
            modes: ProcessingModes::default(),
            estimated_delay_blocks: None,
        }
    }

    /// Buffers a block of render data.
    pub fn buffer_render(&mut self, block: &Block) {
        self.render_event = self.render_buffer.insert(block);
        if self.render_event == BufferingEvent::RenderOverrun {
            tracing::debug!("render buffer overrun");
        }
        self.render_properly_started = true;
    }

    /// Processes a block of capture data in place.
    pub fn process_capture(&mut self, capture_block: &mut Block) {
        // If no render data has yet arrived, do not process the capture signal.
        if !self.render_properly_started {
            return;
        }
        if !self.capture_properly_started {
            self.capture_properly_started = true;
            self.render_buffer.reset();
            self.delay_estimator.reset();
        }

        let mut echo_path_variability = EchoPathVariability::new(DelayAdjustment::None);

        if self.render_event == BufferingEvent::RenderOverrun {
            echo_path_variability.delay_change = DelayAdjustment::BufferFlush;
            self.delay_estimator.reset();
        }
        self.render_event = BufferingEvent::None;

        // Update the render buffers and prepare for reading.
        if self.render_buffer.prepare_capture_processing() == BufferingEvent::RenderUnderrun {
            tracing::debug!(delay_blocks = ?self.render_buffer.delay(), "render buffer underrun");
            self.delay_estimator.reset();
        }

        // Compute and apply the render delay.
        let estimated_delay = self
            .delay_estimator
            .estimate_delay(self.render_buffer.downsampled_render_buffer(), capture_block);
        let estimated_delay_blocks = estimated_delay.map(|d| d >> BLOCK_SIZE_LOG2);
        if let Some(delay_blocks) = estimated_delay_blocks
            && self.render_buffer.align_from_delay(delay_blocks)
        {
            tracing::debug!(
                delay_blocks,
                previous = ?self.estimated_delay_blocks,
                "new echo path delay"
            );
            echo_path_variability.delay_change = DelayAdjustment::NewDetectedDelay;
        }
        self.estimated_delay_blocks = estimated_delay_blocks;

        // Remove the echo from the capture signal.
        let render_buffer = self.render_buffer.render_buffer();
        self.echo_remover
            .process_capture(&echo_path_variability, &render_buffer, capture_block);
    }

    /// Enables or disables the linear filter and the nonlinear suppressor.
    pub fn set_processing_modes(&mut self, modes: ProcessingModes) {
        self.modes = modes;
        self.echo_remover
            .set_processing_modes(modes.linear_filter, modes.nonlinear_suppressor);
    }

    pub fn processing_modes(&self) -> ProcessingModes {
        self.modes
    }

    /// Delay estimate of the most recent capture block, in whole blocks.
    pub fn estimated_delay_blocks(&self) -> Option<usize> {
        self.estimated_delay_blocks
    }

    pub fn metrics(&self) -> EchoRemoverMetrics {
        self.echo_remover.metrics()
    }
}
