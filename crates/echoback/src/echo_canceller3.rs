//! Echo canceller: the public entry point.
//!
//! Render blocks are queued as they arrive and handed to the block processor
//! right before the next capture block is processed, so render and capture
//! may be delivered from independent call sites as long as they are
//! serialized.

use std::collections::VecDeque;

use echoback_aec3::{
    BLOCK_SIZE, Block, BlockProcessor, EchoCanceller3Config, ProcessingModes,
    RENDER_TRANSFER_QUEUE_SIZE_BLOCKS,
};

use crate::audio_buffer::AudioBuffer;

// ─── Error ───────────────────────────────────────────────────────────

/// Errors returned by the echo canceller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A block did not hold exactly [`BLOCK_SIZE`] samples.
    BadDataLength { expected: usize, actual: usize },
    /// The configuration is inconsistent and cannot be repaired by clamping.
    BadConfig,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadDataLength { expected, actual } => {
                write!(f, "bad data length: expected {expected} samples, got {actual}")
            }
            Self::BadConfig => write!(f, "bad echo canceller configuration"),
        }
    }
}

impl std::error::Error for Error {}

fn bad_length(actual: usize) -> Error {
    Error::BadDataLength {
        expected: BLOCK_SIZE,
        actual,
    }
}

/// Borrows `samples` as exactly one block.
fn as_block<T>(samples: &[T]) -> Result<&[T; BLOCK_SIZE], Error> {
    samples.try_into().map_err(|_| bad_length(samples.len()))
}

fn as_block_mut<T>(samples: &mut [T]) -> Result<&mut [T; BLOCK_SIZE], Error> {
    let actual = samples.len();
    samples.try_into().map_err(|_| bad_length(actual))
}

// ─── Metrics ─────────────────────────────────────────────────────────

/// Diagnostics of the most recently processed capture block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    /// Render-to-capture delay in blocks, if one has been estimated.
    pub estimated_delay_blocks: Option<usize>,
    /// Energy of the linear filter residual.
    pub e2: f32,
    /// Energy of the capture block.
    pub y2: f32,
    /// Mean echo return loss enhancement over all bins, linear scale.
    pub erle_avg: f32,
    /// Whether the suppressor relied on the linear filter output.
    pub linear_usable: bool,
}

// ─── EchoCancellerBuilder ────────────────────────────────────────────

/// Builder for constructing an [`EchoCanceller3`] instance.
///
/// # Example
/// ```
/// use echoback::{EchoCanceller3, EchoCanceller3Config, ProcessingModes};
///
/// let mut config = EchoCanceller3Config::default();
/// config.delay.default_delay = 8;
///
/// let aec = EchoCanceller3::builder()
///     .config(config)
///     .processing_modes(ProcessingModes {
///         linear_filter: true,
///         nonlinear_suppressor: false,
///     })
///     .build()
///     .unwrap();
/// assert_eq!(aec.estimated_delay_blocks(), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EchoCancellerBuilder {
    config: EchoCanceller3Config,
    modes: ProcessingModes,
}

impl EchoCancellerBuilder {
    /// Set the engine configuration.
    pub fn config(mut self, config: EchoCanceller3Config) -> Self {
        self.config = config;
        self
    }

    /// Set the initial processing modes.
    pub fn processing_modes(mut self, modes: ProcessingModes) -> Self {
        self.modes = modes;
        self
    }

    /// Validates the configuration and builds the [`EchoCanceller3`].
    ///
    /// Out-of-range values are clamped. Delay selection thresholds where the
    /// initial threshold exceeds the converged one are rejected.
    pub fn build(self) -> Result<EchoCanceller3, Error> {
        let mut config = self.config;
        let thresholds = config.delay.delay_selection_thresholds;
        if thresholds.initial > thresholds.converged {
            return Err(Error::BadConfig);
        }
        if !config.validate() {
            tracing::warn!("echo canceller configuration out of range; values were clamped");
        }
        Ok(EchoCanceller3::with_config(&config, self.modes))
    }
}

// ─── EchoCanceller3 ──────────────────────────────────────────────────

/// Acoustic echo canceller for 16 kHz mono audio in blocks of
/// [`BLOCK_SIZE`] samples.
///
/// # Usage
///
/// 1. Create an instance via [`EchoCanceller3::new()`] or
///    [`EchoCanceller3::builder()`].
/// 2. For every block:
///    - pass the far-end (playback) audio to
///      [`analyze_render()`](EchoCanceller3::analyze_render),
///    - pass the near-end (microphone) audio to
///      [`process_capture()`](EchoCanceller3::process_capture), which
///      removes the echo in place.
///
/// Both f32 (FloatS16 scale) and i16 interfaces are provided.
#[derive(Debug)]
pub struct EchoCanceller3 {
    block_processor: BlockProcessor,
    render_queue: VecDeque<Block>,
    capture_buffer: AudioBuffer,
}

impl Default for EchoCanceller3 {
    fn default() -> Self {
        Self::new()
    }
}

impl EchoCanceller3 {
    /// Creates a new instance with the default configuration and both
    /// processing stages enabled.
    pub fn new() -> Self {
        Self::with_config(&EchoCanceller3Config::default(), ProcessingModes::default())
    }

    /// Returns a builder for constructing an instance with custom
    /// configuration.
    pub fn builder() -> EchoCancellerBuilder {
        EchoCancellerBuilder::default()
    }

    fn with_config(config: &EchoCanceller3Config, modes: ProcessingModes) -> Self {
        let mut block_processor = BlockProcessor::new(config);
        block_processor.set_processing_modes(modes);
        Self {
            block_processor,
            render_queue: VecDeque::with_capacity(RENDER_TRANSFER_QUEUE_SIZE_BLOCKS),
            capture_buffer: AudioBuffer::new(),
        }
    }

    fn enqueue_render(&mut self, block: Block) {
        if self.render_queue.len() >= RENDER_TRANSFER_QUEUE_SIZE_BLOCKS {
            self.render_queue.pop_front();
            tracing::debug!(
                capacity = RENDER_TRANSFER_QUEUE_SIZE_BLOCKS,
                "render queue full; dropping oldest block"
            );
        }
        self.render_queue.push_back(block);
    }

    /// Queues one block of far-end audio.
    pub fn analyze_render(&mut self, render: &[f32]) -> Result<(), Error> {
        let render = as_block(render)?;
        self.enqueue_render(Block::from_samples(render));
        Ok(())
    }

    /// Queues one block of far-end audio given as i16 samples.
    pub fn analyze_render_i16(&mut self, render: &[i16]) -> Result<(), Error> {
        let render = as_block(render)?;
        let mut buffer = AudioBuffer::new();
        buffer.copy_from_i16(render);
        self.enqueue_render(buffer.block().clone());
        Ok(())
    }

    fn process_capture_buffer(&mut self) {
        while let Some(block) = self.render_queue.pop_front() {
            self.block_processor.buffer_render(&block);
        }
        self.block_processor
            .process_capture(self.capture_buffer.block_mut());
    }

    /// Removes the echo from one block of near-end audio in place.
    pub fn process_capture(&mut self, capture: &mut [f32]) -> Result<(), Error> {
        let capture = as_block_mut(capture)?;
        self.capture_buffer.copy_from_float(capture);
        self.process_capture_buffer();
        self.capture_buffer.copy_to_float(capture);
        Ok(())
    }

    /// Removes the echo from one block of i16 near-end audio, writing the
    /// result to `output`.
    pub fn process_capture_i16(&mut self, capture: &[i16], output: &mut [i16]) -> Result<(), Error> {
        let capture = as_block(capture)?;
        let output = as_block_mut(output)?;
        self.capture_buffer.copy_from_i16(capture);
        self.process_capture_buffer();
        self.capture_buffer.copy_to_i16(output);
        Ok(())
    }

    /// Enables or disables the linear filter and the nonlinear suppressor.
    /// Disabling both passes the capture through unchanged.
    pub fn set_processing_modes(&mut self, linear_filter: bool, nonlinear_suppressor: bool) {
        self.block_processor.set_processing_modes(ProcessingModes {
            linear_filter,
            nonlinear_suppressor,
        });
    }

    pub fn processing_modes(&self) -> ProcessingModes {
        self.block_processor.processing_modes()
    }

    /// Render-to-capture delay in blocks of the most recent capture block.
    pub fn estimated_delay_blocks(&self) -> Option<usize> {
        self.block_processor.estimated_delay_blocks()
    }

    pub fn metrics(&self) -> Metrics {
        let echo = self.block_processor.metrics();
        Metrics {
            estimated_delay_blocks: self.estimated_delay_blocks(),
            e2: echo.e2,
            y2: echo.y2,
            erle_avg: echo.erle_avg,
            linear_usable: echo.linear_usable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_strategy::proptest;

    /// Small LCG so test signals are reproducible.
    struct Lcg(u32);

    impl Lcg {
        fn next_i16(&mut self, amplitude: i32) -> i16 {
            self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12345);
            ((self.0 >> 8) as i32 % (2 * amplitude + 1) - amplitude) as i16
        }
    }

    #[test]
    fn bad_lengths_are_rejected() {
        let mut aec = EchoCanceller3::new();
        let short = [0.0f32; BLOCK_SIZE - 1];
        let long = [0i16; BLOCK_SIZE + 1];
        let mut output = [0i16; BLOCK_SIZE];

        let expected = Error::BadDataLength {
            expected: BLOCK_SIZE,
            actual: BLOCK_SIZE - 1,
        };
        assert_eq!(aec.analyze_render(&short), Err(expected));
        assert_eq!(aec.process_capture(&mut short.clone()), Err(expected));
        assert_eq!(
            aec.analyze_render_i16(&long),
            Err(Error::BadDataLength {
                expected: BLOCK_SIZE,
                actual: BLOCK_SIZE + 1,
            })
        );
        assert!(aec.process_capture_i16(&long, &mut output).is_err());
        assert!(aec.process_capture_i16(&output.clone(), &mut output[..10]).is_err());
        assert!(aec.render_queue.is_empty());
    }

    #[test]
    fn error_messages() {
        let err = Error::BadDataLength {
            expected: 64,
            actual: 3,
        };
        assert_eq!(err.to_string(), "bad data length: expected 64 samples, got 3");
        assert_eq!(
            Error::BadConfig.to_string(),
            "bad echo canceller configuration"
        );
    }

    #[test]
    fn builder_rejects_inverted_thresholds() {
        let mut config = EchoCanceller3Config::default();
        config.delay.delay_selection_thresholds.initial = 30;
        config.delay.delay_selection_thresholds.converged = 10;
        let result = EchoCanceller3::builder().config(config).build();
        assert_eq!(result.err(), Some(Error::BadConfig));
    }

    #[test]
    fn builder_clamps_and_applies_modes() {
        let mut config = EchoCanceller3Config::default();
        config.erle.min = -5.0;
        let modes = ProcessingModes {
            linear_filter: false,
            nonlinear_suppressor: true,
        };
        let aec = EchoCanceller3::builder()
            .config(config)
            .processing_modes(modes)
            .build()
            .unwrap();
        assert_eq!(aec.processing_modes(), modes);
        // The minimum ERLE was clamped up to 1.
        assert_eq!(aec.metrics().erle_avg, 1.0);
    }

    #[test]
    fn render_queue_drops_oldest_on_overflow() {
        let mut aec = EchoCanceller3::new();
        for i in 0..RENDER_TRANSFER_QUEUE_SIZE_BLOCKS + 20 {
            aec.analyze_render(&[i as f32; BLOCK_SIZE]).unwrap();
        }
        assert_eq!(aec.render_queue.len(), RENDER_TRANSFER_QUEUE_SIZE_BLOCKS);
        assert_eq!(aec.render_queue.front().unwrap().view()[0], 20.0);

        // Processing a capture block drains the queue.
        aec.process_capture(&mut [0.0; BLOCK_SIZE]).unwrap();
        assert!(aec.render_queue.is_empty());
    }

    #[test]
    fn capture_before_render_is_untouched() {
        let mut aec = EchoCanceller3::new();
        let mut rng = Lcg(3);
        for _ in 0..10 {
            let capture: Vec<i16> = (0..BLOCK_SIZE).map(|_| rng.next_i16(20000)).collect();
            let mut output = [0i16; BLOCK_SIZE];
            aec.process_capture_i16(&capture, &mut output).unwrap();
            assert_eq!(&capture[..], &output[..]);
        }
    }

    #[test]
    fn silence_stays_silent() {
        let mut aec = EchoCanceller3::new();
        let silence = [0i16; BLOCK_SIZE];
        let mut output = [1i16; BLOCK_SIZE];
        for _ in 0..500 {
            aec.analyze_render_i16(&silence).unwrap();
            aec.process_capture_i16(&silence, &mut output).unwrap();
            assert_eq!(output, silence);
        }
        let metrics = aec.metrics();
        assert_eq!(metrics.estimated_delay_blocks, None);
        assert!(metrics.erle_avg.is_finite());
    }

    #[test]
    fn delay_is_estimated_through_i16_api() {
        let mut aec = EchoCanceller3::new();
        let mut rng = Lcg(42);
        let delay_blocks = 10;
        let delay_samples = delay_blocks * BLOCK_SIZE + 48;
        let mut history: Vec<i16> = Vec::new();
        let mut output = [0i16; BLOCK_SIZE];
        let mut estimates = Vec::new();

        for _ in 0..800 {
            let render: Vec<i16> = (0..BLOCK_SIZE).map(|_| rng.next_i16(8000)).collect();
            history.extend_from_slice(&render);
            let end = history.len() as isize - delay_samples as isize;
            let capture: Vec<i16> = (end - BLOCK_SIZE as isize..end)
                .map(|i| if i >= 0 { history[i as usize] / 2 } else { 0 })
                .collect();

            aec.analyze_render_i16(&render).unwrap();
            aec.process_capture_i16(&capture, &mut output).unwrap();
            estimates.push(aec.estimated_delay_blocks());
        }

        assert!(estimates.iter().any(Option::is_some));
        for estimate in estimates.iter().flatten() {
            assert_eq!(*estimate, delay_blocks);
        }
    }

    #[proptest(ProptestConfig { cases: 32, ..ProptestConfig::default() })]
    fn disabled_modes_pass_through_f32(
        #[strategy(proptest::collection::vec(-32768.0f32..32767.0, BLOCK_SIZE * 8))]
        samples: Vec<f32>,
    ) {
        let mut aec = EchoCanceller3::new();
        aec.set_processing_modes(false, false);
        for block in samples.chunks(BLOCK_SIZE) {
            aec.analyze_render(block).unwrap();
            let mut capture = block.to_vec();
            capture.reverse();
            let expected = capture.clone();
            aec.process_capture(&mut capture).unwrap();
            prop_assert_eq!(capture, expected);
        }
    }

    #[proptest(ProptestConfig { cases: 32, ..ProptestConfig::default() })]
    fn disabled_modes_pass_through_i16(
        #[strategy(proptest::collection::vec(any::<i16>(), BLOCK_SIZE * 8))] samples: Vec<i16>,
    ) {
        let mut aec = EchoCanceller3::new();
        aec.set_processing_modes(false, false);
        let mut output = [0i16; BLOCK_SIZE];
        for block in samples.chunks(BLOCK_SIZE) {
            aec.analyze_render_i16(block).unwrap();
            aec.process_capture_i16(block, &mut output).unwrap();
            prop_assert_eq!(&output[..], block);
        }
    }
}
