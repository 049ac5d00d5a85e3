//! Echo subtractor: linear echo cancellation with a partitioned
//! frequency-domain adaptive filter.

use crate::adaptive_fir_filter::{AdaptiveFirFilter, compute_erl};
use crate::aec3_fft::Aec3Fft;
use crate::common::{
    BLOCK_SIZE, FFT_LENGTH, FFT_LENGTH_BY_2, FFT_LENGTH_BY_2_PLUS_1, FILTER_LENGTH_BLOCKS,
};
use crate::config::EchoCanceller3Config;
use crate::echo_path_variability::EchoPathVariability;
use crate::fft_data::FftData;
use crate::filter_update_gain::FilterUpdateGain;
use crate::render_buffer::RenderBuffer;
use crate::subtractor_output::SubtractorOutput;

/// Computes the prediction error `e = y - s` where `s` is the second half of
/// `IFFT(S)` scaled back to sample units.
fn prediction_error(
    fft: &mut Aec3Fft,
    s_fft: &FftData,
    y: &[f32; BLOCK_SIZE],
    e: &mut [f32; BLOCK_SIZE],
    s: &mut [f32; BLOCK_SIZE],
) {
    let mut tmp = [0.0f32; FFT_LENGTH];
    fft.ifft(s_fft, &mut tmp);
    const SCALE: f32 = 1.0 / FFT_LENGTH_BY_2 as f32;
    for k in 0..BLOCK_SIZE {
        s[k] = SCALE * tmp[k + FFT_LENGTH_BY_2];
        e[k] = y[k] - s[k];
    }
}

/// Provides linear echo cancellation functionality.
#[derive(derive_more::Debug)]
pub(crate) struct Subtractor {
    #[debug(skip)]
    fft: Aec3Fft,
    filter: AdaptiveFirFilter,
    update_gain: FilterUpdateGain,
    #[debug(skip)]
    frequency_response: Vec<[f32; FFT_LENGTH_BY_2_PLUS_1]>,
}

impl Subtractor {
    pub(crate) fn new(config: &EchoCanceller3Config) -> Self {
        let filter = AdaptiveFirFilter::new(FILTER_LENGTH_BLOCKS);
        let frequency_response = vec![[0.0; FFT_LENGTH_BY_2_PLUS_1]; filter.size_partitions()];
        Self {
            fft: Aec3Fft::new(),
            filter,
            update_gain: FilterUpdateGain::new(&config.filter),
            frequency_response,
        }
    }

    /// Performs the echo subtraction for one capture block.
    pub(crate) fn process(
        &mut self,
        render_buffer: &RenderBuffer<'_>,
        capture: &[f32; BLOCK_SIZE],
        output: &mut SubtractorOutput,
    ) {
        let num_partitions = self.filter.size_partitions();

        // Compute the render powers.
        let mut x2 = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        render_buffer.spectral_sum(num_partitions, &mut x2);

        // Form the linear echo estimate and the residual.
        let mut s_fft = FftData::default();
        self.filter.filter(render_buffer, &mut s_fft);
        prediction_error(
            &mut self.fft,
            &s_fft,
            capture,
            &mut output.e,
            &mut output.s,
        );
        output.compute_metrics(capture);

        // Compute the spectrum of the residual.
        self.fft.zero_padded_fft(&output.e, &mut output.e_fft);
        output.e_fft.spectrum(&mut output.e2_spectrum);

        // Update the filter.
        let mut erl = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        compute_erl(&self.frequency_response, &mut erl);
        let mut g = FftData::default();
        self.update_gain
            .compute(&x2, output, &erl, num_partitions, &mut g);
        self.filter.adapt(render_buffer, &g);
        self.filter
            .compute_frequency_response(&mut self.frequency_response);
    }

    /// Resets the filter and its gain when the echo path delay moved.
    pub(crate) fn handle_echo_path_change(&mut self, echo_path_variability: &EchoPathVariability) {
        if echo_path_variability.delay_changed() {
            self.filter.handle_echo_path_change();
            self.update_gain
                .handle_echo_path_change(echo_path_variability);
        }
    }

    /// Returns the current filter partitions.
    #[cfg(test)]
    pub(crate) fn filter(&self) -> &[FftData] {
        self.filter.get_filter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::echo_path_variability::DelayAdjustment;
    use crate::render_delay_buffer::RenderDelayBuffer;
    use crate::test_random::{DelayLine, TestRandom};

    /// Runs the subtractor on white-noise render with an echo path of a
    /// scaled delayed copy. Returns `e2 / y2` per block.
    fn run_subtractor(subtractor: &mut Subtractor, num_blocks: usize) -> Vec<f32> {
        let config = EchoCanceller3Config::default();
        let mut render_delay_buffer = RenderDelayBuffer::new(&config);
        let mut rng = TestRandom::new(7);
        let mut history = DelayLine::new();
        let mut output = SubtractorOutput::default();

        // The aligned render lags the newest block by the default delay.
        let echo_delay = config.delay.default_delay * BLOCK_SIZE + 20;

        let mut x = [0.0f32; BLOCK_SIZE];
        let mut y = [0.0f32; BLOCK_SIZE];
        (0..num_blocks)
            .map(|_| {
                rng.fill_scaled(&mut x, 8000.0);
                history.push(&x);
                history.read_delayed(echo_delay, &mut y);
                for v in &mut y {
                    *v *= 0.5;
                }
                render_delay_buffer.insert(&Block::from_samples(&x));
                render_delay_buffer.prepare_capture_processing();
                subtractor.process(&render_delay_buffer.render_buffer(), &y, &mut output);
                output.e2 / output.y2.max(1.0)
            })
            .collect()
    }

    #[test]
    fn zero_input_produces_zero_output() {
        let config = EchoCanceller3Config::default();
        let render_delay_buffer = RenderDelayBuffer::new(&config);
        let mut subtractor = Subtractor::new(&config);
        let mut output = SubtractorOutput::default();

        subtractor.process(
            &render_delay_buffer.render_buffer(),
            &[0.0; BLOCK_SIZE],
            &mut output,
        );

        assert!(output.e.iter().all(|&v| v == 0.0));
        assert!(output.s.iter().all(|&v| v == 0.0));
        assert_eq!(output.e2, 0.0);
        assert_eq!(output.y2, 0.0);
    }

    #[test]
    fn residual_equals_capture_minus_prediction() {
        let config = EchoCanceller3Config::default();
        let mut subtractor = Subtractor::new(&config);
        run_subtractor(&mut subtractor, 50);

        let mut render_delay_buffer = RenderDelayBuffer::new(&config);
        let mut x = [0.0f32; BLOCK_SIZE];
        TestRandom::new(3).fill_scaled(&mut x, 1000.0);
        render_delay_buffer.insert(&Block::from_samples(&x));
        render_delay_buffer.prepare_capture_processing();

        let mut y = [0.0f32; BLOCK_SIZE];
        TestRandom::new(4).fill_scaled(&mut y, 1000.0);
        let mut output = SubtractorOutput::default();
        subtractor.process(&render_delay_buffer.render_buffer(), &y, &mut output);
        for k in 0..BLOCK_SIZE {
            assert!((output.e[k] - (y[k] - output.s[k])).abs() < 1e-3);
        }
    }

    #[test]
    fn converges_on_linear_echo_path() {
        let config = EchoCanceller3Config::default();
        let mut subtractor = Subtractor::new(&config);
        let ratios = run_subtractor(&mut subtractor, 1500);

        let tail = &ratios[ratios.len() - 100..];
        let mean = tail.iter().sum::<f32>() / tail.len() as f32;
        assert!(mean < 0.25, "residual to capture ratio {mean}");
    }

    #[test]
    fn delay_change_zeroes_the_filter() {
        let config = EchoCanceller3Config::default();
        let mut subtractor = Subtractor::new(&config);
        run_subtractor(&mut subtractor, 200);
        assert!(
            subtractor
                .filter()
                .iter()
                .any(|h| h.re.iter().any(|&v| v != 0.0))
        );

        subtractor.handle_echo_path_change(&EchoPathVariability::new(DelayAdjustment::None));
        assert!(
            subtractor
                .filter()
                .iter()
                .any(|h| h.re.iter().any(|&v| v != 0.0))
        );

        subtractor.handle_echo_path_change(&EchoPathVariability::new(
            DelayAdjustment::NewDetectedDelay,
        ));
        for h in subtractor.filter() {
            assert!(h.re.iter().chain(&h.im).all(|&v| v == 0.0));
        }
    }
}
