//! Echo remover: runs the linear subtractor, tracks the AEC state and
//! applies the nonlinear suppression gain to one capture block.

use crate::aec_state::AecState;
use crate::aec3_fft::Aec3Fft;
use crate::block::Block;
use crate::common::{BLOCK_SIZE, FFT_LENGTH_BY_2, FFT_LENGTH_BY_2_PLUS_1};
use crate::config::EchoCanceller3Config;
use crate::echo_path_variability::EchoPathVariability;
use crate::echo_remover_metrics::EchoRemoverMetrics;
use crate::fft_data::FftData;
use crate::render_buffer::RenderBuffer;
use crate::residual_echo_estimator::ResidualEchoEstimator;
use crate::subtractor::Subtractor;
use crate::subtractor_output::SubtractorOutput;
use crate::suppression_filter::SuppressionFilter;
use crate::suppression_gain::SuppressionGain;

/// Computes the linear echo power: S2 = |Y - E|^2.
fn linear_echo_power(e: &FftData, y: &FftData, s2: &mut [f32; FFT_LENGTH_BY_2_PLUS_1]) {
    for k in 0..e.re.len() {
        s2[k] =
            (y.re[k] - e.re[k]) * (y.re[k] - e.re[k]) + (y.im[k] - e.im[k]) * (y.im[k] - e.im[k]);
    }
}

/// Computes a windowed (sqrt-Hanning) padded FFT and updates the related memory.
fn windowed_padded_fft(
    fft: &mut Aec3Fft,
    v: &[f32; BLOCK_SIZE],
    v_old: &mut [f32; FFT_LENGTH_BY_2],
    out: &mut FftData,
) {
    fft.padded_fft(v, v_old, out);
    v_old.copy_from_slice(v);
}

/// Removes echo from the capture signal.
#[derive(derive_more::Debug)]
pub(crate) struct EchoRemover {
    #[debug(skip)]
    fft: Aec3Fft,
    #[debug(skip)]
    subtractor: Subtractor,
    #[debug(skip)]
    subtractor_output: SubtractorOutput,
    suppression_gain: SuppressionGain,
    suppression_filter: SuppressionFilter,
    residual_echo_estimator: ResidualEchoEstimator,
    aec_state: AecState,
    #[debug(skip)]
    e_old: [f32; FFT_LENGTH_BY_2],
    #[debug(skip)]
    y_old: [f32; FFT_LENGTH_BY_2],
    enable_linear_filter: bool,
    enable_nonlinear_suppressor: bool,
    metrics: EchoRemoverMetrics,
}

impl EchoRemover {
    pub(crate) fn new(config: &EchoCanceller3Config) -> Self {
        Self {
            fft: Aec3Fft::new(),
            subtractor: Subtractor::new(config),
            subtractor_output: SubtractorOutput::default(),
            suppression_gain: SuppressionGain::new(config),
            suppression_filter: SuppressionFilter::new(),
            residual_echo_estimator: ResidualEchoEstimator::new(config),
            aec_state: AecState::new(config),
            e_old: [0.0; FFT_LENGTH_BY_2],
            y_old: [0.0; FFT_LENGTH_BY_2],
            enable_linear_filter: true,
            enable_nonlinear_suppressor: true,
            metrics: EchoRemoverMetrics {
                erle_avg: config.erle.min,
                ..EchoRemoverMetrics::default()
            },
        }
    }

    pub(crate) fn set_processing_modes(&mut self, linear_filter: bool, nonlinear_suppressor: bool) {
        self.enable_linear_filter = linear_filter;
        self.enable_nonlinear_suppressor = nonlinear_suppressor;
    }

    /// Returns the metrics of the most recently processed block.
    pub(crate) fn metrics(&self) -> EchoRemoverMetrics {
        self.metrics
    }

    /// Removes echo from a block of capture samples. The render signal in the
    /// render buffer is assumed to be pre-aligned with the capture signal.
    pub(crate) fn process_capture(
        &mut self,
        echo_path_variability: &EchoPathVariability,
        render_buffer: &RenderBuffer<'_>,
        capture: &mut Block,
    ) {
        if echo_path_variability.delay_changed() {
            self.subtractor
                .handle_echo_path_change(echo_path_variability);
            self.aec_state
                .handle_echo_path_change(echo_path_variability);
        }

        if !self.enable_linear_filter && !self.enable_nonlinear_suppressor {
            return;
        }

        let y = capture.view_mut();
        let output = &mut self.subtractor_output;
        if self.enable_linear_filter {
            self.subtractor.process(render_buffer, y, output);
            if !self.enable_nonlinear_suppressor {
                y.copy_from_slice(&output.e);
                self.update_metrics();
                return;
            }
        } else {
            output.e.copy_from_slice(y);
            output.compute_metrics(y);
        }
        let e = output.e;

        // Spectra of the capture and the linear filter residual.
        let mut y_fft = FftData::default();
        let mut e_fft = FftData::default();
        windowed_padded_fft(&mut self.fft, y, &mut self.y_old, &mut y_fft);
        windowed_padded_fft(&mut self.fft, &e, &mut self.e_old, &mut e_fft);

        let mut s2_linear = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        linear_echo_power(&e_fft, &y_fft, &mut s2_linear);

        let mut y2 = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        let mut e2 = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        y_fft.spectrum(&mut y2);
        e_fft.spectrum(&mut e2);

        self.aec_state
            .update(render_buffer, &e2, &y2, &self.subtractor_output);

        let mut r2 = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        self.residual_echo_estimator
            .estimate(&self.aec_state, render_buffer, &s2_linear, &mut r2);

        let usable_linear_estimate = self.aec_state.usable_linear_estimate();
        if usable_linear_estimate {
            // The residual can never hold more power than the capture.
            for (e2_k, &y2_k) in e2.iter_mut().zip(&y2) {
                *e2_k = e2_k.min(y2_k);
            }
        }

        let nearend = if usable_linear_estimate { &e2 } else { &y2 };
        let mut g = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        self.suppression_gain.get_gain(nearend, &r2, &mut g);

        let suppression_input = if usable_linear_estimate {
            &e_fft
        } else {
            &y_fft
        };
        self.suppression_filter
            .apply_gain(&g, suppression_input, y);

        self.update_metrics();
    }

    fn update_metrics(&mut self) {
        let erle = self.aec_state.erle();
        self.metrics = EchoRemoverMetrics {
            e2: self.subtractor_output.e2,
            y2: self.subtractor_output.y2,
            erle_avg: erle.iter().sum::<f32>() / erle.len() as f32,
            linear_usable: self.aec_state.usable_linear_estimate(),
        };
    }
}
