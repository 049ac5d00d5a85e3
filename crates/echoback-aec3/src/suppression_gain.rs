//! Suppression gain: computes the frequency-domain gain that masks the
//! residual echo.

use crate::common::{FFT_LENGTH_BY_2, FFT_LENGTH_BY_2_MINUS_1, FFT_LENGTH_BY_2_PLUS_1};
use crate::config::{EchoAudibility, EchoCanceller3Config, Suppressor, Tuning};
use crate::moving_average::MovingAverage;

/// First bin above 2 kHz; gains above it may not exceed its gain.
const FIRST_BAND_TO_LIMIT: usize = (64 * 2000) / 8000;

/// Limits the low frequency gains to avoid the impact of the high-pass filter
/// on the lower-frequency gain influencing the overall achieved gain.
fn limit_low_frequency_gains(gain: &mut [f32; FFT_LENGTH_BY_2_PLUS_1]) {
    gain[0] = gain[1].min(gain[2]);
    gain[1] = gain[0];
}

/// Limits the high frequency gains to avoid echo leakage due to an imperfect
/// filter.
fn limit_high_frequency_gains(gain: &mut [f32; FFT_LENGTH_BY_2_PLUS_1]) {
    let min_upper_gain = gain[FIRST_BAND_TO_LIMIT];
    for g in &mut gain[FIRST_BAND_TO_LIMIT + 1..] {
        *g = g.min(min_upper_gain);
    }
    gain[FFT_LENGTH_BY_2] = gain[FFT_LENGTH_BY_2_MINUS_1];
}

fn weigh(
    threshold: f32,
    normalizer: f32,
    range: std::ops::Range<usize>,
    echo: &[f32; FFT_LENGTH_BY_2_PLUS_1],
    weighted_echo: &mut [f32; FFT_LENGTH_BY_2_PLUS_1],
) {
    for k in range {
        weighted_echo[k] = if echo[k] < threshold {
            let tmp = (threshold - echo[k]) * normalizer;
            echo[k] * (1.0 - tmp * tmp).max(0.0)
        } else {
            echo[k]
        };
    }
}

/// Scales the echo according to assessed audibility at the other end.
fn weight_echo_for_audibility(
    config: &EchoAudibility,
    echo: &[f32; FFT_LENGTH_BY_2_PLUS_1],
    weighted_echo: &mut [f32; FFT_LENGTH_BY_2_PLUS_1],
) {
    let bands = [
        (config.audibility_threshold_lf, 0..3),
        (config.audibility_threshold_mf, 3..7),
        (config.audibility_threshold_hf, 7..FFT_LENGTH_BY_2_PLUS_1),
    ];
    for (audibility_threshold, range) in bands {
        let threshold = config.floor_power * audibility_threshold;
        let normalizer = 1.0 / (threshold - config.floor_power);
        weigh(threshold, normalizer, range, echo, weighted_echo);
    }
}

/// Per-band masking thresholds computed from the tuning config.
#[derive(Debug)]
struct GainParameters {
    max_inc_factor: f32,
    max_dec_factor_lf: f32,
    enr_transparent: [f32; FFT_LENGTH_BY_2_PLUS_1],
    enr_suppress: [f32; FFT_LENGTH_BY_2_PLUS_1],
    emr_transparent: [f32; FFT_LENGTH_BY_2_PLUS_1],
}

impl GainParameters {
    fn new(last_lf_band: usize, first_hf_band: usize, tuning: &Tuning) -> Self {
        debug_assert!(last_lf_band < first_hf_band);

        let lf = &tuning.mask_lf;
        let hf = &tuning.mask_hf;
        let mut enr_transparent = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        let mut enr_suppress = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        let mut emr_transparent = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];

        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            let a = if k <= last_lf_band {
                0.0f32
            } else if k < first_hf_band {
                (k - last_lf_band) as f32 / (first_hf_band - last_lf_band) as f32
            } else {
                1.0f32
            };
            enr_transparent[k] = (1.0 - a) * lf.enr_transparent + a * hf.enr_transparent;
            enr_suppress[k] = (1.0 - a) * lf.enr_suppress + a * hf.enr_suppress;
            emr_transparent[k] = (1.0 - a) * lf.emr_transparent + a * hf.emr_transparent;
        }

        Self {
            max_inc_factor: tuning.max_inc_factor,
            max_dec_factor_lf: tuning.max_dec_factor_lf,
            enr_transparent,
            enr_suppress,
            emr_transparent,
        }
    }
}

/// Computes the frequency-domain suppression gain.
#[derive(derive_more::Debug)]
pub(crate) struct SuppressionGain {
    suppressor: Suppressor,
    echo_audibility: EchoAudibility,
    #[debug(skip)]
    last_gain: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    last_nearend: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    last_echo: [f32; FFT_LENGTH_BY_2_PLUS_1],
    nearend_smoother: MovingAverage<FFT_LENGTH_BY_2_PLUS_1>,
    #[debug(skip)]
    params: GainParameters,
}

impl SuppressionGain {
    pub(crate) fn new(config: &EchoCanceller3Config) -> Self {
        Self {
            suppressor: config.suppressor.clone(),
            echo_audibility: config.echo_audibility.clone(),
            last_gain: [1.0; FFT_LENGTH_BY_2_PLUS_1],
            last_nearend: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            last_echo: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            nearend_smoother: MovingAverage::new(config.suppressor.nearend_average_blocks),
            params: GainParameters::new(
                config.suppressor.last_lf_band,
                config.suppressor.first_hf_band,
                &config.suppressor.normal_tuning,
            ),
        }
    }

    /// Computes the amplitude gain for the lower band from the near-end and
    /// residual echo power spectra.
    pub(crate) fn get_gain(
        &mut self,
        nearend_spectrum: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        residual_echo_spectrum: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        low_band_gain: &mut [f32; FFT_LENGTH_BY_2_PLUS_1],
    ) {
        self.lower_band_gain(nearend_spectrum, residual_echo_spectrum, low_band_gain);
    }

    /// Computes the gain to reduce the echo to a non audible level.
    fn gain_to_no_audible_echo(
        &self,
        nearend: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        echo: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        gain: &mut [f32; FFT_LENGTH_BY_2_PLUS_1],
    ) {
        let p = &self.params;
        for k in 0..gain.len() {
            let enr = echo[k] / (nearend[k] + 1.0); // Echo-to-nearend ratio.
            let emr = echo[k]; // Echo-to-masker ratio, with no masker.
            let mut g = 1.0f32;
            if enr > p.enr_transparent[k] && emr > p.emr_transparent[k] {
                g = (p.enr_suppress[k] - enr) / (p.enr_suppress[k] - p.enr_transparent[k]);
                g = g.max(p.emr_transparent[k] / emr);
            }
            gain[k] = g;
        }
    }

    /// Compute the minimum gain as the attenuating gain to put the signal just
    /// above the zero sample values.
    fn get_min_gain(
        &self,
        weighted_residual_echo: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        min_gain: &mut [f32; FFT_LENGTH_BY_2_PLUS_1],
    ) {
        let min_echo_power = self.echo_audibility.normal_render_limit;
        for (g, &echo) in min_gain.iter_mut().zip(weighted_residual_echo) {
            *g = if echo > 0.0 {
                (min_echo_power / echo).min(1.0)
            } else {
                1.0
            };
        }

        // Make sure the gains of the low frequencies do not decrease too
        // quickly after strong nearend.
        let dec = self.params.max_dec_factor_lf;
        for k in 0..=self.suppressor.last_lf_smoothing_band {
            if self.last_nearend[k] > self.last_echo[k]
                || k <= self.suppressor.last_permanent_lf_smoothing_band
            {
                min_gain[k] = min_gain[k].max(self.last_gain[k] * dec).min(1.0);
            }
        }
    }

    /// Compute the maximum gain by limiting the gain increase from the previous
    /// gain.
    fn get_max_gain(&self, max_gain: &mut [f32; FFT_LENGTH_BY_2_PLUS_1]) {
        let inc = self.params.max_inc_factor;
        let floor = self.suppressor.floor_first_increase;
        for (g, &last) in max_gain.iter_mut().zip(&self.last_gain) {
            *g = (last * inc).max(floor).min(1.0);
        }
    }

    fn lower_band_gain(
        &mut self,
        suppressor_input: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        residual_echo: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        gain: &mut [f32; FFT_LENGTH_BY_2_PLUS_1],
    ) {
        gain.fill(1.0);
        let mut max_gain = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        self.get_max_gain(&mut max_gain);

        let mut nearend = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        self.nearend_smoother
            .average(suppressor_input, &mut nearend);

        // Weight echo power in terms of audibility.
        let mut weighted_residual_echo = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        weight_echo_for_audibility(
            &self.echo_audibility,
            residual_echo,
            &mut weighted_residual_echo,
        );

        let mut min_gain = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        self.get_min_gain(&weighted_residual_echo, &mut min_gain);

        let mut g = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
        self.gain_to_no_audible_echo(&nearend, &weighted_residual_echo, &mut g);

        // Clamp gains.
        for k in 0..gain.len() {
            g[k] = g[k].min(max_gain[k]).max(min_gain[k]);
            gain[k] = gain[k].min(g[k]);
        }

        // Store data required for the gain computation of the next block.
        self.last_nearend = nearend;
        self.last_echo = weighted_residual_echo;

        limit_low_frequency_gains(gain);
        limit_high_frequency_gains(gain);

        self.last_gain = *gain;

        // Transform gains to amplitude domain.
        for g in gain.iter_mut() {
            *g = g.max(0.0).sqrt();
        }
    }
}
