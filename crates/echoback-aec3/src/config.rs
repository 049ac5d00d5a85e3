//! Tunable parameters of the echo canceller.
//!
//! The block geometry (sample rate, block length, number of matched filters,
//! number of filter partitions) is fixed; everything that was empirically
//! tuned for that geometry lives here so it can be injected per instance.

use crate::common::NUM_BLOCKS_PER_SECOND;

/// Configuration for the echo canceller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EchoCanceller3Config {
    pub delay: Delay,
    pub filter: Filter,
    pub erle: Erle,
    pub render_levels: RenderLevels,
    pub echo_audibility: EchoAudibility,
    pub echo_model: EchoModel,
    pub suppressor: Suppressor,
}

impl EchoCanceller3Config {
    /// Validates and clamps config parameters to reasonable ranges.
    /// Returns `true` if no changes were needed.
    pub fn validate(&mut self) -> bool {
        let mut ok = true;

        ok &= limit_usize(&mut self.delay.default_delay, 0, 150);
        ok &= limit_usize(&mut self.delay.delay_headroom_samples, 0, 250);
        ok &= limit_f32(&mut self.delay.delay_estimate_smoothing, 0.0, 1.0);
        ok &= limit_f32(&mut self.delay.delay_candidate_detection_threshold, 0.0, 1.0);
        ok &= limit_f32(&mut self.delay.excitation_limit, 0.0, 32768.0);
        ok &= limit_usize(
            &mut self.delay.delay_selection_thresholds.initial,
            1,
            250,
        );
        ok &= limit_usize(
            &mut self.delay.delay_selection_thresholds.converged,
            1,
            250,
        );
        if self.delay.delay_selection_thresholds.initial
            > self.delay.delay_selection_thresholds.converged
        {
            self.delay.delay_selection_thresholds.initial =
                self.delay.delay_selection_thresholds.converged;
            ok = false;
        }
        ok &= limit_usize(&mut self.delay.stale_estimate_blocks, 1, 250 * 60);

        ok &= limit_f32(&mut self.filter.leakage_converged, 0.0, 1000.0);
        ok &= limit_f32(&mut self.filter.leakage_diverged, 0.0, 1000.0);
        ok &= limit_f32(&mut self.filter.error_floor, 0.0, 1000.0);
        ok &= limit_f32(&mut self.filter.error_ceil, 0.0, 100_000_000.0);
        ok &= limit_f32(&mut self.filter.noise_gate, 0.0, 100_000_000.0);
        if self.filter.error_floor > self.filter.error_ceil {
            self.filter.error_floor = self.filter.error_ceil;
            ok = false;
        }

        ok &= limit_f32(&mut self.erle.min, 1.0, 100_000.0);
        ok &= limit_f32(&mut self.erle.max, 1.0, 100_000.0);
        if self.erle.min > self.erle.max {
            self.erle.min = self.erle.max;
            ok = false;
        }
        ok &= limit_usize(&mut self.erle.startup_phase_blocks, 0, 250 * 60);

        ok &= limit_f32(&mut self.render_levels.active_render_limit, 0.0, 100.0);

        ok &= limit_f32(&mut self.echo_audibility.normal_render_limit, 0.0, 32768.0);
        ok &= limit_f32(&mut self.echo_audibility.floor_power, 0.0, 32768.0);
        ok &= limit_f32(&mut self.echo_audibility.audibility_threshold_lf, 1.0, 32768.0);
        ok &= limit_f32(&mut self.echo_audibility.audibility_threshold_mf, 1.0, 32768.0);
        ok &= limit_f32(&mut self.echo_audibility.audibility_threshold_hf, 1.0, 32768.0);

        ok &= limit_usize(&mut self.echo_model.noise_floor_hold, 0, 1000);
        ok &= limit_f32(&mut self.echo_model.min_noise_floor_power, 0.0, 2_000_000.0);
        ok &= limit_f32(&mut self.echo_model.stationary_gate_slope, 0.0, 1_000_000.0);
        ok &= limit_f32(&mut self.echo_model.noise_gate_power, 0.0, 1_000_000.0);
        ok &= limit_f32(&mut self.echo_model.noise_gate_slope, 0.0, 1_000_000.0);
        ok &= limit_usize(&mut self.echo_model.render_pre_window_size, 0, 100);
        ok &= limit_usize(&mut self.echo_model.render_post_window_size, 0, 100);

        ok &= limit_usize(&mut self.suppressor.nearend_average_blocks, 1, 5000);
        ok &= validate_tuning(&mut self.suppressor.normal_tuning);
        ok &= limit_usize(&mut self.suppressor.last_permanent_lf_smoothing_band, 0, 64);
        ok &= limit_usize(&mut self.suppressor.last_lf_smoothing_band, 0, 64);
        ok &= limit_usize(&mut self.suppressor.last_lf_band, 0, 63);
        ok &= limit_usize(
            &mut self.suppressor.first_hf_band,
            self.suppressor.last_lf_band + 1,
            64,
        );
        ok &= limit_f32(&mut self.suppressor.floor_first_increase, 0.0, 1_000_000.0);

        ok
    }
}

fn validate_tuning(t: &mut Tuning) -> bool {
    let mut ok = true;
    ok &= limit_f32(&mut t.mask_lf.enr_transparent, 0.0, 100.0);
    ok &= limit_f32(&mut t.mask_lf.enr_suppress, 0.0, 100.0);
    ok &= limit_f32(&mut t.mask_lf.emr_transparent, 0.0, 100.0);
    ok &= limit_f32(&mut t.mask_hf.enr_transparent, 0.0, 100.0);
    ok &= limit_f32(&mut t.mask_hf.enr_suppress, 0.0, 100.0);
    ok &= limit_f32(&mut t.mask_hf.emr_transparent, 0.0, 100.0);
    ok &= limit_f32(&mut t.max_inc_factor, 0.0, 100.0);
    ok &= limit_f32(&mut t.max_dec_factor_lf, 0.0, 100.0);
    ok
}

fn limit_f32(value: &mut f32, min: f32, max: f32) -> bool {
    let clamped = value.clamp(min, max);
    let clamped = if clamped.is_finite() { clamped } else { min };
    let unchanged = *value == clamped;
    *value = clamped;
    unchanged
}

fn limit_usize(value: &mut usize, min: usize, max: usize) -> bool {
    let clamped = (*value).clamp(min, max);
    let unchanged = *value == clamped;
    *value = clamped;
    unchanged
}

/// Histogram counts a lag must exceed before it is reported as the delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelaySelectionThresholds {
    /// Used until the first strong candidate has been seen.
    pub initial: usize,
    pub converged: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delay {
    /// Alignment, in blocks, applied whenever the render buffer is reset.
    pub default_delay: usize,
    /// Samples subtracted from the detected delay so the alignment errs
    /// towards a too short delay.
    pub delay_headroom_samples: usize,
    /// Smoothing factor of the matched filter error energy.
    pub delay_estimate_smoothing: f32,
    /// Fraction of the capture energy a matched filter error must fall below
    /// for its lag to count.
    pub delay_candidate_detection_threshold: f32,
    /// Render amplitude below which the matched filters are not adapted.
    pub excitation_limit: f32,
    pub delay_selection_thresholds: DelaySelectionThresholds,
    /// Number of consecutive identical estimates after which the delay
    /// estimator is considered stale and reset.
    pub stale_estimate_blocks: usize,
}

impl Default for Delay {
    fn default() -> Self {
        Self {
            default_delay: 10,
            delay_headroom_samples: 32,
            delay_estimate_smoothing: 0.7,
            delay_candidate_detection_threshold: 0.2,
            excitation_limit: 150.0,
            delay_selection_thresholds: DelaySelectionThresholds {
                initial: 5,
                converged: 20,
            },
            stale_estimate_blocks: NUM_BLOCKS_PER_SECOND / 2,
        }
    }
}

/// Adaptation parameters of the linear echo filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Error-power leakage while the filter output is trusted.
    pub leakage_converged: f32,
    pub leakage_diverged: f32,
    /// Bounds of the filter error power estimate.
    pub error_floor: f32,
    pub error_ceil: f32,
    /// Render power per bin below which the filter is not adapted.
    pub noise_gate: f32,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            leakage_converged: 0.00005,
            leakage_diverged: 0.05,
            error_floor: 0.001,
            error_ceil: 2.0,
            noise_gate: 20_075_344.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Erle {
    /// Lower and upper bounds of the per-bin ERLE.
    pub min: f32,
    pub max: f32,
    /// Blocks after a reset during which the estimate is frozen.
    pub startup_phase_blocks: usize,
}

impl Default for Erle {
    fn default() -> Self {
        Self {
            min: 1.0,
            max: 64.0,
            startup_phase_blocks: 2 * NUM_BLOCKS_PER_SECOND,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderLevels {
    /// RMS amplitude above which a render block counts as active.
    pub active_render_limit: f32,
}

impl Default for RenderLevels {
    fn default() -> Self {
        Self {
            active_render_limit: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EchoAudibility {
    /// Residual echo power that the minimum gain keeps the output at.
    pub normal_render_limit: f32,
    /// Echo power below which the echo is treated as inaudible.
    pub floor_power: f32,
    /// Multiples of `floor_power` above which echo is fully audible, for
    /// bins 0-2, 3-6 and 7 upwards.
    pub audibility_threshold_lf: f32,
    pub audibility_threshold_mf: f32,
    pub audibility_threshold_hf: f32,
}

impl Default for EchoAudibility {
    fn default() -> Self {
        Self {
            normal_render_limit: 64.0,
            floor_power: 2.0 * 64.0,
            audibility_threshold_lf: 10.0,
            audibility_threshold_mf: 10.0,
            audibility_threshold_hf: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EchoModel {
    /// Blocks the render noise floor is held before it may rise.
    pub noise_floor_hold: usize,
    pub min_noise_floor_power: f32,
    /// Multiple of the render noise floor removed from the echo estimate.
    pub stationary_gate_slope: f32,
    /// Render power below which bins are pulled towards zero.
    pub noise_gate_power: f32,
    pub noise_gate_slope: f32,
    /// Blocks before and after the filter delay searched for the peak
    /// render power.
    pub render_pre_window_size: usize,
    pub render_post_window_size: usize,
}

impl Default for EchoModel {
    fn default() -> Self {
        Self {
            noise_floor_hold: 50,
            min_noise_floor_power: 1_638_400.0,
            stationary_gate_slope: 10.0,
            noise_gate_power: 27509.42,
            noise_gate_slope: 0.3,
            render_pre_window_size: 1,
            render_post_window_size: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaskingThresholds {
    /// Echo-to-nearend ratio below which no suppression is applied.
    pub enr_transparent: f32,
    /// Echo-to-nearend ratio at which the gain reaches zero.
    pub enr_suppress: f32,
    /// Echo power below which no suppression is applied.
    pub emr_transparent: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tuning {
    pub mask_lf: MaskingThresholds,
    pub mask_hf: MaskingThresholds,
    /// Largest per-block gain increase factor.
    pub max_inc_factor: f32,
    /// Smallest per-block gain decrease factor in the smoothed low bins.
    pub max_dec_factor_lf: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Suppressor {
    /// Blocks the near-end spectrum is averaged over.
    pub nearend_average_blocks: usize,
    pub normal_tuning: Tuning,
    /// Bins up to this one always limit the gain decrease.
    pub last_permanent_lf_smoothing_band: usize,
    /// Bins up to this one limit the gain decrease after near-end
    /// dominated the previous block.
    pub last_lf_smoothing_band: usize,
    /// The masking thresholds blend from `mask_lf` at `last_lf_band` to
    /// `mask_hf` at `first_hf_band`.
    pub last_lf_band: usize,
    pub first_hf_band: usize,
    /// Gain a bin may always rise to, whatever its previous gain.
    pub floor_first_increase: f32,
}

impl Default for Suppressor {
    fn default() -> Self {
        Self {
            nearend_average_blocks: 4,
            normal_tuning: Tuning {
                mask_lf: MaskingThresholds {
                    enr_transparent: 0.3,
                    enr_suppress: 0.4,
                    emr_transparent: 0.3,
                },
                mask_hf: MaskingThresholds {
                    enr_transparent: 0.07,
                    enr_suppress: 0.1,
                    emr_transparent: 0.3,
                },
                max_inc_factor: 2.0,
                max_dec_factor_lf: 0.25,
            },
            last_permanent_lf_smoothing_band: 0,
            last_lf_smoothing_band: 5,
            last_lf_band: 5,
            first_hf_band: 8,
            floor_first_increase: 0.00001,
        }
    }
}
