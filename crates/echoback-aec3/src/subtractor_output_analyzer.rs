//! Tracks whether the linear filter output indicates a converged filter.

use crate::common::BLOCK_SIZE;
use crate::subtractor_output::SubtractorOutput;

const CONVERGENCE_THRESHOLD: f32 = 50.0 * 50.0 * BLOCK_SIZE as f32;

/// Analyzes the subtractor output for convergence.
#[derive(Debug, Default)]
pub(crate) struct SubtractorOutputAnalyzer {
    filter_converged: bool,
}

impl SubtractorOutputAnalyzer {
    /// Analyzes the subtractor output and updates the convergence flag.
    pub(crate) fn update(&mut self, subtractor_output: &SubtractorOutput) {
        let y2 = subtractor_output.y2;
        let e2 = subtractor_output.e2;
        self.filter_converged = e2 < 0.5 * y2 && y2 > CONVERGENCE_THRESHOLD;
    }

    pub(crate) fn converged_filter(&self) -> bool {
        self.filter_converged
    }

    pub(crate) fn handle_echo_path_change(&mut self) {
        self.filter_converged = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(y2: f32, e2: f32) -> SubtractorOutput {
        SubtractorOutput {
            y2,
            e2,
            ..SubtractorOutput::default()
        }
    }

    #[test]
    fn initial_state_not_converged() {
        assert!(!SubtractorOutputAnalyzer::default().converged_filter());
    }

    #[test]
    fn convergence_detection() {
        let mut analyzer = SubtractorOutputAnalyzer::default();
        analyzer.update(&output(200_000.0, 10_000.0));
        assert!(analyzer.converged_filter());

        // Residual too large.
        analyzer.update(&output(200_000.0, 150_000.0));
        assert!(!analyzer.converged_filter());
    }

    #[test]
    fn low_level_capture_is_never_converged() {
        let mut analyzer = SubtractorOutputAnalyzer::default();
        analyzer.update(&output(CONVERGENCE_THRESHOLD, 0.0));
        assert!(!analyzer.converged_filter());
    }

    #[test]
    fn handle_echo_path_change_resets() {
        let mut analyzer = SubtractorOutputAnalyzer::default();
        analyzer.update(&output(200_000.0, 10_000.0));
        assert!(analyzer.converged_filter());

        analyzer.handle_echo_path_change();
        assert!(!analyzer.converged_filter());
    }
}
