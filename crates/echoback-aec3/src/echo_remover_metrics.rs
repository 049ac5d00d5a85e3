//! Per-block diagnostics of the echo remover.

/// Snapshot of the echo removal state after the most recent capture block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EchoRemoverMetrics {
    /// Residual energy of the linear filter output.
    pub e2: f32,
    /// Capture energy.
    pub y2: f32,
    /// Mean of the per-bin ERLE estimate, linear scale.
    pub erle_avg: f32,
    /// Whether the suppressor trusted the linear filter output.
    pub linear_usable: bool,
}

impl EchoRemoverMetrics {
    /// Mean ERLE in dB.
    pub fn erle_avg_db(&self) -> f32 {
        10.0 * self.erle_avg.max(1e-10).log10()
    }
}
