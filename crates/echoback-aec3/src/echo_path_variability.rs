//! Signal raised when the render/capture alignment changes.

/// Type of delay adjustment that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DelayAdjustment {
    None,
    /// The render buffer overran and was re-aligned to the default delay.
    BufferFlush,
    /// The delay estimator produced a new alignment.
    NewDetectedDelay,
}

/// Tracks changes in the echo path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EchoPathVariability {
    pub delay_change: DelayAdjustment,
}

impl EchoPathVariability {
    pub(crate) fn new(delay_change: DelayAdjustment) -> Self {
        Self { delay_change }
    }

    pub(crate) fn delay_changed(&self) -> bool {
        self.delay_change != DelayAdjustment::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_changed_for_every_adjustment_but_none() {
        assert!(!EchoPathVariability::new(DelayAdjustment::None).delay_changed());
        assert!(EchoPathVariability::new(DelayAdjustment::BufferFlush).delay_changed());
        assert!(EchoPathVariability::new(DelayAdjustment::NewDetectedDelay).delay_changed());
    }
}
