//! Deterministic pseudo-random signals for tests.

/// Simple LCG (Musl constants) so signals are reproducible across runs.
pub(crate) struct TestRandom {
    state: u32,
}

impl TestRandom {
    pub(crate) fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub(crate) fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1_103_515_245).wrapping_add(12345);
        self.state
    }

    /// Uniform in `[-32767, 32767]`.
    pub(crate) fn next_f32(&mut self) -> f32 {
        let val = self.next_u32();
        ((val % 65535) as i32 - 32767) as f32
    }

    /// Fills `buf` with uniform values scaled to `[-amplitude, amplitude]`.
    pub(crate) fn fill_scaled(&mut self, buf: &mut [f32], amplitude: f32) {
        for v in buf.iter_mut() {
            *v = self.next_f32() * (amplitude / 32767.0);
        }
    }

    pub(crate) fn fill(&mut self, buf: &mut [f32]) {
        self.fill_scaled(buf, 32767.0);
    }
}

/// Render history that can be read back with an arbitrary sample delay.
pub(crate) struct DelayLine {
    samples: Vec<f32>,
}

impl DelayLine {
    pub(crate) fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, block: &[f32]) {
        self.samples.extend_from_slice(block);
    }

    /// Returns the latest `out.len()` samples as they were `delay` samples
    /// ago, zero before the start of the history.
    pub(crate) fn read_delayed(&self, delay: usize, out: &mut [f32]) {
        let end = self.samples.len() as isize - delay as isize;
        let start = end - out.len() as isize;
        for (i, o) in out.iter_mut().enumerate() {
            let idx = start + i as isize;
            *o = if idx >= 0 {
                self.samples[idx as usize]
            } else {
                0.0
            };
        }
    }
}
