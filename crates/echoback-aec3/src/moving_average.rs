//! Running average over the most recent spectra.

/// Averages each input with the `mem_len - 1` inputs that preceded it.
#[derive(Debug)]
pub(crate) struct MovingAverage<const N: usize> {
    scaling: f32,
    memory: Vec<[f32; N]>,
    mem_index: usize,
}

impl<const N: usize> MovingAverage<N> {
    pub(crate) fn new(mem_len: usize) -> Self {
        debug_assert!(mem_len > 0);
        Self {
            scaling: 1.0 / mem_len as f32,
            memory: vec![[0.0; N]; mem_len - 1],
            mem_index: 0,
        }
    }

    /// Writes the average of `input` and the stored history to `output`,
    /// then remembers `input` in place of the oldest entry.
    pub(crate) fn average(&mut self, input: &[f32; N], output: &mut [f32; N]) {
        output.copy_from_slice(input);
        for past in &self.memory {
            for (o, &m) in output.iter_mut().zip(past) {
                *o += m;
            }
        }
        for o in output.iter_mut() {
            *o *= self.scaling;
        }

        if !self.memory.is_empty() {
            self.memory[self.mem_index] = *input;
            self.mem_index = (self.mem_index + 1) % self.memory.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_with_memory() {
        let e = 1e-6;
        let mut ma = MovingAverage::<4>::new(3);

        let data = [
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 1.0, 9.0, 7.0],
            [3.0, 3.0, 5.0, 6.0],
            [8.0, 4.0, 2.0, 1.0],
        ];
        let mut output = [0.0f32; 4];

        // Missing history counts as zeros.
        ma.average(&data[0], &mut output);
        for i in 0..4 {
            assert!((output[i] - data[0][i] / 3.0).abs() < e);
        }

        ma.average(&data[1], &mut output);
        ma.average(&data[2], &mut output);
        for i in 0..4 {
            let expected = (data[0][i] + data[1][i] + data[2][i]) / 3.0;
            assert!((output[i] - expected).abs() < e);
        }

        // The oldest input drops out.
        ma.average(&data[3], &mut output);
        for i in 0..4 {
            let expected = (data[1][i] + data[2][i] + data[3][i]) / 3.0;
            assert!((output[i] - expected).abs() < e);
        }
    }

    #[test]
    fn single_entry_memory_is_pass_through() {
        let mut ma = MovingAverage::<4>::new(1);
        let mut output = [0.0f32; 4];
        for input in [[1.0, 2.0, 3.0, 4.0], [5.0, 1.0, 9.0, 7.0]] {
            ma.average(&input, &mut output);
            assert_eq!(output, input);
        }
    }
}
