//! 4:1 block-average decimation of render and capture blocks.

use crate::common::{BLOCK_SIZE, DOWN_SAMPLING_FACTOR, SUB_BLOCK_SIZE};

/// Downsamples a 64-sample block to 16 samples by averaging each group of
/// four consecutive samples.
pub(crate) fn decimate_by_4(input: &[f32; BLOCK_SIZE], output: &mut [f32; SUB_BLOCK_SIZE]) {
    const SCALE: f32 = 1.0 / DOWN_SAMPLING_FACTOR as f32;
    for (out, group) in output
        .iter_mut()
        .zip(input.chunks_exact(DOWN_SAMPLING_FACTOR))
    {
        *out = group.iter().sum::<f32>() * SCALE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_groups_of_four() {
        let input: [f32; BLOCK_SIZE] = std::array::from_fn(|k| k as f32);
        let mut output = [0.0f32; SUB_BLOCK_SIZE];
        decimate_by_4(&input, &mut output);
        for (j, &v) in output.iter().enumerate() {
            let expected = (4 * j) as f32 + 1.5;
            assert!((v - expected).abs() < 1e-6, "sample {j}: {v} != {expected}");
        }
    }

    #[test]
    fn alternating_signal_cancels() {
        let input: [f32; BLOCK_SIZE] =
            std::array::from_fn(|k| if k % 2 == 0 { 1000.0 } else { -1000.0 });
        let mut output = [1.0f32; SUB_BLOCK_SIZE];
        decimate_by_4(&input, &mut output);
        assert!(output.iter().all(|&v| v == 0.0));
    }
}
