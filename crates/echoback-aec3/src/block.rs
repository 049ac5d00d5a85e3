//! One 4 ms block of mono audio.

use crate::common::BLOCK_SIZE;

/// Holds `BLOCK_SIZE` (64) samples of 16 kHz mono audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    data: [f32; BLOCK_SIZE],
}

impl Default for Block {
    fn default() -> Self {
        Self {
            data: [0.0; BLOCK_SIZE],
        }
    }
}

impl Block {
    pub fn new_with_value(value: f32) -> Self {
        Self {
            data: [value; BLOCK_SIZE],
        }
    }

    pub fn from_samples(samples: &[f32; BLOCK_SIZE]) -> Self {
        Self { data: *samples }
    }

    pub fn view(&self) -> &[f32; BLOCK_SIZE] {
        &self.data
    }

    pub fn view_mut(&mut self) -> &mut [f32; BLOCK_SIZE] {
        &mut self.data
    }

    /// Sum of squared samples.
    pub fn energy(&self) -> f32 {
        self.data.iter().map(|&v| v * v).sum()
    }
}
