//! Staging buffer between the PCM interfaces and the engine's blocks.
//!
//! Samples are kept in the FloatS16 domain: f32 values spanning the i16
//! range, so i16 input converts by a plain cast.

use echoback_aec3::{BLOCK_SIZE, Block};

/// Converts a single S16 sample to FloatS16.
#[inline]
pub fn s16_to_float_s16(v: i16) -> f32 {
    f32::from(v)
}

/// Converts a single FloatS16 sample to S16, rounding half away from zero.
#[inline]
pub fn float_s16_to_s16(v: f32) -> i16 {
    let v = v.clamp(-32768.0, 32767.0);
    (v + f32::copysign(0.5, v)) as i16
}

/// One block of FloatS16 audio.
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer {
    data: Block,
}

impl AudioBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy_from_float(&mut self, samples: &[f32; BLOCK_SIZE]) {
        self.data.view_mut().copy_from_slice(samples);
    }

    pub fn copy_to_float(&self, samples: &mut [f32; BLOCK_SIZE]) {
        samples.copy_from_slice(self.data.view());
    }

    pub fn copy_from_i16(&mut self, samples: &[i16; BLOCK_SIZE]) {
        for (dst, &src) in self.data.view_mut().iter_mut().zip(samples) {
            *dst = s16_to_float_s16(src);
        }
    }

    pub fn copy_to_i16(&self, samples: &mut [i16; BLOCK_SIZE]) {
        for (dst, &src) in samples.iter_mut().zip(self.data.view()) {
            *dst = float_s16_to_s16(src);
        }
    }

    pub fn block(&self) -> &Block {
        &self.data
    }

    pub fn block_mut(&mut self) -> &mut Block {
        &mut self.data
    }
}
