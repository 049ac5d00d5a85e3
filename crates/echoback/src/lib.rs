//! Acoustic echo cancellation for 16 kHz mono voice.
//!
//! Removes the echo of a far-end (playback) signal from a near-end
//! (microphone) signal, one 4 ms block of 64 samples at a time. The crate
//! wraps the `echoback-aec3` engine with length-checked f32 and i16 entry
//! points and exposes the same functionality through a C-compatible FFI.

pub mod audio_buffer;
mod echo_canceller3;
pub mod ffi;

pub use audio_buffer::AudioBuffer;
pub use echo_canceller3::{EchoCanceller3, EchoCancellerBuilder, Error, Metrics};
pub use echoback_aec3::{BLOCK_SIZE, EchoCanceller3Config, ProcessingModes, SAMPLE_RATE_HZ};
