//! C-compatible type definitions for the echo canceller C API.

use crate::EchoCanceller3;

/// Opaque handle to an echo canceller instance.
///
/// Created by `aec3_create()` and released by `aec3_destroy()`.
pub struct Aec3Handle {
    pub(crate) inner: EchoCanceller3,
}
