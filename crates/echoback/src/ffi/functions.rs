//! Exported `extern "C"` functions for the echo canceller C API.
//!
//! Every sample pointer must reference exactly 64 `int16_t` values.

use std::ffi::c_int;

use echoback_aec3::BLOCK_SIZE;

use crate::EchoCanceller3;

use super::panic_guard::{ffi_guard, ffi_guard_ptr};
use super::types::Aec3Handle;

// ─── Lifecycle ───────────────────────────────────────────────────────

/// Creates a new echo canceller with the default configuration and both
/// processing stages enabled.
///
/// Returns `NULL` on internal error. The caller owns the returned pointer
/// and must free it with [`aec3_destroy()`].
#[unsafe(no_mangle)]
pub extern "C" fn aec3_create() -> *mut Aec3Handle {
    ffi_guard_ptr! {
        let boxed = Box::new(Aec3Handle {
            inner: EchoCanceller3::new(),
        });
        Box::into_raw(boxed)
    }
}

/// Destroys an echo canceller and frees its memory.
///
/// Passing `NULL` is a safe no-op. After this call the pointer is invalid.
#[unsafe(no_mangle)]
pub extern "C" fn aec3_destroy(handle: *mut Aec3Handle) {
    if !handle.is_null() {
        // Safety: we created this pointer via Box::into_raw in aec3_create,
        // and the caller guarantees single ownership.
        let _ = unsafe { Box::from_raw(handle) };
    }
}

// ─── Configuration ───────────────────────────────────────────────────

/// Enables (non-zero) or disables (zero) the linear filter and the
/// nonlinear suppressor. Disabling both passes the capture through.
#[unsafe(no_mangle)]
pub extern "C" fn aec3_set_modes(handle: *mut Aec3Handle, linear: c_int, nonlinear: c_int) {
    ffi_guard! { () =>
        if handle.is_null() {
            return;
        }
        // Safety: the caller guarantees the pointer is valid and not aliased.
        let handle = unsafe { &mut *handle };
        handle.inner.set_processing_modes(linear != 0, nonlinear != 0);
    }
}

// ─── Processing ──────────────────────────────────────────────────────

/// Queues one block of far-end (playback) audio.
#[unsafe(no_mangle)]
pub extern "C" fn aec3_analyze(handle: *mut Aec3Handle, ref64: *const i16) {
    ffi_guard! { () =>
        if handle.is_null() || ref64.is_null() {
            return;
        }
        // Safety: the caller guarantees the pointers are valid and that
        // `ref64` holds BLOCK_SIZE samples.
        let handle = unsafe { &mut *handle };
        let render = unsafe { std::slice::from_raw_parts(ref64, BLOCK_SIZE) };
        if let Err(err) = handle.inner.analyze_render_i16(render) {
            tracing::error!(%err, "aec3_analyze failed");
        }
    }
}

/// Removes the echo from one block of near-end (microphone) audio.
///
/// `cap64` and `out64` may point to the same buffer.
#[unsafe(no_mangle)]
pub extern "C" fn aec3_process(handle: *mut Aec3Handle, cap64: *const i16, out64: *mut i16) {
    ffi_guard! { () =>
        if handle.is_null() || cap64.is_null() || out64.is_null() {
            return;
        }
        // Safety: the caller guarantees the pointers are valid and that each
        // buffer holds BLOCK_SIZE samples. The capture is copied before the
        // output is borrowed, so the buffers may alias.
        let handle = unsafe { &mut *handle };
        let mut capture = [0i16; BLOCK_SIZE];
        capture.copy_from_slice(unsafe { std::slice::from_raw_parts(cap64, BLOCK_SIZE) });
        let output = unsafe { std::slice::from_raw_parts_mut(out64, BLOCK_SIZE) };
        if let Err(err) = handle.inner.process_capture_i16(&capture, output) {
            tracing::error!(%err, "aec3_process failed");
        }
    }
}

// ─── Diagnostics ─────────────────────────────────────────────────────

/// Returns the estimated render-to-capture delay in blocks, or -1 if no
/// estimate is available or `handle` is null.
#[unsafe(no_mangle)]
pub extern "C" fn aec3_get_estimated_delay_blocks(handle: *const Aec3Handle) -> c_int {
    ffi_guard! { -1 =>
        if handle.is_null() {
            return -1;
        }
        // Safety: the caller guarantees the pointer is valid.
        let handle = unsafe { &*handle };
        handle
            .inner
            .estimated_delay_blocks()
            .and_then(|d| c_int::try_from(d).ok())
            .unwrap_or(-1)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn create_and_destroy() {
        let handle = aec3_create();
        assert!(!handle.is_null());
        assert_eq!(aec3_get_estimated_delay_blocks(handle), -1);
        aec3_destroy(handle);
    }

    #[test]
    fn null_handles_are_safe() {
        let samples = [0i16; BLOCK_SIZE];
        let mut output = [7i16; BLOCK_SIZE];
        aec3_destroy(ptr::null_mut());
        aec3_set_modes(ptr::null_mut(), 1, 1);
        aec3_analyze(ptr::null_mut(), samples.as_ptr());
        aec3_process(ptr::null_mut(), samples.as_ptr(), output.as_mut_ptr());
        assert_eq!(aec3_get_estimated_delay_blocks(ptr::null()), -1);
        assert_eq!(output, [7i16; BLOCK_SIZE]);
    }

    #[test]
    fn null_sample_pointers_are_ignored() {
        let handle = aec3_create();
        let mut output = [7i16; BLOCK_SIZE];
        aec3_analyze(handle, ptr::null());
        aec3_process(handle, ptr::null(), output.as_mut_ptr());
        aec3_process(handle, output.as_ptr(), ptr::null_mut());
        assert_eq!(output, [7i16; BLOCK_SIZE]);
        aec3_destroy(handle);
    }

    #[test]
    fn disabled_modes_pass_through_in_place() {
        let handle = aec3_create();
        aec3_set_modes(handle, 0, 0);

        let mut state = 1u32;
        for _ in 0..50 {
            let mut block = [0i16; BLOCK_SIZE];
            for v in &mut block {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                *v = (state >> 16) as i16;
            }
            let original = block;
            aec3_analyze(handle, block.as_ptr());
            aec3_process(handle, block.as_ptr(), block.as_mut_ptr());
            assert_eq!(block, original);
        }
        aec3_destroy(handle);
    }

    #[test]
    fn silence_is_processed() {
        let handle = aec3_create();
        let silence = [0i16; BLOCK_SIZE];
        let mut output = [1i16; BLOCK_SIZE];
        for _ in 0..100 {
            aec3_analyze(handle, silence.as_ptr());
            aec3_process(handle, silence.as_ptr(), output.as_mut_ptr());
        }
        assert_eq!(output, silence);
        assert_eq!(aec3_get_estimated_delay_blocks(handle), -1);
        aec3_destroy(handle);
    }
}
