//! Panic guard macros for FFI boundary safety.
//!
//! Every `extern "C"` function must catch panics to prevent undefined
//! behaviour when unwinding crosses the FFI boundary.

/// Wrap an FFI function body, returning `$fallback` if it panics.
///
/// # Example
///
/// ```ignore
/// extern "C" fn aec3_get_thing(handle: *const Aec3Handle) -> c_int {
///     ffi_guard! { -1 =>
///         // ... body ...
///         0
///     }
/// }
/// ```
macro_rules! ffi_guard {
    ($fallback:expr => $($body:tt)*) => {{
        use std::panic;
        use std::panic::AssertUnwindSafe;

        match panic::catch_unwind(AssertUnwindSafe(move || { $($body)* })) {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("panic caught at the C API boundary");
                $fallback
            }
        }
    }};
}

/// Wrap an FFI function body that returns a pointer.
///
/// On panic the macro returns [`std::ptr::null_mut()`].
macro_rules! ffi_guard_ptr {
    ($($body:tt)*) => {
        $crate::ffi::panic_guard::ffi_guard! { std::ptr::null_mut() => $($body)* }
    };
}

pub(crate) use ffi_guard;
pub(crate) use ffi_guard_ptr;
