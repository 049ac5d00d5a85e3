//! C-compatible FFI layer for the echo canceller.
//!
//! # Symbol prefix
//!
//! - Functions: `aec3_*`
//! - Types: `Aec3*`
//!
//! # Thread safety
//!
//! **NOT thread-safe.** All calls on the same [`Aec3Handle`](types::Aec3Handle)
//! must be serialized by the caller.

pub mod types;

pub mod functions;
mod panic_guard;
