//! aria-core: Shared types for the Aria DSP engine
//!
//! This crate provides the foundational types used across all Aria crates:
//! audio buffers, the per-call DSP context, parameter maps, and errors.
//! Everything crossing the engine boundary is JSON-safe.

mod buffer;
mod context;
mod error;
mod params;
mod sample;

pub use buffer::*;
pub use context::*;
pub use error::*;
pub use params::*;
pub use sample::*;

/// Default sample rate used when a processor is constructed before its
/// first `process()`/`render()` call supplies the real one.
pub const DEFAULT_SAMPLE_RATE: f64 = 48000.0;
