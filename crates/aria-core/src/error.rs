//! Error types for the Aria DSP engine

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum AriaError {
    #[error("buffer shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("DSP error: {0}")]
    Dsp(String),
}

/// Result type alias
pub type AriaResult<T> = Result<T, AriaError>;
