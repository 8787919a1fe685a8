//! Errors reported by capability implementations

use thiserror::Error;

/// Result type for capability calls
pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// Errors raised by vision, OCR and input backends
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("unknown asset: {0}")]
    UnknownAsset(String),

    #[error("screen capture failed: {0}")]
    Capture(String),

    #[error("text recognition failed: {0}")]
    Ocr(String),

    #[error("input device error: {0}")]
    Device(String),

    #[error("capability not available: {0}")]
    Unavailable(&'static str),
}
