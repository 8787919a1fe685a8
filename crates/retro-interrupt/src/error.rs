//! Interrupt scanner errors

use retro_core::CapabilityError;
use thiserror::Error;

pub type InterruptResult<T> = Result<T, InterruptError>;

#[derive(Debug, Error)]
pub enum InterruptError {
    #[error("Interrupt action failed: {0}")]
    Action(#[from] CapabilityError),

    #[error("Scanner stopped during interrupt actions")]
    Stopped,

    #[error("Failed to spawn scanner thread: {0}")]
    Spawn(#[from] std::io::Error),
}
