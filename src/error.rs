use thiserror::Error;

use crate::protocol::Quantity;

#[derive(Error, Debug)]
pub enum PsuError {
    /// Channel, value, slot or mode outside what the model accepts.
    /// Raised before anything is written to the port.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Read-back after a write did not reproduce the requested value
    #[error("Verification error: set {requested}{quantity}, but read {observed}{quantity}")]
    Mismatch {
        quantity: Quantity,
        requested: u32,
        observed: u32,
    },

    /// The device answered with something that could not be interpreted
    #[error("Verification error: {0}")]
    Verification(String),

    #[error("Communication error: {0}")]
    Communication(String),
}

impl PsuError {
    /// True for both flavours of failed write-verification
    pub fn is_verification(&self) -> bool {
        matches!(self, PsuError::Mismatch { .. } | PsuError::Verification(_))
    }
}

pub type PsuResult<T> = std::result::Result<T, PsuError>;
