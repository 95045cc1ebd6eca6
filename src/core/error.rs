use thiserror::Error;

#[derive(Error, Debug)]
pub enum OdmError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Path conflict: {0}")]
    PathConflict(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Index {index} out of bounds for sequence of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, OdmError>;

impl OdmError {
    /// Returns true for caller-usage errors that retrying cannot fix.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }
}

impl<T> From<std::sync::PoisonError<T>> for OdmError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
