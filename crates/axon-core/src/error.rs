//! Core protocol errors.

/// Errors produced while shaping or validating protocol messages.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Request params must be a JSON object (or absent) to carry `_meta`.
    #[error("request params must be a JSON object to carry metadata")]
    NonObjectParams,
    /// A message did not match its expected shape.
    #[error("invalid {what}: {detail}")]
    InvalidMessage { what: &'static str, detail: String },
}

/// Core result type.
pub type Result<T> = std::result::Result<T, ProtocolError>;
