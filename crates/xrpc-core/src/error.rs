//! Error types for the xrpc core.

/// Core error type for xrpc infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum XrpcError {
    /// A configuration value could not be interpreted.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience result type for xrpc operations.
pub type XrpcResult<T> = Result<T, XrpcError>;
