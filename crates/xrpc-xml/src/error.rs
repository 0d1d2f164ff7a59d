//! Error types for XML-RPC encoding and decoding.

use std::io;

use xrpc_model::Fault;

/// Errors produced while encoding or decoding XML-RPC documents.
#[derive(Debug, thiserror::Error)]
pub enum XmlRpcError {
    /// An I/O error during XML writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An error from the underlying quick-xml tokenizer.
    #[error("XML processing error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    /// Text or tag names that could not be decoded or unescaped.
    #[error("failed to decode XML text: {0}")]
    Text(String),

    /// A scalar whose text does not match its declared type.
    #[error("malformed {kind} value: '{text}'")]
    MalformedValue {
        /// The XML-RPC type that failed to parse.
        kind: &'static str,
        /// The offending text.
        text: String,
    },

    /// The document is not a complete XML-RPC envelope.
    #[error("invalid message: {0}")]
    Structural(String),

    /// A well-formed envelope of the wrong kind for the requested decode.
    #[error("{0}")]
    ProtocolType(String),

    /// A well-formed application-level fault.
    #[error(transparent)]
    Fault(#[from] Fault),

    /// A failure reported by the byte stream feeding the tokenizer.
    #[error("transport error: {0}")]
    Transport(String),
}

impl XmlRpcError {
    /// Shorthand for [`XmlRpcError::MalformedValue`].
    pub fn malformed(kind: &'static str, text: impl Into<String>) -> Self {
        Self::MalformedValue {
            kind,
            text: text.into(),
        }
    }

    /// The fault carried by this error, if it is one.
    #[must_use]
    pub fn as_fault(&self) -> Option<&Fault> {
        match self {
            Self::Fault(f) => Some(f),
            _ => None,
        }
    }
}
