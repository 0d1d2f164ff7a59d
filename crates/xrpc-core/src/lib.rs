//! Core configuration and error types for xrpc.
//!
//! This crate holds the pieces shared by the HTTP transport and the server
//! binary: environment-driven configuration and the infrastructure error type.

mod config;
mod error;

pub use config::XrpcConfig;
pub use error::{XrpcError, XrpcResult};
