//! XML-RPC data model for xrpc.
//!
//! This crate defines the shared vocabulary used by the XML codec and the HTTP
//! layer: the [`Value`] tagged union, the [`MethodCall`] / [`MethodResponse`]
//! envelopes, the conventional [`Fault`] shape, and the [`DateFormatOptions`]
//! that control how `dateTime.iso8601` values are rendered.
//!
//! The model carries no behavior of its own beyond construction, conversion and
//! inspection helpers. Encoding and decoding live in `xrpc-xml`.

mod custom;
mod envelope;
mod options;
mod value;

pub use custom::{CustomType, CustomValue};
pub use envelope::{Fault, MethodCall, MethodResponse};
pub use options::DateFormatOptions;
pub use value::{InvalidBigInteger, Value};
