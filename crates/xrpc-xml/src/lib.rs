//! XML-RPC serialization/deserialization for xrpc.
//!
//! This crate is the codec between the [`xrpc_model::Value`] tree and the
//! XML-RPC wire format.
//!
//! # Key components
//!
//! - [`Serializer`] encodes method calls, responses and faults into complete XML
//!   documents with an iterative tree walk.
//! - [`Deserializer`] is an event-driven state machine fed by the [`Tokenizer`]
//!   (or any other source of [`XmlEvent`]s) that yields exactly one outcome.
//! - [`datetime`] converts between `dateTime.iso8601` text and timestamps.
//!
//! # Conventions
//!
//! - Tags are emitted in the standard mixed case (`methodCall`, `dateTime.iso8601`)
//!   and matched case-insensitively on input.
//! - Booleans: `1` / `0`.
//! - Binary payloads: standard base64.
//! - 64-bit integers travel as `<i8>` text and are never routed through `f64`.

pub mod datetime;
pub mod deserialize;
pub mod error;
pub mod serialize;
pub mod tokenizer;

pub use datetime::DateFormatter;
pub use deserialize::{
    Deserializer, Document, Envelope, ResponseKind, decode_call, decode_call_from_reader,
    decode_response, decode_response_from_reader,
};
pub use error::XmlRpcError;
pub use serialize::Serializer;
pub use tokenizer::{Tokenizer, XmlEvent};
