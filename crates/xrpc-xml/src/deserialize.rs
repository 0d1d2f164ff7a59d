//! XML-RPC deserialization: an event-driven state machine over [`XmlEvent`]s.
//!
//! Nesting is tracked with a flat value stack plus a stack of marks (the
//! value-stack length at each open `<array>` / `<struct>`), so arbitrarily
//! deep documents never grow the call stack.

use std::collections::BTreeMap;
use std::io::BufRead;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::FixedOffset;
use xrpc_model::{Fault, MethodCall, Value};

use crate::datetime;
use crate::error::XmlRpcError;
use crate::tokenizer::{Tokenizer, XmlEvent};

/// The root element a document turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// `<methodCall>`.
    Call,
    /// `<methodResponse>`.
    Response,
}

/// Which half of a `<methodResponse>` was seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// `<params>`.
    Params,
    /// `<fault>`.
    Fault,
}

/// A fully parsed, non-fault document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// The root element.
    pub envelope: Envelope,
    /// Set for responses that carried `<params>`.
    pub response_kind: Option<ResponseKind>,
    /// The `<methodName>` text, when present.
    pub method_name: Option<String>,
    /// Top-level values in document order.
    pub values: Vec<Value>,
}

impl Document {
    /// Interpret the document as a method call.
    pub fn into_call(self) -> Result<MethodCall, XmlRpcError> {
        if self.envelope != Envelope::Call {
            return Err(XmlRpcError::ProtocolType("not a method call".to_owned()));
        }
        match self.method_name {
            Some(name) if !name.is_empty() => Ok(MethodCall::with_params(name, self.values)),
            _ => Err(XmlRpcError::ProtocolType("missing method name".to_owned())),
        }
    }

    /// Interpret the document as a successful method response.
    pub fn into_response(mut self) -> Result<Value, XmlRpcError> {
        if self.values.len() > 1 {
            return Err(XmlRpcError::ProtocolType("more than one param".to_owned()));
        }
        if self.envelope != Envelope::Response {
            return Err(XmlRpcError::ProtocolType("not a method response".to_owned()));
        }
        if self.response_kind.is_none() {
            return Err(XmlRpcError::ProtocolType(
                "invalid method response".to_owned(),
            ));
        }
        Ok(self.values.pop().unwrap_or_default())
    }
}

/// Single-use XML-RPC decoder.
///
/// Feed it events with [`Deserializer::feed`] and collect the result with
/// [`Deserializer::outcome`]. The first error or the end of the document
/// settles the outcome; later events are ignored.
#[derive(Debug)]
pub struct Deserializer {
    values: Vec<Value>,
    marks: Vec<usize>,
    text: String,
    envelope: Option<Envelope>,
    response_kind: Option<ResponseKind>,
    method_name: Option<String>,
    bare_value: bool,
    fallback_offset: FixedOffset,
    outcome: Option<Result<Document, XmlRpcError>>,
}

impl Default for Deserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer {
    /// Create a decoder that assumes the machine's current offset for
    /// timestamps written without one.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            marks: Vec::new(),
            text: String::new(),
            envelope: None,
            response_kind: None,
            method_name: None,
            bare_value: false,
            fallback_offset: datetime::current_local_offset(),
            outcome: None,
        }
    }

    /// Use `offset` for timestamps written without a zone.
    #[must_use]
    pub fn with_fallback_offset(mut self, offset: FixedOffset) -> Self {
        self.fallback_offset = offset;
        self
    }

    /// Whether the outcome is settled.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.outcome.is_some()
    }

    /// Process one event.
    pub fn feed(&mut self, event: XmlEvent) {
        if self.outcome.is_some() {
            return;
        }
        let step = match event {
            XmlEvent::Open(tag) => {
                self.open(&tag);
                Ok(())
            }
            XmlEvent::Close(tag) => self.close(&tag),
            XmlEvent::Text(chunk) | XmlEvent::CData(chunk) => {
                self.text.push_str(&chunk);
                Ok(())
            }
            XmlEvent::End => {
                let done = self.end();
                self.outcome = Some(done);
                return;
            }
            XmlEvent::Error(e) => Err(e),
        };
        if let Err(e) = step {
            self.outcome = Some(Err(e));
        }
    }

    /// Take the outcome, ending the document first if no terminal event arrived.
    pub fn outcome(mut self) -> Result<Document, XmlRpcError> {
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => self.end(),
        }
    }

    /// Drain `source` through the tokenizer and return the outcome.
    pub fn run<R: BufRead>(mut self, source: R) -> Result<Document, XmlRpcError> {
        for event in Tokenizer::from_reader(source) {
            self.feed(event);
            if self.is_done() {
                break;
            }
        }
        self.outcome()
    }

    /// Decode a `<methodCall>` from `source`.
    pub fn decode_call<R: BufRead>(self, source: R) -> Result<MethodCall, XmlRpcError> {
        self.run(source)?.into_call()
    }

    /// Decode a `<methodResponse>` from `source`. A fault becomes
    /// [`XmlRpcError::Fault`].
    pub fn decode_response<R: BufRead>(self, source: R) -> Result<Value, XmlRpcError> {
        self.run(source)?.into_response()
    }

    fn open(&mut self, tag: &str) {
        if tag == "ARRAY" || tag == "STRUCT" {
            self.marks.push(self.values.len());
        }
        self.text.clear();
        self.bare_value = tag == "VALUE";
    }

    fn close(&mut self, tag: &str) -> Result<(), XmlRpcError> {
        let text = std::mem::take(&mut self.text);
        match tag {
            "BOOLEAN" => {
                let b = match text.as_str() {
                    "1" => true,
                    "0" => false,
                    _ => return Err(XmlRpcError::malformed("boolean", text)),
                };
                self.values.push(Value::Boolean(b));
            }
            "INT" | "I4" => {
                let i = text
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| XmlRpcError::malformed("int", text.clone()))?;
                self.values.push(Value::Integer(i));
            }
            "I8" => {
                let v = Value::big_integer(text.trim())
                    .map_err(|_| XmlRpcError::malformed("i8", text.clone()))?;
                self.values.push(v);
            }
            "DOUBLE" => {
                let d = text
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|d| d.is_finite())
                    .ok_or_else(|| XmlRpcError::malformed("double", text.clone()))?;
                self.values.push(Value::Double(d));
            }
            "STRING" | "NAME" => self.values.push(Value::String(text)),
            "BASE64" => {
                let compact: String = text
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                let bytes = STANDARD
                    .decode(compact)
                    .map_err(|_| XmlRpcError::malformed("base64", text.clone()))?;
                self.values.push(Value::Bytes(bytes));
            }
            "DATETIME.ISO8601" => {
                let dt = datetime::decode_with_offset(&text, self.fallback_offset)?;
                self.values.push(Value::DateTime(dt));
            }
            "NIL" => self.values.push(Value::Nil),
            "VALUE" => {
                if self.bare_value {
                    self.values.push(Value::String(text));
                }
                self.bare_value = false;
            }
            "ARRAY" => {
                let mark = self.pop_mark(tag)?;
                let items = self.values.split_off(mark);
                self.values.push(Value::Array(items));
            }
            "STRUCT" => {
                let mark = self.pop_mark(tag)?;
                let mut flat = self.values.split_off(mark).into_iter();
                let mut members = BTreeMap::new();
                while let Some(key) = flat.next() {
                    members.insert(key.into_key(), flat.next().unwrap_or_default());
                }
                self.values.push(Value::Struct(members));
            }
            "PARAMS" => self.response_kind = Some(ResponseKind::Params),
            "FAULT" => self.response_kind = Some(ResponseKind::Fault),
            "METHODRESPONSE" => self.envelope = Some(Envelope::Response),
            "METHODCALL" => self.envelope = Some(Envelope::Call),
            "METHODNAME" => self.method_name = Some(text),
            "DATA" | "PARAM" | "MEMBER" => {}
            other => tracing::debug!(tag = other, "ignoring unknown XML-RPC element"),
        }
        Ok(())
    }

    fn pop_mark(&mut self, tag: &str) -> Result<usize, XmlRpcError> {
        self.marks
            .pop()
            .filter(|m| *m <= self.values.len())
            .ok_or_else(|| XmlRpcError::Structural(format!("unbalanced </{tag}>")))
    }

    fn end(&mut self) -> Result<Document, XmlRpcError> {
        let Some(envelope) = self.envelope else {
            return Err(XmlRpcError::Structural("no envelope".to_owned()));
        };
        if !self.marks.is_empty() {
            return Err(XmlRpcError::Structural(
                "unterminated array or struct".to_owned(),
            ));
        }
        let values = std::mem::take(&mut self.values);
        if self.response_kind == Some(ResponseKind::Fault) {
            let fault = Fault::from_value(values.first().unwrap_or(&Value::Nil));
            return Err(XmlRpcError::Fault(fault));
        }
        Ok(Document {
            envelope,
            response_kind: self.response_kind,
            method_name: self.method_name.take(),
            values,
        })
    }
}

/// Decode a `<methodCall>` document.
pub fn decode_call(xml: &[u8]) -> Result<MethodCall, XmlRpcError> {
    Deserializer::new().decode_call(xml)
}

/// Decode a `<methodResponse>` document. A fault becomes [`XmlRpcError::Fault`].
pub fn decode_response(xml: &[u8]) -> Result<Value, XmlRpcError> {
    Deserializer::new().decode_response(xml)
}

/// Decode a `<methodCall>` read incrementally from `source`.
pub fn decode_call_from_reader<R: BufRead>(source: R) -> Result<MethodCall, XmlRpcError> {
    Deserializer::new().decode_call(source)
}

/// Decode a `<methodResponse>` read incrementally from `source`.
pub fn decode_response_from_reader<R: BufRead>(source: R) -> Result<Value, XmlRpcError> {
    Deserializer::new().decode_response(source)
}
