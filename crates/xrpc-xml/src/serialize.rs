//! XML-RPC serialization: converting values and envelopes to XML documents.
//!
//! Values are written with an explicit stack of frames rather than recursion,
//! so nesting depth is bounded by memory instead of the call stack.

use std::collections::btree_map;
use std::io::{self, Write};
use std::slice;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use xrpc_model::{DateFormatOptions, Fault, MethodCall, MethodResponse, Value};

use crate::datetime::DateFormatter;
use crate::error::XmlRpcError;

/// Encodes XML-RPC envelopes.
///
/// A serializer is a small immutable value; build one per configuration and
/// share it freely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Serializer {
    dates: DateFormatter,
}

impl Serializer {
    /// Create a serializer that renders timestamps with `options`.
    #[must_use]
    pub fn new(options: DateFormatOptions) -> Self {
        Self {
            dates: DateFormatter::new(options),
        }
    }

    /// Encode a `<methodCall>` document.
    ///
    /// `encoding` is written into the XML declaration when given; the body is
    /// always produced as UTF-8.
    pub fn encode_call(
        &self,
        name: &str,
        params: &[Value],
        encoding: Option<&str>,
    ) -> Result<Vec<u8>, XmlRpcError> {
        self.document(encoding, |w| {
            w.create_element("methodCall").write_inner_content(|w| {
                write_text_element(w, "methodName", name)?;
                w.create_element("params").write_inner_content(|w| {
                    for param in params {
                        w.create_element("param")
                            .write_inner_content(|w| self.write_value(w, param))?;
                    }
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })
    }

    /// Encode a [`MethodCall`] without an explicit declaration encoding.
    pub fn encode_method_call(&self, call: &MethodCall) -> Result<Vec<u8>, XmlRpcError> {
        self.encode_call(&call.name, &call.params, None)
    }

    /// Encode a successful `<methodResponse>` carrying `value`.
    pub fn encode_response(&self, value: &Value) -> Result<Vec<u8>, XmlRpcError> {
        self.document(None, |w| {
            w.create_element("methodResponse").write_inner_content(|w| {
                w.create_element("params").write_inner_content(|w| {
                    w.create_element("param")
                        .write_inner_content(|w| self.write_value(w, value))?;
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })
    }

    /// Encode a fault `<methodResponse>` with the conventional struct.
    pub fn encode_fault(&self, fault: &Fault) -> Result<Vec<u8>, XmlRpcError> {
        self.encode_fault_value(&fault.to_value())
    }

    /// Encode a fault `<methodResponse>` carrying an arbitrary value.
    pub fn encode_fault_value(&self, value: &Value) -> Result<Vec<u8>, XmlRpcError> {
        self.document(None, |w| {
            w.create_element("methodResponse").write_inner_content(|w| {
                w.create_element("fault")
                    .write_inner_content(|w| self.write_value(w, value))?;
                Ok(())
            })?;
            Ok(())
        })
    }

    /// Encode either side of a [`MethodResponse`].
    pub fn encode_method_response(
        &self,
        response: &MethodResponse,
    ) -> Result<Vec<u8>, XmlRpcError> {
        match response {
            MethodResponse::Success(v) => self.encode_response(v),
            MethodResponse::Fault(f) => self.encode_fault(f),
        }
    }

    /// Write the declaration followed by the root element produced by `body`.
    fn document<F>(&self, encoding: Option<&str>, body: F) -> Result<Vec<u8>, XmlRpcError>
    where
        F: FnOnce(&mut Writer<&mut Vec<u8>>) -> io::Result<()>,
    {
        let mut buf = Vec::with_capacity(256);
        let mut writer = Writer::new(&mut buf);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", encoding, None)))?;
        body(&mut writer)?;
        Ok(buf)
    }

    /// Write one `<value>` element and everything beneath it.
    fn write_value<W: Write>(&self, writer: &mut Writer<W>, root: &Value) -> io::Result<()> {
        let mut stack: Vec<Frame<'_>> = Vec::new();
        self.open_value(writer, root, false, &mut stack)?;

        loop {
            let next = match stack.last_mut() {
                None => break,
                Some(Frame { children, .. }) => children.next(),
            };

            match next {
                Some((Some(name), child)) => {
                    start(writer, "member")?;
                    write_text_element(writer, "name", name)?;
                    self.open_value(writer, child, true, &mut stack)?;
                }
                Some((None, child)) => self.open_value(writer, child, false, &mut stack)?,
                None => {
                    if let Some(frame) = stack.pop() {
                        match frame.children {
                            Children::Array(_) => {
                                end(writer, "data")?;
                                end(writer, "array")?;
                            }
                            Children::Struct(_) => end(writer, "struct")?,
                        }
                        end(writer, "value")?;
                        if frame.in_member {
                            end(writer, "member")?;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Open `<value>` for `value`. Scalars are written and closed immediately;
    /// compounds push a frame whose children are written by the caller's loop.
    fn open_value<'a, W: Write>(
        &self,
        writer: &mut Writer<W>,
        value: &'a Value,
        in_member: bool,
        stack: &mut Vec<Frame<'a>>,
    ) -> io::Result<()> {
        start(writer, "value")?;
        match value {
            Value::Array(items) => {
                start(writer, "array")?;
                start(writer, "data")?;
                stack.push(Frame {
                    children: Children::Array(items.iter()),
                    in_member,
                });
                return Ok(());
            }
            Value::Struct(members) => {
                start(writer, "struct")?;
                stack.push(Frame {
                    children: Children::Struct(members.iter()),
                    in_member,
                });
                return Ok(());
            }
            scalar => self.write_scalar(writer, scalar)?,
        }
        end(writer, "value")?;
        if in_member {
            end(writer, "member")?;
        }
        Ok(())
    }

    fn write_scalar<W: Write>(&self, writer: &mut Writer<W>, value: &Value) -> io::Result<()> {
        match value {
            Value::Nil => {
                writer.create_element("nil").write_empty()?;
            }
            Value::Boolean(b) => write_text_element(writer, "boolean", if *b { "1" } else { "0" })?,
            Value::Integer(i) => write_text_element(writer, "int", &i.to_string())?,
            Value::BigInteger(s) => write_text_element(writer, "i8", s)?,
            Value::Double(d) if !d.is_finite() => {
                tracing::debug!(value = %d, "skipping non-finite double");
            }
            Value::Double(d) => match integral_i32(*d) {
                Some(i) => write_text_element(writer, "int", &i.to_string())?,
                None => write_text_element(writer, "double", &d.to_string())?,
            },
            Value::String(s) => write_string(writer, s)?,
            Value::Bytes(b) => write_text_element(writer, "base64", &STANDARD.encode(b))?,
            Value::DateTime(dt) => {
                write_text_element(writer, "dateTime.iso8601", &self.dates.encode(dt))?;
            }
            Value::Custom(custom) => {
                let tag = custom.tag_name();
                if tag.is_empty() {
                    tracing::debug!("skipping custom value without a tag name");
                } else {
                    write_text_element(writer, tag, &custom.serialize())?;
                }
            }
            Value::Array(_) | Value::Struct(_) => {
                unreachable!("compound values are written through frames")
            }
        }
        Ok(())
    }
}

/// A compound value being written: the children still to emit, and whether
/// the compound sits inside a struct `<member>` that must be closed after it.
struct Frame<'a> {
    children: Children<'a>,
    in_member: bool,
}

enum Children<'a> {
    Array(slice::Iter<'a, Value>),
    Struct(btree_map::Iter<'a, String, Value>),
}

impl<'a> Children<'a> {
    /// The next child, paired with its member name for structs.
    fn next(&mut self) -> Option<(Option<&'a str>, &'a Value)> {
        match self {
            Self::Array(items) => items.next().map(|v| (None, v)),
            Self::Struct(members) => members.next().map(|(k, v)| (Some(k.as_str()), v)),
        }
    }
}

/// Doubles with an integral value that fits `<int>` are written as integers.
#[allow(clippy::cast_possible_truncation)]
fn integral_i32(d: f64) -> Option<i32> {
    if d.is_finite() && d.fract() == 0.0 && d >= f64::from(i32::MIN) && d <= f64::from(i32::MAX)
    {
        Some(d as i32)
    } else {
        None
    }
}

/// Write a `<string>`, using a CDATA section when the text holds markup characters.
fn write_string<W: Write>(writer: &mut Writer<W>, s: &str) -> io::Result<()> {
    if s.is_empty() {
        writer.create_element("string").write_empty()?;
    } else if (s.contains('<') || s.contains('&')) && !s.contains("]]>") {
        writer
            .create_element("string")
            .write_cdata_content(BytesCData::new(s))?;
    } else {
        write_text_element(writer, "string", s)?;
    }
    Ok(())
}

/// Write a simple `<tag>text</tag>` element.
fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

fn start<W: Write>(writer: &mut Writer<W>, tag: &str) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))
}

fn end<W: Write>(writer: &mut Writer<W>, tag: &str) -> io::Result<()> {
    writer.write_event(Event::End(BytesEnd::new(tag)))
}
