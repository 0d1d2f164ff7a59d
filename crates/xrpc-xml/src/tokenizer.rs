//! Adapter from `quick-xml` to the event vocabulary the deserializer consumes.

use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::{BytesRef, Event};

use crate::error::XmlRpcError;

/// One tokenizer event. Tag names are upper-cased; text is already unescaped.
#[derive(Debug)]
pub enum XmlEvent {
    /// An opening tag, including the open half of an empty element.
    Open(String),
    /// A closing tag, including the close half of an empty element.
    Close(String),
    /// A chunk of character data.
    Text(String),
    /// The content of a CDATA section.
    CData(String),
    /// The document ended.
    End,
    /// The tokenizer or the byte stream failed. No events follow.
    Error(XmlRpcError),
}

/// Pulls [`XmlEvent`]s out of a byte stream.
///
/// The iterator yields exactly one terminal event ([`XmlEvent::End`] or
/// [`XmlEvent::Error`]) and then stops.
#[derive(Debug)]
pub struct Tokenizer<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    finished: bool,
}

impl<R: BufRead> Tokenizer<R> {
    /// Tokenize everything `source` produces.
    pub fn from_reader(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().expand_empty_elements = true;
        Self {
            reader,
            buf: Vec::with_capacity(512),
            finished: false,
        }
    }

    fn next_event(&mut self) -> Result<XmlEvent, XmlRpcError> {
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(quick_xml::Error::Io(e)) => {
                    return Err(XmlRpcError::Transport(e.to_string()));
                }
                Err(e) => return Err(e.into()),
            };
            match event {
                Event::Start(e) => return Ok(XmlEvent::Open(tag_name(e.name().as_ref())?)),
                Event::End(e) => return Ok(XmlEvent::Close(tag_name(e.name().as_ref())?)),
                Event::Text(e) => {
                    let decoded = e
                        .decode()
                        .map_err(|err| XmlRpcError::Text(err.to_string()))?;
                    let unescaped = quick_xml::escape::unescape(&decoded)
                        .map_err(|err| XmlRpcError::Text(err.to_string()))?;
                    return Ok(XmlEvent::Text(unescaped.into_owned()));
                }
                Event::CData(e) => {
                    let text = String::from_utf8(e.into_inner().into_owned())
                        .map_err(|err| XmlRpcError::Text(err.to_string()))?;
                    return Ok(XmlEvent::CData(text));
                }
                Event::GeneralRef(e) => return Ok(XmlEvent::Text(resolve_reference(&e)?)),
                Event::Eof => return Ok(XmlEvent::End),
                // Declarations, comments, processing instructions and doctypes.
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for Tokenizer<R> {
    type Item = XmlEvent;

    fn next(&mut self) -> Option<XmlEvent> {
        if self.finished {
            return None;
        }
        let event = self.next_event().unwrap_or_else(XmlEvent::Error);
        if matches!(event, XmlEvent::End | XmlEvent::Error(_)) {
            self.finished = true;
        }
        Some(event)
    }
}

fn tag_name(raw: &[u8]) -> Result<String, XmlRpcError> {
    std::str::from_utf8(raw)
        .map(str::to_ascii_uppercase)
        .map_err(|err| XmlRpcError::Text(err.to_string()))
}

/// Resolve `&#NN;`, `&#xNN;` and the five predefined entities.
fn resolve_reference(e: &BytesRef<'_>) -> Result<String, XmlRpcError> {
    if let Some(ch) = e
        .resolve_char_ref()
        .map_err(|err| XmlRpcError::Text(err.to_string()))?
    {
        return Ok(ch.to_string());
    }
    let name = e.decode().map_err(|err| XmlRpcError::Text(err.to_string()))?;
    quick_xml::escape::resolve_predefined_entity(&name)
        .map(str::to_owned)
        .ok_or_else(|| XmlRpcError::Text(format!("unknown entity '&{name};'")))
}
