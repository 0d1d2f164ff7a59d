//! Extension point for vendor-specific wire types.

use std::fmt;
use std::sync::Arc;

/// A value that knows its own XML-RPC element name and how to render its payload.
///
/// The serializer writes `<value><{tag_name}>{serialize()}</{tag_name}></value>`
/// without consulting its own type table, so new wire types (for example Apache's
/// `ex:i1` or a vendor `<uuid>`) plug in without touching the codec.
pub trait CustomValue: fmt::Debug + Send + Sync {
    /// The element name written around the payload.
    fn tag_name(&self) -> &str;

    /// The element's text payload. It is escaped by the writer.
    fn serialize(&self) -> String;
}

/// A shared handle to a [`CustomValue`], storable inside a [`Value`](crate::Value).
#[derive(Debug, Clone)]
pub struct CustomType(Arc<dyn CustomValue>);

impl CustomType {
    /// Wrap a custom value.
    pub fn new(value: impl CustomValue + 'static) -> Self {
        Self(Arc::new(value))
    }

    /// The element name of the wrapped value.
    #[must_use]
    pub fn tag_name(&self) -> &str {
        self.0.tag_name()
    }

    /// The rendered payload of the wrapped value.
    #[must_use]
    pub fn serialize(&self) -> String {
        self.0.serialize()
    }
}

impl PartialEq for CustomType {
    fn eq(&self, other: &Self) -> bool {
        self.tag_name() == other.tag_name() && self.serialize() == other.serialize()
    }
}
