//! The XML-RPC value tagged union.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, TimeZone};
use regex::Regex;

use crate::custom::CustomType;

/// Integer-shaped text accepted for `<i8>` values: optional leading minus, digits only.
static BIG_INTEGER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+$").expect("static regex should compile"));

/// Text rejected as a big integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not an integer: '{0}'")]
pub struct InvalidBigInteger(pub String);

/// A single XML-RPC value.
///
/// Struct members are kept in a [`BTreeMap`]: member order carries no meaning on
/// the wire, and inserting a duplicate key replaces the earlier value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// `<nil/>`.
    #[default]
    Nil,
    /// `<boolean>`, written as `1` / `0`.
    Boolean(bool),
    /// `<int>` / `<i4>`.
    Integer(i32),
    /// `<i8>` or any integer beyond the i32 range, carried as validated decimal text.
    BigInteger(String),
    /// `<double>`.
    Double(f64),
    /// `<string>`, or the content of a bare `<value>`.
    String(String),
    /// `<base64>`.
    Bytes(Vec<u8>),
    /// `<dateTime.iso8601>`. The offset records the zone the text was written in,
    /// or the local offset assumed when the text had none.
    DateTime(DateTime<FixedOffset>),
    /// `<array>`.
    Array(Vec<Value>),
    /// `<struct>`.
    Struct(BTreeMap<String, Value>),
    /// A caller-defined wire type that serializes itself.
    Custom(CustomType),
}

impl Value {
    /// Build a [`Value::BigInteger`] from decimal text.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBigInteger`] unless the text is an optional `-` followed by digits.
    pub fn big_integer(text: impl Into<String>) -> Result<Self, InvalidBigInteger> {
        let text = text.into();
        if BIG_INTEGER_PATTERN.is_match(&text) {
            Ok(Self::BigInteger(text))
        } else {
            Err(InvalidBigInteger(text))
        }
    }

    /// Build an empty struct.
    #[must_use]
    pub fn empty_struct() -> Self {
        Self::Struct(BTreeMap::new())
    }

    /// Build a struct from `(name, value)` pairs. Later duplicates win.
    #[must_use]
    pub fn from_members<K, V, I>(members: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Struct(
            members
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// The XML-RPC element name this value is written as.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Nil => "nil",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "int",
            Self::BigInteger(_) => "i8",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Bytes(_) => "base64",
            Self::DateTime(_) => "dateTime.iso8601",
            Self::Array(_) => "array",
            Self::Struct(_) => "struct",
            Self::Custom(c) => c.tag_name(),
        }
    }

    /// Whether this value is `Nil`.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// The boolean payload, if any.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The i32 payload, if any.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::BigInteger(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// The value as an i64, accepting both `int` and `i8` payloads.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(i64::from(*i)),
            Self::BigInteger(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// The value as an f64. Integers convert losslessly where they can.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            Self::Integer(i) => Some(f64::from(*i)),
            _ => None,
        }
    }

    /// The string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The binary payload, if any.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The timestamp payload, if any.
    #[must_use]
    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// The array elements, if any.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The struct members, if any.
    #[must_use]
    pub fn as_struct(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Struct(members) => Some(members),
            _ => None,
        }
    }

    /// Look up a struct member by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_struct().and_then(|m| m.get(key))
    }

    /// Turn a decoded member name into a struct key.
    ///
    /// Names normally arrive as strings; anything else is rendered as text.
    #[must_use]
    pub fn into_key(mut self) -> String {
        if let Self::String(s) | Self::BigInteger(s) = &mut self {
            return std::mem::take(s);
        }
        self.to_string()
    }
}

/// Children are released from an explicit worklist, so dropping a tree of
/// any depth uses constant stack.
impl Drop for Value {
    fn drop(&mut self) {
        let mut pending = match self {
            Self::Array(items) if !items.is_empty() => std::mem::take(items),
            Self::Struct(members) if !members.is_empty() => {
                std::mem::take(members).into_values().collect()
            }
            _ => return,
        };
        while let Some(mut value) = pending.pop() {
            match &mut value {
                Self::Array(items) => pending.append(items),
                Self::Struct(members) => pending.extend(std::mem::take(members).into_values()),
                _ => {}
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::BigInteger(s) | Self::String(s) => f.write_str(s),
            Self::Double(d) => write!(f, "{d}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Struct(members) => {
                f.write_str("{")?;
                for (i, (k, v)) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Custom(c) => write!(f, "<{}>{}", c.tag_name(), c.serialize()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        i32::try_from(v).map_or_else(|_| Self::BigInteger(v.to_string()), Self::Integer)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(v: DateTime<Tz>) -> Self {
        Self::DateTime(v.fixed_offset())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Nil, Into::into)
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(v: BTreeMap<String, T>) -> Self {
        Self::Struct(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<CustomType> for Value {
    fn from(v: CustomType) -> Self {
        Self::Custom(v)
    }
}
