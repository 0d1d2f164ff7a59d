//! Method call, method response and fault envelopes.

use std::fmt;

use crate::value::Value;

/// A `<methodCall>`: a method name and its ordered parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodCall {
    /// Name of the remote procedure. Never empty once decoded.
    pub name: String,
    /// Positional parameters, in wire order.
    pub params: Vec<Value>,
}

impl MethodCall {
    /// Create a call with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Create a call with the given parameters.
    pub fn with_params(name: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// A `<methodResponse>`: exactly one result value, or a fault.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    /// `<params><param>` carrying the single result.
    Success(Value),
    /// `<fault>` carrying an application-level error.
    Fault(Fault),
}

impl MethodResponse {
    /// Collapse into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the fault when the response is a `<fault>`.
    pub fn into_result(self) -> Result<Value, Fault> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Fault(f) => Err(f),
        }
    }
}

/// An application-level XML-RPC fault.
///
/// On the wire a fault is a struct with `faultCode` and `faultString`
/// members. Decoding does not validate that shape; missing members fall back
/// to `0` and the empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// `faultCode`.
    pub code: i32,
    /// `faultString`.
    pub message: String,
}

impl Fault {
    /// Code used for requests whose body could not be parsed.
    pub const PARSE_ERROR: i32 = -32700;
    /// Code used for calls to methods the server does not know.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Code used when a handler fails without a more specific code.
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Create a fault.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The conventional `{faultCode, faultString}` struct.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::from_members([
            ("faultCode", Value::Integer(self.code)),
            ("faultString", Value::String(self.message.clone())),
        ])
    }

    /// Read a fault out of whatever value a `<fault>` element carried.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let code = value
            .get("faultCode")
            .and_then(Value::as_i64)
            .and_then(|c| i32::try_from(c).ok())
            .unwrap_or_default();
        let message = match value.get("faultString") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Nil) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Self { code, message }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "XML-RPC fault (code {})", self.code)
        } else {
            write!(f, "XML-RPC fault: {} (code {})", self.message, self.code)
        }
    }
}

impl std::error::Error for Fault {}
