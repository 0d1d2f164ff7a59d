//! Configuration management for xrpc services.
//!
//! All configuration is driven by environment variables.

use xrpc_model::DateFormatOptions;

use crate::error::{XrpcError, XrpcResult};

/// Global configuration for xrpc.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrpcConfig {
    /// Bind address for the server.
    pub gateway_listen: String,
    /// Log level.
    pub log_level: String,
    /// Request path XML-RPC calls are served on.
    pub path: String,
    /// Encoding label written into outgoing XML declarations.
    pub encoding: Option<String>,
    /// How `dateTime.iso8601` values are rendered.
    pub date_format: DateFormatOptions,
}

impl Default for XrpcConfig {
    fn default() -> Self {
        Self {
            gateway_listen: "0.0.0.0:8080".to_owned(),
            log_level: "info".to_owned(),
            path: "/RPC2".to_owned(),
            encoding: None,
            date_format: DateFormatOptions::default(),
        }
    }
}

impl XrpcConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> XrpcResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> XrpcResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = lookup("XMLRPC_PATH") {
            if !v.starts_with('/') {
                return Err(XrpcError::Config(format!(
                    "XMLRPC_PATH must start with '/': {v}"
                )));
            }
            config.path = v;
        }
        if let Some(v) = lookup("XMLRPC_ENCODING") {
            config.encoding = Some(v).filter(|v| !v.is_empty());
        }

        let dates = &mut config.date_format;
        for (key, slot) in [
            ("XMLRPC_DATE_COLONS", &mut dates.colons),
            ("XMLRPC_DATE_HYPHENS", &mut dates.hyphens),
            ("XMLRPC_DATE_LOCAL", &mut dates.local),
            ("XMLRPC_DATE_MS", &mut dates.include_milliseconds),
            ("XMLRPC_DATE_OFFSET", &mut dates.include_offset),
        ] {
            if let Some(v) = lookup(key) {
                *slot = parse_flag(key, &v)?;
            }
        }

        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> XrpcResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(XrpcError::Config(format!(
            "{key} must be a boolean, got '{value}'"
        ))),
    }
}
