//! A minimal cookie jar for XML-RPC clients.
//!
//! Cookies are read from every `Set-Cookie` response header and sent back as
//! a single `Cookie` request header. Only the name, value and expiry are
//! tracked; domain, path and security attributes are ignored.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use http::HeaderMap;
use http::header::{COOKIE, HeaderValue, SET_COOKIE};

/// Netscape-style expiry dates, as some servers still send them.
const LEGACY_EXPIRES_FORMAT: &str = "%a, %d-%b-%Y %H:%M:%S GMT";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cookie {
    value: String,
    expires: Option<DateTime<Utc>>,
}

/// Cookies keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: BTreeMap<String, Cookie>,
}

impl CookieJar {
    /// Create an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored value for `name`, expired or not.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|c| c.value.as_str())
    }

    /// When `name` expires, if it has an expiry.
    #[must_use]
    pub fn expiration(&self, name: &str) -> Option<DateTime<Utc>> {
        self.cookies.get(name).and_then(|c| c.expires)
    }

    /// Store a session cookie.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set_with_expiry(name, value, None);
    }

    /// Store a cookie that stops being sent after `expires`.
    pub fn set_with_expiry(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        expires: Option<DateTime<Utc>>,
    ) {
        self.cookies.insert(
            name.into(),
            Cookie {
                value: value.into(),
                expires,
            },
        );
    }

    /// Number of stored cookies, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Whether the jar holds no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Absorb every `Set-Cookie` header in a response.
    pub fn parse_response(&mut self, headers: &HeaderMap) {
        self.parse_response_at(headers, Utc::now());
    }

    fn parse_response_at(&mut self, headers: &HeaderMap, now: DateTime<Utc>) {
        for raw in headers.get_all(SET_COOKIE) {
            let Ok(line) = raw.to_str() else {
                tracing::debug!("skipping non-ASCII set-cookie header");
                continue;
            };
            self.parse_set_cookie(line, now);
        }
    }

    fn parse_set_cookie(&mut self, line: &str, now: DateTime<Utc>) {
        let mut parts = line.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            tracing::debug!(line, "skipping malformed set-cookie header");
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        let mut expires = None;
        for attr in parts {
            let Some((key, val)) = attr.split_once('=') else {
                continue;
            };
            let val = val.trim();
            if key.trim().eq_ignore_ascii_case("max-age") {
                // Max-Age wins over Expires regardless of order.
                if let Ok(secs) = val.parse::<i64>() {
                    expires = max_age_expiry(now, secs);
                    break;
                }
            } else if key.trim().eq_ignore_ascii_case("expires") {
                expires = parse_expires(val).or(expires);
            }
        }

        self.set_with_expiry(name, value.trim(), expires);
    }

    /// Write unexpired cookies into a single `Cookie` header, replacing any
    /// existing one. Nothing is written when no cookie is live.
    pub fn compose_request(&self, headers: &mut HeaderMap) {
        self.compose_request_at(headers, Utc::now());
    }

    fn compose_request_at(&self, headers: &mut HeaderMap, now: DateTime<Utc>) {
        let Some(line) = self.header_value(now) else {
            return;
        };
        match HeaderValue::from_str(&line) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, "cookie values are not a valid header"),
        }
    }

    fn header_value(&self, now: DateTime<Utc>) -> Option<String> {
        let live: Vec<String> = self
            .cookies
            .iter()
            .filter(|(_, c)| c.expires.is_none_or(|at| at > now))
            .map(|(name, c)| format!("{name}={}", c.value))
            .collect();
        (!live.is_empty()).then(|| live.join(";"))
    }
}

/// A non-positive Max-Age expires the cookie at once; one too large to
/// represent never expires.
fn max_age_expiry(now: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return Some(DateTime::<Utc>::MIN_UTC);
    }
    Duration::try_seconds(secs).and_then(|d| now.checked_add_signed(d))
}

fn parse_expires(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(text)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(text, LEGACY_EXPIRES_FORMAT).map(|n| n.and_utc())
        })
        .ok()
}
