//! `dateTime.iso8601` encoding and decoding.
//!
//! Decoding is tolerant: date and time separators are optional, minutes,
//! seconds, fractions and the zone suffix may be omitted. Encoding is driven by
//! [`DateFormatOptions`] held by a [`DateFormatter`] value; the functions here
//! keep no state and are safe to call from any thread.

use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike,
    Utc,
};
use regex::Regex;
use xrpc_model::DateFormatOptions;

use crate::error::XmlRpcError;

const KIND: &str = "dateTime.iso8601";

/// `YYYY[-]MM[-]DD[THH[[:]MM][[:]SS][.fff][Z|±HH[[:]MM]]]`
static ISO8601: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^([0-9]{4})-?([0-9]{2})-?([0-9]{2})",
        r"(?:T([0-9]{2})(?::?([0-9]{2}))?(?::?([0-9]{2}))?(?:\.([0-9]+))?",
        r"(Z|([+-])([0-9]{2})(?::?([0-9]{2}))?)?)?$",
    ))
    .expect("static regex should compile")
});

/// The machine's current UTC offset, sampled now.
#[must_use]
pub fn current_local_offset() -> FixedOffset {
    Local::now().offset().fix()
}

/// Decode ISO-8601 text, assuming the current local offset when the text has none.
///
/// # Errors
///
/// Returns [`XmlRpcError::MalformedValue`] if the text is not a valid timestamp.
pub fn decode(text: &str) -> Result<DateTime<FixedOffset>, XmlRpcError> {
    decode_with_offset(text, current_local_offset())
}

/// Decode ISO-8601 text, assuming `fallback` when the text has no zone suffix.
///
/// # Errors
///
/// Returns [`XmlRpcError::MalformedValue`] if the text is not a valid timestamp.
pub fn decode_with_offset(
    text: &str,
    fallback: FixedOffset,
) -> Result<DateTime<FixedOffset>, XmlRpcError> {
    let malformed = || XmlRpcError::malformed(KIND, text);
    let caps = ISO8601.captures(text.trim()).ok_or_else(malformed)?;

    let field = |i: usize| -> Result<u32, XmlRpcError> {
        caps.get(i)
            .map_or(Ok(0), |m| m.as_str().parse::<u32>())
            .map_err(|_| malformed())
    };

    let year: i32 = caps[1].parse().map_err(|_| malformed())?;
    let nanos = caps.get(7).map_or(0, |m| fraction_to_nanos(m.as_str()));

    let offset = match caps.get(8).map(|m| m.as_str()) {
        None => fallback,
        Some("Z") => Utc.fix(),
        Some(_) => {
            let hours = i32::try_from(field(10)?).map_err(|_| malformed())?;
            let minutes = i32::try_from(field(11)?).map_err(|_| malformed())?;
            let seconds = hours * 3600 + minutes * 60;
            let signed = if &caps[9] == "-" { -seconds } else { seconds };
            FixedOffset::east_opt(signed).ok_or_else(malformed)?
        }
    };

    let (month, day) = (field(2)?, field(3)?);
    let (hour, minute, second) = (field(4)?, field(5)?, field(6)?);
    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_nano_opt(hour, minute, second, nanos))
        .ok_or_else(malformed)?;

    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(malformed)
}

/// Scale a run of fraction digits to nanoseconds, truncating past nine digits.
fn fraction_to_nanos(digits: &str) -> u32 {
    digits
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(9)
        .fold(0, |acc, b| acc * 10 + u32::from(b - b'0'))
}

/// Renders timestamps according to a fixed set of [`DateFormatOptions`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateFormatter {
    options: DateFormatOptions,
}

impl DateFormatter {
    /// Create a formatter.
    #[must_use]
    pub fn new(options: DateFormatOptions) -> Self {
        Self { options }
    }

    /// The options this formatter renders with.
    #[must_use]
    pub fn options(&self) -> &DateFormatOptions {
        &self.options
    }

    /// Encode a timestamp, reading local fields from the machine's zone when
    /// `local` is set.
    #[must_use]
    pub fn encode<Tz: TimeZone>(&self, ts: &DateTime<Tz>) -> String {
        let local_offset = ts.with_timezone(&Local).offset().fix();
        self.encode_with_local_offset(ts, local_offset)
    }

    /// Encode a timestamp, treating `local_offset` as the machine's zone.
    #[must_use]
    pub fn encode_with_local_offset<Tz: TimeZone>(
        &self,
        ts: &DateTime<Tz>,
        local_offset: FixedOffset,
    ) -> String {
        let opts = &self.options;
        let fields: NaiveDateTime = if opts.local {
            ts.with_timezone(&local_offset).naive_local()
        } else {
            ts.naive_utc()
        };

        let date_sep = if opts.hyphens { "-" } else { "" };
        let time_sep = if opts.colons { ":" } else { "" };

        let mut out = format!(
            "{:04}{date_sep}{:02}{date_sep}{:02}T{:02}{time_sep}{:02}{time_sep}{:02}",
            fields.year(),
            fields.month(),
            fields.day(),
            fields.hour(),
            fields.minute(),
            fields.second(),
        );

        if opts.include_milliseconds {
            // Leap seconds carry nanoseconds past 1e9.
            let millis = (fields.nanosecond() / 1_000_000).min(999);
            out.push_str(&format!(".{millis:03}"));
        }

        if !opts.local {
            out.push('Z');
        } else if opts.include_offset {
            out.push_str(&format_offset(local_offset));
        }

        out
    }
}

/// `Z` for a zero offset, otherwise `±HH:MM`.
fn format_offset(offset: FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    if secs == 0 {
        return "Z".to_owned();
    }
    let sign = if secs < 0 { '-' } else { '+' };
    let abs = secs.unsigned_abs();
    format!("{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60)
}
