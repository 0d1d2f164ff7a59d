//! Formatting options for `dateTime.iso8601` values.

/// How timestamps are rendered on the wire.
///
/// The options are fixed per codec instance; there is no process-wide default
/// to mutate. [`Default`] yields the classic XML-RPC form `19980717T14:08:55`
/// in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct DateFormatOptions {
    /// Join time fields with `:`.
    pub colons: bool,
    /// Join date fields with `-`.
    pub hyphens: bool,
    /// Render local calendar fields instead of UTC.
    pub local: bool,
    /// Append `.mmm` milliseconds.
    pub include_milliseconds: bool,
    /// Append the local `±HH:MM` offset (only meaningful with `local`).
    pub include_offset: bool,
}

impl Default for DateFormatOptions {
    fn default() -> Self {
        Self {
            colons: true,
            hyphens: false,
            local: true,
            include_milliseconds: false,
            include_offset: false,
        }
    }
}

impl DateFormatOptions {
    /// UTC rendering with a trailing `Z`, otherwise the defaults.
    #[must_use]
    pub fn utc() -> Self {
        Self {
            local: false,
            ..Self::default()
        }
    }
}
