use bytes::BytesMut;
use bytestring::ByteString;

use crate::error::{DecodeError, EncodeError};
use crate::topic::TopicKind;
use crate::types::UNIT_UNDEFINED;

/// Default upper bound on an encoded payload.
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 128;

/// Response type token for an accepted command.
pub const RESPONSE_OK: &str = "ok";
/// Response type token for a rejected command.
pub const RESPONSE_ERROR: &str = "error";

/// Fields of a parsed payload, borrowed from the input string.
///
/// Which fields are populated depends on the grammar of the topic kind the
/// payload arrived on; `value` is always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fields<'a> {
    pub ty: Option<&'a str>,
    pub unit: Option<&'a str>,
    pub value: &'a str,
    pub id: Option<&'a str>,
}

/// Builds and parses the compact `type,unit=value` payload grammar.
#[derive(Debug, Clone)]
pub struct PayloadCodec {
    max_len: usize,
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadCodec {
    pub fn new() -> Self {
        PayloadCodec { max_len: DEFAULT_MAX_PAYLOAD_LEN }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Exact byte length `build` would produce, computable before writing.
    ///
    /// The comma is only counted when a type segment precedes it, the
    /// `null` unit placeholder only when a type is present without a unit,
    /// and `=` only when a value follows a non-empty prefix.
    pub fn encoded_len(ty: Option<&str>, unit: Option<&str>, value: Option<&str>) -> usize {
        let mut n = ty.map_or(0, str::len);
        if n > 0 {
            n += 1;
        }
        match unit {
            Some(unit) => n += unit.len(),
            None if ty.is_some() => n += UNIT_UNDEFINED.len(),
            None => {}
        }
        if let Some(value) = value {
            if n > 0 {
                n += 1;
            }
            n += value.len();
        }
        n
    }

    /// Builds `[type][,unit-or-null][=value]`, or fails before writing
    /// anything if the exact length exceeds the configured maximum.
    pub fn build(
        &self,
        ty: Option<&str>,
        unit: Option<&str>,
        value: Option<&str>,
    ) -> Result<ByteString, EncodeError> {
        let required = Self::encoded_len(ty, unit, value);
        if required > self.max_len {
            return Err(EncodeError::BufferTooSmall { required, capacity: self.max_len });
        }
        let mut payload = String::with_capacity(required);
        if let Some(ty) = ty {
            payload.push_str(ty);
        }
        if !payload.is_empty() {
            payload.push(',');
        }
        match unit {
            Some(unit) => payload.push_str(unit),
            None if ty.is_some() => payload.push_str(UNIT_UNDEFINED),
            None => {}
        }
        if let Some(value) = value {
            if !payload.is_empty() {
                payload.push('=');
            }
            payload.push_str(value);
        }
        debug_assert_eq!(payload.len(), required);
        Ok(ByteString::from(payload))
    }

    /// Appends the built payload to `dst`. Writes nothing on failure.
    pub fn encode(
        &self,
        dst: &mut BytesMut,
        ty: Option<&str>,
        unit: Option<&str>,
        value: Option<&str>,
    ) -> Result<usize, EncodeError> {
        let payload = self.build(ty, unit, value)?;
        dst.extend_from_slice(payload.as_bytes());
        Ok(payload.len())
    }

    /// Builds the acknowledgement for the command carrying `id`:
    /// `ok,<id>` on success, `error,<id>=<text>` on failure.
    pub fn build_response(&self, id: &str, error: Option<&str>) -> Result<ByteString, EncodeError> {
        match error {
            Some(text) => self.build(Some(RESPONSE_ERROR), Some(id), Some(text)),
            None => self.build(Some(RESPONSE_OK), Some(id), None),
        }
    }

    /// Parses a payload according to the grammar of `kind`.
    ///
    /// Info kinds split an optional `type,` prefix and require `unit=value`;
    /// command kinds split an optional `id,` prefix and an optional `=`.
    /// Every other kind returns the whole payload verbatim as the value, so
    /// messages on unclassified topics stay observable.
    pub fn decode<'a>(&self, kind: TopicKind, payload: &'a str) -> Result<Fields<'a>, DecodeError> {
        match kind {
            TopicKind::Data | TopicKind::Digital | TopicKind::Analog => decode_info(payload),
            TopicKind::Command | TopicKind::DigitalCommand | TopicKind::AnalogCommand => {
                decode_command(payload)
            }
            _ => Ok(Fields { value: payload, ..Fields::default() }),
        }
    }
}

fn decode_info(payload: &str) -> Result<Fields<'_>, DecodeError> {
    let (ty, rest) = match payload.split_once(',') {
        Some((ty, rest)) => (non_empty(ty), rest),
        None => (None, payload),
    };
    let (unit, value) = rest.split_once('=').ok_or(DecodeError::MissingValue)?;
    Ok(Fields { ty, unit: non_empty(unit), value, id: None })
}

fn decode_command(payload: &str) -> Result<Fields<'_>, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::MissingValue);
    }
    let (id, rest) = match payload.split_once(',') {
        Some((id, rest)) => (non_empty(id), rest),
        None => (None, payload),
    };
    let (unit, value) = match rest.split_once('=') {
        Some((unit, value)) => (non_empty(unit), value),
        None => (None, rest),
    };
    Ok(Fields { ty: None, unit, value, id })
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Renders one or more numeric components into a payload value,
/// joining components with commas at a fixed precision each.
#[derive(Debug, Clone, Default)]
pub struct ValueList {
    out: String,
}

impl ValueList {
    pub fn new() -> Self {
        ValueList::default()
    }

    pub fn push(&mut self, value: f64, precision: usize) -> &mut Self {
        if !self.out.is_empty() {
            self.out.push(',');
        }
        self.out.push_str(&format!("{value:.precision$}"));
        self
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }
}
