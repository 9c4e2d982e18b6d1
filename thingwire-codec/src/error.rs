/// Errors which can occur while building topic or payload strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// The exact encoded length exceeds the destination capacity.
    /// Nothing has been written when this is returned.
    #[error("buffer too small, required {required} bytes but capacity is {capacity}")]
    BufferTooSmall { required: usize, capacity: usize },
}

/// Errors which can occur while parsing topic or payload strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The version, identity or marker segments do not match the scheme.
    #[error("malformed topic")]
    Malformed,
    /// The suffix matches no known topic kind.
    #[error("unknown topic suffix")]
    UnknownTopic,
    /// The channel segment is empty, non-numeric, zero-padded or overflows.
    #[error("invalid channel segment")]
    InvalidChannel,
    /// The payload grammar for this topic kind requires a value.
    #[error("payload is missing a value")]
    MissingValue,
}
