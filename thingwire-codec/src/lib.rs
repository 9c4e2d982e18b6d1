#![deny(unsafe_code)]

//! String codec for the thingwire `v1` device convention.
//!
//! Devices and the cloud broker exchange plain-text messages over
//! publish/subscribe topics named
//! `v1/<identity>/things/<device>/<suffix>[/<channel>]` with payloads in the
//! compact `type,unit=value` grammar. This crate owns both directions of
//! that wire format and nothing else:
//!
//! - [`topic::TopicCodec`]: building and classifying topic strings,
//!   including `+`/`#` filter matching for subscriptions
//! - [`payload::PayloadCodec`]: building and parsing payload strings and
//!   command responses
//! - [`types`]: the fixed measurement type/unit token tables
//!
//! Encoding is capacity checked: the exact encoded length is computed
//! before any byte is written, so a too-small bound fails cleanly with
//! [`error::EncodeError::BufferTooSmall`].

/// Error types for encoding/decoding operations
pub mod error;

/// Payload grammar implementation
pub mod payload;

/// Topic scheme implementation and filter matching
pub mod topic;

/// Measurement type and unit wire tokens
pub mod types;

pub use error::{DecodeError, EncodeError};
pub use payload::{Fields, PayloadCodec, ValueList, RESPONSE_ERROR, RESPONSE_OK};
pub use topic::{matches, Channel, Topic, TopicCodec, TopicKind, PROTOCOL_VERSION};
