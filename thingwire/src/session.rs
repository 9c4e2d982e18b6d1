//! Seams to the pre-existing transport, pub/sub client and pin I/O.
//!
//! The core never opens sockets, frames packets or touches hardware; it
//! drives these traits and nothing else. Implementations live outside the
//! core (`thingwire-net` ships a TCP transport) or in the embedding
//! application.

use std::time::Duration;

use async_trait::async_trait;
use bytestring::ByteString;

use crate::Result;

/// Account identity presented to the broker during login.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: ByteString,
    pub password: ByteString,
    pub client_id: ByteString,
}

/// One message delivered by the broker, still in wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub topic: ByteString,
    pub payload: ByteString,
}

/// Byte-stream transport under the broker session.
#[async_trait]
pub trait Transport: Send {
    async fn connect(&mut self, host: &str, port: u16) -> Result<()>;

    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Reads up to `buf.len()` bytes, blocking at most `timeout`.
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Writes from `buf`, blocking at most `timeout`; returns bytes written.
    async fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize>;
}

/// The broker-side pub/sub client, operating over a borrowed transport.
///
/// Keep-alive, packet framing and acknowledgement bookkeeping are the
/// implementation's concern; the core only logs in, subscribes, publishes
/// and polls.
#[async_trait]
pub trait Session<T: Transport>: Send {
    async fn login(&mut self, link: &mut T, credentials: &Credentials) -> Result<()>;

    /// Releases the broker session; the transport stays up until the
    /// caller drops it.
    async fn logout(&mut self, link: &mut T);

    async fn subscribe(&mut self, link: &mut T, filter: &str) -> Result<()>;

    async fn publish(&mut self, link: &mut T, topic: &str, payload: &str) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Waits up to `timeout` for one inbound message; `None` when the
    /// window elapses quietly.
    async fn poll(&mut self, link: &mut T, timeout: Duration) -> Result<Option<Inbound>>;
}

/// Hardware pin access for the built-in digital/analog handling.
///
/// Analog values are normalized to `0.0..=1.0`; scaling to the converter's
/// resolution is the implementation's concern.
pub trait ChannelIo: Send {
    fn read_digital(&mut self, channel: u32) -> bool;
    fn write_digital(&mut self, channel: u32, level: bool);
    fn read_analog(&mut self, channel: u32) -> f32;
    fn write_analog(&mut self, channel: u32, value: f32);
}

/// Pin backend for devices without addressable pins. Reads idle low,
/// writes vanish.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIo;

impl ChannelIo for NullIo {
    fn read_digital(&mut self, _channel: u32) -> bool {
        false
    }

    fn write_digital(&mut self, _channel: u32, _level: bool) {}

    fn read_analog(&mut self, _channel: u32) -> f32 {
        0.0
    }

    fn write_analog(&mut self, _channel: u32, _value: f32) {}
}
