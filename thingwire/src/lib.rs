#![deny(unsafe_code)]

//! Device-side client for the thingwire `v1` topic convention.
//!
//! The crate glues the wire codec ([`thingwire_codec`]) to a pair of
//! injected collaborators — a byte [`session::Transport`] and a pub/sub
//! [`session::Session`] — and runs the device's cooperative loop on top of
//! them: classify and dispatch inbound commands and config changes, report
//! the channels enabled for periodic publishing, and keep the connection
//! alive with a fixed-backoff reconnect machine. Everything is
//! single-task; one [`client::Client::tick`] performs one pass.

pub mod channels;
pub mod client;
pub mod connection;
pub mod context;
pub mod dispatch;
pub mod session;

pub use channels::{Category, ChannelBanks, ChannelBitmap};
pub use client::{Client, ClientOptions, DeviceInfo, Measurement, Producer};
pub use connection::{ConnectionManager, ConnectionState, Endpoint};
pub use context::Context;
pub use dispatch::{Command, CommandHandler, Dispatcher, Outbound, ERROR_INCORRECT_PARAM};
pub use session::{ChannelIo, Credentials, Inbound, NullIo, Session, Transport};

pub use thingwire_codec as codec;

pub type Error = anyhow::Error;
pub type Result<T> = anyhow::Result<T, Error>;
