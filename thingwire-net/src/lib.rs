#![deny(unsafe_code)]

//! Transport adapters for thingwire devices running on hosted platforms.

mod tcp;

pub use tcp::TcpTransport;
