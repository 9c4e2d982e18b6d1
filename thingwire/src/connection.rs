//! Connection lifecycle: connect, login, detect drops, reconnect.

use std::time::Duration;

use bytestring::ByteString;

use crate::session::{Credentials, Inbound, Session, Transport};
use crate::Result;

/// Fixed delay between reconnect attempts.
///
/// Deliberately flat: the device has no supervisor to report giving up to,
/// so the machine retries at this cadence forever.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(1000);

/// Where the broker lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: ByteString,
    pub port: u16,
}

/// Lifecycle position of the single broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Owns the transport and session pair and drives them through the
/// `Disconnected → Connecting → Connected` machine. Any detected failure
/// returns to `Disconnected`; there is no terminal state.
pub struct ConnectionManager<T, S> {
    transport: T,
    session: S,
    state: ConnectionState,
    backoff: Duration,
}

impl<T, S> ConnectionManager<T, S>
where
    T: Transport,
    S: Session<T>,
{
    pub fn new(transport: T, session: S) -> Self {
        ConnectionManager { transport, session, state: ConnectionState::Disconnected, backoff: DEFAULT_BACKOFF }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn set_backoff(&mut self, backoff: Duration) {
        self.backoff = backoff;
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[inline]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    #[inline]
    pub fn session(&self) -> &S {
        &self.session
    }

    #[inline]
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Both layers still report live.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.transport.is_connected() && self.session.is_connected()
    }

    /// Runs the connect sequence until the broker session is up, retrying
    /// with fixed backoff indefinitely. A transport failure sleeps and
    /// retries; a login failure also tears the fresh transport back down.
    pub async fn establish(&mut self, endpoint: &Endpoint, credentials: &Credentials) {
        self.state = ConnectionState::Connecting;
        log::info!("connecting to {}:{}", endpoint.host, endpoint.port);
        loop {
            if let Err(err) = self.transport.connect(&endpoint.host, endpoint.port).await {
                log::warn!("transport connect failed: {err}");
                tokio::time::sleep(self.backoff).await;
                continue;
            }
            match self.session.login(&mut self.transport, credentials).await {
                Ok(()) => break,
                Err(err) => {
                    log::warn!("broker login failed: {err}");
                    self.transport.disconnect().await;
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
        self.state = ConnectionState::Connected;
        log::info!("connected as {}", credentials.client_id);
    }

    /// Tears both layers down and records the drop. The next `establish`
    /// starts the machine over.
    pub async fn teardown(&mut self) {
        self.session.logout(&mut self.transport).await;
        self.transport.disconnect().await;
        self.state = ConnectionState::Disconnected;
        log::info!("disconnected");
    }

    pub async fn subscribe(&mut self, filter: &str) -> Result<()> {
        self.session.subscribe(&mut self.transport, filter).await
    }

    pub async fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        self.session.publish(&mut self.transport, topic, payload).await
    }

    pub async fn poll(&mut self, timeout: Duration) -> Result<Option<Inbound>> {
        self.session.poll(&mut self.transport, timeout).await
    }
}
