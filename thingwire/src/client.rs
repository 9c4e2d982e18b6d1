//! The device client: one cooperative loop over the injected collaborators.

use std::collections::HashMap;
use std::time::Duration;

use bytestring::ByteString;

use thingwire_codec::types;
use thingwire_codec::{Channel, TopicKind, ValueList, PROTOCOL_VERSION};

use crate::channels::{ChannelBanks, DEFAULT_WORDS};
use crate::connection::{ConnectionManager, ConnectionState, Endpoint, DEFAULT_BACKOFF};
use crate::context::Context;
use crate::dispatch::{CommandHandler, Dispatcher, Outbound};
use crate::session::{ChannelIo, Credentials, Session, Transport};

/// Default window one tick waits for inbound traffic.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Inbound filters requested on every (re)connect, one per supported kind.
const SUBSCRIBED_KINDS: [TopicKind; 6] = [
    TopicKind::Command,
    TopicKind::Config,
    TopicKind::DigitalCommand,
    TopicKind::DigitalConfig,
    TopicKind::AnalogCommand,
    TopicKind::AnalogConfig,
];

/// Descriptor strings announced after every successful connect.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub model: ByteString,
    pub cpu_model: ByteString,
    pub cpu_speed_hz: u64,
}

/// Loop tuning knobs.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub poll_timeout: Duration,
    pub reconnect_backoff: Duration,
    pub channel_words: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            reconnect_backoff: DEFAULT_BACKOFF,
            channel_words: DEFAULT_WORDS,
        }
    }
}

/// One reading produced for a virtual channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    pub ty: Option<ByteString>,
    pub unit: Option<ByteString>,
    pub value: ByteString,
}

impl Measurement {
    /// A bare value with no type/unit annotation.
    pub fn raw(value: impl Into<ByteString>) -> Self {
        Measurement { ty: None, unit: None, value: value.into() }
    }

    pub fn typed(
        ty: impl Into<ByteString>,
        unit: impl Into<ByteString>,
        value: impl Into<ByteString>,
    ) -> Self {
        Measurement { ty: Some(ty.into()), unit: Some(unit.into()), value: value.into() }
    }
}

/// Application-level source of periodic readings for one virtual channel.
///
/// `None` skips the report for this pass.
pub trait Producer: Send {
    fn sample(&mut self, channel: u32) -> Option<Measurement>;
}

impl<F> Producer for F
where
    F: FnMut(u32) -> Option<Measurement> + Send,
{
    fn sample(&mut self, channel: u32) -> Option<Measurement> {
        self(channel)
    }
}

/// The device client.
///
/// Owns the codec context, the channel schedule, the dispatcher and the
/// connection machine; everything runs on the single task that calls
/// [`Client::tick`]. The only way to stop it is to stop calling.
pub struct Client<T, S, Io> {
    ctx: Context,
    endpoint: Endpoint,
    credentials: Credentials,
    device: DeviceInfo,
    conn: ConnectionManager<T, S>,
    dispatcher: Dispatcher<Io>,
    banks: ChannelBanks,
    producers: HashMap<u32, Box<dyn Producer>>,
    poll_timeout: Duration,
}

impl<T, S, Io> Client<T, S, Io>
where
    T: Transport,
    S: Session<T>,
    Io: ChannelIo,
{
    pub fn new(
        endpoint: Endpoint,
        credentials: Credentials,
        device: DeviceInfo,
        transport: T,
        session: S,
        io: Io,
    ) -> Self {
        let ctx = Context::new(credentials.username.clone(), credentials.client_id.clone());
        Client {
            ctx,
            endpoint,
            credentials,
            device,
            conn: ConnectionManager::new(transport, session),
            dispatcher: Dispatcher::new(io),
            banks: ChannelBanks::new(),
            producers: HashMap::new(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.poll_timeout = options.poll_timeout;
        self.conn.set_backoff(options.reconnect_backoff);
        self.banks = ChannelBanks::with_words(options.channel_words);
        self
    }

    #[inline]
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    #[inline]
    pub fn banks(&self) -> &ChannelBanks {
        &self.banks
    }

    #[inline]
    pub fn connection(&self) -> &ConnectionManager<T, S> {
        &self.conn
    }

    #[inline]
    pub fn connection_mut(&mut self) -> &mut ConnectionManager<T, S> {
        &mut self.conn
    }

    /// Registers the command handler for one virtual channel.
    pub fn register_handler(&mut self, channel: u32, handler: impl CommandHandler + 'static) {
        self.dispatcher.register(channel, handler);
    }

    /// Replaces the handler used for channels with no registration.
    pub fn set_default_handler(&mut self, handler: impl CommandHandler + 'static) {
        self.dispatcher.set_default(handler);
    }

    /// Registers the reading source for one virtual channel.
    pub fn register_producer(&mut self, channel: u32, producer: impl Producer + 'static) {
        self.producers.insert(channel, Box::new(producer));
    }

    /// Connects, subscribes the command/config filters and announces the
    /// device descriptors. Blocks until the broker session is up.
    pub async fn connect(&mut self) {
        self.conn.establish(&self.endpoint, &self.credentials).await;
        for kind in SUBSCRIBED_KINDS {
            match self.ctx.filter(kind) {
                Ok(filter) => {
                    if let Err(err) = self.conn.subscribe(&filter).await {
                        log::warn!("subscribe {filter} failed: {err}");
                    }
                }
                Err(err) => log::error!("filter encode for {kind:?} failed: {err}"),
            }
        }
        self.publish_device_info().await;
    }

    /// Publishes the model/cpu/speed/version descriptor set.
    pub async fn publish_device_info(&mut self) {
        let speed = self.device.cpu_speed_hz.to_string();
        let descriptors = [
            (TopicKind::SysModel, self.device.model.clone()),
            (TopicKind::SysCpuModel, self.device.cpu_model.clone()),
            (TopicKind::SysCpuSpeed, ByteString::from(speed)),
            (TopicKind::SysVersion, ByteString::from_static(PROTOCOL_VERSION)),
        ];
        for (kind, value) in descriptors {
            self.publish_raw(kind, Channel::None, None, None, &value).await;
        }
    }

    /// One pass of the cooperative loop: drain one inbound message, emit
    /// the periodic reports, then repair the connection if either layer
    /// dropped. Never fails; everything is recovered or logged.
    pub async fn tick(&mut self) {
        match self.conn.poll(self.poll_timeout).await {
            Ok(Some(message)) => {
                let replies = self.dispatcher.dispatch(&self.ctx, &message, &mut self.banks);
                for Outbound { topic, payload } in replies {
                    if let Err(err) = self.conn.publish(&topic, &payload).await {
                        log::warn!("publish to {topic} failed: {err}");
                    }
                }
            }
            Ok(None) => {}
            Err(err) => log::debug!("inbound poll failed: {err}"),
        }

        self.report_virtual_channels().await;
        self.report_digital_channels().await;
        self.report_analog_channels().await;

        if !self.conn.is_alive() {
            log::warn!("connection lost");
            self.conn.teardown().await;
            self.connect().await;
        }
    }

    /// Runs the loop until the process exits.
    pub async fn run(&mut self) {
        if self.conn.state() != ConnectionState::Connected {
            self.connect().await;
        }
        loop {
            self.tick().await;
        }
    }

    /// Publishes a measurement string for a virtual channel.
    pub async fn publish_measurement(
        &mut self,
        channel: u32,
        ty: Option<&str>,
        unit: Option<&str>,
        value: &str,
    ) {
        self.publish_raw(TopicKind::Data, Channel::Id(channel), ty, unit, value).await;
    }

    /// Publishes a numeric measurement at three decimals.
    pub async fn virtual_write(&mut self, channel: u32, value: f64, ty: &str, unit: &str) {
        let mut rendered = ValueList::new();
        rendered.push(value, 3);
        self.publish_raw(TopicKind::Data, Channel::Id(channel), Some(ty), Some(unit), rendered.as_str())
            .await;
    }

    pub async fn celsius_write(&mut self, channel: u32, value: f64) {
        self.virtual_write(channel, value, types::TYPE_TEMPERATURE, types::UNIT_CELSIUS).await;
    }

    pub async fn fahrenheit_write(&mut self, channel: u32, value: f64) {
        self.virtual_write(channel, value, types::TYPE_TEMPERATURE, types::UNIT_FAHRENHEIT).await;
    }

    pub async fn kelvin_write(&mut self, channel: u32, value: f64) {
        self.virtual_write(channel, value, types::TYPE_TEMPERATURE, types::UNIT_KELVIN).await;
    }

    pub async fn lux_write(&mut self, channel: u32, value: f64) {
        self.virtual_write(channel, value, types::TYPE_LUMINOSITY, types::UNIT_LUX).await;
    }

    pub async fn pascal_write(&mut self, channel: u32, value: f64) {
        self.virtual_write(channel, value, types::TYPE_BAROMETRIC_PRESSURE, types::UNIT_PASCAL).await;
    }

    pub async fn hectopascal_write(&mut self, channel: u32, value: f64) {
        self.virtual_write(channel, value, types::TYPE_BAROMETRIC_PRESSURE, types::UNIT_HECTOPASCAL)
            .await;
    }

    /// Publishes a three-axis acceleration reading at one decimal each.
    pub async fn accel_write(&mut self, channel: u32, x: f64, y: f64, z: f64) {
        let mut rendered = ValueList::new();
        rendered.push(x, 1).push(y, 1).push(z, 1);
        self.publish_raw(
            TopicKind::Data,
            Channel::Id(channel),
            Some(types::TYPE_ACCELERATION),
            Some(types::UNIT_GRAVITY),
            rendered.as_str(),
        )
        .await;
    }

    /// Publishes a GPS fix: latitude/longitude at five decimals, altitude
    /// in meters at one.
    pub async fn gps_write(&mut self, channel: u32, latitude: f64, longitude: f64, altitude: f64) {
        let mut rendered = ValueList::new();
        rendered.push(latitude, 5).push(longitude, 5).push(altitude, 1);
        self.publish_raw(
            TopicKind::Data,
            Channel::Id(channel),
            Some(types::TYPE_GPS),
            Some(types::UNIT_METER),
            rendered.as_str(),
        )
        .await;
    }

    /// Publishes the state of a digital channel.
    pub async fn publish_digital_state(&mut self, channel: u32, level: bool) {
        self.publish_raw(
            TopicKind::Digital,
            Channel::Id(channel),
            None,
            None,
            if level { "1" } else { "0" },
        )
        .await;
    }

    /// Publishes the state of an analog channel at three decimals.
    pub async fn publish_analog_state(&mut self, channel: u32, value: f64) {
        let mut rendered = ValueList::new();
        rendered.push(value, 3);
        self.publish_raw(TopicKind::Analog, Channel::Id(channel), None, None, rendered.as_str())
            .await;
    }

    async fn publish_raw(
        &mut self,
        kind: TopicKind,
        channel: Channel,
        ty: Option<&str>,
        unit: Option<&str>,
        value: &str,
    ) {
        let built = self.ctx.topic(kind, channel).and_then(|topic| {
            self.ctx.payloads.build(ty, unit, Some(value)).map(|payload| (topic, payload))
        });
        match built {
            Ok((topic, payload)) => {
                if let Err(err) = self.conn.publish(&topic, &payload).await {
                    log::warn!("publish to {topic} failed: {err}");
                }
            }
            Err(err) => log::error!("encode for {kind:?} failed: {err}"),
        }
    }

    async fn report_virtual_channels(&mut self) {
        let due: Vec<u32> = self.banks.virtual_channels.iter().collect();
        for channel in due {
            let sample = match self.producers.get_mut(&channel) {
                Some(producer) => producer.sample(channel),
                None => {
                    log::debug!("channel {channel} enabled but has no producer");
                    None
                }
            };
            if let Some(measurement) = sample {
                self.publish_raw(
                    TopicKind::Data,
                    Channel::Id(channel),
                    measurement.ty.as_deref(),
                    measurement.unit.as_deref(),
                    &measurement.value,
                )
                .await;
            }
        }
    }

    async fn report_digital_channels(&mut self) {
        let due: Vec<u32> = self.banks.digital_channels.iter().collect();
        for channel in due {
            let level = self.dispatcher.io_mut().read_digital(channel);
            self.publish_digital_state(channel, level).await;
        }
    }

    async fn report_analog_channels(&mut self) {
        let due: Vec<u32> = self.banks.analog_channels.iter().collect();
        for channel in due {
            let value = self.dispatcher.io_mut().read_analog(channel);
            self.publish_analog_state(channel, f64::from(value)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;

    use crate::session::{Inbound, NullIo};
    use crate::Result;

    use super::*;

    struct ScriptTransport {
        connected: bool,
        fail_connects: u32,
        connect_attempts: u32,
    }

    #[async_trait]
    impl Transport for ScriptTransport {
        async fn connect(&mut self, _host: &str, _port: u16) -> Result<()> {
            self.connect_attempts += 1;
            if self.fail_connects > 0 {
                self.fail_connects -= 1;
                anyhow::bail!("connection refused");
            }
            self.connected = true;
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.connected = false;
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn read(&mut self, _buf: &mut [u8], _timeout: Duration) -> Result<usize> {
            Ok(0)
        }

        async fn write(&mut self, buf: &[u8], _timeout: Duration) -> Result<usize> {
            Ok(buf.len())
        }
    }

    #[derive(Default)]
    struct ScriptSession {
        logged_in: bool,
        drop_on_poll: bool,
        subscriptions: Vec<String>,
        published: Vec<(String, String)>,
        inbound: VecDeque<Inbound>,
    }

    #[async_trait]
    impl Session<ScriptTransport> for ScriptSession {
        async fn login(
            &mut self,
            link: &mut ScriptTransport,
            _credentials: &Credentials,
        ) -> Result<()> {
            if !link.is_connected() {
                anyhow::bail!("transport is down");
            }
            self.logged_in = true;
            Ok(())
        }

        async fn logout(&mut self, _link: &mut ScriptTransport) {
            self.logged_in = false;
        }

        async fn subscribe(&mut self, _link: &mut ScriptTransport, filter: &str) -> Result<()> {
            self.subscriptions.push(filter.to_string());
            Ok(())
        }

        async fn publish(
            &mut self,
            _link: &mut ScriptTransport,
            topic: &str,
            payload: &str,
        ) -> Result<()> {
            self.published.push((topic.to_string(), payload.to_string()));
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.logged_in
        }

        async fn poll(
            &mut self,
            _link: &mut ScriptTransport,
            _timeout: Duration,
        ) -> Result<Option<Inbound>> {
            if self.drop_on_poll {
                self.drop_on_poll = false;
                self.logged_in = false;
            }
            Ok(self.inbound.pop_front())
        }
    }

    type TestClient = Client<ScriptTransport, ScriptSession, NullIo>;

    fn inbound(topic: &str, payload: &str) -> Inbound {
        Inbound { topic: topic.into(), payload: payload.into() }
    }

    fn client(fail_connects: u32, messages: Vec<Inbound>) -> TestClient {
        let endpoint = Endpoint { host: "broker.test".into(), port: 1883 };
        let credentials = Credentials {
            username: "user1".into(),
            password: "secret".into(),
            client_id: "dev1".into(),
        };
        let device =
            DeviceInfo { model: "bench".into(), cpu_model: "riscv".into(), cpu_speed_hz: 160_000_000 };
        let transport =
            ScriptTransport { connected: false, fail_connects, connect_attempts: 0 };
        let session = ScriptSession { inbound: messages.into(), ..Default::default() };
        Client::new(endpoint, credentials, device, transport, session, NullIo).with_options(
            ClientOptions {
                poll_timeout: Duration::from_millis(1),
                reconnect_backoff: Duration::from_millis(1),
                ..ClientOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn test_connect_retries_then_subscribes_and_announces() {
        let mut client = client(2, Vec::new());
        client.connect().await;

        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(client.connection().transport().connect_attempts, 3);

        let session = client.connection().session();
        assert_eq!(
            session.subscriptions,
            vec![
                "v1/user1/things/dev1/cmd/+",
                "v1/user1/things/dev1/conf/+",
                "v1/user1/things/dev1/digital/cmd/+",
                "v1/user1/things/dev1/digital/conf/+",
                "v1/user1/things/dev1/analog/cmd/+",
                "v1/user1/things/dev1/analog/conf/+",
            ]
        );
        assert_eq!(
            session.published,
            vec![
                ("v1/user1/things/dev1/sys/model".to_string(), "bench".to_string()),
                ("v1/user1/things/dev1/sys/cpu/model".to_string(), "riscv".to_string()),
                ("v1/user1/things/dev1/sys/cpu/speed".to_string(), "160000000".to_string()),
                ("v1/user1/things/dev1/sys/version".to_string(), "v1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_tick_answers_unhandled_command() {
        let mut client = client(0, vec![inbound("v1/user1/things/dev1/cmd/4", "id123,=0.750")]);
        client.connect().await;
        client.tick().await;

        let responses: Vec<_> = client
            .connection()
            .session()
            .published
            .iter()
            .filter(|(topic, _)| topic == "v1/user1/things/dev1/response")
            .collect();
        assert_eq!(
            responses,
            vec![&(
                "v1/user1/things/dev1/response".to_string(),
                "error,id123=Incorrect parameter".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_config_drives_periodic_reporting() {
        let mut client = client(
            0,
            vec![
                inbound("v1/user1/things/dev1/conf/4", "on"),
                inbound("v1/user1/things/dev1/conf/4", "xyz"),
                inbound("v1/user1/things/dev1/conf/4", "off"),
            ],
        );
        client.register_producer(4, |_channel: u32| -> Option<Measurement> {
            Some(Measurement::typed("temp", "c", "21.500"))
        });
        client.connect().await;

        client.tick().await;
        assert!(client.banks().virtual_channels.is_enabled(4));
        let reports = |client: &TestClient| {
            client
                .connection()
                .session()
                .published
                .iter()
                .filter(|(topic, _)| topic == "v1/user1/things/dev1/data/4")
                .count()
        };
        assert_eq!(reports(&client), 1);
        assert_eq!(
            client.connection().session().published.last().unwrap().1,
            "temp,c=21.500"
        );

        // Unknown token: state unchanged, channel still reports.
        client.tick().await;
        assert!(client.banks().virtual_channels.is_enabled(4));
        assert_eq!(reports(&client), 2);

        client.tick().await;
        assert!(!client.banks().virtual_channels.is_enabled(4));
        assert_eq!(reports(&client), 2);
    }

    #[tokio::test]
    async fn test_reports_follow_category_then_channel_order() {
        let mut client = client(
            0,
            vec![
                inbound("v1/user1/things/dev1/conf/4", "on"),
                inbound("v1/user1/things/dev1/conf/2", "on"),
                inbound("v1/user1/things/dev1/digital/conf/9", "on"),
                inbound("v1/user1/things/dev1/analog/conf/1", "on"),
            ],
        );
        client.register_producer(2, |_channel: u32| -> Option<Measurement> {
            Some(Measurement::raw("a"))
        });
        client.register_producer(4, |_channel: u32| -> Option<Measurement> {
            Some(Measurement::raw("b"))
        });
        client.connect().await;
        for _ in 0..4 {
            client.tick().await;
        }

        client.connection_mut().session_mut().published.clear();
        client.tick().await;
        let topics: Vec<_> = client
            .connection()
            .session()
            .published
            .iter()
            .map(|(topic, _)| topic.as_str())
            .collect();
        assert_eq!(
            topics,
            vec![
                "v1/user1/things/dev1/data/2",
                "v1/user1/things/dev1/data/4",
                "v1/user1/things/dev1/digital/9",
                "v1/user1/things/dev1/analog/1",
            ]
        );
    }

    #[tokio::test]
    async fn test_dropped_session_reconnects_and_resubscribes() {
        let mut client = client(0, Vec::new());
        client.connect().await;
        assert_eq!(client.connection().session().subscriptions.len(), 6);

        client.connection_mut().session_mut().drop_on_poll = true;
        client.tick().await;

        assert_eq!(client.state(), ConnectionState::Connected);
        assert!(client.connection().is_alive());
        assert_eq!(client.connection().session().subscriptions.len(), 12);
    }

    #[tokio::test]
    async fn test_typed_writers_render_wire_payloads() {
        let mut client = client(0, Vec::new());
        client.connect().await;
        client.connection_mut().session_mut().published.clear();

        client.celsius_write(4, 21.5).await;
        client.accel_write(5, 1.0, -2.0, 0.25).await;
        client.gps_write(6, 44.968_05, -93.223_58, 252.0).await;
        client.publish_digital_state(7, true).await;
        client.publish_analog_state(8, 0.75).await;

        assert_eq!(
            client.connection().session().published,
            vec![
                ("v1/user1/things/dev1/data/4".to_string(), "temp,c=21.500".to_string()),
                ("v1/user1/things/dev1/data/5".to_string(), "accel,g=1.0,-2.0,0.2".to_string()),
                (
                    "v1/user1/things/dev1/data/6".to_string(),
                    "gps,m=44.96805,-93.22358,252.0".to_string()
                ),
                ("v1/user1/things/dev1/digital/7".to_string(), "1".to_string()),
                ("v1/user1/things/dev1/analog/8".to_string(), "0.750".to_string()),
            ]
        );
    }
}
