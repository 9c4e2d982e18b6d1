#![deny(unsafe_code)]

//! Settings for a thingwire device process.
//!
//! Sources, in ascending precedence: `/etc/thingwire/thingwire.toml`, a
//! `thingwire.toml` next to the binary, `THINGWIRE_*` environment
//! variables, and an explicit file handed to [`Settings::load`]. The
//! result is an explicit value passed down to the client; nothing is
//! stored globally.

use std::time::Duration;

use config::{Config, File};
use serde::de::{self, Deserializer};
use serde::Deserialize;

use thingwire::client::{ClientOptions, DeviceInfo};
use thingwire::connection::Endpoint;
use thingwire::session::Credentials;
use thingwire::Result;

pub mod logging;

pub use logging::Log;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub broker: Broker,
    #[serde(default)]
    pub device: Device,
    #[serde(default)]
    pub client: Client,
    #[serde(default)]
    pub log: Log,
}

impl Settings {
    /// Loads settings from the standard sources plus an optional explicit
    /// file.
    pub fn load(cfg_name: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::with_name("/etc/thingwire/thingwire").required(false))
            .add_source(File::with_name("thingwire").required(false))
            .add_source(config::Environment::with_prefix("thingwire").try_parsing(true));
        if let Some(cfg_name) = cfg_name {
            builder = builder.add_source(File::with_name(cfg_name).required(false));
        }
        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint { host: self.broker.host.clone().into(), port: self.broker.port }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.device.username.clone().into(),
            password: self.device.password.clone().into(),
            client_id: self.device.client_id.clone().into(),
        }
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            model: self.device.model.clone().into(),
            cpu_model: self.device.cpu_model.clone().into(),
            cpu_speed_hz: self.device.cpu_speed_hz,
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            poll_timeout: self.client.poll_timeout,
            reconnect_backoff: self.client.reconnect_backoff,
            channel_words: self.client.channel_words,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Broker {
    #[serde(default = "Broker::host_default")]
    pub host: String,
    #[serde(default = "Broker::port_default")]
    pub port: u16,
}

impl Default for Broker {
    #[inline]
    fn default() -> Self {
        Self { host: Self::host_default(), port: Self::port_default() }
    }
}

impl Broker {
    fn host_default() -> String {
        "mqtt.thingwire.io".into()
    }
    fn port_default() -> u16 {
        1883
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "Device::descriptor_default")]
    pub model: String,
    #[serde(default = "Device::descriptor_default")]
    pub cpu_model: String,
    #[serde(default)]
    pub cpu_speed_hz: u64,
}

impl Default for Device {
    #[inline]
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            client_id: String::new(),
            model: Self::descriptor_default(),
            cpu_model: Self::descriptor_default(),
            cpu_speed_hz: 0,
        }
    }
}

impl Device {
    fn descriptor_default() -> String {
        "unknown".into()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Client {
    #[serde(default = "Client::poll_timeout_default", deserialize_with = "deserialize_duration")]
    pub poll_timeout: Duration,
    #[serde(
        default = "Client::reconnect_backoff_default",
        deserialize_with = "deserialize_duration"
    )]
    pub reconnect_backoff: Duration,
    #[serde(default = "Client::channel_words_default")]
    pub channel_words: usize,
}

impl Default for Client {
    #[inline]
    fn default() -> Self {
        Self {
            poll_timeout: Self::poll_timeout_default(),
            reconnect_backoff: Self::reconnect_backoff_default(),
            channel_words: Self::channel_words_default(),
        }
    }
}

impl Client {
    fn poll_timeout_default() -> Duration {
        thingwire::client::DEFAULT_POLL_TIMEOUT
    }
    fn reconnect_backoff_default() -> Duration {
        thingwire::connection::DEFAULT_BACKOFF
    }
    fn channel_words_default() -> usize {
        thingwire::channels::DEFAULT_WORDS
    }
}

/// Parses `10s`, `1500ms`, `2m`, `1h30m` or a bare millisecond count.
pub fn to_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(millis) = text.parse::<u64>() {
        return Some(Duration::from_millis(millis));
    }

    let mut total = Duration::ZERO;
    let mut digits = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let count = digits.parse::<u64>().ok()?;
        digits.clear();
        let unit = match ch {
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                Duration::from_millis(1)
            }
            's' => Duration::from_secs(1),
            'm' => Duration::from_secs(60),
            'h' => Duration::from_secs(3600),
            _ => return None,
        };
        total += unit * u32::try_from(count).ok()?;
    }
    if !digits.is_empty() {
        return None;
    }
    Some(total)
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    to_duration(&text).ok_or_else(|| de::Error::custom(format!("invalid duration `{text}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.broker.host, "mqtt.thingwire.io");
        assert_eq!(settings.broker.port, 1883);
        assert_eq!(settings.client.poll_timeout, Duration::from_millis(1000));
        assert_eq!(settings.client.reconnect_backoff, Duration::from_millis(1000));
        assert_eq!(settings.client.channel_words, 4);

        let settings: Settings = toml_settings("");
        assert_eq!(settings.device.model, "unknown");
        assert_eq!(settings.device.cpu_model, "unknown");
    }

    #[test]
    fn test_sections_deserialize() {
        let settings = toml_settings(
            r#"
            [broker]
            host = "broker.example"
            port = 8883

            [device]
            username = "user1"
            client_id = "dev1"
            model = "bench"
            cpu_speed_hz = 160000000

            [client]
            poll_timeout = "250ms"
            reconnect_backoff = "2s"
            channel_words = 2
            "#,
        );
        assert_eq!(settings.broker.host, "broker.example");
        assert_eq!(settings.endpoint().port, 8883);
        assert_eq!(&*settings.credentials().client_id, "dev1");
        assert_eq!(settings.device_info().cpu_speed_hz, 160_000_000);
        assert_eq!(settings.client_options().poll_timeout, Duration::from_millis(250));
        assert_eq!(settings.client_options().reconnect_backoff, Duration::from_secs(2));
        assert_eq!(settings.client_options().channel_words, 2);
    }

    #[test]
    fn test_to_duration() {
        assert_eq!(to_duration("250"), Some(Duration::from_millis(250)));
        assert_eq!(to_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(to_duration("10s"), Some(Duration::from_secs(10)));
        assert_eq!(to_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(to_duration("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(to_duration(""), None);
        assert_eq!(to_duration("10x"), None);
        assert_eq!(to_duration("10s5"), None);
    }

    fn toml_settings(text: &str) -> Settings {
        Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }
}
