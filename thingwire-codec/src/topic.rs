use bytes::BytesMut;
use bytestring::ByteString;
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, EncodeError};

/// Protocol version segment leading every topic.
pub const PROTOCOL_VERSION: &str = "v1";

/// Fixed marker between the owning identity and the device id.
const THINGS_MARKER: &str = "things";

/// Default upper bound on an encoded topic, matching the broker's limit.
pub const DEFAULT_MAX_TOPIC_LEN: usize = 128;

/// The closed set of topic categories a device speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopicKind {
    /// Actuator command aimed at a virtual channel.
    Command,
    /// Enable/disable of periodic reporting for a virtual channel.
    Config,
    /// Measurement report for a virtual channel.
    Data,
    /// Command acknowledgement correlated by message id.
    Response,
    /// Device model descriptor.
    SysModel,
    /// Protocol version descriptor.
    SysVersion,
    /// CPU model descriptor.
    SysCpuModel,
    /// CPU clock speed descriptor.
    SysCpuSpeed,
    /// State report for a digital pin channel.
    Digital,
    DigitalCommand,
    DigitalConfig,
    /// State report for an analog pin channel.
    Analog,
    AnalogCommand,
    AnalogConfig,
}

impl TopicKind {
    /// Suffix priority for inbound topic classification. More specific
    /// suffixes come first so `digital/cmd/3` never classifies as `digital`
    /// with a junk channel.
    pub const PARSE_ORDER: [TopicKind; 14] = [
        TopicKind::Command,
        TopicKind::Config,
        TopicKind::AnalogCommand,
        TopicKind::AnalogConfig,
        TopicKind::DigitalCommand,
        TopicKind::DigitalConfig,
        TopicKind::Digital,
        TopicKind::Analog,
        TopicKind::Data,
        TopicKind::Response,
        TopicKind::SysModel,
        TopicKind::SysVersion,
        TopicKind::SysCpuModel,
        TopicKind::SysCpuSpeed,
    ];

    /// The fixed literal this kind contributes to a topic.
    pub const fn suffix(self) -> &'static str {
        match self {
            TopicKind::Command => "cmd",
            TopicKind::Config => "conf",
            TopicKind::Data => "data",
            TopicKind::Response => "response",
            TopicKind::SysModel => "sys/model",
            TopicKind::SysVersion => "sys/version",
            TopicKind::SysCpuModel => "sys/cpu/model",
            TopicKind::SysCpuSpeed => "sys/cpu/speed",
            TopicKind::Digital => "digital",
            TopicKind::DigitalCommand => "digital/cmd",
            TopicKind::DigitalConfig => "digital/conf",
            TopicKind::Analog => "analog",
            TopicKind::AnalogCommand => "analog/cmd",
            TopicKind::AnalogConfig => "analog/conf",
        }
    }

    /// The suffix pattern used to classify inbound topics of this kind.
    pub const fn filter_suffix(self) -> &'static str {
        match self {
            TopicKind::Command => "cmd/+",
            TopicKind::Config => "conf/+",
            TopicKind::Data => "data/+",
            TopicKind::Response => "response",
            TopicKind::SysModel => "sys/model",
            TopicKind::SysVersion => "sys/version",
            TopicKind::SysCpuModel => "sys/cpu/model",
            TopicKind::SysCpuSpeed => "sys/cpu/speed",
            TopicKind::Digital => "digital/+",
            TopicKind::DigitalCommand => "digital/cmd/+",
            TopicKind::DigitalConfig => "digital/conf/+",
            TopicKind::Analog => "analog/+",
            TopicKind::AnalogCommand => "analog/cmd/+",
            TopicKind::AnalogConfig => "analog/conf/+",
        }
    }

    /// Whether topics of this kind carry a trailing channel segment.
    pub const fn takes_channel(self) -> bool {
        !matches!(
            self,
            TopicKind::Response
                | TopicKind::SysModel
                | TopicKind::SysVersion
                | TopicKind::SysCpuModel
                | TopicKind::SysCpuSpeed
        )
    }
}

/// Channel designator within a topic.
///
/// `None` is the device-wide sentinel, `All` the subscription wildcard.
/// `All` never appears in a concrete publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    None,
    All,
    Id(u32),
}

impl Channel {
    #[inline]
    pub fn id(self) -> Option<u32> {
        match self {
            Channel::Id(id) => Some(id),
            _ => None,
        }
    }
}

/// A fully classified topic: kind, channel and the device it addresses.
///
/// `decode(build(t)) == t` holds for every representable `Topic`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic {
    pub kind: TopicKind,
    pub channel: Channel,
    pub device_id: ByteString,
}

/// Builds and parses topic strings for one owning identity.
///
/// The scheme is `v1/<identity>/things/<device>/<suffix>[/<channel>]`.
/// Identity comparison on parse is exact: case sensitive, no normalization.
#[derive(Debug, Clone)]
pub struct TopicCodec {
    username: ByteString,
    max_len: usize,
}

impl TopicCodec {
    pub fn new(username: impl Into<ByteString>) -> Self {
        TopicCodec { username: username.into(), max_len: DEFAULT_MAX_TOPIC_LEN }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    #[inline]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Exact byte length `build` would produce, computable before writing.
    pub fn encoded_len(&self, device_id: &str, kind: TopicKind, channel: Channel) -> usize {
        let mut n = PROTOCOL_VERSION.len()
            + 1
            + self.username.len()
            + 1
            + THINGS_MARKER.len()
            + 1
            + device_id.len()
            + 1
            + kind.suffix().len();
        match channel {
            Channel::None => {}
            Channel::All => n += 2,
            Channel::Id(id) => n += 1 + itoa::Buffer::new().format(id).len(),
        }
        n
    }

    /// Builds the topic string, or fails before writing anything if the
    /// exact length exceeds the configured maximum.
    pub fn build(
        &self,
        device_id: &str,
        kind: TopicKind,
        channel: Channel,
    ) -> Result<ByteString, EncodeError> {
        let required = self.encoded_len(device_id, kind, channel);
        if required > self.max_len {
            return Err(EncodeError::BufferTooSmall { required, capacity: self.max_len });
        }
        let mut topic = String::with_capacity(required);
        topic.push_str(PROTOCOL_VERSION);
        topic.push('/');
        topic.push_str(&self.username);
        topic.push('/');
        topic.push_str(THINGS_MARKER);
        topic.push('/');
        topic.push_str(device_id);
        topic.push('/');
        topic.push_str(kind.suffix());
        match channel {
            Channel::None => {}
            Channel::All => topic.push_str("/+"),
            Channel::Id(id) => {
                topic.push('/');
                topic.push_str(itoa::Buffer::new().format(id));
            }
        }
        debug_assert_eq!(topic.len(), required);
        Ok(ByteString::from(topic))
    }

    /// Appends the built topic to `dst`. Writes nothing on failure.
    pub fn encode(
        &self,
        dst: &mut BytesMut,
        device_id: &str,
        kind: TopicKind,
        channel: Channel,
    ) -> Result<usize, EncodeError> {
        let topic = self.build(device_id, kind, channel)?;
        dst.extend_from_slice(topic.as_bytes());
        Ok(topic.len())
    }

    /// Classifies an inbound topic string.
    ///
    /// The version, identity and `things` marker must match exactly, the
    /// device id is the next segment, and the remaining suffix is matched
    /// against [`TopicKind::PARSE_ORDER`]; the first match wins. The channel
    /// segment of channel-bearing kinds must be plain decimal with no
    /// leading zero and fit in a `u32`.
    pub fn decode(&self, topic: &str) -> Result<Topic, DecodeError> {
        let rest = strip_segment(topic, PROTOCOL_VERSION)?;
        let rest = strip_segment(rest, &self.username)?;
        let rest = strip_segment(rest, THINGS_MARKER)?;
        let (device_id, suffix) = rest.split_once('/').ok_or(DecodeError::Malformed)?;
        if device_id.is_empty() {
            return Err(DecodeError::Malformed);
        }

        let kind = TopicKind::PARSE_ORDER
            .into_iter()
            .find(|kind| matches(kind.filter_suffix(), suffix))
            .ok_or(DecodeError::UnknownTopic)?;

        let channel = if kind.takes_channel() {
            let segment = suffix.rsplit_once('/').map(|(_, s)| s).unwrap_or(suffix);
            Channel::Id(parse_channel(segment)?)
        } else {
            Channel::None
        };

        Ok(Topic { kind, channel, device_id: ByteString::from(device_id) })
    }
}

fn strip_segment<'a>(topic: &'a str, segment: &str) -> Result<&'a str, DecodeError> {
    topic
        .strip_prefix(segment)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or(DecodeError::Malformed)
}

fn parse_channel(segment: &str) -> Result<u32, DecodeError> {
    if segment.is_empty()
        || (segment.len() > 1 && segment.starts_with('0'))
        || !segment.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(DecodeError::InvalidChannel);
    }
    segment.parse::<u32>().map_err(|_| DecodeError::InvalidChannel)
}

/// Checks a topic filter against a concrete topic name.
///
/// `+` matches exactly one `/`-delimited segment, including an empty one;
/// `#` matches all remaining segments, including none; any other segment
/// matches only identical text. Evaluation is left to right and stops at
/// the first mismatch.
pub fn matches(filter: &str, topic: &str) -> bool {
    let mut levels = topic.split('/');
    for pattern in filter.split('/') {
        if pattern == "#" {
            return true;
        }
        match levels.next() {
            Some(level) if pattern == "+" || pattern == level => {}
            _ => return false,
        }
    }
    levels.next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TopicCodec {
        TopicCodec::new("user1")
    }

    #[test]
    fn test_build() {
        assert_eq!(
            &*codec().build("dev1", TopicKind::Command, Channel::Id(4)).unwrap(),
            "v1/user1/things/dev1/cmd/4"
        );
        assert_eq!(
            &*codec().build("dev1", TopicKind::Config, Channel::All).unwrap(),
            "v1/user1/things/dev1/conf/+"
        );
        assert_eq!(
            &*codec().build("dev1", TopicKind::SysCpuSpeed, Channel::None).unwrap(),
            "v1/user1/things/dev1/sys/cpu/speed"
        );
        assert_eq!(
            &*codec().build("dev1", TopicKind::DigitalCommand, Channel::Id(0)).unwrap(),
            "v1/user1/things/dev1/digital/cmd/0"
        );
    }

    #[test]
    fn test_build_length_check() {
        let tight = TopicCodec::new("user1").with_max_len(26);
        assert!(tight.build("dev1", TopicKind::Command, Channel::Id(4)).is_ok());
        assert_eq!(
            tight.build("dev1", TopicKind::Command, Channel::Id(42)).unwrap_err(),
            EncodeError::BufferTooSmall { required: 27, capacity: 26 }
        );

        let codec = codec();
        let topic = codec.build("dev1", TopicKind::Analog, Channel::Id(u32::MAX)).unwrap();
        assert_eq!(
            topic.len(),
            codec.encoded_len("dev1", TopicKind::Analog, Channel::Id(u32::MAX))
        );
    }

    #[test]
    fn test_decode() {
        let topic = codec().decode("v1/user1/things/dev1/cmd/4").unwrap();
        assert_eq!(
            topic,
            Topic { kind: TopicKind::Command, channel: Channel::Id(4), device_id: "dev1".into() }
        );

        let topic = codec().decode("v1/user1/things/dev1/sys/model").unwrap();
        assert_eq!(topic.kind, TopicKind::SysModel);
        assert_eq!(topic.channel, Channel::None);
    }

    #[test]
    fn test_decode_rejects_foreign_topics() {
        assert_eq!(codec().decode("v2/user1/things/dev1/cmd/4"), Err(DecodeError::Malformed));
        assert_eq!(codec().decode("v1/user2/things/dev1/cmd/4"), Err(DecodeError::Malformed));
        assert_eq!(codec().decode("v1/User1/things/dev1/cmd/4"), Err(DecodeError::Malformed));
        assert_eq!(codec().decode("v1/user1/stuff/dev1/cmd/4"), Err(DecodeError::Malformed));
        assert_eq!(codec().decode("v1/user1/things/dev1"), Err(DecodeError::Malformed));
        assert_eq!(codec().decode("v1/user1/things/dev1/bogus/4"), Err(DecodeError::UnknownTopic));
        assert_eq!(codec().decode("v1/user1/things/dev1/cmd"), Err(DecodeError::UnknownTopic));
    }

    #[test]
    fn test_decode_channel_digits() {
        let codec = codec();
        assert_eq!(
            codec.decode("v1/user1/things/dev1/cmd/0").unwrap().channel,
            Channel::Id(0)
        );
        assert_eq!(
            codec.decode("v1/user1/things/dev1/cmd/123").unwrap().channel,
            Channel::Id(123)
        );
        assert_eq!(codec.decode("v1/user1/things/dev1/cmd/01"), Err(DecodeError::InvalidChannel));
        assert_eq!(codec.decode("v1/user1/things/dev1/cmd/"), Err(DecodeError::InvalidChannel));
        assert_eq!(codec.decode("v1/user1/things/dev1/cmd/4a"), Err(DecodeError::InvalidChannel));
        assert_eq!(codec.decode("v1/user1/things/dev1/cmd/-1"), Err(DecodeError::InvalidChannel));
        assert_eq!(
            codec.decode("v1/user1/things/dev1/cmd/4294967295").unwrap().channel,
            Channel::Id(u32::MAX)
        );
        assert_eq!(
            codec.decode("v1/user1/things/dev1/cmd/4294967296"),
            Err(DecodeError::InvalidChannel)
        );
    }

    #[test]
    fn test_suffix_priority() {
        let codec = codec();
        assert_eq!(
            codec.decode("v1/user1/things/dev1/digital/cmd/3").unwrap().kind,
            TopicKind::DigitalCommand
        );
        assert_eq!(
            codec.decode("v1/user1/things/dev1/digital/7").unwrap().kind,
            TopicKind::Digital
        );
        assert_eq!(
            codec.decode("v1/user1/things/dev1/analog/conf/2").unwrap().kind,
            TopicKind::AnalogConfig
        );
    }

    #[test]
    fn test_round_trip_all_kinds() {
        let codec = codec();
        for kind in TopicKind::PARSE_ORDER {
            let channel = if kind.takes_channel() { Channel::Id(35) } else { Channel::None };
            let built = codec.build("dev1", kind, channel).unwrap();
            let parsed = codec.decode(&built).unwrap();
            assert_eq!(parsed, Topic { kind, channel, device_id: "dev1".into() });
        }
    }

    #[test]
    fn test_matches() {
        assert!(matches("+/b", "a/b"));
        assert!(!matches("+/b", "a/c/b"));
        assert!(matches("#", "a/b/c"));
        assert!(!matches("a/+", "a"));
        assert!(matches("a/+", "a/"));
        assert!(matches("a/#", "a"));
        assert!(matches("a/#", "a/b/c"));
        assert!(matches("cmd/+", "cmd/4"));
        assert!(!matches("cmd/+", "cmd/4/5"));
        assert!(!matches("cmd/+", "conf/4"));
        assert!(matches("sys/cpu/model", "sys/cpu/model"));
        assert!(!matches("sys/cpu/model", "sys/cpu/speed"));
    }
}
