use bytestring::ByteString;

use thingwire_codec::{Channel, EncodeError, PayloadCodec, TopicCodec, TopicKind};

/// Codec state shared by every client operation.
///
/// Built once at startup and passed by reference; there is no process-wide
/// instance.
#[derive(Debug, Clone)]
pub struct Context {
    pub topics: TopicCodec,
    pub payloads: PayloadCodec,
    pub device_id: ByteString,
}

impl Context {
    pub fn new(username: impl Into<ByteString>, device_id: impl Into<ByteString>) -> Self {
        Context {
            topics: TopicCodec::new(username),
            payloads: PayloadCodec::new(),
            device_id: device_id.into(),
        }
    }

    /// Builds a concrete topic addressed to this device.
    pub fn topic(&self, kind: TopicKind, channel: Channel) -> Result<ByteString, EncodeError> {
        self.topics.build(&self.device_id, kind, channel)
    }

    /// Builds the subscription filter for one topic kind, with the
    /// all-channels wildcard where the kind carries a channel.
    pub fn filter(&self, kind: TopicKind) -> Result<ByteString, EncodeError> {
        let channel = if kind.takes_channel() { Channel::All } else { Channel::None };
        self.topics.build(&self.device_id, kind, channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_and_filter() {
        let ctx = Context::new("user1", "dev1");
        assert_eq!(
            &*ctx.topic(TopicKind::Data, Channel::Id(7)).unwrap(),
            "v1/user1/things/dev1/data/7"
        );
        assert_eq!(&*ctx.filter(TopicKind::Command).unwrap(), "v1/user1/things/dev1/cmd/+");
        assert_eq!(&*ctx.filter(TopicKind::SysModel).unwrap(), "v1/user1/things/dev1/sys/model");
    }
}
