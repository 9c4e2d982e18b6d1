//! Routing of classified inbound messages.
//!
//! The dispatcher owns the per-channel command handlers and the pin
//! backend, but performs no publishing itself: every call returns the list
//! of messages to send, in order, and the caller puts them on the wire.
//! That keeps dispatch decisions synchronous and directly testable.

use std::collections::HashMap;

use bytestring::ByteString;

use thingwire_codec::{Channel, Fields, TopicKind};

use crate::channels::{Category, ChannelBanks};
use crate::context::Context;
use crate::session::{ChannelIo, Inbound};

/// Fixed error text reported for commands the device cannot apply.
pub const ERROR_INCORRECT_PARAM: &str = "Incorrect parameter";

const CONFIG_ON: &str = "on";
const CONFIG_OFF: &str = "off";

/// A message produced while handling an inbound one, ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub topic: ByteString,
    pub payload: ByteString,
}

/// An inbound command aimed at one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub channel: u32,
    pub id: Option<ByteString>,
    pub unit: Option<ByteString>,
    pub value: ByteString,
}

/// Application logic for commands on one channel.
///
/// An `Err` carries the text reported back to the sender; the value is
/// only echoed as the channel's new state on `Ok`.
pub trait CommandHandler: Send {
    fn handle(&mut self, command: &Command) -> Result<(), String>;
}

impl<F> CommandHandler for F
where
    F: FnMut(&Command) -> Result<(), String> + Send,
{
    fn handle(&mut self, command: &Command) -> Result<(), String> {
        self(command)
    }
}

/// The stock default: a channel nobody registered cannot apply anything.
struct RejectCommand;

impl CommandHandler for RejectCommand {
    fn handle(&mut self, _command: &Command) -> Result<(), String> {
        Err(ERROR_INCORRECT_PARAM.to_string())
    }
}

/// Routes parsed inbound messages to handlers and the channel banks.
pub struct Dispatcher<Io> {
    handlers: HashMap<u32, Box<dyn CommandHandler>>,
    default_handler: Box<dyn CommandHandler>,
    io: Io,
}

impl<Io: ChannelIo> Dispatcher<Io> {
    pub fn new(io: Io) -> Self {
        Dispatcher { handlers: HashMap::new(), default_handler: Box::new(RejectCommand), io }
    }

    /// Registers the handler for one virtual channel, replacing any
    /// previous registration.
    pub fn register(&mut self, channel: u32, handler: impl CommandHandler + 'static) {
        self.handlers.insert(channel, Box::new(handler));
    }

    /// Replaces the handler used for channels with no registration.
    pub fn set_default(&mut self, handler: impl CommandHandler + 'static) {
        self.default_handler = Box::new(handler);
    }

    pub fn io_mut(&mut self) -> &mut Io {
        &mut self.io
    }

    /// Routes one raw inbound message. Unparseable or unroutable messages
    /// are logged and dropped; command messages always produce exactly one
    /// response when they carry a correlation id.
    pub fn dispatch(
        &mut self,
        ctx: &Context,
        inbound: &Inbound,
        banks: &mut ChannelBanks,
    ) -> Vec<Outbound> {
        let topic = match ctx.topics.decode(&inbound.topic) {
            Ok(topic) => topic,
            Err(err) => {
                log::debug!("dropping message on {:?}: {err}", inbound.topic);
                return Vec::new();
            }
        };
        let fields = match ctx.payloads.decode(topic.kind, &inbound.payload) {
            Ok(fields) => fields,
            Err(err) => {
                log::debug!("dropping {:?} payload: {err}", topic.kind);
                return Vec::new();
            }
        };

        match topic.kind {
            TopicKind::Command => self.command(ctx, topic.channel, &fields),
            TopicKind::DigitalCommand => self.digital_command(ctx, topic.channel, &fields),
            TopicKind::AnalogCommand => self.analog_command(ctx, topic.channel, &fields),
            TopicKind::Config => config(banks, Category::Virtual, topic.channel, fields.value),
            TopicKind::DigitalConfig => config(banks, Category::Digital, topic.channel, fields.value),
            TopicKind::AnalogConfig => config(banks, Category::Analog, topic.channel, fields.value),
            other => {
                log::debug!("no route for inbound {other:?} message");
                Vec::new()
            }
        }
    }

    fn command(&mut self, ctx: &Context, channel: Channel, fields: &Fields<'_>) -> Vec<Outbound> {
        let Some(channel) = channel.id() else {
            log::debug!("command without a channel");
            return Vec::new();
        };
        let mut out = Vec::new();
        if fields.value.is_empty() {
            push_response(ctx, &mut out, fields.id, Some(ERROR_INCORRECT_PARAM));
            return out;
        }

        let command = Command {
            channel,
            id: fields.id.map(ByteString::from),
            unit: fields.unit.map(ByteString::from),
            value: ByteString::from(fields.value),
        };
        let result = match self.handlers.get_mut(&channel) {
            Some(handler) => handler.handle(&command),
            None => self.default_handler.handle(&command),
        };
        match result {
            Ok(()) => {
                // The accepted value becomes the channel's reported state.
                push_state(ctx, &mut out, TopicKind::Data, channel, fields.value);
                push_response(ctx, &mut out, fields.id, None);
            }
            Err(text) => push_response(ctx, &mut out, fields.id, Some(&text)),
        }
        out
    }

    fn digital_command(
        &mut self,
        ctx: &Context,
        channel: Channel,
        fields: &Fields<'_>,
    ) -> Vec<Outbound> {
        let Some(channel) = channel.id() else {
            log::debug!("digital command without a channel");
            return Vec::new();
        };
        let mut out = Vec::new();
        let error = match fields.value {
            "0" => {
                self.io.write_digital(channel, false);
                push_state(ctx, &mut out, TopicKind::Digital, channel, "0");
                None
            }
            "1" => {
                self.io.write_digital(channel, true);
                push_state(ctx, &mut out, TopicKind::Digital, channel, "1");
                None
            }
            _ => Some(ERROR_INCORRECT_PARAM),
        };
        push_response(ctx, &mut out, fields.id, error);
        out
    }

    fn analog_command(
        &mut self,
        ctx: &Context,
        channel: Channel,
        fields: &Fields<'_>,
    ) -> Vec<Outbound> {
        let Some(channel) = channel.id() else {
            log::debug!("analog command without a channel");
            return Vec::new();
        };
        let mut out = Vec::new();
        let error = match fields.value.parse::<f32>() {
            Ok(value) if (0.0..=1.0).contains(&value) => {
                self.io.write_analog(channel, value);
                push_state(ctx, &mut out, TopicKind::Analog, channel, fields.value);
                None
            }
            _ => Some(ERROR_INCORRECT_PARAM),
        };
        push_response(ctx, &mut out, fields.id, error);
        out
    }
}

/// Applies a config message to the matching channel bank. Anything but the
/// exact on/off vocabulary is a no-op, not a protocol violation.
fn config(
    banks: &mut ChannelBanks,
    category: Category,
    channel: Channel,
    value: &str,
) -> Vec<Outbound> {
    let Some(channel) = channel.id() else {
        log::debug!("config without a channel");
        return Vec::new();
    };
    match value {
        CONFIG_ON => banks.bank_mut(category).enable(channel, true),
        CONFIG_OFF => banks.bank_mut(category).enable(channel, false),
        other => log::debug!("ignoring config token {other:?} for channel {channel}"),
    }
    Vec::new()
}

fn push_state(ctx: &Context, out: &mut Vec<Outbound>, kind: TopicKind, channel: u32, value: &str) {
    let built = ctx.topic(kind, Channel::Id(channel)).and_then(|topic| {
        ctx.payloads.build(None, None, Some(value)).map(|payload| (topic, payload))
    });
    match built {
        Ok((topic, payload)) => out.push(Outbound { topic, payload }),
        Err(err) => log::error!("state encode for channel {channel} failed: {err}"),
    }
}

fn push_response(ctx: &Context, out: &mut Vec<Outbound>, id: Option<&str>, error: Option<&str>) {
    let Some(id) = id else {
        log::debug!("command without a correlation id, response suppressed");
        return;
    };
    let built = ctx.topic(TopicKind::Response, Channel::None).and_then(|topic| {
        ctx.payloads.build_response(id, error).map(|payload| (topic, payload))
    });
    match built {
        Ok((topic, payload)) => out.push(Outbound { topic, payload }),
        Err(err) => log::error!("response encode for {id} failed: {err}"),
    }
}
