//! Cross-context messaging reports: postMessage, custom events, message
//! channels and broadcast channels.
//!
//! Receiving reports may name the sending context in `sourcehierarchy`; the
//! exchange is then drawn as an edge from sender to receiver.

use super::{ContextState, FieldSpec, Fields, MESSAGING_COLOR, Processor, note_for};
use crate::diagram::{Arrow, LogEntry};
use crate::{DistinctError, Report};

/// Kind of messaging event observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagingEvent {
    AddEventListener,
    RemoveEventListener,
    PostMessageReceived,
    CustomEventNew,
    CustomEventReceived,
    MessageChannelNew,
    ChannelMessageReceived,
    BroadcastChannelNew,
    BroadcastMessageSent,
    BroadcastMessageReceived,
}

const LISTENER: &[FieldSpec] = &[
    FieldSpec::req("type", "Type"),
    FieldSpec::opt("callback", "Callback"),
];

const POST_MESSAGE: &[FieldSpec] = &[
    FieldSpec::req("data", "Data"),
    FieldSpec::opt("origin", "Origin"),
];

const CUSTOM_EVENT: &[FieldSpec] = &[
    FieldSpec::req("type", "Type"),
    FieldSpec::opt("detail", "Detail"),
];

const CHANNEL_NEW: &[FieldSpec] = &[FieldSpec::opt("channel", "Channel")];

const CHANNEL_MESSAGE: &[FieldSpec] = &[FieldSpec::req("data", "Data")];

const BROADCAST_NEW: &[FieldSpec] = &[FieldSpec::req("name", "Name")];

const BROADCAST_MESSAGE: &[FieldSpec] = &[
    FieldSpec::req("name", "Name"),
    FieldSpec::req("data", "Data"),
];

impl MessagingEvent {
    pub const ALL: [MessagingEvent; 10] = [
        MessagingEvent::AddEventListener,
        MessagingEvent::RemoveEventListener,
        MessagingEvent::PostMessageReceived,
        MessagingEvent::CustomEventNew,
        MessagingEvent::CustomEventReceived,
        MessagingEvent::MessageChannelNew,
        MessagingEvent::ChannelMessageReceived,
        MessagingEvent::BroadcastChannelNew,
        MessagingEvent::BroadcastMessageSent,
        MessagingEvent::BroadcastMessageReceived,
    ];

    #[must_use]
    pub const fn discriminators(self) -> &'static [&'static str] {
        match self {
            MessagingEvent::AddEventListener => &["addeventlistener"],
            MessagingEvent::RemoveEventListener => &["removeeventlistener"],
            MessagingEvent::PostMessageReceived => &["postmessagereceived"],
            MessagingEvent::CustomEventNew => &["customeventnew"],
            MessagingEvent::CustomEventReceived => &["customeventreceived"],
            MessagingEvent::MessageChannelNew => &["messagechannelnew"],
            MessagingEvent::ChannelMessageReceived => {
                &["channelmessagereceived", "messagechannelreceived"]
            }
            MessagingEvent::BroadcastChannelNew => &["broadcastchannelnew"],
            MessagingEvent::BroadcastMessageSent => &["broadcastmessagesent"],
            MessagingEvent::BroadcastMessageReceived => &["broadcastmessagereceived"],
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            MessagingEvent::AddEventListener => "Add Event Listener",
            MessagingEvent::RemoveEventListener => "Remove Event Listener",
            MessagingEvent::PostMessageReceived => "PostMessage Received",
            MessagingEvent::CustomEventNew => "Custom Event New",
            MessagingEvent::CustomEventReceived => "Custom Event Received",
            MessagingEvent::MessageChannelNew => "Message Channel New",
            MessagingEvent::ChannelMessageReceived => "Channel Message Received",
            MessagingEvent::BroadcastChannelNew => "Broadcast Channel New",
            MessagingEvent::BroadcastMessageSent => "Broadcast Message Sent",
            MessagingEvent::BroadcastMessageReceived => "Broadcast Message Received",
        }
    }

    const fn fields(self) -> &'static [FieldSpec] {
        match self {
            MessagingEvent::AddEventListener | MessagingEvent::RemoveEventListener => LISTENER,
            MessagingEvent::PostMessageReceived => POST_MESSAGE,
            MessagingEvent::CustomEventNew | MessagingEvent::CustomEventReceived => CUSTOM_EVENT,
            MessagingEvent::MessageChannelNew => CHANNEL_NEW,
            MessagingEvent::ChannelMessageReceived => CHANNEL_MESSAGE,
            MessagingEvent::BroadcastChannelNew => BROADCAST_NEW,
            MessagingEvent::BroadcastMessageSent | MessagingEvent::BroadcastMessageReceived => {
                BROADCAST_MESSAGE
            }
        }
    }

    /// Whether the report may name its sender.
    const fn is_receive(self) -> bool {
        matches!(
            self,
            MessagingEvent::PostMessageReceived
                | MessagingEvent::CustomEventReceived
                | MessagingEvent::ChannelMessageReceived
                | MessagingEvent::BroadcastMessageReceived
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MessagingProcessor {
    event: MessagingEvent,
}

impl MessagingProcessor {
    #[must_use]
    pub const fn new(event: MessagingEvent) -> Self {
        Self { event }
    }
}

impl Processor for MessagingProcessor {
    fn discriminators(&self) -> &'static [&'static str] {
        self.event.discriminators()
    }

    fn apply(
        &self,
        _state: &mut ContextState,
        report: &Report,
    ) -> Result<Vec<LogEntry>, DistinctError> {
        let fields = Fields::new(report);
        let receiver = fields.hierarchy()?;
        let values = fields.collect(self.event.fields())?;
        let source = if self.event.is_receive() {
            fields.optional_address("sourcehierarchy")?
        } else {
            None
        };

        let mut note = note_for(&receiver, report, self.event.label())
            .color(Some(MESSAGING_COLOR))
            .fields(values);
        if let Some(source) = &source {
            note = note.field("Source", source.to_string());
        }

        let mut entries = Vec::with_capacity(2);
        if let Some(source) = source {
            entries.push(Arrow::new(source.to_string(), receiver.to_string(), self.event.label()).into());
        }
        entries.push(note.into());
        Ok(entries)
    }
}
