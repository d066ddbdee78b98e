/*!
The uniform event model. Every decoded message, meta event, or builtin
marker is carried as an [`Event`]: the kind-specific payload plus the timing
fields that the container dispatch chains maintain.
!*/

use crate::core::{Channel, Message};
use crate::file::{Builtin, BuiltinKind, MetaEvent};

/// The key under which dispatch handlers are registered. For wire messages
/// this is the canonical status byte (channel bits zeroed); for meta events
/// it is the meta type byte; builtin events use their own out-of-band tags.
/// `Global` handlers run for every event.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum HandlerKey {
    Global,
    Status(u8),
    Meta(u8),
    Builtin(BuiltinKind),
}

/// The payload of an [`Event`].
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    /// A MIDI wire message (channel voice, system common, real-time,
    /// System Exclusive, or an unknown status).
    Message(Message),
    /// An SMF meta event.
    Meta(MetaEvent),
    /// A non-wire marker produced by the SMF layer.
    Builtin(Builtin),
}

/// A MIDI event annotated with its position in time. The timing fields are
/// written by the ingestion dispatch chain of the owning track; a freshly
/// decoded event carries only its `delta` (and `track` when it came from an
/// SMF file).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Event {
    /// Absolute tick position within the owning track.
    pub tick: u64,
    /// Ticks since the preceding event in the same track.
    pub delta: u32,
    /// Microseconds equivalent of `delta` at the tempo prevailing when the
    /// event was ingested.
    pub delta_time: u64,
    /// Absolute microseconds since the start of the track.
    pub time: u64,
    /// Index of the track this event belongs to, -1 while unsorted.
    pub track: i32,
    pub kind: EventKind,
}

impl Event {
    /// Creates an event at delta zero with no track assignment.
    pub fn new(kind: EventKind) -> Self {
        Self {
            tick: 0,
            delta: 0,
            delta_time: 0,
            time: 0,
            track: -1,
            kind,
        }
    }

    /// Creates an event with the given delta, as a convenience for builders.
    pub fn with_delta(kind: EventKind, delta: u32) -> Self {
        let mut event = Self::new(kind);
        event.delta = delta;
        event
    }

    pub fn message(message: Message) -> Self {
        Self::new(EventKind::Message(message))
    }

    pub fn meta(meta: MetaEvent) -> Self {
        Self::new(EventKind::Meta(meta))
    }

    pub fn builtin(builtin: Builtin) -> Self {
        Self::new(EventKind::Builtin(builtin))
    }

    /// The dispatch key of this event.
    pub fn key(&self) -> HandlerKey {
        match &self.kind {
            EventKind::Message(message) => HandlerKey::Status(message.statusmsg()),
            EventKind::Meta(meta) => HandlerKey::Meta(meta.meta_type()),
            EventKind::Builtin(builtin) => HandlerKey::Builtin(builtin.kind()),
        }
    }

    /// The on-wire status byte, for events that have one. Meta events
    /// report `0xFF`; builtin events report nothing.
    pub fn status_byte(&self) -> Option<u8> {
        match &self.kind {
            EventKind::Message(message) => Some(message.status()),
            EventKind::Meta(_) => Some(0xFF),
            EventKind::Builtin(_) => None,
        }
    }

    /// The channel, for channel voice messages.
    pub fn channel(&self) -> Option<Channel> {
        match &self.kind {
            EventKind::Message(message) => message.channel(),
            _ => None,
        }
    }

    /// Returns true for the End of Track meta event.
    pub fn is_end_of_track(&self) -> bool {
        matches!(&self.kind, EventKind::Meta(MetaEvent::EndOfTrack))
    }
}
