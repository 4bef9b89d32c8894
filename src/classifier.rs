//! Long-poll update classification
//!
//! The long-poll server delivers updates as untyped JSON arrays whose first
//! element is an event code. [`Update::parse`] turns one into a typed value;
//! only "message new" updates carry an [`Event`], every other kind is kept
//! as [`Update::Ignored`] so adding a kind is a matter of adding a variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::trace;

/// One raw update exactly as the server sent it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawUpdate(pub Value);

impl RawUpdate {
    /// Event code in position 0, numeric or numeric string
    pub fn code(&self) -> Option<i64> {
        self.field(0).and_then(as_i64)
    }

    fn field(&self, index: usize) -> Option<&Value> {
        self.0.as_array().and_then(|items| items.get(index))
    }
}

impl From<Value> for RawUpdate {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Long-poll event codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessageFlagsReplace,
    MessageFlagsSet,
    MessageFlagsReset,
    MessageNew,
    MessageEdit,
    ReadAllIncoming,
    ReadAllOutgoing,
    UserOnline,
    UserOffline,
    PeerFlagsReset,
    PeerFlagsReplace,
    PeerFlagsSet,
    PeerDeleteAll,
    PeerRestoreAll,
    ChatEdit,
    ChatUpdate,
    UserTyping,
    UserTypingInChat,
    UserCall,
    MessagesCounterUpdate,
    NotificationSettingsUpdate,
    Unknown(i64),
}

impl EventKind {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => EventKind::MessageFlagsReplace,
            2 => EventKind::MessageFlagsSet,
            3 => EventKind::MessageFlagsReset,
            4 => EventKind::MessageNew,
            5 => EventKind::MessageEdit,
            6 => EventKind::ReadAllIncoming,
            7 => EventKind::ReadAllOutgoing,
            8 => EventKind::UserOnline,
            9 => EventKind::UserOffline,
            10 => EventKind::PeerFlagsReset,
            11 => EventKind::PeerFlagsReplace,
            12 => EventKind::PeerFlagsSet,
            13 => EventKind::PeerDeleteAll,
            14 => EventKind::PeerRestoreAll,
            51 => EventKind::ChatEdit,
            52 => EventKind::ChatUpdate,
            61 => EventKind::UserTyping,
            62 => EventKind::UserTypingInChat,
            70 => EventKind::UserCall,
            80 => EventKind::MessagesCounterUpdate,
            114 => EventKind::NotificationSettingsUpdate,
            other => EventKind::Unknown(other),
        }
    }
}

/// Message flag bitset
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageFlags(u32);

impl MessageFlags {
    pub const UNREAD: Self = Self(1);
    pub const OUTBOX: Self = Self(2);
    pub const REPLIED: Self = Self(4);
    pub const IMPORTANT: Self = Self(8);
    pub const CHAT: Self = Self(16);
    pub const FRIENDS: Self = Self(32);
    pub const SPAM: Self = Self(64);
    pub const DELETED: Self = Self(128);
    pub const FIXED: Self = Self(256);
    pub const MEDIA: Self = Self(512);
    pub const HIDDEN: Self = Self(65536);
    pub const DELETED_ALL: Self = Self(131072);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl fmt::Debug for MessageFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageFlags({:#b})", self.0)
    }
}

/// A message-arrival notification
///
/// Produced only by [`classify`] from message-new updates, so `kind` is
/// always [`EventKind::MessageNew`] and `to_me` always mirrors the absence
/// of [`MessageFlags::OUTBOX`]. Fields are public for inspection; a value
/// built by hand may break both, and [`is_actionable`] checks `kind`
/// regardless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub message_id: i64,
    pub flags: MessageFlags,
    pub peer_id: i64,
    pub timestamp: i64,
    pub text: String,
    /// Message was received by the account owner rather than sent by them
    pub to_me: bool,
}

impl Event {
    /// Build from a message-new update laid out as
    /// `[4, message_id, flags, peer_id, timestamp, text, ...]`
    fn from_message_new(raw: &RawUpdate) -> Option<Self> {
        let message_id = raw.field(1).and_then(as_i64)?;
        let flags = raw
            .field(2)
            .and_then(as_i64)
            .and_then(|bits| u32::try_from(bits).ok())
            .map(MessageFlags::from_bits)?;
        let peer_id = raw.field(3).and_then(as_i64).unwrap_or_default();
        let timestamp = raw.field(4).and_then(as_i64).unwrap_or_default();
        let text = raw
            .field(5)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .replace("<br>", "\n");

        Some(Self {
            kind: EventKind::MessageNew,
            message_id,
            flags,
            peer_id,
            timestamp,
            text,
            to_me: !flags.contains(MessageFlags::OUTBOX),
        })
    }
}

/// Typed view of a raw update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    MessageNew(Event),
    Ignored(EventKind),
}

impl Update {
    /// Returns `None` when the update has no readable event code
    pub fn parse(raw: &RawUpdate) -> Option<Self> {
        let kind = EventKind::from_code(raw.code()?);
        match kind {
            EventKind::MessageNew => match Event::from_message_new(raw) {
                Some(event) => Some(Update::MessageNew(event)),
                None => {
                    trace!("Malformed message-new update: {}", raw.0);
                    Some(Update::Ignored(kind))
                }
            },
            other => Some(Update::Ignored(other)),
        }
    }
}

/// Project a raw update onto an [`Event`] if it is a new message
pub fn classify(raw: &RawUpdate) -> Option<Event> {
    match Update::parse(raw)? {
        Update::MessageNew(event) => Some(event),
        Update::Ignored(_) => None,
    }
}

/// New incoming message that is not yet flagged important
pub fn is_actionable(event: &Event) -> bool {
    event.kind == EventKind::MessageNew
        && event.to_me
        && !event.flags.contains(MessageFlags::IMPORTANT)
}

/// Actionable events of one batch, in arrival order
pub fn actionable(batch: &[RawUpdate]) -> impl Iterator<Item = Event> + '_ {
    batch.iter().filter_map(classify).filter(is_actionable)
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
