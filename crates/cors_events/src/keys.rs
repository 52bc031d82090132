//! Typed builders and parsers for every key the event channel writes.
//!
//! The persisted layout is fixed so that state written by earlier sessions stays readable:
//!
//! - `<tab>.cors.events.<name>` holds the comma-joined queue of pending call ids.
//! - `_temp_.event.<id>.arguments|state|return` hold one call's record.

use std::fmt;

use userscript_host::TabId;

/// Namespace prefix shared by all temporary keys.
pub const TEMP_PREFIX: &str = "_temp_";
/// Segment under [`TEMP_PREFIX`] holding call records.
pub const EVENT_SEGMENT: &str = "event";
/// Infix between the tab id and the event name of a queue key.
pub const QUEUE_INFIX: &str = ".cors.events.";
/// Length of a call id and of a generated tab id.
pub const ID_LEN: usize = 32;

/// Joins `parts` under the temporary-key namespace.
pub fn temp_key(parts: &[&str]) -> String {
    std::iter::once(TEMP_PREFIX)
        .chain(parts.iter().copied())
        .collect::<Vec<_>>()
        .join(".")
}

/// Returns whether `raw` looks like a tab id minted by the web host: 32 chars of `[0-9a-z]`.
pub fn is_generated_tab_id(raw: &str) -> bool {
    raw.len() == ID_LEN
        && raw
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}

/// Identifier of one in-flight call: 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(String);

impl CallId {
    /// Generates a fresh random id (UUID v4 without separators).
    ///
    /// Collisions are not detected.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Parses a call id, rejecting anything but 32 lowercase hex characters.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(raw.to_string()))
    }

    /// Returns the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the three slots of a call record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallSlot {
    /// Serialized argument list written by the caller.
    Arguments,
    /// Tri-state completion marker written by both sides.
    State,
    /// Handler result written by the listener.
    Return,
}

impl CallSlot {
    /// All slots, in deletion order.
    pub const ALL: [CallSlot; 3] = [CallSlot::State, CallSlot::Return, CallSlot::Arguments];

    /// Key segment naming this slot.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arguments => "arguments",
            Self::State => "state",
            Self::Return => "return",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "arguments" => Some(Self::Arguments),
            "state" => Some(Self::State),
            "return" => Some(Self::Return),
            _ => None,
        }
    }
}

/// Key of one slot of a call record: `_temp_.event.<id>.<slot>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallKey {
    /// Call the slot belongs to.
    pub id: CallId,
    /// Slot within the record.
    pub slot: CallSlot,
}

impl CallKey {
    /// Builds the key for `slot` of call `id`.
    pub fn new(id: &CallId, slot: CallSlot) -> Self {
        Self {
            id: id.clone(),
            slot,
        }
    }

    /// Parses a full call-record key.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split('.');
        let (Some(TEMP_PREFIX), Some(EVENT_SEGMENT), Some(id), Some(slot), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return None;
        };
        Some(Self {
            id: CallId::parse(id)?,
            slot: CallSlot::parse(slot)?,
        })
    }
}

impl fmt::Display for CallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&temp_key(&[
            EVENT_SEGMENT,
            self.id.as_str(),
            self.slot.as_str(),
        ]))
    }
}

/// Name of an event channel. Never empty and never contains `,`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventName(String);

impl EventName {
    /// Validates an event name.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        (!raw.is_empty() && !raw.contains(',')).then_some(Self(raw))
    }

    /// Returns the raw name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a per-tab event queue: `<tab>.cors.events.<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueKey {
    /// Owning tab.
    pub tab: TabId,
    /// Event channel name.
    pub name: EventName,
}

impl QueueKey {
    /// Builds the queue key of `name` in `tab`.
    pub fn new(tab: TabId, name: EventName) -> Self {
        Self { tab, name }
    }

    /// Parses a queue key. The tab segment is everything before the first `.cors.events.`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (tab, name) = raw.split_once(QUEUE_INFIX)?;
        if tab.is_empty() {
            return None;
        }
        Some(Self {
            tab: TabId::new(tab),
            name: EventName::new(name)?,
        })
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{QUEUE_INFIX}{}", self.tab, self.name)
    }
}
