//! Event kinds and queued events.

use core::{convert::TryFrom, fmt};
use serde_json::Value;

/// Component id used for the page-load event sent by [`Relay::init`](`crate::relay::Relay::init`).
pub const INIT_COMPONENT_ID: &str = "__init__";

/// Kinds of interaction reported to the server.
///
/// The discriminants are part of the wire format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
	/// Also used for the page-init event.
	Click = 1,
	ValueChanged = 5,
	MouseOver = 6,
	MouseOut = 7,
	Submit = 9,
	/// Cursor up/down in a suggestion list.
	CursorNavigation = 11,
	KeyEnter = 12,
	/// Timer-driven background poll. Never shows the busy indicator.
	PollTick = 13,
	DragResize = 14,
}

impl EventType {
	#[must_use]
	pub fn wire_value(self) -> u8 {
		self as u8
	}

	#[must_use]
	pub fn is_poll(self) -> bool {
		self == Self::PollTick
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type {0}")]
pub struct UnknownEventType(pub u8);

impl TryFrom<u8> for EventType {
	type Error = UnknownEventType;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		Ok(match value {
			1 => Self::Click,
			5 => Self::ValueChanged,
			6 => Self::MouseOver,
			7 => Self::MouseOut,
			9 => Self::Submit,
			11 => Self::CursorNavigation,
			12 => Self::KeyEnter,
			13 => Self::PollTick,
			14 => Self::DragResize,
			other => return Err(UnknownEventType(other)),
		})
	}
}

impl fmt::Display for EventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.wire_value())
	}
}

/// An event argument as handed over by the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
	Text(String),
	/// Serialized to compact JSON before encoding.
	Structured(Value),
}

impl Argument {
	/// The textual form that goes on the wire (before percent-encoding).
	///
	/// Structured values are written as compact JSON. If that JSON is a quoted string, the surrounding quotes are dropped.
	#[must_use]
	pub fn to_wire_text(&self) -> String {
		match self {
			Self::Text(text) => text.clone(),
			Self::Structured(value) => {
				let json = value.to_string();
				if json.len() > 1 && json.starts_with('"') && json.ends_with('"') {
					json[1..json.len() - 1].to_owned()
				} else {
					json
				}
			}
		}
	}
}

impl Default for Argument {
	fn default() -> Self {
		Self::Text(String::new())
	}
}

impl From<&str> for Argument {
	fn from(text: &str) -> Self {
		Self::Text(text.to_owned())
	}
}

impl From<String> for Argument {
	fn from(text: String) -> Self {
		Self::Text(text)
	}
}

impl From<Value> for Argument {
	fn from(value: Value) -> Self {
		Self::Structured(value)
	}
}

/// One queued interaction. Consumed exactly once, by the dispatch that drains it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
	pub component_id: String,
	pub event_type: EventType,
	pub argument: Argument,
	pub callback: String,
}

impl PendingEvent {
	pub fn new(component_id: impl Into<String>, event_type: EventType, argument: impl Into<Argument>, callback: Option<&str>) -> Self {
		Self {
			component_id: component_id.into(),
			event_type,
			argument: argument.into(),
			callback: callback.unwrap_or_default().to_owned(),
		}
	}
}
