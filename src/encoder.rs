//! Turns queued events into the `/`-joined batch string and back.
//!
//! Each event becomes one token: `id/type/arg/callback`, where `arg` and `callback` are percent-encoded.
//! The whole token is then percent-encoded again, so the `/` inside a token can't be mistaken for the batch delimiter.

use crate::event::{EventType, PendingEvent};
use core::convert::TryFrom;
use tracing::{instrument, trace};

const DELIMITER: char = '/';

/// Accumulates the pending batch. One instance lives in each [`AjaxSession`](`crate::session::AjaxSession`).
#[derive(Debug, Default)]
pub struct EventEncoder {
	batch: String,
	len: usize,
	current_event_type: Option<EventType>,
}

/// The batch handed to a dispatch, together with the type of the last event that went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainedBatch {
	pub encoded: String,
	pub len: usize,
	pub event_type: Option<EventType>,
}

impl EventEncoder {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends one token. Earlier tokens are never dropped.
	#[instrument(skip(self, event), fields(component_id = %event.component_id, event_type = %event.event_type))]
	pub fn append(&mut self, event: &PendingEvent) {
		self.current_event_type = Some(event.event_type);
		if !self.batch.is_empty() {
			self.batch.push(DELIMITER);
		}
		let token = encode_token(event);
		if cfg!(feature = "dangerous-logging") {
			trace!(argument = ?event.argument, callback = %event.callback, "Queued event.");
		} else {
			trace!(token_len = token.len(), "Queued event.");
		}
		self.batch.push_str(&token);
		self.len += 1;
	}

	/// Type of the most recently appended event, if the batch is non-empty.
	#[must_use]
	pub fn current_event_type(&self) -> Option<EventType> {
		self.current_event_type
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.len
	}

	/// Takes the accumulated batch and resets to the initial state.
	pub fn drain_batch(&mut self) -> DrainedBatch {
		let drained = DrainedBatch {
			encoded: core::mem::take(&mut self.batch),
			len: self.len,
			event_type: self.current_event_type.take(),
		};
		self.len = 0;
		drained
	}
}

fn encode_token(event: &PendingEvent) -> String {
	let inner = format!(
		"{}{d}{}{d}{}{d}{}",
		event.component_id,
		event.event_type.wire_value(),
		urlencoding::encode(&event.argument.to_wire_text()),
		urlencoding::encode(&event.callback),
		d = DELIMITER,
	);
	urlencoding::encode(&inner).into_owned()
}

/// An event as the server sees it after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
	pub component_id: String,
	pub event_type: EventType,
	pub argument: String,
	pub callback: String,
}

impl DecodedEvent {
	/// Parses the argument as JSON, for events whose argument was structured.
	///
	/// # Errors
	///
	/// Iff the argument isn't valid JSON.
	pub fn structured_argument(&self) -> serde_json::Result<serde_json::Value> {
		serde_json::from_str(&self.argument)
	}
}

#[derive(Debug, thiserror::Error)]
pub enum BatchDecodeError {
	#[error("token {index} is not valid percent-encoded UTF-8")]
	Encoding { index: usize },
	#[error("token {index} has {found} fields instead of 4")]
	FieldCount { index: usize, found: usize },
	#[error("token {index} has an invalid event type {value:?}")]
	EventType { index: usize, value: String },
}

/// Decodes a batch produced by [`EventEncoder::drain_batch`], preserving order.
///
/// # Errors
///
/// Iff a token is malformed.
pub fn decode_batch(batch: &str) -> Result<Vec<DecodedEvent>, BatchDecodeError> {
	if batch.is_empty() {
		return Ok(Vec::new());
	}
	batch.split(DELIMITER).enumerate().map(|(index, token)| decode_token(index, token)).collect()
}

fn decode_token(index: usize, token: &str) -> Result<DecodedEvent, BatchDecodeError> {
	let inner = urlencoding::decode(token).map_err(|_| BatchDecodeError::Encoding { index })?;

	// The component id is the only unencoded field, so split from the right.
	let fields: Vec<&str> = inner.rsplitn(4, DELIMITER).collect();
	if fields.len() != 4 {
		return Err(BatchDecodeError::FieldCount { index, found: fields.len() });
	}
	let (callback, argument, event_type, component_id) = (fields[0], fields[1], fields[2], fields[3]);

	let event_type = event_type
		.parse::<u8>()
		.ok()
		.and_then(|value| EventType::try_from(value).ok())
		.ok_or_else(|| BatchDecodeError::EventType { index, value: event_type.to_owned() })?;

	let decode = |field: &str| urlencoding::decode(field).map(|decoded| decoded.into_owned()).map_err(|_| BatchDecodeError::Encoding { index });
	Ok(DecodedEvent {
		component_id: component_id.to_owned(),
		event_type,
		argument: decode(argument)?,
		callback: decode(callback)?,
	})
}
