//! The response envelope: a JSON array of DOM patch operations, applied in order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PatchOp {
	/// Replaces the element itself. Focus inside it is restored afterwards if possible.
	ReplaceHtml { id: String, html: String },
	SetInnerHtml { id: String, html: String },
	SetAttribute { id: String, name: String, value: String },
	RemoveAttribute { id: String, name: String },
	RemoveNode { id: String },
	/// Calls a callback registered with [`ResponseApplier::register_callback`](`crate::apply::ResponseApplier::register_callback`).
	InvokeCallback {
		name: String,
		#[serde(default)]
		args: Vec<Value>,
	},
	Redirect {
		url: String,
		#[serde(default, rename = "newWindow")]
		new_window: bool,
	},
}

impl PatchOp {
	/// The element this operation targets, if any.
	#[must_use]
	pub fn target(&self) -> Option<&str> {
		match self {
			Self::ReplaceHtml { id, .. } | Self::SetInnerHtml { id, .. } | Self::SetAttribute { id, .. } | Self::RemoveAttribute { id, .. } | Self::RemoveNode { id } => Some(id),
			Self::InvokeCallback { .. } | Self::Redirect { .. } => None,
		}
	}
}

/// Parses a response body. A blank body is an empty envelope.
///
/// # Errors
///
/// Iff the body is neither blank nor a JSON array of operations.
pub fn parse_envelope(body: &str) -> serde_json::Result<Vec<PatchOp>> {
	if body.trim().is_empty() {
		return Ok(Vec::new());
	}
	serde_json::from_str(body)
}
