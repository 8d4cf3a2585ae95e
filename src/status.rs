//! Busy/error affordance driven by request outcomes.

use crate::event::EventType;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
	Hidden,
	Busy,
	/// Stays visible, with the message as tooltip, until the next busy or hidden transition.
	Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusIcons {
	pub busy: String,
	pub error: String,
}

impl StatusIcons {
	/// The stock icons served below `context_path`.
	#[must_use]
	pub fn below(context_path: &str) -> Self {
		Self {
			busy: format!("{}ajax/icons/busy_anim.gif", context_path),
			error: format!("{}ajax/icons/warning.png", context_path),
		}
	}
}

#[derive(Debug)]
pub struct StatusIndicator {
	status: Status,
}

impl Default for StatusIndicator {
	fn default() -> Self {
		Self { status: Status::Hidden }
	}
}

impl StatusIndicator {
	#[must_use]
	pub fn status(&self) -> &Status {
		&self.status
	}

	/// Called when a request is about to go out. Returns whether the status changed.
	///
	/// Poll ticks never show the busy indicator.
	pub fn request_started(&mut self, event_type: Option<EventType>) -> bool {
		if event_type.map_or(false, EventType::is_poll) {
			return false;
		}
		self.transition(Status::Busy)
	}

	pub fn succeeded(&mut self) -> bool {
		self.transition(Status::Hidden)
	}

	pub fn failed(&mut self, message: impl Into<String>) -> bool {
		self.transition(Status::Error(message.into()))
	}

	fn transition(&mut self, status: Status) -> bool {
		if self.status == status {
			return false;
		}
		debug!(from = ?self.status, to = ?status, "Status changed.");
		self.status = status;
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn poll_tick_never_busy() {
		let mut indicator = StatusIndicator::default();
		assert!(!indicator.request_started(Some(EventType::PollTick)));
		assert_eq!(indicator.status(), &Status::Hidden);

		indicator.failed("Error: Bad Gateway (HTTP 502)");
		assert!(!indicator.request_started(Some(EventType::PollTick)));
		assert_eq!(indicator.status(), &Status::Error("Error: Bad Gateway (HTTP 502)".into()));
	}

	#[test]
	fn error_is_superseded() {
		let mut indicator = StatusIndicator::default();
		indicator.failed("boom");
		assert!(indicator.request_started(Some(EventType::Click)));
		assert_eq!(indicator.status(), &Status::Busy);
		assert!(indicator.succeeded());
		assert_eq!(indicator.status(), &Status::Hidden);
	}
}
