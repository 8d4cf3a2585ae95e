//! All mutable relay state, owned explicitly instead of living in page globals.

use crate::{
	config::RelayConfig,
	encoder::EventEncoder,
	error::RelayError,
	event::{EventType, PendingEvent},
	poll::PollingScheduler,
	status::{Status, StatusIndicator},
	transport::{page_query, Request},
};
use futures::channel::oneshot;
use tracing::{debug, trace};

/// Result of asking for a poll-channel dispatch.
#[derive(Debug)]
pub enum Begin {
	/// Nothing queued. No request is made.
	Skip,
	/// A dispatch is in flight. The queued events will ride on the follow-up, which signals completion through this.
	Folded(oneshot::Receiver<()>),
	/// Send `request`. The batch and current event type were already reset.
	Send(Dispatch),
}

/// A drained batch on its way to the server.
#[derive(Debug)]
pub struct Dispatch {
	pub request: Request,
	pub event_count: usize,
	pub event_type: Option<EventType>,
	/// Folded dispatch requests whose events this dispatch carries.
	waiters: Vec<oneshot::Sender<()>>,
}

impl Dispatch {
	/// Wakes every folded request that was waiting on this dispatch.
	pub fn notify_waiters(self) {
		for waiter in self.waiters {
			// A dropped receiver just means nobody is waiting anymore.
			let _ = waiter.send(());
		}
	}
}

#[derive(Debug)]
pub struct AjaxSession {
	config: RelayConfig,
	encoder: EventEncoder,
	status: StatusIndicator,
	polls: PollingScheduler,
	in_flight: bool,
	folded: Vec<oneshot::Sender<()>>,
}

impl AjaxSession {
	#[must_use]
	pub fn new(config: RelayConfig) -> Self {
		Self {
			config,
			encoder: EventEncoder::new(),
			status: StatusIndicator::default(),
			polls: PollingScheduler::new(),
			in_flight: false,
			folded: Vec::new(),
		}
	}

	#[must_use]
	pub fn config(&self) -> &RelayConfig {
		&self.config
	}

	#[must_use]
	pub fn encoder(&self) -> &EventEncoder {
		&self.encoder
	}

	#[must_use]
	pub fn status(&self) -> &Status {
		self.status.status()
	}

	#[must_use]
	pub fn polls(&self) -> &PollingScheduler {
		&self.polls
	}

	pub fn polls_mut(&mut self) -> &mut PollingScheduler {
		&mut self.polls
	}

	/// Whether a poll-channel request is outstanding.
	#[must_use]
	pub fn in_flight(&self) -> bool {
		self.in_flight
	}

	/// Queues `event` for the next dispatch. Never fails.
	pub fn append(&mut self, event: &PendingEvent) {
		self.encoder.append(event);
	}

	/// Drains the batch into a poll-channel request, unless it is empty or a request is already in flight.
	///
	/// `location_href` is the current page URL; its query is forwarded. `now_ms` feeds the cache buster.
	pub fn begin_dispatch(&mut self, location_href: &str, now_ms: u64) -> Begin {
		if self.encoder.is_empty() {
			trace!("Nothing queued; skipping dispatch.");
			return Begin::Skip;
		}
		if self.in_flight {
			trace!(queued = self.encoder.len(), "Dispatch in flight; folding into the follow-up.");
			let (sender, receiver) = oneshot::channel();
			self.folded.push(sender);
			return Begin::Folded(receiver);
		}

		let batch = self.encoder.drain_batch();
		self.in_flight = true;
		self.status.request_started(batch.event_type);

		let cache_buster = if self.config.cache_busting { Some(now_ms) } else { None };
		let request = Request::poll(&self.config, page_query(location_href), &batch.encoded, cache_buster);
		debug!(events = batch.len, event_type = ?batch.event_type, "Dispatching batch.");
		Begin::Send(Dispatch {
			request,
			event_count: batch.len,
			event_type: batch.event_type,
			waiters: core::mem::take(&mut self.folded),
		})
	}

	/// Builds a component POST. These don't take part in the single-flight rule and leave the batch alone.
	pub fn begin_post(&mut self, component_id: &str, event_type: EventType, location_href: &str, params: Option<&str>) -> Request {
		self.status.request_started(Some(event_type));
		debug!(component_id, %event_type, "Posting to component.");
		Request::component_post(&self.config, component_id, page_query(location_href), params)
	}

	/// Records how a poll-channel round trip ended.
	pub fn end_dispatch(&mut self, result: &Result<(), RelayError>) {
		self.in_flight = false;
		self.settle(result);
	}

	/// Updates the status indicator for a finished round trip on either channel.
	pub fn settle(&mut self, result: &Result<(), RelayError>) {
		match result {
			Ok(()) => self.status.succeeded(),
			Err(error) => self.status.failed(error.to_string()),
		};
	}
}
