//! Per-element polling subscriptions.
//!
//! Each subscription cycles Scheduled → Firing → Scheduled until it is stopped or its element disappears.
//! The next timer is only armed once the previous round trip completed, so slow responses can't pile up requests.

use crate::{
	event::{Argument, EventType, PendingEvent},
	timer::TimerHandle,
};
use core::cell::Cell;
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{debug, instrument, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
	Idle,
	Scheduled,
	Firing,
}

/// Shared between a subscription and the tick it armed. Once cancelled, it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.set(true);
	}

	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		self.0.get()
	}
}

/// Handed to each tick, identifying the subscription that armed it.
#[derive(Debug, Clone)]
pub struct PollTicket {
	pub id: String,
	pub interval_ms: u32,
	generation: u64,
	token: CancellationToken,
}

impl PollTicket {
	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}
}

#[derive(Debug)]
struct Subscription {
	generation: u64,
	token: CancellationToken,
	event_type: EventType,
	argument: Argument,
	callback: String,
	state: PollState,
	timer: Option<TimerHandle>,
}

/// What a timer firing should do.
#[derive(Debug, PartialEq)]
pub enum Tick {
	/// Queue this event, dispatch, then call [`PollingScheduler::round_trip_complete`].
	Fire(PendingEvent),
	/// The subscription was stopped or restarted since this timer was armed.
	Stale,
	/// The element is gone. The subscription ended.
	ElementGone,
}

/// Returned by [`PollingScheduler::stop`] if there was something to stop.
#[derive(Debug, PartialEq, Eq)]
pub struct Stopped {
	/// Needs to be cleared by the caller.
	pub pending_timer: Option<TimerHandle>,
}

#[derive(Debug, Default)]
pub struct PollingScheduler {
	subscriptions: HashMap<String, Subscription>,
	next_generation: u64,
}

impl PollingScheduler {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// (Re)starts polling for `id`. Any previous subscription for `id` is stopped first.
	///
	/// The caller must arm a timer for the returned ticket and report it with [`armed`](`Self::armed`),
	/// and clear the previous timer if there is one.
	#[instrument(skip(self, argument, callback))]
	pub fn start(&mut self, id: &str, event_type: EventType, argument: Argument, callback: Option<&str>, interval_ms: u32) -> (PollTicket, Option<Stopped>) {
		let stopped = self.stop(id);

		self.next_generation += 1;
		let token = CancellationToken::new();
		self.subscriptions.insert(
			id.to_owned(),
			Subscription {
				generation: self.next_generation,
				token: token.clone(),
				event_type,
				argument,
				callback: callback.unwrap_or_default().to_owned(),
				state: PollState::Scheduled,
				timer: None,
			},
		);
		debug!("Starting polling.");

		let ticket = PollTicket {
			id: id.to_owned(),
			interval_ms,
			generation: self.next_generation,
			token,
		};
		(ticket, stopped)
	}

	/// Ends the subscription for `id`, if any, and cancels its token.
	pub fn stop(&mut self, id: &str) -> Option<Stopped> {
		let subscription = self.subscriptions.remove(id)?;
		subscription.token.cancel();
		debug!(id, state = ?subscription.state, "Stopped polling.");
		Some(Stopped { pending_timer: subscription.timer })
	}

	/// Records the timer armed for `ticket`.
	///
	/// Returns `false` if the ticket went stale in the meantime, in which case the caller should clear `timer`.
	pub fn armed(&mut self, ticket: &PollTicket, timer: TimerHandle) -> bool {
		match self.current_mut(ticket) {
			Some(subscription) => {
				subscription.timer = Some(timer);
				subscription.state = PollState::Scheduled;
				true
			}
			None => false,
		}
	}

	/// Called when the timer for `ticket` fires. `element_present` is whether the subscribed element still exists.
	pub fn fire(&mut self, ticket: &PollTicket, element_present: bool) -> Tick {
		if self.current_mut(ticket).is_none() {
			trace!(id = %ticket.id, "Ignoring stale poll tick.");
			return Tick::Stale;
		}
		if !element_present {
			debug!(id = %ticket.id, "Element is gone; stopping polling.");
			self.stop(&ticket.id);
			return Tick::ElementGone;
		}

		match self.current_mut(ticket) {
			Some(subscription) => {
				subscription.state = PollState::Firing;
				subscription.timer = None;
				Tick::Fire(PendingEvent {
					component_id: ticket.id.clone(),
					event_type: subscription.event_type,
					argument: subscription.argument.clone(),
					callback: subscription.callback.clone(),
				})
			}
			None => Tick::Stale,
		}
	}

	/// Called after the round trip started by a [`Tick::Fire`] finished, whatever its outcome.
	///
	/// Returns whether a new timer should be armed.
	pub fn round_trip_complete(&mut self, ticket: &PollTicket) -> bool {
		match self.current_mut(ticket) {
			Some(subscription) if subscription.state == PollState::Firing => {
				subscription.state = PollState::Scheduled;
				true
			}
			_ => false,
		}
	}

	#[must_use]
	pub fn state(&self, id: &str) -> PollState {
		self.subscriptions.get(id).map_or(PollState::Idle, |subscription| subscription.state)
	}

	/// Number of running subscriptions.
	#[must_use]
	pub fn active_count(&self) -> usize {
		self.subscriptions.len()
	}

	fn current_mut(&mut self, ticket: &PollTicket) -> Option<&mut Subscription> {
		if ticket.is_cancelled() {
			return None;
		}
		self.subscriptions.get_mut(&ticket.id).filter(|subscription| subscription.generation == ticket.generation)
	}
}
