//! Drives an [`AjaxSession`] against a live page.
//!
//! Everything runs on the UI thread. Futures are spawned onto a [`LocalSpawn`] executor, and [`RefCell`] borrows are
//! never held across an `.await`.

use crate::{
	apply::ResponseApplier,
	config::RelayConfig,
	error::RelayError,
	event::{Argument, EventType, PendingEvent, INIT_COMPONENT_ID},
	page::Page,
	poll::{PollTicket, Stopped, Tick},
	session::{AjaxSession, Begin},
	status::Status,
	timer::Timers,
	transport::{RequestOutcome, Transport},
};
use core::{cell::RefCell, future::Future};
use futures::task::{LocalSpawn, LocalSpawnExt};
use serde_json::{json, Value};
use std::rc::{Rc, Weak};
use tracing::{debug, error, instrument, warn};

/// How long [`Relay::delayed_catch_event`] waits before sending.
pub const DELAYED_DISPATCH_MS: u32 = 500;

/// How a call to [`Relay::dispatch`] ended.
#[derive(Debug)]
#[must_use]
pub enum Dispatched {
	/// The batch was empty.
	Skipped,
	/// Another dispatch was in flight; the events went out with its follow-up, which has now completed.
	Folded,
	/// Result of the last round trip this call performed.
	Completed(Result<(), RelayError>),
}

struct Inner<P> {
	session: RefCell<AjaxSession>,
	page: RefCell<P>,
	applier: RefCell<ResponseApplier>,
	transport: Box<dyn Transport>,
	timers: Box<dyn Timers>,
	spawner: Box<dyn LocalSpawn>,
}

/// Cheap to clone; all clones share the same session.
pub struct Relay<P> {
	inner: Rc<Inner<P>>,
}

impl<P> Clone for Relay<P> {
	fn clone(&self) -> Self {
		Self { inner: Rc::clone(&self.inner) }
	}
}

impl<P> core::fmt::Debug for Relay<P> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Relay").field("session", &self.inner.session).finish_non_exhaustive()
	}
}

impl<P: Page + 'static> Relay<P> {
	pub fn new(config: RelayConfig, page: P, transport: impl Transport + 'static, timers: impl Timers + 'static, spawner: impl LocalSpawn + 'static) -> Self {
		Self {
			inner: Rc::new(Inner {
				session: RefCell::new(AjaxSession::new(config)),
				page: RefCell::new(page),
				applier: RefCell::new(ResponseApplier::new()),
				transport: Box::new(transport),
				timers: Box::new(timers),
				spawner: Box::new(spawner),
			}),
		}
	}

	fn from_weak(weak: &Weak<Inner<P>>) -> Option<Self> {
		weak.upgrade().map(|inner| Self { inner })
	}

	/// Registers a callback that response envelopes can invoke by name.
	///
	/// Callbacks run between patch operations with nothing borrowed, so they may call back into this [`Relay`].
	pub fn register_callback(&self, name: impl Into<String>, callback: impl Fn(&[Value]) -> Result<(), String> + 'static) {
		self.inner.applier.borrow_mut().register_callback(name, callback);
	}

	#[must_use]
	pub fn status(&self) -> Status {
		self.inner.session.borrow().status().clone()
	}

	pub fn with_session<R>(&self, f: impl FnOnce(&AjaxSession) -> R) -> R {
		f(&self.inner.session.borrow())
	}

	pub fn with_page<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
		f(&mut self.inner.page.borrow_mut())
	}

	/// Queues an event without sending it.
	pub fn append(&self, component_id: &str, event_type: EventType, argument: impl Into<Argument>, callback: Option<&str>) {
		let event = PendingEvent::new(component_id, event_type, argument, callback);
		self.inner.session.borrow_mut().append(&event);
	}

	/// Announces the page to the server.
	pub fn init(&self, callback: Option<&str>) {
		debug!("Relay initialized.");
		self.catch_event(INIT_COMPONENT_ID, EventType::Click, "", callback);
	}

	/// Queues an event and dispatches.
	pub fn catch_event(&self, component_id: &str, event_type: EventType, argument: impl Into<Argument>, callback: Option<&str>) {
		self.append(component_id, event_type, argument, callback);
		self.flush();
	}

	/// Queues an event and dispatches after [`DELAYED_DISPATCH_MS`], unless something else sent it first.
	pub fn delayed_catch_event(&self, component_id: &str, event_type: EventType, argument: impl Into<Argument>) {
		self.append(component_id, event_type, argument, None);
		let weak = Rc::downgrade(&self.inner);
		self.inner.timers.set_timeout(
			DELAYED_DISPATCH_MS,
			Box::new(move || {
				if let Some(relay) = Self::from_weak(&weak) {
					relay.flush();
				}
			}),
		);
	}

	/// Sends the values of the components `ids` as structured click argument of `component_id`.
	///
	/// # Errors
	///
	/// Iff one of the components doesn't exist. Nothing is queued in that case.
	pub fn submit_values(&self, component_id: &str, ids: &[&str]) -> Result<(), RelayError> {
		let values = self.component_values(ids)?;
		self.catch_event(component_id, EventType::Click, values, None);
		Ok(())
	}

	/// Collects `[{"id": …, "val": …}]` for the components `ids`.
	///
	/// # Errors
	///
	/// Iff one of the components doesn't exist.
	pub fn component_values(&self, ids: &[&str]) -> Result<Value, RelayError> {
		let page = self.inner.page.borrow();
		ids.iter()
			.map(|&id| {
				page.value_of(id)
					.map(|value| json!({ "id": id, "val": value }))
					.ok_or_else(|| RelayError::ElementNotFound(id.to_owned()))
			})
			.collect::<Result<Vec<_>, _>>()
			.map(Value::Array)
	}

	/// Spawns a dispatch of the pending batch.
	pub fn flush(&self) {
		let relay = self.clone();
		self.spawn(async move {
			let _ = relay.dispatch().await;
		});
	}

	/// Sends the pending batch over the poll channel and applies the response.
	///
	/// If a dispatch is already in flight, this waits for the follow-up that carries the queued events instead.
	#[instrument(skip(self))]
	pub async fn dispatch(&self) -> Dispatched {
		let mut dispatch = match self.begin() {
			Begin::Skip => return Dispatched::Skipped,
			Begin::Folded(receiver) => {
				let _ = receiver.await;
				return Dispatched::Folded;
			}
			Begin::Send(dispatch) => dispatch,
		};

		loop {
			let outcome = self.inner.transport.send(dispatch.request.clone()).await;
			let result = self.complete(outcome);
			self.inner.session.borrow_mut().end_dispatch(&result);
			self.render_status();
			dispatch.notify_waiters();

			match self.begin() {
				Begin::Send(follow_up) => {
					debug!(events = follow_up.event_count, "Sending follow-up batch.");
					dispatch = follow_up;
				}
				Begin::Skip | Begin::Folded(_) => return Dispatched::Completed(result),
			}
		}
	}

	fn begin(&self) -> Begin {
		let href = self.inner.page.borrow().location_href();
		let now_ms = self.inner.timers.now_ms();
		let begin = self.inner.session.borrow_mut().begin_dispatch(&href, now_ms);
		if let Begin::Send(_) = begin {
			self.render_status();
		}
		begin
	}

	/// Spawns a POST of `params` (already url-encoded) to the component endpoint of `component_id`.
	pub fn post(&self, component_id: &str, event_type: EventType, params: Option<&str>) {
		let relay = self.clone();
		let component_id = component_id.to_owned();
		let params = params.map(str::to_owned);
		self.spawn(async move {
			let _ = relay.send_post(&component_id, event_type, params.as_deref()).await;
		});
	}

	/// Like [`post`](`Self::post`), but posts `param_name=value` (default name `args`) with `value` percent-encoded.
	pub fn post_encoded(&self, component_id: &str, event_type: EventType, value: &str, param_name: Option<&str>) {
		let params = format!("{}={}", param_name.unwrap_or("args"), urlencoding::encode(value));
		self.post(component_id, event_type, Some(&params));
	}

	/// POSTs to a component endpoint and applies the response. Doesn't wait for, or block, the poll channel.
	///
	/// # Errors
	///
	/// Iff the request or applying its response failed. The error is also shown by the status indicator.
	#[instrument(skip(self, params))]
	pub async fn send_post(&self, component_id: &str, event_type: EventType, params: Option<&str>) -> Result<(), RelayError> {
		let href = self.inner.page.borrow().location_href();
		let request = self.inner.session.borrow_mut().begin_post(component_id, event_type, &href, params);
		self.render_status();

		let outcome = self.inner.transport.send(request).await;
		let result = self.complete(outcome);
		self.inner.session.borrow_mut().settle(&result);
		self.render_status();
		result
	}

	fn complete(&self, outcome: RequestOutcome) -> Result<(), RelayError> {
		match outcome {
			RequestOutcome::Success(body) => {
				// Cloned out so that callbacks may register further callbacks.
				let applier = self.inner.applier.borrow().clone();
				match applier.apply(&body, &self.inner.page) {
					Ok(_) => Ok(()),
					Err(apply_error) => {
						error!(error = %apply_error, body_len = body.len(), "Failed to apply response.");
						Err(apply_error.into())
					}
				}
			}
			RequestOutcome::HttpError { status, status_text } => {
				warn!(status, %status_text, "Request failed.");
				Err(RelayError::Http { status, status_text })
			}
			RequestOutcome::TransportException(message) => {
				warn!(%message, "Request could not be sent.");
				Err(RelayError::Transport(message))
			}
		}
	}

	/// Starts (or restarts) polling for the element `id` every `interval_ms`, measured from the end of the previous round trip.
	///
	/// Returns `false` without doing anything if there's no such element.
	#[instrument(skip(self, argument, callback))]
	pub fn start_polling(&self, id: &str, event_type: EventType, argument: impl Into<Argument>, callback: Option<&str>, interval_ms: u32) -> bool {
		if !self.inner.page.borrow().contains(id) {
			debug!("Not polling for a missing element.");
			return false;
		}
		let (ticket, stopped) = self.inner.session.borrow_mut().polls_mut().start(id, event_type, argument.into(), callback, interval_ms);
		if let Some(Stopped { pending_timer: Some(timer) }) = stopped {
			self.inner.timers.clear_timeout(timer);
		}
		self.arm(ticket);
		true
	}

	/// Stops polling for `id`. Returns whether it was polling.
	pub fn stop_polling(&self, id: &str) -> bool {
		let stopped = self.inner.session.borrow_mut().polls_mut().stop(id);
		match stopped {
			Some(Stopped { pending_timer }) => {
				if let Some(timer) = pending_timer {
					self.inner.timers.clear_timeout(timer);
				}
				true
			}
			None => false,
		}
	}

	fn arm(&self, ticket: PollTicket) {
		let weak = Rc::downgrade(&self.inner);
		let fired = ticket.clone();
		let timer = self.inner.timers.set_timeout(
			ticket.interval_ms,
			Box::new(move || {
				if let Some(relay) = Self::from_weak(&weak) {
					relay.tick(fired);
				}
			}),
		);
		let current = self.inner.session.borrow_mut().polls_mut().armed(&ticket, timer);
		if !current {
			self.inner.timers.clear_timeout(timer);
		}
	}

	fn tick(&self, ticket: PollTicket) {
		let element_present = self.inner.page.borrow().contains(&ticket.id);
		let tick = self.inner.session.borrow_mut().polls_mut().fire(&ticket, element_present);
		if let Tick::Fire(event) = tick {
			self.inner.session.borrow_mut().append(&event);
			let relay = self.clone();
			self.spawn(async move {
				let _ = relay.dispatch().await;
				let rearm = relay.inner.session.borrow_mut().polls_mut().round_trip_complete(&ticket);
				if rearm {
					relay.arm(ticket);
				}
			});
		}
	}

	fn render_status(&self) {
		let session = self.inner.session.borrow();
		let icons = session.config().status_icons();
		self.inner.page.borrow_mut().render_status(session.status(), &icons);
	}

	fn spawn(&self, future: impl Future<Output = ()> + 'static) {
		if let Err(spawn_error) = self.inner.spawner.spawn_local(future) {
			let error = RelayError::Spawn(spawn_error.to_string());
			error!(%error, "Dropping dispatch.");
			self.inner.session.borrow_mut().settle(&Err(error));
			self.render_status();
		}
	}
}
