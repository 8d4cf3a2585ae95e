
use ajax_relay::{poll::PollState, status::Status, transport::RequestOutcome, EventType};
use fake_page_::Harness;

fn polling_clock() -> Harness {
	let h = Harness::new();
	h.page.insert("clock", false, "");
	assert!(h.relay.start_polling("clock", EventType::PollTick, "", None, 1000));
	h
}

fn poll_state(h: &Harness) -> PollState {
	h.relay.with_session(|session| session.polls().state("clock"))
}

#[test]
fn restarting_keeps_a_single_timer() {
	let h = polling_clock();
	assert!(h.relay.start_polling("clock", EventType::PollTick, "", None, 250));
	assert_eq!(h.timers.delays(), vec![250]);
	assert_eq!(h.timers.0.borrow().cleared, 1);

	assert!(h.relay.stop_polling("clock"));
	assert_eq!(h.timers.pending(), 0);
	assert_eq!(poll_state(&h), PollState::Idle);
	assert!(!h.relay.stop_polling("clock"));
}

#[test]
fn missing_element_is_not_polled() {
	let h = Harness::new();
	assert!(!h.relay.start_polling("ghost", EventType::PollTick, "", None, 1000));
	assert_eq!(h.timers.pending(), 0);
}

#[test]
fn tick_rearms_only_after_the_round_trip() {
	let mut h = polling_clock();
	assert!(h.timers.fire_next());
	h.run();

	assert_eq!(h.transport.events(0)[0].component_id, "clock");
	assert_eq!(h.transport.events(0)[0].event_type, EventType::PollTick);
	assert_eq!(poll_state(&h), PollState::Firing);
	assert_eq!(h.timers.pending(), 0, "no timer while the tick is in flight");

	h.respond_ok("");
	assert_eq!(poll_state(&h), PollState::Scheduled);
	assert_eq!(h.timers.delays(), vec![1000]);
}

#[test]
fn poll_ticks_never_show_busy() {
	let mut h = polling_clock();
	for _ in 0..3 {
		assert!(h.timers.fire_next());
		h.run();
		assert_eq!(h.relay.status(), Status::Hidden);
		h.respond_ok("");
	}
	assert_eq!(h.transport.requests().len(), 3);
	assert!(!h.page.statuses().contains(&Status::Busy));
}

#[test]
fn failed_tick_still_rearms() {
	let mut h = polling_clock();
	assert!(h.timers.fire_next());
	h.run();
	h.transport.respond(RequestOutcome::HttpError {
		status: 502,
		status_text: "Bad Gateway".to_owned(),
	});
	h.run();
	assert!(matches!(h.relay.status(), Status::Error(_)));
	assert_eq!(h.timers.pending(), 1);
}

#[test]
fn removed_element_stops_polling() {
	let mut h = polling_clock();
	h.page.remove("clock");
	assert!(h.timers.fire_next());
	h.run();

	assert!(h.transport.requests().is_empty());
	assert_eq!(h.timers.pending(), 0);
	assert_eq!(poll_state(&h), PollState::Idle);
}

#[test]
fn stopping_during_flight_prevents_rearm() {
	let mut h = polling_clock();
	assert!(h.timers.fire_next());
	h.run();
	assert!(h.relay.stop_polling("clock"));

	h.respond_ok("");
	assert_eq!(h.timers.pending(), 0);
	assert_eq!(poll_state(&h), PollState::Idle);
}

#[test]
fn restart_during_flight_does_not_double_arm() {
	let mut h = polling_clock();
	assert!(h.timers.fire_next());
	h.run();
	assert!(h.relay.start_polling("clock", EventType::PollTick, "", None, 1000));
	assert_eq!(h.timers.pending(), 1);

	h.respond_ok("");
	assert_eq!(h.timers.pending(), 1);
}

#[test]
fn tick_during_interaction_folds_into_the_follow_up() {
	let mut h = polling_clock();
	h.page.insert("btn1", false, "");
	h.relay.catch_event("btn1", EventType::Click, "", None);
	h.run();

	assert!(h.timers.fire_next());
	h.run();
	assert_eq!(h.transport.requests().len(), 1);
	assert_eq!(h.timers.pending(), 0);

	h.respond_ok("");
	assert_eq!(h.transport.requests().len(), 2);
	assert_eq!(h.transport.events(1)[0].event_type, EventType::PollTick);
	assert_eq!(h.timers.pending(), 0);

	h.respond_ok("");
	assert_eq!(h.timers.delays(), vec![1000]);
}
