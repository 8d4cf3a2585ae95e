
use ajax_relay::{
	encoder::DecodedEvent,
	relay::{Dispatched, DELAYED_DISPATCH_MS},
	status::Status,
	transport::{Method, RequestOutcome},
	EventType, RelayError,
};
use fake_page_::Harness;
use serde_json::json;

fn event(component_id: &str, event_type: EventType, argument: &str, callback: &str) -> DecodedEvent {
	DecodedEvent {
		component_id: component_id.to_owned(),
		event_type,
		argument: argument.to_owned(),
		callback: callback.to_owned(),
	}
}

#[test]
fn batched_clicks_go_out_in_one_request() {
	let mut h = Harness::new();
	h.relay.append("btn1", EventType::Click, "", None);
	h.relay.append("btn1", EventType::Click, "", None);
	h.relay.flush();
	h.run();

	let requests = h.transport.requests();
	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].method, Method::Get);
	assert!(requests[0].url.starts_with("/iwb/ajax/req/?uri=Main&evt="));
	assert_eq!(h.transport.events(0), vec![event("btn1", EventType::Click, "", ""), event("btn1", EventType::Click, "", "")]);
	assert_eq!(h.relay.status(), Status::Busy);
	assert!(h.relay.with_session(|session| session.encoder().is_empty()));

	h.respond_ok("");
	assert_eq!(h.relay.status(), Status::Hidden);
	assert_eq!(h.page.statuses(), vec![Status::Busy, Status::Hidden]);
	assert_eq!(h.transport.requests().len(), 1);
}

#[test]
fn empty_batch_makes_no_request() {
	let mut h = Harness::new();
	h.relay.flush();
	h.run();
	assert!(h.transport.requests().is_empty());

	let dispatched = h.pool.run_until(h.relay.dispatch());
	assert!(matches!(dispatched, Dispatched::Skipped));
	assert!(h.transport.requests().is_empty());
	assert!(h.page.statuses().is_empty());
}

#[test]
fn events_during_flight_ride_on_the_follow_up() {
	let mut h = Harness::new();
	h.relay.catch_event("a", EventType::Click, "", None);
	h.run();
	assert_eq!(h.transport.in_flight(), 1);

	h.relay.catch_event("b", EventType::Click, "", None);
	h.relay.catch_event("c", EventType::ValueChanged, "x", Some("cb"));
	h.run();
	assert_eq!(h.transport.requests().len(), 1, "second request while the first is in flight");
	assert_eq!(h.relay.with_session(|session| session.encoder().len()), 2);

	h.respond_ok("");
	assert_eq!(h.transport.requests().len(), 2);
	assert_eq!(h.transport.events(1), vec![event("b", EventType::Click, "", ""), event("c", EventType::ValueChanged, "x", "cb")]);
	assert_eq!(h.relay.status(), Status::Busy);

	h.respond_ok("");
	assert_eq!(h.transport.requests().len(), 2);
	assert_eq!(h.relay.status(), Status::Hidden);
	assert!(!h.relay.with_session(|session| session.in_flight()));
}

#[test]
fn http_error_is_shown_until_the_next_request() {
	let mut h = Harness::new();
	h.relay.catch_event("btn1", EventType::Click, "", None);
	h.run();
	h.transport.respond(RequestOutcome::HttpError {
		status: 500,
		status_text: "Internal Server Error".to_owned(),
	});
	h.run();
	assert_eq!(h.relay.status(), Status::Error("Error: Internal Server Error (HTTP 500)".to_owned()));

	h.relay.catch_event("btn1", EventType::Click, "", None);
	h.run();
	assert_eq!(h.transport.requests().len(), 2);
	assert_eq!(h.relay.status(), Status::Busy);
}

#[test]
fn transport_exception_sets_error() {
	let mut h = Harness::new();
	h.relay.catch_event("btn1", EventType::Click, "", None);
	h.run();
	h.transport.respond(RequestOutcome::TransportException("network down".to_owned()));
	h.run();
	assert_eq!(h.relay.status(), Status::Error("network down".to_owned()));
	assert!(!h.relay.with_session(|session| session.in_flight()));
}

#[test]
fn malformed_response_leaves_the_relay_usable() {
	let mut h = Harness::new();
	h.relay.catch_event("btn1", EventType::Click, "", None);
	h.run();
	h.respond_ok("this is not json");
	assert!(matches!(h.relay.status(), Status::Error(_)));
	assert!(h.relay.with_session(|session| !session.in_flight() && session.encoder().is_empty()));

	h.relay.catch_event("btn2", EventType::Click, "", None);
	h.run();
	assert_eq!(h.transport.requests().len(), 2);
	h.respond_ok("[]");
	assert_eq!(h.relay.status(), Status::Hidden);
}

#[test]
fn init_announces_the_page() {
	let mut h = Harness::new();
	h.relay.init(Some("ready"));
	h.run();
	assert_eq!(h.transport.events(0), vec![event("__init__", EventType::Click, "", "ready")]);
}

#[test]
fn delayed_event_is_sent_when_the_timer_fires() {
	let mut h = Harness::new();
	h.relay.delayed_catch_event("name", EventType::ValueChanged, "Ada");
	h.run();
	assert_eq!(h.timers.delays(), vec![DELAYED_DISPATCH_MS]);
	assert!(h.transport.requests().is_empty());

	assert!(h.timers.fire_next());
	h.run();
	assert_eq!(h.transport.events(0), vec![event("name", EventType::ValueChanged, "Ada", "")]);
}

#[test]
fn delayed_event_can_be_picked_up_early() {
	let mut h = Harness::new();
	h.relay.delayed_catch_event("name", EventType::ValueChanged, "Ada");
	h.relay.catch_event("save", EventType::Click, "", None);
	h.run();
	assert_eq!(h.transport.events(0), vec![event("name", EventType::ValueChanged, "Ada", ""), event("save", EventType::Click, "", "")]);

	h.respond_ok("");
	assert!(h.timers.fire_next());
	h.run();
	assert_eq!(h.transport.requests().len(), 1);
}

#[test]
fn submitted_values_are_structured() {
	let mut h = Harness::new();
	h.page.insert("first", true, "Ada");
	h.page.insert("last", true, "Lovelace");
	h.relay.submit_values("save", &["first", "last"]).unwrap();
	h.run();

	let events = h.transport.events(0);
	assert_eq!(events.len(), 1);
	assert_eq!(events[0].component_id, "save");
	assert_eq!(
		events[0].structured_argument().unwrap(),
		json!([{ "id": "first", "val": "Ada" }, { "id": "last", "val": "Lovelace" }])
	);
}

#[test]
fn missing_component_value_queues_nothing() {
	let mut h = Harness::new();
	h.page.insert("first", true, "Ada");
	let error = h.relay.submit_values("save", &["first", "ghost"]).unwrap_err();
	assert!(matches!(error, RelayError::ElementNotFound(id) if id == "ghost"));
	h.run();
	assert!(h.transport.requests().is_empty());
	assert!(h.relay.with_session(|session| session.encoder().is_empty()));
}
