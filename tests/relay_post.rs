
use ajax_relay::{status::Status, transport::Method, EventType};
use fake_page_::Harness;

#[test]
fn post_targets_the_component() {
	let mut h = Harness::new();
	h.relay.post("upload", EventType::Submit, Some("name=a%20b"));
	h.run();

	let requests = h.transport.requests();
	assert_eq!(requests.len(), 1);
	let request = &requests[0];
	assert_eq!(request.method, Method::Post);
	assert_eq!(request.url, "/iwb/ajax/req/upload");
	assert_eq!(request.body.as_deref(), Some("uri=Main&name=a%20b"));
	assert_eq!(request.header("content-type"), Some("application/x-www-form-urlencoded"));
	assert_eq!(request.header("Content-Length"), Some("19"));
	assert_eq!(request.header("Connection"), Some("close"));
	assert_eq!(h.relay.status(), Status::Busy);

	h.respond_ok(r#"[{"op":"redirect","url":"/done"}]"#);
	assert_eq!(h.relay.status(), Status::Hidden);
	assert_eq!(h.page.navigations(), vec![("/done".to_owned(), false)]);
}

#[test]
fn encoded_post_defaults_to_args() {
	let mut h = Harness::new();
	h.relay.post_encoded("pw", EventType::Submit, "s3cret/&=", None);
	h.relay.post_encoded("search", EventType::KeyEnter, "a b", Some("q"));
	h.run();

	let requests = h.transport.requests();
	assert_eq!(requests[0].body.as_deref(), Some("uri=Main&args=s3cret%2F%26%3D"));
	assert_eq!(requests[1].body.as_deref(), Some("uri=Main&q=a%20b"));
}

#[test]
fn post_leaves_the_batch_and_poll_channel_alone() {
	let mut h = Harness::new();
	h.relay.append("name", EventType::ValueChanged, "Ada", None);
	h.relay.post("upload", EventType::Submit, None);
	h.run();

	assert_eq!(h.transport.requests()[0].body.as_deref(), Some("uri=Main"));
	assert_eq!(h.relay.with_session(|session| session.encoder().len()), 1);
	assert!(!h.relay.with_session(|session| session.in_flight()));

	h.relay.flush();
	h.run();
	assert_eq!(h.transport.in_flight(), 2, "the poll channel doesn't wait for posts");
}
