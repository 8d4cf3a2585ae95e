//! HTTP requests for the poll channel and component POSTs.

use crate::config::RelayConfig;
use futures::future::LocalBoxFuture;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
	Get,
	Post,
}

impl Method {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
	pub method: Method,
	pub url: String,
	pub headers: Vec<(String, String)>,
	pub body: Option<String>,
}

impl Request {
	/// The poll-channel GET.
	///
	/// `&evt=` is only added for a non-empty batch, `&fool_webkit=` only if `cache_buster` is given.
	#[must_use]
	pub fn poll(config: &RelayConfig, page_query: &str, batch: &str, cache_buster: Option<u64>) -> Self {
		let mut url = format!("{}ajax/req/?{}", config.context_path(), page_query);
		if !batch.is_empty() {
			url.push_str("&evt=");
			url.push_str(batch);
		}
		if let Some(timestamp) = cache_buster {
			url.push_str("&fool_webkit=");
			url.push_str(&timestamp.to_string());
		}
		Self {
			method: Method::Get,
			url,
			headers: Vec::new(),
			body: None,
		}
	}

	/// A targeted POST to one component. `params` must already be url-encoded.
	#[must_use]
	pub fn component_post(config: &RelayConfig, component_id: &str, page_query: &str, params: Option<&str>) -> Self {
		let mut body = page_query.to_owned();
		if let Some(params) = params.filter(|params| !params.is_empty()) {
			body.push('&');
			body.push_str(params);
		}
		Self {
			method: Method::Post,
			url: format!("{}ajax/req/{}", config.context_path(), component_id),
			headers: vec![
				("Content-Type".to_owned(), "application/x-www-form-urlencoded".to_owned()),
				("Content-Length".to_owned(), body.len().to_string()),
				("Connection".to_owned(), "close".to_owned()),
			],
			body: Some(body),
		}
	}

	#[must_use]
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
	}
}

/// How a single request ended. There is no automatic retry for any of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
	Success(String),
	HttpError { status: u16, status_text: String },
	TransportException(String),
}

impl RequestOutcome {
	/// Maps a finished HTTP exchange. Only status 200 counts as success.
	#[must_use]
	pub fn from_status(status: u16, status_text: impl Into<String>, body: String) -> Self {
		if status == 200 {
			Self::Success(body)
		} else {
			Self::HttpError {
				status,
				status_text: status_text.into(),
			}
		}
	}
}

impl fmt::Display for RequestOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Success(body) => write!(f, "success ({} bytes)", body.len()),
			Self::HttpError { status, status_text } => write!(f, "HTTP {} {}", status, status_text),
			Self::TransportException(message) => write!(f, "transport exception: {}", message),
		}
	}
}

/// Issues requests. Implementations resolve to exactly one [`RequestOutcome`] and never panic on network failure.
pub trait Transport {
	fn send(&self, request: Request) -> LocalBoxFuture<'static, RequestOutcome>;
}

/// Extracts the query string that is forwarded to the server: the `#` fragment is cut off first, then everything after the first `?`.
#[must_use]
pub fn page_query(href: &str) -> &str {
	let without_fragment = href.split('#').next().unwrap_or_default();
	without_fragment.split_once('?').map_or("", |(_, query)| query)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn page_query_strips_fragment() {
		assert_eq!(page_query("http://localhost:50080/sap/jsps/pool.jsp?moref=pool-3&name=test#4"), "moref=pool-3&name=test");
		assert_eq!(page_query("http://localhost/page?a=1"), "a=1");
		assert_eq!(page_query("http://localhost/page#top"), "");
		assert_eq!(page_query("http://localhost/page"), "");
		assert_eq!(page_query("http://host/iwb/resource#section?secret=1"), "");
		assert_eq!(page_query("http://host/iwb/resource?uri=Main#section?secret=1"), "uri=Main");
	}

	#[test]
	fn poll_url_layout() {
		let config = RelayConfig::new("/iwb");
		let request = Request::poll(&config, "uri=Main", "btn1%2F1%2F%2F", Some(1234));
		assert_eq!(request.method, Method::Get);
		assert_eq!(request.url, "/iwb/ajax/req/?uri=Main&evt=btn1%2F1%2F%2F&fool_webkit=1234");
		assert!(request.body.is_none());

		let request = Request::poll(&RelayConfig::default(), "", "", None);
		assert_eq!(request.url, "ajax/req/?");
	}

	#[test]
	fn post_headers_match_body() {
		let config = RelayConfig::new("/iwb/");
		let request = Request::component_post(&config, "pw1", "uri=Main", Some("args=s%C3%A4cret"));
		assert_eq!(request.method, Method::Post);
		assert_eq!(request.url, "/iwb/ajax/req/pw1");
		assert_eq!(request.body.as_deref(), Some("uri=Main&args=s%C3%A4cret"));
		assert_eq!(request.header("content-type"), Some("application/x-www-form-urlencoded"));
		assert_eq!(request.header("Content-Length"), Some("25"));
		assert_eq!(request.header("Connection"), Some("close"));

		let request = Request::component_post(&config, "pw1", "uri=Main", Some(""));
		assert_eq!(request.body.as_deref(), Some("uri=Main"));
	}

	#[test]
	fn only_200_is_success() {
		assert_eq!(RequestOutcome::from_status(200, "OK", "x".into()), RequestOutcome::Success("x".into()));
		assert_eq!(
			RequestOutcome::from_status(204, "No Content", String::new()),
			RequestOutcome::HttpError {
				status: 204,
				status_text: "No Content".into()
			}
		);
	}
}
