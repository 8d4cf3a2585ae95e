//! Browser bindings: `web_sys` DOM, `fetch`, `setTimeout` and `spawn_local`.
//!
//! [`connect`] wires them into a [`Relay`]. The `#[wasm_bindgen]` exports at the bottom are what server-rendered
//! markup calls from its event handlers.

use crate::{
	config::RelayConfig,
	error::RelayError,
	event::{Argument, EventType},
	page::{Page, PageError, SelectionRange},
	relay::Relay,
	status::{Status, StatusIcons},
	timer::{TimerHandle, Timers},
	transport::{Request, RequestOutcome, Transport},
};
use core::{cell::RefCell, convert::TryFrom};
use futures::{
	future::{FutureExt, LocalBoxFuture},
	task::{LocalFutureObj, LocalSpawn, SpawnError},
};
use js_sys::Function;
use serde_json::Value;
use std::sync::Once;
use tracing::{error, instrument, trace, warn};
use wasm_bindgen::{closure::Closure, prelude::wasm_bindgen, JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Element, HtmlElement, HtmlInputElement, HtmlTextAreaElement, Window};

const PROGRESS_ID: &str = "progress";
const PROGRESS_IMAGE_ID: &str = "progressImg";

fn describe(value: &JsValue) -> String {
	value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

fn rejected(id: &str, value: &JsValue) -> PageError {
	PageError::Rejected {
		id: id.to_owned(),
		message: describe(value),
	}
}

/// The current document.
#[derive(Debug, Clone)]
pub struct WebPage {
	window: Window,
	document: web_sys::Document,
}

impl WebPage {
	/// # Errors
	///
	/// Iff there's no `window` or `document`, e.g. in a worker.
	pub fn new() -> Result<Self, RelayError> {
		let window = web_sys::window().ok_or(RelayError::NoDocument)?;
		let document = window.document().ok_or(RelayError::NoDocument)?;
		Ok(Self { window, document })
	}

	#[must_use]
	pub fn window(&self) -> &Window {
		&self.window
	}

	#[must_use]
	pub fn is_webkit(&self) -> bool {
		self.window.navigator().user_agent().map_or(false, |user_agent| user_agent.to_lowercase().contains("webkit"))
	}

	fn element(&self, id: &str) -> Result<Element, PageError> {
		self.document.get_element_by_id(id).ok_or_else(|| PageError::NotFound(id.to_owned()))
	}

	fn focus_without_scrolling(&self, element: &HtmlElement) {
		let x = self.window.scroll_x().unwrap_or_default();
		let y = self.window.scroll_y().unwrap_or_default();
		// Hidden or disabled elements refuse focus; that's fine.
		if element.focus().is_ok() {
			self.window.scroll_to_with_x_and_y(x, y);
		}
	}

	/// Finds or creates the progress container and its image.
	fn progress(&self) -> Option<(HtmlElement, Element)> {
		if let (Some(container), Some(image)) = (self.document.get_element_by_id(PROGRESS_ID), self.document.get_element_by_id(PROGRESS_IMAGE_ID)) {
			return Some((container.dyn_into().ok()?, image));
		}

		let body = self.document.body()?;
		let container: HtmlElement = self.document.create_element("div").ok()?.dyn_into().ok()?;
		container.set_id(PROGRESS_ID);
		container.set_class_name("flProgress");
		let style = container.style();
		style.set_property("z-index", "999").ok()?;
		style.set_property("display", "none").ok()?;
		let image = self.document.create_element("img").ok()?;
		image.set_id(PROGRESS_IMAGE_ID);
		container.append_child(&image).ok()?;
		body.append_child(&container).ok()?;
		trace!("Created progress indicator.");
		Some((container, image))
	}
}

enum TextControl {
	Input(HtmlInputElement),
	TextArea(HtmlTextAreaElement),
}

impl TextControl {
	fn of(element: &Element) -> Option<Self> {
		if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
			if input.type_().eq_ignore_ascii_case("text") {
				return Some(Self::Input(input.clone()));
			}
			return None;
		}
		element.dyn_ref::<HtmlTextAreaElement>().map(|text_area| Self::TextArea(text_area.clone()))
	}

	fn selection(&self) -> Option<SelectionRange> {
		let (start, end) = match self {
			Self::Input(input) => (input.selection_start(), input.selection_end()),
			Self::TextArea(text_area) => (text_area.selection_start(), text_area.selection_end()),
		};
		Some(SelectionRange {
			start: start.ok()??,
			end: end.ok()??,
		})
	}

	fn set_selection(&self, SelectionRange { start, end }: SelectionRange) -> Result<(), JsValue> {
		match self {
			Self::Input(input) => input.set_selection_range(start, end),
			Self::TextArea(text_area) => text_area.set_selection_range(start, end),
		}
	}
}

impl Page for WebPage {
	type Node = Element;

	fn contains(&self, id: &str) -> bool {
		self.document.get_element_by_id(id).is_some()
	}

	fn value_of(&self, id: &str) -> Option<String> {
		let element = self.document.get_element_by_id(id)?;
		Some(if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
			input.value()
		} else if let Some(text_area) = element.dyn_ref::<HtmlTextAreaElement>() {
			text_area.value()
		} else {
			element.get_attribute("value").unwrap_or_default()
		})
	}

	fn location_href(&self) -> String {
		self.window.location().href().unwrap_or_default()
	}

	fn active_element(&self) -> Option<Element> {
		self.document.active_element()
	}

	fn element_id(&self, node: &Element) -> Option<String> {
		Some(node.id())
	}

	fn text_selection(&self, node: &Element) -> Option<SelectionRange> {
		TextControl::of(node)?.selection()
	}

	fn is_attached(&self, node: &Element) -> bool {
		node.is_connected()
	}

	fn focus(&mut self, id: &str, selection: Option<SelectionRange>) -> bool {
		let element = match self.document.get_element_by_id(id) {
			Some(element) => element,
			None => return false,
		};
		if let Some(html_element) = element.dyn_ref::<HtmlElement>() {
			self.focus_without_scrolling(html_element);
		}
		if let (Some(selection), Some(control)) = (selection, TextControl::of(&element)) {
			if let Err(error) = control.set_selection(selection) {
				warn!(id, error = %describe(&error), "Failed to restore selection.");
			}
		}
		true
	}

	fn replace_html(&mut self, id: &str, html: &str) -> Result<(), PageError> {
		self.element(id)?.set_outer_html(html);
		Ok(())
	}

	fn set_inner_html(&mut self, id: &str, html: &str) -> Result<(), PageError> {
		self.element(id)?.set_inner_html(html);
		Ok(())
	}

	fn set_attribute(&mut self, id: &str, name: &str, value: &str) -> Result<(), PageError> {
		self.element(id)?.set_attribute(name, value).map_err(|error| rejected(id, &error))
	}

	fn remove_attribute(&mut self, id: &str, name: &str) -> Result<(), PageError> {
		self.element(id)?.remove_attribute(name).map_err(|error| rejected(id, &error))
	}

	fn remove_node(&mut self, id: &str) -> Result<(), PageError> {
		self.element(id)?.remove();
		Ok(())
	}

	fn navigate(&mut self, url: &str, new_window: bool) -> Result<(), PageError> {
		if new_window {
			self.window.open_with_url(url).map(drop).map_err(|error| rejected("window", &error))
		} else {
			self.window.location().set_href(url).map_err(|error| rejected("location", &error))
		}
	}

	fn render_status(&mut self, status: &Status, icons: &StatusIcons) {
		let (container, image) = match self.progress() {
			Some(elements) => elements,
			None => {
				warn!("Unable to create the progress indicator.");
				return;
			}
		};
		let (display, src, tooltip, cursor) = match status {
			Status::Hidden => ("none", None, "", ""),
			Status::Busy => ("block", Some(icons.busy.as_str()), "", "wait"),
			Status::Error(message) => ("block", Some(icons.error.as_str()), message.as_str(), ""),
		};

		let mut results = vec![container.style().set_property("display", display)];
		if let Some(src) = src {
			results.push(image.set_attribute("src", src));
		}
		results.push(image.set_attribute("alt", tooltip));
		results.push(image.set_attribute("title", tooltip));
		if let Some(body) = self.document.body() {
			results.push(body.style().set_property("cursor", cursor));
		}
		for error in results.into_iter().filter_map(Result::err) {
			warn!(error = %describe(&error), "Failed to update the progress indicator.");
		}
	}
}

/// `fetch`-based [`Transport`].
#[derive(Debug, Clone)]
pub struct FetchTransport {
	window: Window,
}

impl FetchTransport {
	#[must_use]
	pub fn new(window: Window) -> Self {
		Self { window }
	}
}

impl Transport for FetchTransport {
	fn send(&self, request: Request) -> LocalBoxFuture<'static, RequestOutcome> {
		let window = self.window.clone();
		async move {
			match fetch(&window, &request).await {
				Ok(outcome) => outcome,
				Err(error) => RequestOutcome::TransportException(describe(&error)),
			}
		}
		.boxed_local()
	}
}

#[instrument(skip(window, request), fields(method = request.method.as_str(), url = %request.url))]
async fn fetch(window: &Window, request: &Request) -> Result<RequestOutcome, JsValue> {
	let init = web_sys::RequestInit::new();
	init.set_method(request.method.as_str());
	let headers = web_sys::Headers::new()?;
	for (name, value) in &request.headers {
		headers.set(name, value)?;
	}
	init.set_headers(&headers);
	if let Some(body) = &request.body {
		init.set_body(&JsValue::from_str(body));
	}

	let js_request = web_sys::Request::new_with_str_and_init(&request.url, &init)?;
	let response: web_sys::Response = JsFuture::from(window.fetch_with_request(&js_request)).await?.dyn_into()?;
	let body = JsFuture::from(response.text()?).await?.as_string().unwrap_or_default();
	trace!(status = response.status(), body_len = body.len(), "Received response.");
	Ok(RequestOutcome::from_status(response.status(), response.status_text(), body))
}

/// `setTimeout`/`clearTimeout`.
#[derive(Debug, Clone)]
pub struct WebTimers {
	window: Window,
}

impl WebTimers {
	#[must_use]
	pub fn new(window: Window) -> Self {
		Self { window }
	}
}

impl Timers for WebTimers {
	fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle {
		// Freed by the JS side once called. Cleared timers leak their closure.
		let closure = Closure::once_into_js(callback);
		let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
		match self.window.set_timeout_with_callback_and_timeout_and_arguments_0(closure.unchecked_ref::<Function>(), delay) {
			Ok(raw) => TimerHandle::from_raw(raw),
			Err(error) => {
				error!(error = %describe(&error), "setTimeout failed.");
				// 0 is never a valid timer id, so clearing it is a no-op.
				TimerHandle::from_raw(0)
			}
		}
	}

	fn clear_timeout(&self, handle: TimerHandle) {
		self.window.clear_timeout_with_handle(handle.into_raw());
	}

	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	fn now_ms(&self) -> u64 {
		js_sys::Date::now() as u64
	}
}

/// Spawns onto the browser's microtask queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSpawner;

impl LocalSpawn for WebSpawner {
	fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
		wasm_bindgen_futures::spawn_local(future);
		Ok(())
	}
}

static LOGGING: Once = Once::new();

/// Creates a [`Relay`] for the current page.
///
/// Installs `tracing-wasm` if `config.debug_enabled`, and turns on cache busting for WebKit browsers.
///
/// # Errors
///
/// Iff there's no `window` or `document`.
pub fn connect(config: RelayConfig) -> Result<Relay<WebPage>, RelayError> {
	if config.debug_enabled {
		LOGGING.call_once(tracing_wasm::set_as_global_default);
	}
	let page = WebPage::new()?;
	let cache_busting = config.cache_busting || page.is_webkit();
	let window = page.window().clone();
	Ok(Relay::new(
		config.with_cache_busting(cache_busting),
		page,
		FetchTransport::new(window.clone()),
		WebTimers::new(window),
		WebSpawner,
	))
}

thread_local! {
	static RELAY: RefCell<Option<Relay<WebPage>>> = RefCell::new(None);
}

fn with_relay<R>(f: impl FnOnce(&Relay<WebPage>) -> Result<R, JsValue>) -> Result<R, JsValue> {
	// Cloned out so that `f` may re-enter.
	let relay = RELAY.with(|relay| relay.borrow().clone());
	match relay {
		Some(relay) => f(&relay),
		None => Err(JsValue::from_str("ajax-relay is not initialized; call `fluInit` first")),
	}
}

fn event_type(value: u8) -> Result<EventType, JsValue> {
	EventType::try_from(value).map_err(|error| JsValue::from_str(&error.to_string()))
}

/// Converts a JS event argument. Objects and `null` are serialized to JSON, everything else is stringified.
fn argument(value: &JsValue) -> Result<Argument, JsValue> {
	if value.is_undefined() {
		return Ok(Argument::default());
	}
	if value.is_null() {
		return Ok(Argument::Structured(Value::Null));
	}
	if let Some(text) = value.as_string() {
		return Ok(Argument::Text(text));
	}
	if let Some(number) = value.as_f64() {
		return Ok(Argument::Text(number.to_string()));
	}
	if let Some(flag) = value.as_bool() {
		return Ok(Argument::Text(flag.to_string()));
	}
	let json = String::from(js_sys::JSON::stringify(value)?);
	serde_json::from_str(&json).map(Argument::Structured).map_err(|error| JsValue::from_str(&error.to_string()))
}

/// Sets up the relay for this page and sends the init event.
#[wasm_bindgen(js_name = fluInit)]
pub fn flu_init(context_path: &str, debug_enabled: bool, callback: Option<String>) -> Result<(), JsValue> {
	let relay = connect(RelayConfig::new(context_path).with_debug(debug_enabled)).map_err(|error| JsValue::from_str(&error.to_string()))?;
	RELAY.with(|slot| *slot.borrow_mut() = Some(relay.clone()));
	relay.init(callback.as_deref());
	Ok(())
}

#[wasm_bindgen(js_name = catchEventId)]
pub fn catch_event_id(id: &str, event_type_value: u8, arg: JsValue, callback: Option<String>) -> Result<(), JsValue> {
	with_relay(|relay| {
		relay.catch_event(id, event_type(event_type_value)?, argument(&arg)?, callback.as_deref());
		Ok(())
	})
}

#[wasm_bindgen(js_name = appendEventId)]
pub fn append_event_id(id: &str, event_type_value: u8, arg: JsValue, callback: Option<String>) -> Result<(), JsValue> {
	with_relay(|relay| {
		relay.append(id, event_type(event_type_value)?, argument(&arg)?, callback.as_deref());
		Ok(())
	})
}

#[wasm_bindgen(js_name = delayedCatchEventId)]
pub fn delayed_catch_event_id(id: &str, event_type_value: u8, arg: JsValue) -> Result<(), JsValue> {
	with_relay(|relay| {
		relay.delayed_catch_event(id, event_type(event_type_value)?, argument(&arg)?);
		Ok(())
	})
}

#[wasm_bindgen(js_name = sendUnsentEvents)]
pub fn send_unsent_events() -> Result<(), JsValue> {
	with_relay(|relay| {
		relay.flush();
		Ok(())
	})
}

#[wasm_bindgen(js_name = catchPostEventId)]
pub fn catch_post_event_id(id: &str, event_type_value: u8, parameters: Option<String>) -> Result<(), JsValue> {
	with_relay(|relay| {
		relay.post(id, event_type(event_type_value)?, parameters.as_deref());
		Ok(())
	})
}

#[wasm_bindgen(js_name = catchPostEventIdEncode)]
pub fn catch_post_event_id_encode(id: &str, event_type_value: u8, parameter: Option<String>, param_name: Option<String>) -> Result<(), JsValue> {
	with_relay(|relay| {
		relay.post_encoded(id, event_type(event_type_value)?, parameter.as_deref().unwrap_or_default(), param_name.as_deref());
		Ok(())
	})
}

#[wasm_bindgen(js_name = startAsyncUpdatePeriodical)]
pub fn start_async_update_periodical(id: &str, event_type_value: u8, arg: JsValue, callback: Option<String>, timeout: u32) -> Result<bool, JsValue> {
	with_relay(|relay| Ok(relay.start_polling(id, event_type(event_type_value)?, argument(&arg)?, callback.as_deref(), timeout)))
}

#[wasm_bindgen(js_name = stopAsyncUpdatePeriodical)]
pub fn stop_async_update_periodical(id: &str) -> Result<bool, JsValue> {
	with_relay(|relay| Ok(relay.stop_polling(id)))
}

/// Returns `[{"id": …, "val": …}]` as JSON. Throws if a component is missing.
#[wasm_bindgen(js_name = getValuesFromComps)]
pub fn get_values_from_comps(ids: &js_sys::Array) -> Result<String, JsValue> {
	let ids: Vec<String> = ids.iter().filter_map(|id| id.as_string()).collect();
	let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
	with_relay(|relay| relay.component_values(&ids).map(|values| values.to_string()).map_err(|error| JsValue::from_str(&error.to_string())))
}
