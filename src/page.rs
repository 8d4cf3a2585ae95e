//! The live document as seen by the relay.
//!
//! [`WebPage`](`crate::web::WebPage`) implements this on top of `web_sys`.
//! Everything here is synchronous and runs on the UI thread.

use crate::status::{Status, StatusIcons};

/// Caret or selection offsets inside a text input, in UTF-16 code units as the DOM reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRange {
	pub start: u32,
	pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
	#[error("no element with id {0:?}")]
	NotFound(String),
	#[error("element {id:?} rejected the change: {message}")]
	Rejected { id: String, message: String },
}

pub trait Page {
	/// A handle to a DOM node, with identity. Two handles to the same node must refer to the same node even after the
	/// document changes around it.
	type Node: Clone;

	fn contains(&self, id: &str) -> bool;

	/// The form value of the element `id`, or [`None`] if there is no such element.
	fn value_of(&self, id: &str) -> Option<String>;

	/// Everything after `?` is forwarded to the server.
	fn location_href(&self) -> String;

	fn active_element(&self) -> Option<Self::Node>;
	fn element_id(&self, node: &Self::Node) -> Option<String>;
	/// [`Some`] only for text inputs and text areas.
	fn text_selection(&self, node: &Self::Node) -> Option<SelectionRange>;
	/// Whether `node` is still part of the document tree.
	fn is_attached(&self, node: &Self::Node) -> bool;
	/// Focuses the element `id` without scrolling and applies `selection` if it is a text input.
	///
	/// Returns whether an element was found.
	fn focus(&mut self, id: &str, selection: Option<SelectionRange>) -> bool;

	/// Replaces the element `id` itself (its outer HTML).
	///
	/// # Errors
	///
	/// Iff there's no element `id` or it can't be replaced.
	fn replace_html(&mut self, id: &str, html: &str) -> Result<(), PageError>;

	/// # Errors
	///
	/// Iff there's no element `id` or its content can't be replaced.
	fn set_inner_html(&mut self, id: &str, html: &str) -> Result<(), PageError>;

	/// # Errors
	///
	/// Iff there's no element `id` or the attribute is rejected.
	fn set_attribute(&mut self, id: &str, name: &str, value: &str) -> Result<(), PageError>;

	/// # Errors
	///
	/// Iff there's no element `id`.
	fn remove_attribute(&mut self, id: &str, name: &str) -> Result<(), PageError>;

	/// # Errors
	///
	/// Iff there's no element `id`.
	fn remove_node(&mut self, id: &str) -> Result<(), PageError>;

	/// # Errors
	///
	/// Iff the browser refuses to navigate.
	fn navigate(&mut self, url: &str, new_window: bool) -> Result<(), PageError>;

	/// Shows `status`. Rendering problems are logged, not reported.
	fn render_status(&mut self, status: &Status, icons: &StatusIcons);
}
