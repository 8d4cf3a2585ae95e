//! Interprets response envelopes against a [`Page`].

use crate::{
	error::ApplyError,
	page::{Page, SelectionRange},
	patch::{parse_envelope, PatchOp},
};
use core::cell::RefCell;
use hashbrown::HashMap;
use serde_json::Value;
use std::rc::Rc;
use tracing::{debug, instrument, trace, trace_span, warn};

/// A callback the server may invoke by name. The `Err` message ends up in the error indicator.
pub type NamedCallback = Rc<dyn Fn(&[Value]) -> Result<(), String>>;

/// Focus state captured before a response is applied.
#[derive(Debug, Clone)]
pub struct FocusSnapshot<N> {
	node: N,
	pub element_id: Option<String>,
	pub selection: Option<SelectionRange>,
}

impl<N: Clone> FocusSnapshot<N> {
	pub fn capture<P: Page<Node = N>>(page: &P) -> Option<Self> {
		let node = page.active_element()?;
		Some(Self {
			element_id: page.element_id(&node).filter(|id| !id.is_empty()),
			selection: page.text_selection(&node),
			node,
		})
	}

	/// Refocuses the element with the same id, but only if the original node left the document.
	///
	/// Returns whether focus was moved.
	pub fn restore<P: Page<Node = N>>(&self, page: &mut P) -> bool {
		if page.is_attached(&self.node) {
			return false;
		}
		match &self.element_id {
			Some(id) => {
				let focused = page.focus(id, self.selection);
				trace!(id = %id, selection = ?self.selection, focused, "Restored focus.");
				focused
			}
			None => false,
		}
	}
}

/// Cheap to clone; clones share the registered callbacks.
#[derive(Clone, Default)]
pub struct ResponseApplier {
	callbacks: HashMap<String, NamedCallback>,
}

impl core::fmt::Debug for ResponseApplier {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("ResponseApplier").field("callbacks", &self.callbacks.keys().collect::<Vec<_>>()).finish()
	}
}

impl ResponseApplier {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers (or replaces) the callback `name`.
	pub fn register_callback(&mut self, name: impl Into<String>, callback: impl Fn(&[Value]) -> Result<(), String> + 'static) {
		self.callbacks.insert(name.into(), Rc::new(callback));
	}

	/// Parses `body` and applies its operations in order, then restores focus if the focused element was replaced.
	///
	/// `page` is only borrowed for the duration of each DOM operation. Callbacks run without any borrow held,
	/// so they may use the page or the relay that owns it.
	///
	/// Returns the number of applied operations.
	///
	/// # Errors
	///
	/// On the first operation that fails. Focus is not restored in that case.
	#[instrument(skip(self, body, page), fields(body_len = body.len()))]
	pub fn apply<P: Page>(&self, body: &str, page: &RefCell<P>) -> Result<usize, ApplyError> {
		if cfg!(feature = "dangerous-logging") {
			trace!(body, "Applying response.");
		}
		let ops = parse_envelope(body)?;
		if ops.is_empty() {
			return Ok(0);
		}

		let snapshot = FocusSnapshot::capture(&*page.borrow());
		for (index, op) in ops.iter().enumerate() {
			let span = trace_span!("Applying patch", index, target = ?op.target());
			let _enter = span.enter();
			self.apply_op(op, page).map_err(|error| {
				warn!(index, %error, "Patch failed; skipping the rest of the envelope.");
				error
			})?;
		}
		if let Some(snapshot) = snapshot {
			snapshot.restore(&mut *page.borrow_mut());
		}

		debug!(count = ops.len(), "Applied response.");
		Ok(ops.len())
	}

	fn apply_op<P: Page>(&self, op: &PatchOp, page: &RefCell<P>) -> Result<(), ApplyError> {
		if let PatchOp::InvokeCallback { name, args } = op {
			let callback = self.callbacks.get(name).cloned().ok_or_else(|| ApplyError::UnknownCallback(name.clone()))?;
			return callback(args).map_err(|message| ApplyError::Callback { name: name.clone(), message });
		}

		let mut page = page.borrow_mut();
		match op {
			PatchOp::ReplaceHtml { id, html } => page.replace_html(id, html)?,
			PatchOp::SetInnerHtml { id, html } => page.set_inner_html(id, html)?,
			PatchOp::SetAttribute { id, name, value } => page.set_attribute(id, name, value)?,
			PatchOp::RemoveAttribute { id, name } => page.remove_attribute(id, name)?,
			PatchOp::RemoveNode { id } => page.remove_node(id)?,
			PatchOp::Redirect { url, new_window } => page.navigate(url, *new_window)?,
			PatchOp::InvokeCallback { .. } => {}
		}
		Ok(())
	}
}
