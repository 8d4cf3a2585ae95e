use crate::status::StatusIcons;
use serde::Deserialize;

/// Resolved once at page load and owned by the [`AjaxSession`](`crate::session::AjaxSession`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelayConfig {
	context_path: String,
	/// Gates diagnostic logging. In the browser, no subscriber is installed unless this is set.
	pub debug_enabled: bool,
	/// Adds a `fool_webkit` timestamp to poll requests so aggressive caches can't answer them.
	pub cache_busting: bool,
	/// Defaults to the icons below the context path if absent.
	pub status_icons: Option<StatusIcons>,
}

impl RelayConfig {
	#[must_use]
	pub fn new(context_path: &str) -> Self {
		Self::default().with_context_path(context_path)
	}

	/// # Errors
	///
	/// Iff `json` isn't a valid configuration object.
	pub fn from_json(json: &str) -> serde_json::Result<Self> {
		let config: Self = serde_json::from_str(json)?;
		let context_path = config.context_path.clone();
		Ok(config.with_context_path(&context_path))
	}

	#[must_use]
	pub fn with_context_path(mut self, context_path: &str) -> Self {
		self.context_path = normalize_context_path(context_path);
		self
	}

	#[must_use]
	pub fn with_debug(mut self, debug_enabled: bool) -> Self {
		self.debug_enabled = debug_enabled;
		self
	}

	#[must_use]
	pub fn with_cache_busting(mut self, cache_busting: bool) -> Self {
		self.cache_busting = cache_busting;
		self
	}

	/// Either empty or ending in `/`.
	#[must_use]
	pub fn context_path(&self) -> &str {
		&self.context_path
	}

	#[must_use]
	pub fn status_icons(&self) -> StatusIcons {
		self.status_icons.clone().unwrap_or_else(|| StatusIcons::below(&self.context_path))
	}
}

fn normalize_context_path(context_path: &str) -> String {
	if context_path.is_empty() || context_path.ends_with('/') {
		context_path.to_owned()
	} else {
		format!("{}/", context_path)
	}
}
