use crate::page::PageError;

/// Why applying a response body failed. Operations before the failing one stay applied.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
	#[error("malformed response envelope: {0}")]
	Envelope(#[from] serde_json::Error),
	#[error(transparent)]
	Page(#[from] PageError),
	#[error("no callback registered as {0:?}")]
	UnknownCallback(String),
	#[error("callback {name:?} failed: {message}")]
	Callback { name: String, message: String },
}

/// Terminal failure of one dispatch. None of these are retried; the next poll tick or interaction is the retry.
///
/// The [`Display`](`core::fmt::Display`) text is what the error indicator shows as tooltip.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
	#[error("{0}")]
	Transport(String),
	#[error("Error: {status_text} (HTTP {status})")]
	Http { status: u16, status_text: String },
	#[error(transparent)]
	Apply(#[from] ApplyError),
	#[error("unable to find component with id {0:?}")]
	ElementNotFound(String),
	#[error("failed to spawn dispatch: {0}")]
	Spawn(String),
	#[error("no browser window or document available")]
	NoDocument,
}
