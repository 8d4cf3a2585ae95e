/// Opaque id of a pending one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(i32);

impl TimerHandle {
	#[must_use]
	pub fn from_raw(raw: i32) -> Self {
		Self(raw)
	}

	#[must_use]
	pub fn into_raw(self) -> i32 {
		self.0
	}
}

/// One-shot timers and a wall clock, as provided by `setTimeout`/`clearTimeout`/`Date.now`.
pub trait Timers {
	/// Runs `callback` once, after at least `delay_ms`, on the UI thread.
	fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle;

	/// Cancels a pending timer. Unknown or already-fired handles are ignored.
	fn clear_timeout(&self, handle: TimerHandle);

	/// Milliseconds since the Unix epoch.
	fn now_ms(&self) -> u64;
}
