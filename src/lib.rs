#![doc(html_root_url = "https://docs.rs/ajax-relay/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod apply;
pub mod config;
pub mod encoder;
pub mod error;
pub mod event;
pub mod page;
pub mod patch;
pub mod poll;
pub mod relay;
pub mod session;
pub mod status;
pub mod timer;
pub mod transport;
pub mod web;

pub use config::RelayConfig;
pub use error::{ApplyError, RelayError};
pub use event::{Argument, EventType, PendingEvent};
pub use relay::Relay;
