//! Client adapters: the intercepting wrapper and its per-mode handlers.
//!
//! [`InterceptedClient`] is the decorator handed to test code. Whether a call
//! passes through, is recorded, or is replayed is decided per call from the
//! [`crate::cassette::session::SessionState`] it shares with its controller.

pub mod intercepting;
pub mod local;
mod recording;
mod replaying;

pub use intercepting::{InterceptedClient, Interceptor};
pub use local::LocalClient;
