//! Record/replay harness for RPC client calls.
//!
//! Run a test suite once against a live service with
//! [`SessionController::record`], and every call made through an
//! [`InterceptedClient`] is captured into a named cassette. Later runs use
//! [`SessionController::play`] to answer the same calls from that cassette,
//! with no network access and no tolerance for calls that were never
//! recorded.

pub mod adapters;
pub mod cassette;
pub mod error;
pub mod logging;
pub mod ports;

pub use adapters::{InterceptedClient, Interceptor, LocalClient};
pub use cassette::codec::{Request, Response};
pub use cassette::config::StoreConfig;
pub use cassette::format::{Cassette, CASSETTE_VERSION};
pub use cassette::session::{Mode, SessionController, SessionGuard, SessionState};
pub use cassette::store::CassetteStore;
pub use error::{Error, Result};
pub use ports::{CallFuture, Field, Message, RpcClient};
