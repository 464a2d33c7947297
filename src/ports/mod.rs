//! Port traits defining external boundaries.
//!
//! The only boundary this crate cares about is the RPC client call. Its
//! implementations live outside the crate (generated stubs) or in
//! `src/adapters/`.

pub mod rpc;

pub use rpc::{CallFuture, Field, Message, RpcClient};
