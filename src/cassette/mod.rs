//! Cassettes: canonical call capture, on-disk format, storage and sessions.

pub mod codec;
pub mod config;
pub mod format;
pub mod session;
pub mod store;
