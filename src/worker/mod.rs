//! Dedicated thread that owns one `rusqlite::Connection`.
//!
//! Commands are queued over a std channel in call order and answered through
//! `tokio::sync::oneshot`, so the native handle never leaves its thread.

mod channel;
mod dispatcher;
mod manager;

pub(crate) use channel::{Command, Reply};
pub(crate) use dispatcher::OpenRequest;
pub(crate) use manager::{Pending, SqliteWorker, await_custom, await_reply};
