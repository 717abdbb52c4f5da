use std::any::Any;

use tokio::sync::oneshot;

use crate::error::SqliteBridgeError;
use crate::executor::BoxedRowCallback;
use crate::params::Params;
use crate::row::Row;
use crate::types::DisplayMode;

pub(crate) type Reply<T> = oneshot::Sender<Result<T, SqliteBridgeError>>;

pub(crate) type BoxedResponse = Result<Box<dyn Any + Send>, SqliteBridgeError>;
pub(crate) type BoxedCallback = Box<dyn FnOnce(&mut rusqlite::Connection) -> BoxedResponse + Send>;

pub(crate) enum Command {
    ExecSql {
        sql: String,
        params: Params,
        respond_to: Reply<Option<i64>>,
    },
    GetOne {
        sql: String,
        params: Params,
        mode: DisplayMode,
        respond_to: Reply<Option<Row>>,
    },
    GetAll {
        sql: String,
        params: Params,
        mode: DisplayMode,
        respond_to: Reply<Vec<Row>>,
    },
    ForEach {
        sql: String,
        params: Params,
        mode: DisplayMode,
        on_row: BoxedRowCallback,
        respond_to: Reply<usize>,
    },
    WithConnection {
        callback: BoxedCallback,
        respond_to: oneshot::Sender<BoxedResponse>,
    },
    /// Release the native handle; the worker exits after answering.
    Close { respond_to: Reply<()> },
    Shutdown,
}

impl Command {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Command::ExecSql { .. } => "exec_sql",
            Command::GetOne { .. } => "get",
            Command::GetAll { .. } => "all",
            Command::ForEach { .. } => "each",
            Command::WithConnection { .. } => "with_connection",
            Command::Close { .. } => "close",
            Command::Shutdown => "shutdown",
        }
    }
}
