use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::Receiver;

use rusqlite::OpenFlags;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::config::DatabaseTarget;
use crate::error::{NativeError, SqliteBridgeError};
use crate::executor;

use super::channel::{BoxedCallback, BoxedResponse, Command};

/// Everything the worker thread needs to open its connection.
pub(crate) struct OpenRequest {
    pub(crate) target: DatabaseTarget,
    pub(crate) flags: OpenFlags,
    pub(crate) create_dirs: bool,
}

pub(super) fn run_sqlite_worker(
    request: OpenRequest,
    opened: oneshot::Sender<Result<(), SqliteBridgeError>>,
    receiver: &Receiver<Command>,
) {
    let mut conn = match open_native(&request) {
        Ok(conn) => {
            let _ = opened.send(Ok(()));
            conn
        }
        Err(err) => {
            let _ = opened.send(Err(err));
            return;
        }
    };

    while let Ok(command) = receiver.recv() {
        trace!(command = command.label(), "sqlite worker received command");
        match command {
            Command::Shutdown => break,
            Command::Close { respond_to } => {
                if let Err((_, err)) = conn.close() {
                    warn!(db = %request.target, error = %err, "native close reported an error");
                }
                let _ = respond_to.send(Ok(()));
                return;
            }
            Command::ExecSql {
                sql,
                params,
                respond_to,
            } => {
                let _ = respond_to.send(executor::exec_sql(&conn, &sql, &params));
            }
            Command::GetOne {
                sql,
                params,
                mode,
                respond_to,
            } => {
                let _ = respond_to.send(executor::get_one(&conn, &sql, &params, mode));
            }
            Command::GetAll {
                sql,
                params,
                mode,
                respond_to,
            } => {
                let _ = respond_to.send(executor::get_all(&conn, &sql, &params, mode));
            }
            Command::ForEach {
                sql,
                params,
                mode,
                mut on_row,
                respond_to,
            } => {
                let _ = respond_to.send(executor::for_each(&conn, &sql, &params, mode, &mut on_row));
            }
            Command::WithConnection {
                callback,
                respond_to,
            } => {
                let _ = respond_to.send(run_custom_callback(&mut conn, callback));
            }
        }
    }
    debug!(db = %request.target, "sqlite worker exiting");
}

fn open_native(request: &OpenRequest) -> Result<rusqlite::Connection, SqliteBridgeError> {
    if request.create_dirs
        && let Some(dir) = request.target.parent_dir()
        && !dir.exists()
        && let Err(err) = fs::create_dir_all(dir)
    {
        // the open below reports the real failure
        warn!(dir = %dir.display(), error = %err, "could not create database directory");
    }

    rusqlite::Connection::open_with_flags(request.target.engine_path(), request.flags).map_err(
        |err| SqliteBridgeError::Open {
            name: request.target.to_string(),
            source: NativeError::from(&err),
        },
    )
}

fn run_custom_callback(conn: &mut rusqlite::Connection, callback: BoxedCallback) -> BoxedResponse {
    match catch_unwind(AssertUnwindSafe(|| callback(conn))) {
        Ok(outcome) => outcome,
        Err(_) => Err(SqliteBridgeError::worker("connection callback panicked")),
    }
}
