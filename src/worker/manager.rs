use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread;

use tokio::sync::oneshot;
use tracing::trace;

use crate::error::SqliteBridgeError;

use super::channel::{BoxedCallback, BoxedResponse, Command, Reply};
use super::dispatcher::{OpenRequest, run_sqlite_worker};

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Pending answer from the worker thread.
pub(crate) type Pending<T> = oneshot::Receiver<Result<T, SqliteBridgeError>>;

/// Handle to the thread that owns one native connection.
pub(crate) struct SqliteWorker {
    sender: Sender<Command>,
    id: u64,
}

impl SqliteWorker {
    /// Start the worker thread; it opens the connection itself and reports the
    /// outcome through the returned receiver before accepting commands.
    pub(crate) fn spawn(request: OpenRequest) -> Result<(Self, Pending<()>), SqliteBridgeError> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let (opened_tx, opened_rx) = oneshot::channel();
        let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
        thread::Builder::new()
            .name(format!("sqlite-worker-{id}"))
            .spawn(move || run_sqlite_worker(request, opened_tx, &receiver))
            .map_err(|err| {
                SqliteBridgeError::worker(format!("failed to spawn SQLite worker thread: {err}"))
            })?;

        Ok((Self { sender, id }, opened_rx))
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    fn send_command(&self, command: Command) -> Result<(), SqliteBridgeError> {
        trace!(worker = self.id, command = command.label(), "dispatching");
        self.sender
            .send(command)
            .map_err(|_| SqliteBridgeError::NotOpen)
    }

    /// Queue a command now and hand back the receiver for its answer.
    ///
    /// Queueing happens synchronously so commands reach the worker in call order.
    pub(crate) fn dispatch<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<Pending<T>, SqliteBridgeError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(build(tx))?;
        Ok(rx)
    }

    pub(crate) fn dispatch_with_connection<F, R>(
        &self,
        func: F,
    ) -> Result<oneshot::Receiver<BoxedResponse>, SqliteBridgeError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqliteBridgeError> + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let callback: BoxedCallback =
            Box::new(move |conn| func(conn).map(|value| Box::new(value) as Box<dyn Any + Send>));
        self.send_command(Command::WithConnection {
            callback,
            respond_to: tx,
        })?;
        Ok(rx)
    }
}

/// Await an answer queued with [`SqliteWorker::dispatch`].
pub(crate) async fn await_reply<T>(
    pending: Pending<T>,
    drop_message: &'static str,
) -> Result<T, SqliteBridgeError> {
    pending
        .await
        .map_err(|_| SqliteBridgeError::worker(drop_message))?
}

/// Await and downcast an answer queued with [`SqliteWorker::dispatch_with_connection`].
pub(crate) async fn await_custom<R: 'static>(
    pending: oneshot::Receiver<BoxedResponse>,
) -> Result<R, SqliteBridgeError> {
    match pending.await {
        Ok(Ok(payload)) => payload
            .downcast::<R>()
            .map(|boxed| *boxed)
            .map_err(|_| SqliteBridgeError::worker("SQLite worker response downcast failure")),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(SqliteBridgeError::worker(
            "SQLite worker dropped while handling custom callback",
        )),
    }
}

impl Drop for SqliteWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}
