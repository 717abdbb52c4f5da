use std::fmt;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::adapter::{Deferred, Outcome};
use crate::config::{DatabaseTarget, OpenOptions};
use crate::error::SqliteBridgeError;
use crate::executor::{BoxedRowCallback, RowCallbackError};
use crate::params::Params;
use crate::plugin::{self, ConnectionPlugin};
use crate::row::Row;
use crate::types::{DisplayMode, ResultMode, RowShape, Value, ValueTyping};
use crate::worker::{
    Command, OpenRequest, Pending, Reply, SqliteWorker, await_custom, await_reply,
};

/// Handle to one open SQLite database.
///
/// Clones share the same native connection. Operations are executed one at a time,
/// in the order they are called, on the connection's worker thread. Every operation
/// returns a [`Deferred`] that may be awaited, given a callback with
/// [`Deferred::with_callback`], or dropped to run it fire-and-forget.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    target: DatabaseTarget,
    name: String,
    worker: SqliteWorker,
    open: AtomicBool,
    mode: Mutex<DisplayMode>,
    runtime: Handle,
    plugins: Vec<Arc<dyn ConnectionPlugin>>,
}

impl Connection {
    /// Open (creating if needed) the database `name`.
    ///
    /// `""` opens a private temporary database, `":memory:"` an in-memory one, and a
    /// `file:` URI is passed to the engine as is. Registered plugin init hooks run
    /// before the returned value settles.
    ///
    /// # Errors
    /// [`SqliteBridgeError::Open`] when the engine rejects the target, the first
    /// failing plugin hook's error, or [`SqliteBridgeError::Runtime`] when called
    /// outside a Tokio runtime.
    pub fn open(name: &str, options: OpenOptions) -> Deferred<Connection> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => return Deferred::settled(Err(SqliteBridgeError::Runtime(err.to_string()))),
        };
        let target = DatabaseTarget::resolve(name, options.base_dir.as_deref());
        let request = OpenRequest {
            target: target.clone(),
            flags: options.open_flags(),
            create_dirs: !options.skip_create_dirs,
        };

        let task_runtime = runtime.clone();
        Deferred::spawn(&runtime, async move {
            let (worker, opened) = SqliteWorker::spawn(request)?;
            await_reply(opened, "SQLite worker exited before opening the database").await?;

            let conn = Connection {
                inner: Arc::new(Inner {
                    name: target.to_string(),
                    target,
                    worker,
                    open: AtomicBool::new(true),
                    mode: Mutex::new(options.display_mode()),
                    runtime: task_runtime,
                    plugins: options.plugins().to_vec(),
                }),
            };
            debug!(db = conn.name(), worker = conn.inner.worker.id(), "database opened");

            if let Err(err) = plugin::run_init_hooks(&conn, &options).await {
                if let Err(close_err) = conn.close().await {
                    warn!(db = conn.name(), error = %close_err, "close after failed plugin init");
                }
                return Err(err);
            }
            Ok(conn)
        })
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    /// The resolved database target, as handed to the engine.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn target(&self) -> &DatabaseTarget {
        &self.inner.target
    }

    /// The display mode new calls start from.
    #[must_use]
    pub fn display_mode(&self) -> DisplayMode {
        *self.inner.mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn row_shape(&self) -> RowShape {
        self.display_mode().shape
    }

    #[must_use]
    pub fn value_typing(&self) -> ValueTyping {
        self.display_mode().typing
    }

    /// Change the row shape used by later calls; returns the previous shape.
    pub fn set_row_shape(&self, shape: RowShape) -> RowShape {
        let mut mode = self.inner.mode.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut mode.shape, shape)
    }

    /// Change the value typing used by later calls; returns the previous typing.
    pub fn set_value_typing(&self, typing: ValueTyping) -> ValueTyping {
        let mut mode = self.inner.mode.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut mode.typing, typing)
    }

    /// Release the native handle.
    ///
    /// Calls made before `close` still run first. Every later call fails with
    /// [`SqliteBridgeError::NotOpen`].
    ///
    /// # Errors
    /// [`SqliteBridgeError::AlreadyClosed`] when the connection was already closed.
    pub fn close(&self) -> Deferred<()> {
        if self
            .inner
            .open
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Deferred::settled(Err(SqliteBridgeError::AlreadyClosed));
        }
        debug!(db = self.name(), "closing database");
        self.forward("close", self.inner.worker.dispatch(|respond_to| Command::Close { respond_to }))
    }

    /// The schema's `user_version`.
    pub fn version(&self) -> Deferred<i64> {
        let pending = self.get_as("pragma user_version", (), DisplayMode::RAW.into());
        Deferred::spawn(&self.inner.runtime, async move {
            let row = pending.await?;
            Ok(row.and_then(|row| row.get(0).and_then(Value::as_int)).unwrap_or(0))
        })
    }

    /// Store a new `user_version`; resolves with the previous one.
    pub fn set_version(&self, version: i64) -> Deferred<i64> {
        let previous = self.version();
        let update = self.exec_sql(&format!("pragma user_version = {version}"), ());
        Deferred::spawn(&self.inner.runtime, async move {
            let previous = previous.await?;
            update.await?;
            Ok(previous)
        })
    }

    /// Run one statement.
    ///
    /// Resolves with the last inserted row id for `insert`, the number of changed
    /// rows for `update` and `delete`, and `None` for anything else.
    pub fn exec_sql(&self, sql: &str, params: impl Into<Params>) -> Deferred<Option<i64>> {
        let sql = sql.to_owned();
        let params = params.into();
        self.request("exec_sql", |respond_to| Command::ExecSql {
            sql,
            params,
            respond_to,
        })
    }

    /// First row of the result, or `None` when the query matched nothing.
    pub fn get(&self, sql: &str, params: impl Into<Params>) -> Deferred<Option<Row>> {
        self.get_as(sql, params, ResultMode::default())
    }

    /// [`get`](Self::get) with a per-call display mode override.
    pub fn get_as(
        &self,
        sql: &str,
        params: impl Into<Params>,
        mode: ResultMode,
    ) -> Deferred<Option<Row>> {
        let sql = sql.to_owned();
        let params = params.into();
        let mode = mode.resolve(self.display_mode());
        self.request("get", |respond_to| Command::GetOne {
            sql,
            params,
            mode,
            respond_to,
        })
    }

    /// Every row of the result; an empty `Vec` when the query matched nothing.
    pub fn all(&self, sql: &str, params: impl Into<Params>) -> Deferred<Vec<Row>> {
        self.all_as(sql, params, ResultMode::default())
    }

    /// [`all`](Self::all) with a per-call display mode override.
    pub fn all_as(&self, sql: &str, params: impl Into<Params>, mode: ResultMode) -> Deferred<Vec<Row>> {
        let sql = sql.to_owned();
        let params = params.into();
        let mode = mode.resolve(self.display_mode());
        self.request("all", |respond_to| Command::GetAll {
            sql,
            params,
            mode,
            respond_to,
        })
    }

    /// Stream rows one at a time; see [`Each`].
    pub fn each(&self, sql: &str, params: impl Into<Params>) -> Each {
        Each {
            conn: self.clone(),
            sql: sql.to_owned(),
            params: params.into(),
            mode: ResultMode::default(),
            on_row: None,
            on_complete: None,
        }
    }

    /// Run `func` against the native handle on the worker thread.
    ///
    /// # Errors
    /// Whatever `func` returns, or [`SqliteBridgeError::NotOpen`] after close.
    pub fn with_connection<F, R>(&self, func: F) -> Deferred<R>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqliteBridgeError> + Send + 'static,
        R: Send + 'static,
    {
        if !self.is_open() {
            return Deferred::settled(Err(SqliteBridgeError::NotOpen));
        }
        match self.inner.worker.dispatch_with_connection(func) {
            Ok(pending) => Deferred::spawn(&self.inner.runtime, await_custom(pending)),
            Err(err) => Deferred::settled(Err(err)),
        }
    }

    /// The registered plugin of type `P`, if any.
    #[must_use]
    pub fn plugin<P: ConnectionPlugin>(&self) -> Option<&P> {
        self.inner
            .plugins
            .iter()
            .find_map(|plugin| plugin.as_any().downcast_ref::<P>())
    }

    #[must_use]
    pub fn plugin_named(&self, name: &str) -> Option<&Arc<dyn ConnectionPlugin>> {
        self.inner.plugins.iter().find(|plugin| plugin.name() == name)
    }

    fn request<T: Send + 'static>(
        &self,
        op: &'static str,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Deferred<T> {
        if !self.is_open() {
            return Deferred::settled(Err(SqliteBridgeError::NotOpen));
        }
        self.forward(op, self.inner.worker.dispatch(build))
    }

    fn forward<T: Send + 'static>(
        &self,
        op: &'static str,
        dispatched: Result<Pending<T>, SqliteBridgeError>,
    ) -> Deferred<T> {
        let pending = match dispatched {
            Ok(pending) => pending,
            Err(err) => return Deferred::settled(Err(err)),
        };
        let worker = self.inner.worker.id();
        Deferred::spawn(&self.inner.runtime, async move {
            let outcome = await_reply(pending, "SQLite worker dropped before answering").await;
            if let Err(err) = &outcome {
                debug!(worker, op, error = %err, "operation failed");
            }
            outcome
        })
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name())
            .field("open", &self.is_open())
            .field("mode", &self.display_mode())
            .finish_non_exhaustive()
    }
}

type CompleteCallback = Box<dyn FnOnce(Outcome<usize>) + Send>;

/// Row-streaming call built by [`Connection::each`].
///
/// A per-row callback is mandatory. Rows reach it on the worker thread while the
/// cursor is open, in result order; returning an error (or panicking) stops the
/// scan, and the statement is finalized before the failure is reported. The
/// deferred value and the optional completion callback both receive the number of
/// rows delivered.
///
/// ```rust
/// use sqlite_bridge::prelude::*;
///
/// # async fn demo(conn: &Connection) -> Result<(), SqliteBridgeError> {
/// let count = conn
///     .each("select name from users where active = ?", 1_i64)
///     .on_row(|row| {
///         println!("{:?}", row.get(0));
///         Ok(())
///     })
///     .await?;
/// # let _ = count;
/// # Ok(())
/// # }
/// ```
#[must_use = "an Each does nothing until run or awaited"]
pub struct Each {
    conn: Connection,
    sql: String,
    params: Params,
    mode: ResultMode,
    on_row: Option<BoxedRowCallback>,
    on_complete: Option<CompleteCallback>,
}

impl Each {
    pub fn mode(mut self, mode: impl Into<ResultMode>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn on_row<F>(mut self, on_row: F) -> Self
    where
        F: FnMut(Row) -> Result<(), RowCallbackError> + Send + 'static,
    {
        self.on_row = Some(Box::new(on_row));
        self
    }

    pub fn on_complete<F>(mut self, on_complete: F) -> Self
    where
        F: FnOnce(Outcome<usize>) + Send + 'static,
    {
        self.on_complete = Some(Box::new(on_complete));
        self
    }

    /// Queue the scan. The display mode is resolved now.
    ///
    /// # Errors
    /// [`SqliteBridgeError::CallbackContract`] without a per-row callback.
    pub fn run(self) -> Deferred<usize> {
        let Each {
            conn,
            sql,
            params,
            mode,
            on_row,
            on_complete,
        } = self;

        let deferred = match on_row {
            None => Deferred::settled(Err(SqliteBridgeError::CallbackContract(
                "each requires a per-row callback",
            ))),
            Some(on_row) => {
                let mode = mode.resolve(conn.display_mode());
                conn.request("each", |respond_to| Command::ForEach {
                    sql,
                    params,
                    mode,
                    on_row,
                    respond_to,
                })
            }
        };
        match on_complete {
            Some(on_complete) => deferred.with_callback(on_complete),
            None => deferred,
        }
    }
}

impl IntoFuture for Each {
    type Output = Outcome<usize>;
    type IntoFuture = Deferred<usize>;

    fn into_future(self) -> Self::IntoFuture {
        self.run()
    }
}

impl fmt::Debug for Each {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Each")
            .field("sql", &self.sql)
            .field("params", &self.params)
            .field("mode", &self.mode)
            .field("on_row", &self.on_row.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish_non_exhaustive()
    }
}
