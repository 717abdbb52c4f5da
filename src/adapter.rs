//! Dual calling convention for every public operation.
//!
//! Operations always produce a [`Deferred`] value. Awaiting it gives the outcome;
//! [`Deferred::with_callback`] additionally hands a copy of the same outcome to a
//! callback. Dropping a `Deferred` without awaiting it detaches the work, which
//! still runs to completion.

use std::fmt;
use std::future::Future;
use std::panic;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::SqliteBridgeError;

/// Outcome of an asynchronous operation.
pub type Outcome<T> = Result<T, SqliteBridgeError>;

/// A result that becomes available asynchronously.
///
/// # Examples
/// ```rust
/// use sqlite_bridge::prelude::*;
///
/// # async fn demo() -> Result<(), SqliteBridgeError> {
/// let conn = Connection::open(":memory:", OpenOptions::new()).await?;
/// // promise style
/// let row = conn.get("select 1", ()).await?;
/// assert!(row.is_some());
/// // callback style; the deferred value may still be awaited or dropped
/// conn.exec_sql("create table t (x)", ())
///     .with_callback(|outcome| assert!(outcome.is_ok()))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[must_use = "dropping a Deferred detaches the operation; await it to observe failures"]
pub struct Deferred<T> {
    runtime: Option<Handle>,
    state: State<T>,
}

enum State<T> {
    Spawned(JoinHandle<Outcome<T>>),
    Settled(Option<Outcome<T>>),
}

// `T` is only ever moved out by value; nothing is pinned structurally.
impl<T> Unpin for Deferred<T> {}

impl<T: Send + 'static> Deferred<T> {
    /// Run `work` as a task on `runtime`.
    pub(crate) fn spawn<F>(runtime: &Handle, work: F) -> Self
    where
        F: Future<Output = Outcome<T>> + Send + 'static,
    {
        Self {
            runtime: Some(runtime.clone()),
            state: State::Spawned(runtime.spawn(work)),
        }
    }

    /// A value whose outcome is already known.
    pub(crate) fn settled(outcome: Outcome<T>) -> Self {
        Self {
            runtime: Handle::try_current().ok(),
            state: State::Settled(Some(outcome)),
        }
    }

    /// `true` once the outcome is known without awaiting.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        match &self.state {
            State::Spawned(handle) => handle.is_finished(),
            State::Settled(outcome) => outcome.is_some(),
        }
    }
}

impl<T: Clone + Send + 'static> Deferred<T> {
    /// Invoke `callback` exactly once with the outcome, then settle the returned
    /// value with that same outcome.
    ///
    /// The callback runs on the runtime after the operation completes, even if the
    /// returned value is dropped. A panic in the callback is re-raised to whoever
    /// awaits the returned value.
    pub fn with_callback<C>(self, callback: C) -> Deferred<T>
    where
        C: FnOnce(Outcome<T>) + Send + 'static,
    {
        let Some(runtime) = self.runtime.clone() else {
            // outside a runtime nothing is pending; report synchronously
            let outcome = match self.state {
                State::Settled(Some(outcome)) => outcome,
                _ => Err(SqliteBridgeError::Runtime(
                    "callback attached outside a Tokio runtime".into(),
                )),
            };
            callback(outcome.clone());
            return Deferred {
                runtime: None,
                state: State::Settled(Some(outcome)),
            };
        };

        Deferred::spawn(&runtime, async move {
            let outcome = self.await;
            callback(outcome.clone());
            outcome
        })
    }
}

impl<T> Future for Deferred<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            State::Spawned(handle) => match Pin::new(handle).poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(err)) if err.is_panic() => panic::resume_unwind(err.into_panic()),
                Poll::Ready(Err(err)) => Poll::Ready(Err(SqliteBridgeError::worker(format!(
                    "operation task did not complete: {err}"
                )))),
            },
            State::Settled(outcome) => Poll::Ready(outcome.take().unwrap_or_else(|| {
                Err(SqliteBridgeError::worker("deferred value polled after completion"))
            })),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Spawned(handle) if handle.is_finished() => "finished",
            State::Spawned(_) => "running",
            State::Settled(Some(_)) => "settled",
            State::Settled(None) => "consumed",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn settled_values_resolve_immediately() {
        let ok: Deferred<i32> = Deferred::settled(Ok(3));
        assert!(ok.is_finished());
        assert_eq!(ok.await, Ok(3));
        let err: Deferred<i32> = Deferred::settled(Err(SqliteBridgeError::NotOpen));
        assert_eq!(err.await, Err(SqliteBridgeError::NotOpen));
    }

    #[tokio::test]
    async fn callback_and_value_see_the_same_outcome() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let runtime = Handle::current();
        let value = Deferred::spawn(&runtime, async { Err::<i32, _>(SqliteBridgeError::AlreadyClosed) })
            .with_callback(move |outcome| sink.lock().expect("sink").push(outcome))
            .await;
        assert_eq!(value, Err(SqliteBridgeError::AlreadyClosed));
        assert_eq!(*seen.lock().expect("seen"), vec![Err(SqliteBridgeError::AlreadyClosed)]);
    }

    #[tokio::test]
    async fn callback_runs_when_value_is_dropped() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let runtime = Handle::current();
        drop(Deferred::spawn(&runtime, async { Ok(7_u8) }).with_callback(move |outcome| {
            let _ = tx.send(outcome);
        }));
        assert_eq!(rx.await.ok(), Some(Ok(7)));
    }

    #[test]
    fn callback_without_runtime_is_invoked_synchronously() {
        let called = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&called);
        let deferred: Deferred<&'static str> = Deferred::settled(Ok("done"));
        let deferred = deferred.with_callback(move |outcome| {
            *sink.lock().expect("sink") = Some(outcome);
        });
        assert_eq!(*called.lock().expect("called"), Some(Ok("done")));
        assert!(deferred.is_finished());
    }
}
