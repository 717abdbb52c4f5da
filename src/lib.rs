//! Async bindings over a native SQLite handle.
//!
//! A [`Connection`] owns one native handle on a dedicated worker thread. Every
//! operation returns a [`Deferred`] value that can be awaited, paired with a
//! callback through [`Deferred::with_callback`], or dropped to run detached.
//! Rows are decoded as positional or named ([`RowShape`]) with native or
//! stringified values ([`ValueTyping`]).
//!
//! ```rust
//! use sqlite_bridge::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), SqliteBridgeError> {
//! let conn = Connection::open(":memory:", OpenOptions::new()).await?;
//! conn.exec_sql("create table users (id integer primary key, name text)", ()).await?;
//! let id = conn.exec_sql("insert into users (name) values (?)", "alice").await?;
//! assert_eq!(id, Some(1));
//!
//! let row = conn
//!     .get_as("select id, name from users", (), ResultMode::default().with_shape(RowShape::Named))
//!     .await?;
//! assert_eq!(row.and_then(|r| r.get_named("name").cloned()), Some(Value::Text("alice".into())));
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod connection;
mod decode;
pub mod error;
mod executor;
pub mod files;
pub mod params;
pub mod plugin;
pub mod prelude;
pub mod row;
pub mod types;
mod worker;

pub use adapter::{Deferred, Outcome};
pub use config::{DatabaseTarget, MEMORY_DATABASE, OpenOptions};
pub use connection::{Connection, Each};
pub use error::{NativeError, SqliteBridgeError};
pub use executor::RowCallbackError;
pub use params::{Param, Params};
pub use plugin::ConnectionPlugin;
pub use row::{ColumnSet, NamedRow, Row};
pub use types::{DisplayMode, ResultMode, RowShape, StatementKind, Value, ValueTyping};

pub use async_trait::async_trait;
pub use rusqlite;
