//! Convenient imports for common functionality.

pub use crate::adapter::{Deferred, Outcome};
pub use crate::config::OpenOptions;
pub use crate::connection::{Connection, Each};
pub use crate::error::{NativeError, SqliteBridgeError};
pub use crate::executor::RowCallbackError;
pub use crate::params::{Param, Params};
pub use crate::plugin::ConnectionPlugin;
pub use crate::row::{NamedRow, Row};
pub use crate::types::{DisplayMode, ResultMode, RowShape, Value, ValueTyping};

pub use crate::params;
