use std::any::Any;

use async_trait::async_trait;

use crate::config::OpenOptions;
use crate::connection::Connection;
use crate::error::SqliteBridgeError;

/// Capability provider registered through [`OpenOptions::plugin`].
///
/// Every registered plugin's [`init`](ConnectionPlugin::init) runs once per open,
/// in registration order, after the native handle is usable and before the open
/// resolves. The first failing hook aborts the open: the connection is closed and
/// the hook's error is returned.
///
/// Extra instance methods are contributed through an extension trait on
/// [`Connection`] that reaches the plugin with [`Connection::plugin`].
#[async_trait]
pub trait ConnectionPlugin: Send + Sync + 'static {
    /// Stable name used for lookup and in error reports.
    fn name(&self) -> &str;

    async fn init(&self, conn: &Connection, options: &OpenOptions) -> Result<(), SqliteBridgeError>;

    fn as_any(&self) -> &dyn Any;
}

pub(crate) async fn run_init_hooks(
    conn: &Connection,
    options: &OpenOptions,
) -> Result<(), SqliteBridgeError> {
    for plugin in options.plugins() {
        tracing::debug!(plugin = plugin.name(), "running plugin init hook");
        if let Err(err) = plugin.init(conn, options).await {
            tracing::warn!(plugin = plugin.name(), error = %err, "plugin init hook failed");
            return Err(err);
        }
    }
    Ok(())
}
