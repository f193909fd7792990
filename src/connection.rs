use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::error::SqlSessionError;

/// The SQL Server client type used for every terminal operation.
pub type SqlClient = Client<Compat<TcpStream>>;

/// Open a fresh connection for a single terminal operation.
///
/// The connection string is ADO-style and opaque to this crate; it is parsed
/// here, at execution time, by the driver itself.
///
/// # Errors
/// Returns `SqlSessionError::ConfigError` if the connection string does not
/// parse and `SqlSessionError::ConnectionError` if the TCP connect or TDS
/// handshake fails.
pub(crate) async fn connect(connection_string: &str) -> Result<SqlClient, SqlSessionError> {
    let config = Config::from_ado_string(connection_string)
        .map_err(|e| SqlSessionError::ConfigError(format!("invalid connection string: {e}")))?;

    let addr = config.get_addr();
    tracing::debug!(%addr, "opening sql server connection");

    let tcp = TcpStream::connect(&addr)
        .await
        .map_err(|e| SqlSessionError::ConnectionError(format!("TCP connection error: {e}")))?;
    tcp.set_nodelay(true)
        .map_err(|e| SqlSessionError::ConnectionError(format!("TCP configuration error: {e}")))?;

    Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| {
            SqlSessionError::ConnectionError(format!("SQL Server connection error: {e}"))
        })
}
