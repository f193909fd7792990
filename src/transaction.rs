use tiberius::Query;

use crate::connection::SqlClient;
use crate::error::SqlSessionError;

/// Begin a transaction on the connection owned by the current call.
///
/// # Errors
/// Returns `SqlSessionError::ExecutionError` if issuing the BEGIN fails.
pub(crate) async fn begin(client: &mut SqlClient) -> Result<(), SqlSessionError> {
    Query::new("BEGIN TRANSACTION")
        .execute(client)
        .await
        .map_err(|e| SqlSessionError::ExecutionError(format!("begin transaction error: {e}")))?;
    tracing::debug!("transaction started");
    Ok(())
}

/// Commit the open transaction.
///
/// # Errors
/// Returns `SqlSessionError::ExecutionError` if the COMMIT fails.
pub(crate) async fn commit(client: &mut SqlClient) -> Result<(), SqlSessionError> {
    Query::new("COMMIT TRANSACTION")
        .execute(client)
        .await
        .map_err(|e| SqlSessionError::ExecutionError(format!("commit error: {e}")))?;
    tracing::debug!("transaction committed");
    Ok(())
}

/// Roll back the open transaction.
///
/// # Errors
/// Returns `SqlSessionError::ExecutionError` if the ROLLBACK fails.
pub(crate) async fn rollback(client: &mut SqlClient) -> Result<(), SqlSessionError> {
    Query::new("ROLLBACK TRANSACTION")
        .execute(client)
        .await
        .map_err(|e| SqlSessionError::ExecutionError(format!("rollback error: {e}")))?;
    Ok(())
}
