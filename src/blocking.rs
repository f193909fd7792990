use std::future::Future;

use crate::error::SqlSessionError;

/// Drive an async terminal operation to completion on a private
/// current-thread runtime.
///
/// The blocking variants exist for callers that have no async context of
/// their own; calling one from inside a tokio runtime would deadlock, so that
/// is rejected up front.
pub(crate) fn block_on<T>(
    fut: impl Future<Output = Result<T, SqlSessionError>>,
) -> Result<T, SqlSessionError> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(SqlSessionError::Other(
            "blocking variant called from within an async runtime; use the async method instead"
                .to_string(),
        ));
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| SqlSessionError::Other(format!("failed to build blocking runtime: {e}")))?;

    runtime.block_on(fut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_future_outside_runtime() {
        let result = block_on(async { Ok::<_, SqlSessionError>(42) });
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn rejected_inside_runtime() {
        let result = block_on(async { Ok::<_, SqlSessionError>(()) });
        assert!(matches!(result, Err(SqlSessionError::Other(_))));
    }
}
