use sql_session::{SqlSession, SqlSessionError, SqlValue};

fn test_connection_string() -> Option<String> {
    match std::env::var("MSSQL_TEST_ADO_URL") {
        Ok(v) if !v.is_empty() => Some(v),
        _ => {
            eprintln!("skipping: set MSSQL_TEST_ADO_URL to run SQL Server integration tests");
            None
        }
    }
}

fn read_key(row: &sql_session::SqlRow) -> Result<i64, SqlSessionError> {
    Ok(*row.get("k").and_then(SqlValue::as_int).unwrap())
}

fn read_value(row: &sql_session::SqlRow) -> Result<String, SqlSessionError> {
    Ok(row.get("v").and_then(SqlValue::as_text).unwrap().to_string())
}

#[test]
fn dictionary_keyed_results() -> Result<(), Box<dyn std::error::Error>> {
    let Some(conn_str) = test_connection_string() else {
        return Ok(());
    };
    let rt = tokio::runtime::Runtime::new()?;
    let session = SqlSession::new(conn_str);

    rt.block_on(async {
        let map = session
            .text(
                "SELECT 1 AS k, 'alpha' AS v UNION ALL SELECT 2, 'bravo' UNION ALL SELECT 3, 'charlie'",
                0,
            )
            .query_as_map(read_key, read_value)
            .await?;

        assert_eq!(map.len(), 3);
        assert_eq!(map[&1], "alpha");
        assert_eq!(map[&3], "charlie");

        // The same key twice is an error, not an overwrite.
        let err = session
            .text(
                "SELECT 1 AS k, 'alpha' AS v UNION ALL SELECT 2, 'bravo' UNION ALL SELECT 1, 'dup'",
                0,
            )
            .query_as_map(read_key, read_value)
            .await
            .unwrap_err();
        assert!(matches!(err, SqlSessionError::DuplicateKey(k) if k == "1"));

        Ok::<(), SqlSessionError>(())
    })?;

    // Blocking variant, driven outside any runtime.
    let map = session
        .text("SELECT 10 AS k, 'x' AS v", 0)
        .query_as_map_blocking(read_key, read_value)?;
    assert_eq!(map[&10], "x");

    Ok(())
}
