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

#[test]
fn text_command_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    let Some(conn_str) = test_connection_string() else {
        return Ok(());
    };
    let rt = tokio::runtime::Runtime::new()?;
    let session = SqlSession::new(conn_str);

    rt.block_on(async {
        session
            .text(
                "DROP TABLE IF EXISTS sql_session_test1;
                 CREATE TABLE sql_session_test1 (
                     id BIGINT PRIMARY KEY,
                     name NVARCHAR(64) NOT NULL,
                     score FLOAT NULL
                 );",
                0,
            )
            .execute()
            .await?;

        let seed = [
            (1i64, "alpha", Some(10.5)),
            (2i64, "bravo", None),
            (3i64, "charlie", Some(30.25)),
        ];
        for (id, name, score) in seed {
            session
                .text(
                    "INSERT INTO sql_session_test1 (id, name, score) VALUES (@P1, @P2, @P3)",
                    3,
                )
                .bind("id", id)
                .bind("name", name)
                .bind("score", score)
                .transactional()
                .execute()
                .await?;
        }

        // Full mapping of the first (only) result set, order preserved.
        let rows = session
            .text(
                "SELECT id, name, score FROM sql_session_test1 ORDER BY id",
                0,
            )
            .query(|row| {
                Ok((
                    *row.get("id").and_then(SqlValue::as_int).unwrap(),
                    row.get("name")
                        .and_then(SqlValue::as_text)
                        .unwrap()
                        .to_string(),
                    row.get("score").unwrap().as_float(),
                ))
            })
            .await?;

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], (1, "alpha".to_string(), Some(10.5)));
        assert_eq!(rows[1].2, None, "explicit NULL comes back absent");
        assert_eq!(rows[2], (3, "charlie".to_string(), Some(30.25)));

        // Single-row fetch maps the first row only, even with more available.
        let first = session
            .text("SELECT name FROM sql_session_test1 ORDER BY id", 0)
            .query_one(|row| {
                Ok(row
                    .get("name")
                    .and_then(SqlValue::as_text)
                    .unwrap()
                    .to_string())
            })
            .await?;
        assert_eq!(first.as_deref(), Some("alpha"));

        // Zero rows yields the absent result.
        let absent = session
            .text("SELECT name FROM sql_session_test1 WHERE id = @P1", 1)
            .bind("id", 999i64)
            .query_one(|row| {
                Ok(row
                    .get("name")
                    .and_then(SqlValue::as_text)
                    .unwrap()
                    .to_string())
            })
            .await?;
        assert!(absent.is_none());

        // Side-effecting handler accumulates into caller-owned state.
        let mut names = Vec::new();
        session
            .text("SELECT name FROM sql_session_test1 ORDER BY id DESC", 0)
            .query_each(|row| {
                names.push(
                    row.get("name")
                        .and_then(SqlValue::as_text)
                        .unwrap()
                        .to_string(),
                );
                Ok(())
            })
            .await?;
        assert_eq!(names, vec!["charlie", "bravo", "alpha"]);

        Ok::<(), SqlSessionError>(())
    })?;

    // Blocking variants drive their own runtime, so they run outside the
    // test runtime.
    let count = session
        .text("SELECT COUNT(*) AS cnt FROM sql_session_test1", 0)
        .query_blocking(|row| Ok(*row.get("cnt").and_then(SqlValue::as_int).unwrap()))?;
    assert_eq!(count, vec![3]);

    session
        .text("DROP TABLE IF EXISTS sql_session_test1", 0)
        .execute_blocking()?;

    Ok(())
}
