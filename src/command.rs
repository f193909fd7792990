use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::Debug;
use std::hash::Hash;

use crate::blocking;
use crate::connection::{self, SqlClient};
use crate::error::SqlSessionError;
use crate::params::{OutParam, SqlParam, SqlType};
use crate::query::{self, RowFlow};
use crate::row::SqlRow;
use crate::statement::{self, RenderedCommand};
use crate::transaction;
use crate::types::{SqlValue, StatementKind};

/// A single statement-plus-parameters unit of work, executed at most once.
///
/// Configuration methods consume and return the builder for chaining;
/// terminal operations consume it outright, so a command cannot be replayed
/// or reset after execution.
///
/// Every terminal operation opens its own connection, runs, and drops the
/// connection before returning, on success and failure alike.
#[derive(Debug)]
pub struct SqlCommand {
    connection_string: String,
    statement: String,
    kind: StatementKind,
    params: Vec<SqlParam>,
    outs: Vec<OutParam>,
    transactional: bool,
}

/// Terminal-operation state split out of the builder: rendered SQL, the
/// connection to use, and the output handles to fill.
struct PreparedParts {
    connection_string: String,
    transactional: bool,
    rendered: RenderedCommand,
    outs: Vec<OutParam>,
}

impl SqlCommand {
    pub(crate) fn new(
        connection_string: String,
        statement: String,
        kind: StatementKind,
        param_hint: usize,
    ) -> Self {
        Self {
            connection_string,
            statement,
            kind,
            params: Vec::with_capacity(param_hint),
            outs: Vec::new(),
            transactional: false,
        }
    }

    /// The statement text (or procedure name) this command will run.
    #[must_use]
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Whether this command invokes a procedure or literal text.
    #[must_use]
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Append a fully-specified parameter.
    #[must_use]
    pub fn param(mut self, param: SqlParam) -> Self {
        self.params.push(param);
        self
    }

    /// Append a name/value input parameter.
    ///
    /// An absent value (`None`) binds an explicit database NULL:
    /// ```rust
    /// # use sql_session::SqlSession;
    /// let cmd = SqlSession::new("server=tcp:localhost,1433")
    ///     .text("INSERT INTO t (a, b) VALUES (@P1, @P2)", 2)
    ///     .bind("a", 7)
    ///     .bind("b", None::<&str>);
    /// # let _ = cmd;
    /// ```
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.params.push(SqlParam::new(name, value));
        self
    }

    /// Bulk-append parameters, preserving their order.
    #[must_use]
    pub fn params(mut self, params: impl IntoIterator<Item = SqlParam>) -> Self {
        self.params.extend(params);
        self
    }

    /// Append an output-direction parameter and return the handle to read the
    /// server-assigned value from after execution.
    pub fn out_param(&mut self, name: impl Into<String>, declared: SqlType) -> OutParam {
        let name = name.into();
        self.params.push(SqlParam::output(name.clone(), declared));
        let handle = OutParam::new(name);
        self.outs.push(handle.clone());
        handle
    }

    /// Wrap execution in a transaction: committed on success, rolled back on
    /// any failure before the error propagates.
    #[must_use]
    pub fn transactional(mut self) -> Self {
        self.transactional = true;
        self
    }

    fn prepare(self) -> Result<PreparedParts, SqlSessionError> {
        let rendered = statement::render(self.kind, &self.statement, &self.params)?;
        Ok(PreparedParts {
            connection_string: self.connection_string,
            transactional: self.transactional,
            rendered,
            outs: self.outs,
        })
    }

    /// Run the statement, discarding any result sets.
    ///
    /// # Errors
    /// Surfaces connection, execution, and transaction errors.
    pub async fn execute(self) -> Result<(), SqlSessionError> {
        let parts = self.prepare()?;

        with_client(
            &parts.connection_string,
            parts.transactional,
            async |client: &mut SqlClient| {
                if parts.rendered.has_outputs {
                    let stream = statement::bind_rendered(&parts.rendered)
                        .query(client)
                        .await?;
                    let readback =
                        query::walk_stream(stream, true, |_row, _index| Ok(RowFlow::Continue))
                            .await?;
                    query::capture_out_values(readback.as_ref(), &parts.outs)
                } else {
                    let result = statement::bind_rendered(&parts.rendered)
                        .execute(client)
                        .await?;
                    let rows_affected: u64 = result.rows_affected().iter().sum();
                    tracing::debug!(rows_affected, "statement executed");
                    Ok(())
                }
            },
        )
        .await
    }

    /// Blocking variant of [`execute`](Self::execute).
    ///
    /// # Errors
    /// As [`execute`](Self::execute); also fails when called from inside an
    /// async runtime.
    pub fn execute_blocking(self) -> Result<(), SqlSessionError> {
        blocking::block_on(self.execute())
    }

    /// Fetch at most one row of the first result set.
    ///
    /// Returns `Ok(None)` if the statement produced zero rows; otherwise
    /// `map` is applied to the first row only, even when more rows exist, and
    /// reading stops there.
    ///
    /// # Errors
    /// Surfaces connection, execution, mapping, and transaction errors.
    pub async fn query_one<T>(
        self,
        mut map: impl FnMut(&SqlRow) -> Result<T, SqlSessionError>,
    ) -> Result<Option<T>, SqlSessionError> {
        let parts = self.prepare()?;
        let mut mapped = None;

        let readback = with_client(
            &parts.connection_string,
            parts.transactional,
            async |client: &mut SqlClient| {
                let stream = statement::bind_rendered(&parts.rendered)
                    .query(client)
                    .await?;
                query::walk_stream(stream, parts.rendered.has_outputs, |row, index| {
                    if index == 0 && mapped.is_none() {
                        mapped = Some(map(row)?);
                    }
                    Ok(RowFlow::Stop)
                })
                .await
            },
        )
        .await?;

        query::capture_out_values(readback.as_ref(), &parts.outs)?;
        Ok(mapped)
    }

    /// Map every row of the first result set into a vector, preserving row
    /// order.
    ///
    /// # Errors
    /// Surfaces connection, execution, mapping, and transaction errors.
    pub async fn query<T>(
        self,
        mut map: impl FnMut(&SqlRow) -> Result<T, SqlSessionError>,
    ) -> Result<Vec<T>, SqlSessionError> {
        let parts = self.prepare()?;
        let mut results = Vec::new();

        let readback = with_client(
            &parts.connection_string,
            parts.transactional,
            async |client: &mut SqlClient| {
                let stream = statement::bind_rendered(&parts.rendered)
                    .query(client)
                    .await?;
                query::walk_stream(stream, parts.rendered.has_outputs, |row, index| {
                    if index == 0 {
                        results.push(map(row)?);
                        Ok(RowFlow::Continue)
                    } else {
                        Ok(RowFlow::Stop)
                    }
                })
                .await
            },
        )
        .await?;

        query::capture_out_values(readback.as_ref(), &parts.outs)?;
        Ok(results)
    }

    /// Blocking variant of [`query`](Self::query).
    ///
    /// # Errors
    /// As [`query`](Self::query); also fails when called from inside an async
    /// runtime.
    pub fn query_blocking<T>(
        self,
        map: impl FnMut(&SqlRow) -> Result<T, SqlSessionError>,
    ) -> Result<Vec<T>, SqlSessionError> {
        blocking::block_on(self.query(map))
    }

    /// Iterate the first result set with a side-effecting handler instead of
    /// a mapping function.
    ///
    /// # Errors
    /// Surfaces connection, execution, handler, and transaction errors.
    pub async fn query_each(
        self,
        mut handler: impl FnMut(&SqlRow) -> Result<(), SqlSessionError>,
    ) -> Result<(), SqlSessionError> {
        let parts = self.prepare()?;

        let readback = with_client(
            &parts.connection_string,
            parts.transactional,
            async |client: &mut SqlClient| {
                let stream = statement::bind_rendered(&parts.rendered)
                    .query(client)
                    .await?;
                query::walk_stream(stream, parts.rendered.has_outputs, |row, index| {
                    if index == 0 {
                        handler(row)?;
                        Ok(RowFlow::Continue)
                    } else {
                        Ok(RowFlow::Stop)
                    }
                })
                .await
            },
        )
        .await?;

        query::capture_out_values(readback.as_ref(), &parts.outs)
    }

    /// Blocking variant of [`query_each`](Self::query_each).
    ///
    /// # Errors
    /// As [`query_each`](Self::query_each); also fails when called from
    /// inside an async runtime.
    pub fn query_each_blocking(
        self,
        handler: impl FnMut(&SqlRow) -> Result<(), SqlSessionError>,
    ) -> Result<(), SqlSessionError> {
        blocking::block_on(self.query_each(handler))
    }

    /// Build a key-to-element map over the first result set.
    ///
    /// A key produced twice is a [`SqlSessionError::DuplicateKey`] error, not
    /// an overwrite.
    ///
    /// # Errors
    /// Surfaces connection, execution, mapping, duplicate-key, and
    /// transaction errors.
    pub async fn query_as_map<K, V>(
        self,
        mut read_key: impl FnMut(&SqlRow) -> Result<K, SqlSessionError>,
        mut read_value: impl FnMut(&SqlRow) -> Result<V, SqlSessionError>,
    ) -> Result<HashMap<K, V>, SqlSessionError>
    where
        K: Eq + Hash + Debug,
    {
        let parts = self.prepare()?;
        let mut map = HashMap::new();

        let readback = with_client(
            &parts.connection_string,
            parts.transactional,
            async |client: &mut SqlClient| {
                let stream = statement::bind_rendered(&parts.rendered)
                    .query(client)
                    .await?;
                query::walk_stream(stream, parts.rendered.has_outputs, |row, index| {
                    if index == 0 {
                        let key = read_key(row)?;
                        let value = read_value(row)?;
                        insert_unique(&mut map, key, value)?;
                        Ok(RowFlow::Continue)
                    } else {
                        Ok(RowFlow::Stop)
                    }
                })
                .await
            },
        )
        .await?;

        query::capture_out_values(readback.as_ref(), &parts.outs)?;
        Ok(map)
    }

    /// Blocking variant of [`query_as_map`](Self::query_as_map).
    ///
    /// # Errors
    /// As [`query_as_map`](Self::query_as_map); also fails when called from
    /// inside an async runtime.
    pub fn query_as_map_blocking<K, V>(
        self,
        read_key: impl FnMut(&SqlRow) -> Result<K, SqlSessionError>,
        read_value: impl FnMut(&SqlRow) -> Result<V, SqlSessionError>,
    ) -> Result<HashMap<K, V>, SqlSessionError>
    where
        K: Eq + Hash + Debug,
    {
        blocking::block_on(self.query_as_map(read_key, read_value))
    }

    /// Iterate every result set the statement produces.
    ///
    /// The handler receives each row together with the zero-based index of
    /// the result set it belongs to; the index advances once per result-set
    /// boundary, including boundaries of empty result sets.
    ///
    /// # Errors
    /// Surfaces connection, execution, handler, and transaction errors.
    pub async fn query_multiple(
        self,
        mut handler: impl FnMut(&SqlRow, usize) -> Result<(), SqlSessionError>,
    ) -> Result<(), SqlSessionError> {
        let parts = self.prepare()?;

        let readback = with_client(
            &parts.connection_string,
            parts.transactional,
            async |client: &mut SqlClient| {
                let stream = statement::bind_rendered(&parts.rendered)
                    .query(client)
                    .await?;
                query::walk_stream(stream, parts.rendered.has_outputs, |row, index| {
                    handler(row, index)?;
                    Ok(RowFlow::Continue)
                })
                .await
            },
        )
        .await?;

        query::capture_out_values(readback.as_ref(), &parts.outs)
    }
}

/// Open a connection scoped to one terminal operation, optionally wrapping
/// the body in a transaction, and release the connection on every exit path.
///
/// On a body failure inside a transaction, rollback is attempted first and
/// the original error is returned unchanged; a rollback failure is logged but
/// does not replace it.
async fn with_client<T>(
    connection_string: &str,
    transactional: bool,
    body: impl AsyncFnOnce(&mut SqlClient) -> Result<T, SqlSessionError>,
) -> Result<T, SqlSessionError> {
    let mut client = connection::connect(connection_string).await?;

    if transactional {
        transaction::begin(&mut client).await?;
        match body(&mut client).await {
            Ok(value) => {
                transaction::commit(&mut client).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = transaction::rollback(&mut client).await {
                    tracing::warn!(error = %rollback_err, "rollback failed after execution error");
                }
                Err(err)
            }
        }
    } else {
        body(&mut client).await
    }
    // client drops here on every path, closing the connection
}

fn insert_unique<K, V>(
    map: &mut HashMap<K, V>,
    key: K,
    value: V,
) -> Result<(), SqlSessionError>
where
    K: Eq + Hash + Debug,
{
    match map.entry(key) {
        Entry::Occupied(entry) => Err(SqlSessionError::DuplicateKey(format!(
            "{:?}",
            entry.key()
        ))),
        Entry::Vacant(slot) => {
            slot.insert(value);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamDirection;

    fn command() -> SqlCommand {
        SqlCommand::new(
            "server=tcp:localhost,1433".to_string(),
            "dbo.noop".to_string(),
            StatementKind::Procedure,
            4,
        )
    }

    #[test]
    fn builder_preserves_insertion_order() {
        let cmd = command()
            .bind("c", 3i64)
            .bind("a", 1i64)
            .params(vec![SqlParam::new("b", 2i64)]);

        let names: Vec<&str> = cmd.params.iter().map(SqlParam::name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn bind_normalizes_missing_values_to_null() {
        let cmd = command().bind("a", None::<i64>);
        assert!(cmd.params[0].value().is_null());
    }

    #[test]
    fn out_param_registers_param_and_handle() {
        let mut cmd = command();
        let handle = cmd.out_param("id", SqlType::BigInt);

        assert_eq!(cmd.params.len(), 1);
        assert_eq!(cmd.params[0].direction(), ParamDirection::Output);
        assert_eq!(cmd.outs.len(), 1);
        assert_eq!(handle.name(), "id");
        assert!(handle.value().is_none());
    }

    #[test]
    fn transactional_sets_flag() {
        let cmd = command();
        assert!(!cmd.transactional);
        let cmd = cmd.transactional();
        assert!(cmd.transactional);
    }

    #[test]
    fn insert_unique_rejects_duplicates() {
        let mut map = HashMap::new();
        insert_unique(&mut map, 1, "a").unwrap();
        insert_unique(&mut map, 2, "b").unwrap();

        let err = insert_unique(&mut map, 1, "c").unwrap_err();
        assert!(matches!(err, SqlSessionError::DuplicateKey(k) if k == "1"));
        // The original element survives.
        assert_eq!(map[&1], "a");
    }
}
