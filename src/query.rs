use std::collections::HashMap;
use std::sync::Arc;

use futures_util::TryStreamExt;
use tiberius::{QueryItem, QueryStream, ResultMetadata, Row};

use crate::error::SqlSessionError;
use crate::params::OutParam;
use crate::row::SqlRow;
use crate::statement::sanitize_out_name;
use crate::types::SqlValue;

/// Flow control returned by row callbacks during stream consumption.
pub(crate) enum RowFlow {
    Continue,
    Stop,
}

/// Tracks the zero-based result-set index while walking a query stream.
///
/// The index advances once per column-metadata token, which SQL Server emits
/// at every result-set boundary whether or not the set contains rows.
pub(crate) struct SetTracker {
    started: bool,
    index: usize,
}

impl SetTracker {
    pub(crate) fn new() -> Self {
        Self {
            started: false,
            index: 0,
        }
    }

    /// Cross a result-set boundary; returns the index of the new set.
    pub(crate) fn advance(&mut self) -> usize {
        if self.started {
            self.index += 1;
        } else {
            self.started = true;
        }
        self.index
    }

    /// Index of the current result set, or None before the first boundary.
    pub(crate) fn current(&self) -> Option<usize> {
        self.started.then_some(self.index)
    }
}

fn columns_of(meta: &ResultMetadata) -> (Arc<Vec<String>>, Arc<HashMap<String, usize>>) {
    let names: Vec<String> = meta
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let cache: HashMap<String, usize> = names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect();
    (Arc::new(names), Arc::new(cache))
}

/// Extract a single field from a tiberius row.
///
/// Types are probed in turn; `Ok(None)` from the driver means the column type
/// matched but the value is NULL. Column types without a mapping come back as
/// NULL rather than failing the whole row.
pub(crate) fn extract_value(row: &Row, idx: usize) -> Result<SqlValue, SqlSessionError> {
    match row.try_get::<u8, _>(idx) {
        Ok(Some(v)) => return Ok(SqlValue::Int(i64::from(v))),
        Ok(None) => return Ok(SqlValue::Null),
        Err(_) => {}
    }

    match row.try_get::<i16, _>(idx) {
        Ok(Some(v)) => return Ok(SqlValue::Int(i64::from(v))),
        Ok(None) => return Ok(SqlValue::Null),
        Err(_) => {}
    }

    match row.try_get::<i32, _>(idx) {
        Ok(Some(v)) => return Ok(SqlValue::Int(i64::from(v))),
        Ok(None) => return Ok(SqlValue::Null),
        Err(_) => {}
    }

    match row.try_get::<i64, _>(idx) {
        Ok(Some(v)) => return Ok(SqlValue::Int(v)),
        Ok(None) => return Ok(SqlValue::Null),
        Err(_) => {}
    }

    match row.try_get::<f32, _>(idx) {
        Ok(Some(v)) => return Ok(SqlValue::Float(f64::from(v))),
        Ok(None) => return Ok(SqlValue::Null),
        Err(_) => {}
    }

    match row.try_get::<f64, _>(idx) {
        Ok(Some(v)) => return Ok(SqlValue::Float(v)),
        Ok(None) => return Ok(SqlValue::Null),
        Err(_) => {}
    }

    match row.try_get::<bool, _>(idx) {
        Ok(Some(v)) => return Ok(SqlValue::Bool(v)),
        Ok(None) => return Ok(SqlValue::Null),
        Err(_) => {}
    }

    match row.try_get::<chrono::NaiveDateTime, _>(idx) {
        Ok(Some(v)) => return Ok(SqlValue::Timestamp(v)),
        Ok(None) => return Ok(SqlValue::Null),
        Err(_) => {}
    }

    match row.try_get::<&str, _>(idx) {
        Ok(Some(v)) => return Ok(SqlValue::Text(v.to_string())),
        Ok(None) => return Ok(SqlValue::Null),
        Err(_) => {}
    }

    match row.try_get::<&[u8], _>(idx) {
        Ok(Some(v)) => return Ok(SqlValue::Blob(v.to_vec())),
        Ok(None) => return Ok(SqlValue::Null),
        Err(_) => {}
    }

    // Unmapped column type; surface as NULL instead of failing the row.
    Ok(SqlValue::Null)
}

fn convert_row(
    row: &Row,
    names: &Arc<Vec<String>>,
    cache: &Arc<HashMap<String, usize>>,
) -> Result<SqlRow, SqlSessionError> {
    let mut values = Vec::with_capacity(names.len());
    for idx in 0..names.len() {
        values.push(extract_value(row, idx)?);
    }
    Ok(SqlRow::with_shared_cache(
        Arc::clone(names),
        values,
        Arc::clone(cache),
    ))
}

/// Walk a query stream, invoking `on_row` once per row with the zero-based
/// result-set index the row belongs to.
///
/// The synthetic output-parameter read-back set (recognized by its
/// [`READBACK_MARKER`](crate::statement::READBACK_MARKER) first column) is
/// never surfaced to `on_row` and does not consume a result-set index; its
/// first row is returned for capture instead.
///
/// When `on_row` returns [`RowFlow::Stop`] no further callbacks are made; with
/// `drain_for_readback` set the remaining items are still consumed so the
/// trailing read-back set can be reached. Without it the walk ends
/// immediately.
///
/// # Errors
/// Propagates driver errors and any error returned by `on_row`.
pub(crate) async fn walk_stream(
    mut stream: QueryStream<'_>,
    drain_for_readback: bool,
    mut on_row: impl FnMut(&SqlRow, usize) -> Result<RowFlow, SqlSessionError>,
) -> Result<Option<SqlRow>, SqlSessionError> {
    let mut tracker = SetTracker::new();
    let mut columns: Option<(Arc<Vec<String>>, Arc<HashMap<String, usize>>)> = None;
    let mut readback_row: Option<SqlRow> = None;
    let mut in_readback = false;
    let mut stopped = false;

    while let Some(item) = stream.try_next().await? {
        match item {
            QueryItem::Metadata(meta) => {
                in_readback = meta
                    .columns()
                    .first()
                    .is_some_and(|col| col.name() == crate::statement::READBACK_MARKER);
                if !in_readback {
                    tracker.advance();
                }
                columns = Some(columns_of(&meta));
            }
            QueryItem::Row(row) => {
                let Some((names, cache)) = &columns else {
                    return Err(SqlSessionError::ExecutionError(
                        "row received before column metadata".to_string(),
                    ));
                };

                if in_readback {
                    if readback_row.is_none() {
                        readback_row = Some(convert_row(&row, names, cache)?);
                    }
                    continue;
                }

                let index = tracker.current().ok_or_else(|| {
                    SqlSessionError::ExecutionError(
                        "row received before result set boundary".to_string(),
                    )
                })?;

                if stopped {
                    continue;
                }

                let sql_row = convert_row(&row, names, cache)?;
                match on_row(&sql_row, index)? {
                    RowFlow::Continue => {}
                    RowFlow::Stop => {
                        if drain_for_readback {
                            stopped = true;
                        } else {
                            return Ok(None);
                        }
                    }
                }
            }
        }
    }

    Ok(readback_row)
}

/// Copy server-assigned values from the read-back row into the registered
/// output-parameter handles.
///
/// # Errors
/// Returns `SqlSessionError::ExecutionError` if the read-back row is missing
/// or lacks a column for a registered handle.
pub(crate) fn capture_out_values(
    readback: Option<&SqlRow>,
    outs: &[OutParam],
) -> Result<(), SqlSessionError> {
    if outs.is_empty() {
        return Ok(());
    }

    let row = readback.ok_or_else(|| {
        SqlSessionError::ExecutionError(
            "output parameter read-back returned no row".to_string(),
        )
    })?;

    for out in outs {
        let name = sanitize_out_name(out.name())?;
        let value = row.get(&name).ok_or_else(|| {
            SqlSessionError::ExecutionError(format!(
                "output parameter {name:?} missing from read-back row"
            ))
        })?;
        out.fill(value.clone());
    }

    Ok(())
}
