use std::collections::HashMap;
use std::sync::Arc;

use crate::types::SqlValue;

/// A single row handed to mapping functions during result iteration.
///
/// Column names are shared across all rows of one result set; a name-to-index
/// cache avoids repeated string comparisons during lookups.
#[derive(Debug, Clone)]
pub struct SqlRow {
    column_names: Arc<Vec<String>>,
    values: Vec<SqlValue>,
    column_index_cache: Arc<HashMap<String, usize>>,
}

impl SqlRow {
    /// Create a row from column names and values.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<SqlValue>) -> Self {
        let cache = Arc::new(
            column_names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect::<HashMap<_, _>>(),
        );

        Self {
            column_names,
            values,
            column_index_cache: cache,
        }
    }

    /// Create a row reusing a prebuilt lookup cache shared across one result set.
    pub(crate) fn with_shared_cache(
        column_names: Arc<Vec<String>>,
        values: Vec<SqlValue>,
        column_index_cache: Arc<HashMap<String, usize>>,
    ) -> Self {
        Self {
            column_names,
            values,
            column_index_cache,
        }
    }

    /// Get the index of a column by name, or None if not found.
    #[must_use]
    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }

        // Fall back to linear search
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value by column name, or None if the column wasn't found.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&SqlValue> {
        self.column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value by column index, or None if the index is out of bounds.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// The column names of the result set this row belongs to.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.column_names
    }

    /// Number of fields in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
