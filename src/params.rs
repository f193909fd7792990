use std::sync::{Arc, Mutex};

use crate::types::SqlValue;

/// Whether a parameter carries a value into the statement or receives one
/// assigned by the server during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDirection {
    Input,
    Output,
}

/// Declared server-side type for an output parameter.
///
/// Sized variants carry an optional length; `None` renders as `MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Bit,
    Int,
    BigInt,
    Float,
    DateTime2,
    NVarChar(Option<u32>),
    VarBinary(Option<u32>),
}

impl SqlType {
    /// Render the T-SQL type name for a DECLARE statement.
    pub(crate) fn render(self) -> String {
        match self {
            SqlType::Bit => "BIT".to_string(),
            SqlType::Int => "INT".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Float => "FLOAT".to_string(),
            SqlType::DateTime2 => "DATETIME2".to_string(),
            SqlType::NVarChar(Some(size)) => format!("NVARCHAR({size})"),
            SqlType::NVarChar(None) => "NVARCHAR(MAX)".to_string(),
            SqlType::VarBinary(Some(size)) => format!("VARBINARY({size})"),
            SqlType::VarBinary(None) => "VARBINARY(MAX)".to_string(),
        }
    }
}

/// A single statement parameter: name, value, and direction.
///
/// Input parameters bind positionally in insertion order; output parameters
/// additionally carry a declared type for the server-side variable.
#[derive(Debug, Clone)]
pub struct SqlParam {
    name: String,
    value: SqlValue,
    direction: ParamDirection,
    declared: Option<SqlType>,
}

impl SqlParam {
    /// A fully-specified input parameter. A `None` value normalizes to an
    /// explicit database NULL.
    pub fn new(name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            direction: ParamDirection::Input,
            declared: None,
        }
    }

    /// An output-direction parameter with a declared server type.
    pub fn output(name: impl Into<String>, declared: SqlType) -> Self {
        Self {
            name: name.into(),
            value: SqlValue::Null,
            direction: ParamDirection::Output,
            declared: Some(declared),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &SqlValue {
        &self.value
    }

    #[must_use]
    pub fn direction(&self) -> ParamDirection {
        self.direction
    }

    #[must_use]
    pub fn declared_type(&self) -> Option<SqlType> {
        self.declared
    }
}

/// Readable handle for an output parameter.
///
/// The execution layer fills the slot once the terminal operation finishes;
/// until then [`value`](OutParam::value) returns `None`. Handles are cheap to
/// clone and share the same slot.
#[derive(Debug, Clone)]
pub struct OutParam {
    name: String,
    slot: Arc<Mutex<Option<SqlValue>>>,
}

impl OutParam {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// The parameter name this handle was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value the server assigned during execution, if any.
    #[must_use]
    pub fn value(&self) -> Option<SqlValue> {
        match self.slot.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn fill(&self, value: SqlValue) {
        let mut guard = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(value);
    }
}
