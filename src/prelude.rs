//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types so callers can get
//! started with a single `use`.

pub use crate::command::SqlCommand;
pub use crate::connection::SqlClient;
pub use crate::error::SqlSessionError;
pub use crate::params::{OutParam, ParamDirection, SqlParam, SqlType};
pub use crate::row::SqlRow;
pub use crate::session::SqlSession;
pub use crate::types::{SqlValue, StatementKind};
