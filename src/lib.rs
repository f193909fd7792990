//! Fluent command builder for SQL Server over [tiberius].
//!
//! A [`SqlSession`] holds a connection string and manufactures [`SqlCommand`]
//! builders for stored procedures or literal text statements. Parameters
//! accumulate through chained calls; a terminal operation then opens a
//! connection scoped to that one call, executes, streams rows into
//! caller-supplied mapping functions, and drops the connection.
//!
//! ```rust,no_run
//! use sql_session::{SqlSession, SqlValue};
//!
//! # async fn demo() -> Result<(), sql_session::SqlSessionError> {
//! let session = SqlSession::new(
//!     "server=tcp:localhost,1433;user=sa;password=secret;TrustServerCertificate=true",
//! );
//!
//! let names = session
//!     .text("SELECT name FROM users WHERE age > @P1", 1)
//!     .bind("min_age", 21)
//!     .query(|row| {
//!         Ok(row
//!             .get("name")
//!             .and_then(SqlValue::as_text)
//!             .unwrap_or_default()
//!             .to_string())
//!     })
//!     .await?;
//! # let _ = names;
//! # Ok(())
//! # }
//! ```
//!
//! Commands are single-use: terminal operations consume the builder, so a
//! command cannot be executed twice. Wrapping a call in [`SqlCommand::transactional`]
//! commits on success and rolls back before propagating any failure.
//!
//! [tiberius]: https://docs.rs/tiberius

mod blocking;
mod command;
mod connection;
mod error;
mod params;
pub mod prelude;
mod query;
mod row;
mod session;
mod statement;
mod transaction;
mod types;

pub use command::SqlCommand;
pub use connection::SqlClient;
pub use error::SqlSessionError;
pub use params::{OutParam, ParamDirection, SqlParam, SqlType};
pub use row::SqlRow;
pub use session::SqlSession;
pub use types::{SqlValue, StatementKind};
