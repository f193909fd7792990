use crate::command::SqlCommand;
use crate::types::StatementKind;

/// Factory for command builders, holding the connection string they execute
/// against.
///
/// The connection string is ADO-style and treated as opaque; it is neither
/// parsed nor validated until a terminal operation opens a connection.
///
/// ```rust
/// use sql_session::SqlSession;
///
/// let session = SqlSession::new(
///     "server=tcp:localhost,1433;user=sa;password=secret;TrustServerCertificate=true",
/// );
/// let cmd = session.text("SELECT 1 AS one", 0);
/// # let _ = cmd;
/// ```
#[derive(Debug, Clone)]
pub struct SqlSession {
    connection_string: String,
}

impl SqlSession {
    /// Create a session factory over the given connection string.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
        }
    }

    /// Start a command that invokes a stored procedure.
    ///
    /// `param_hint` pre-sizes the parameter list; it is a capacity hint only.
    #[must_use]
    pub fn procedure(&self, name: impl Into<String>, param_hint: usize) -> SqlCommand {
        SqlCommand::new(
            self.connection_string.clone(),
            name.into(),
            StatementKind::Procedure,
            param_hint,
        )
    }

    /// Start a command that runs a literal text statement.
    ///
    /// `param_hint` pre-sizes the parameter list; it is a capacity hint only.
    #[must_use]
    pub fn text(&self, sql: impl Into<String>, param_hint: usize) -> SqlCommand {
        SqlCommand::new(
            self.connection_string.clone(),
            sql.into(),
            StatementKind::Text,
            param_hint,
        )
    }

    /// The connection string this session hands to its commands.
    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_sets_statement_kind() {
        let session = SqlSession::new("server=tcp:localhost,1433");

        let proc = session.procedure("dbo.get_scores", 2);
        assert_eq!(proc.kind(), StatementKind::Procedure);
        assert_eq!(proc.statement(), "dbo.get_scores");

        let text = session.text("SELECT 1", 0);
        assert_eq!(text.kind(), StatementKind::Text);
        assert_eq!(text.statement(), "SELECT 1");
    }
}
