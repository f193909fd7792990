use std::collections::HashSet;

use tiberius::Query;

use crate::error::SqlSessionError;
use crate::params::{ParamDirection, SqlParam};
use crate::types::{SqlValue, StatementKind};

/// Marker column prefixed to the output-parameter read-back SELECT so the
/// stream walker can tell the synthetic result set apart from real ones.
pub(crate) const READBACK_MARKER: &str = "__sql_session_out";

/// A statement rendered to its final T-SQL shape, with the input values to
/// bind in positional order.
#[derive(Debug)]
pub(crate) struct RenderedCommand {
    pub(crate) sql: String,
    pub(crate) inputs: Vec<SqlValue>,
    pub(crate) has_outputs: bool,
}

/// Normalize an output parameter name: a leading `@` is tolerated, the rest
/// must be a plain identifier since it becomes a T-SQL local variable.
pub(crate) fn sanitize_out_name(name: &str) -> Result<String, SqlSessionError> {
    let trimmed = name.strip_prefix('@').unwrap_or(name);
    let mut chars = trimmed.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(trimmed.to_string())
    } else {
        Err(SqlSessionError::ParameterError(format!(
            "invalid output parameter name: {name:?}"
        )))
    }
}

fn validate_procedure_name(name: &str) -> Result<(), SqlSessionError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']' | '#' | '$'));
    if valid {
        Ok(())
    } else {
        Err(SqlSessionError::ParameterError(format!(
            "invalid procedure name: {name:?}"
        )))
    }
}

/// Render the accumulated statement and parameter list to executable T-SQL.
///
/// Text statements without output parameters pass through verbatim. Procedure
/// statements become an `EXEC` with positional `@Pn` placeholders for inputs
/// and local variables for outputs. Output parameters add a `DECLARE`
/// preamble and a trailing `SELECT` that reads the assigned values back as
/// the statement's final result set.
///
/// # Errors
/// Returns `SqlSessionError::ParameterError` for invalid or duplicate output
/// parameter names or an invalid procedure name.
pub(crate) fn render(
    kind: StatementKind,
    statement: &str,
    params: &[SqlParam],
) -> Result<RenderedCommand, SqlSessionError> {
    let mut inputs = Vec::with_capacity(params.len());
    let mut declares = Vec::new();
    let mut args = Vec::with_capacity(params.len());
    let mut readbacks = Vec::new();
    let mut seen_outputs = HashSet::new();

    for param in params {
        match param.direction() {
            ParamDirection::Input => {
                inputs.push(param.value().clone());
                args.push(format!("@P{}", inputs.len()));
            }
            ParamDirection::Output => {
                let name = sanitize_out_name(param.name())?;
                if !seen_outputs.insert(name.clone()) {
                    return Err(SqlSessionError::ParameterError(format!(
                        "duplicate output parameter name: {name:?}"
                    )));
                }
                let declared = param.declared_type().ok_or_else(|| {
                    SqlSessionError::ParameterError(format!(
                        "output parameter {name:?} has no declared type"
                    ))
                })?;
                declares.push(format!("DECLARE @{name} {};", declared.render()));
                args.push(format!("@{name} OUTPUT"));
                readbacks.push(format!("@{name} AS [{name}]"));
            }
        }
    }

    if readbacks.is_empty() && matches!(kind, StatementKind::Text) {
        // Verbatim pass-through for plain text statements.
        return Ok(RenderedCommand {
            sql: statement.to_string(),
            inputs,
            has_outputs: false,
        });
    }

    let body = match kind {
        StatementKind::Procedure => {
            validate_procedure_name(statement)?;
            if args.is_empty() {
                format!("EXEC {statement};")
            } else {
                format!("EXEC {statement} {};", args.join(", "))
            }
        }
        StatementKind::Text => {
            let trimmed = statement.trim_end();
            if trimmed.ends_with(';') {
                trimmed.to_string()
            } else {
                format!("{trimmed};")
            }
        }
    };

    let has_outputs = !readbacks.is_empty();
    let mut parts = declares;
    parts.push(body);
    if has_outputs {
        parts.push(format!(
            "SELECT 1 AS [{READBACK_MARKER}], {};",
            readbacks.join(", ")
        ));
    }

    Ok(RenderedCommand {
        sql: parts.join("\n"),
        inputs,
        has_outputs,
    })
}

/// Bind the rendered statement's input values onto a tiberius query, in
/// positional order.
pub(crate) fn bind_rendered(rendered: &RenderedCommand) -> Query<'_> {
    let mut query = Query::new(rendered.sql.as_str());

    for value in &rendered.inputs {
        match value {
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Timestamp(dt) => {
                query.bind(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
            }
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Json(jsval) => query.bind(jsval.to_string()),
            SqlValue::Blob(bytes) => query.bind(bytes.clone()),
        }
    }

    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SqlType;

    #[test]
    fn text_without_outputs_passes_through() {
        let params = vec![SqlParam::new("a", 1i64), SqlParam::new("b", "x")];
        let rendered = render(
            StatementKind::Text,
            "SELECT * FROM t WHERE a = @P1 AND b = @P2",
            &params,
        )
        .unwrap();

        assert_eq!(rendered.sql, "SELECT * FROM t WHERE a = @P1 AND b = @P2");
        assert_eq!(
            rendered.inputs,
            vec![SqlValue::Int(1), SqlValue::Text("x".to_string())]
        );
        assert!(!rendered.has_outputs);
    }

    #[test]
    fn procedure_renders_positional_exec() {
        let params = vec![SqlParam::new("name", "alice"), SqlParam::new("age", 30i64)];
        let rendered = render(StatementKind::Procedure, "dbo.add_user", &params).unwrap();

        assert_eq!(rendered.sql, "EXEC dbo.add_user @P1, @P2;");
    }

    #[test]
    fn procedure_without_params() {
        let rendered = render(StatementKind::Procedure, "dbo.tick", &[]).unwrap();
        assert_eq!(rendered.sql, "EXEC dbo.tick;");
    }

    #[test]
    fn output_param_wraps_with_declare_and_readback() {
        let params = vec![
            SqlParam::new("name", "alice"),
            SqlParam::output("id", SqlType::BigInt),
        ];
        let rendered = render(StatementKind::Procedure, "dbo.make_user", &params).unwrap();

        assert_eq!(
            rendered.sql,
            "DECLARE @id BIGINT;\nEXEC dbo.make_user @P1, @id OUTPUT;\nSELECT 1 AS [__sql_session_out], @id AS [id];"
        );
        assert_eq!(rendered.inputs, vec![SqlValue::Text("alice".to_string())]);
        assert!(rendered.has_outputs);
    }

    #[test]
    fn text_with_output_appends_readback() {
        let params = vec![SqlParam::output("total", SqlType::Int)];
        let rendered = render(
            StatementKind::Text,
            "SET @total = (SELECT COUNT(*) FROM t)",
            &params,
        )
        .unwrap();

        assert_eq!(
            rendered.sql,
            "DECLARE @total INT;\nSET @total = (SELECT COUNT(*) FROM t);\nSELECT 1 AS [__sql_session_out], @total AS [total];"
        );
    }

    #[test]
    fn input_order_is_insertion_order() {
        let params = vec![
            SqlParam::new("z", 3i64),
            SqlParam::output("o", SqlType::Int),
            SqlParam::new("a", 1i64),
        ];
        let rendered = render(StatementKind::Procedure, "p", &params).unwrap();

        // Inputs keep insertion order; the output occupies its positional slot.
        assert_eq!(rendered.inputs, vec![SqlValue::Int(3), SqlValue::Int(1)]);
        assert!(rendered.sql.contains("EXEC p @P1, @o OUTPUT, @P2;"));
    }

    #[test]
    fn out_name_sanitization() {
        assert_eq!(sanitize_out_name("@id").unwrap(), "id");
        assert_eq!(sanitize_out_name("row_count").unwrap(), "row_count");
        assert!(sanitize_out_name("").is_err());
        assert!(sanitize_out_name("1abc").is_err());
        assert!(sanitize_out_name("a b").is_err());
        assert!(sanitize_out_name("x; DROP TABLE t").is_err());
    }

    #[test]
    fn duplicate_output_names_rejected() {
        let params = vec![
            SqlParam::output("id", SqlType::Int),
            SqlParam::output("@id", SqlType::Int),
        ];
        let err = render(StatementKind::Procedure, "p", &params).unwrap_err();
        assert!(matches!(err, SqlSessionError::ParameterError(_)));
    }

    #[test]
    fn invalid_procedure_name_rejected() {
        let err = render(StatementKind::Procedure, "p; DROP TABLE t", &[]).unwrap_err();
        assert!(matches!(err, SqlSessionError::ParameterError(_)));
    }
}
