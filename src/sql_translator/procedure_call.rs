//! `CALL proc(args)` and table functions in `FROM`.
//!
//! Named arguments (`name => value`) are matched against the sampled
//! procedure signature and reordered into positional Cypher arguments.

use sqlparser::ast::{Function, FunctionArg, FunctionArgExpr, FunctionArguments, Ident, ObjectName};

use crate::graph_catalog::{GraphType, ProcedureArgument, ProcedureInfo, ProcedureKind};

use super::cypher::{Clause, Expr, Literal, Projection, ProjectionItem, Statement};
use super::errors::TranslationError;
use super::expression::{ColumnResolver, ExpressionTranslator};
use super::Context;

/// Dotted procedure name as written.
pub(crate) fn procedure_name(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|i| i.value.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

/// Argument values never see table columns: bare names are variables.
struct NoColumns;

impl ColumnResolver for NoColumns {
    fn resolve_column(&self, idents: &[Ident]) -> Result<Expr, TranslationError> {
        match idents {
            [single] => Ok(Expr::var(&single.value)),
            _ => Err(TranslationError::UnknownColumn(
                idents.iter().map(|i| i.value.as_str()).collect::<Vec<_>>().join("."),
            )),
        }
    }
}

/// Columns yielded by a procedure, used as plain variables.
pub(crate) struct Yielded<'p> {
    pub procedure: Option<&'p ProcedureInfo>,
}

impl ColumnResolver for Yielded<'_> {
    fn resolve_column(&self, idents: &[Ident]) -> Result<Expr, TranslationError> {
        let Some(column) = idents.last() else {
            return Err(TranslationError::UnknownColumn(String::new()));
        };
        match self.procedure {
            Some(p) if !p.outputs.is_empty() => p
                .outputs
                .iter()
                .find(|o| o.name.eq_ignore_ascii_case(&column.value))
                .map(|o| Expr::var(&o.name))
                .ok_or_else(|| TranslationError::UnknownColumn(format!("{}.{}", p.name, column.value))),
            _ => Ok(Expr::var(&column.value)),
        }
    }
}

/// Positional Cypher arguments for a call, checking named ones against the signature.
pub(crate) fn arguments(
    name: &str,
    procedure: Option<&ProcedureInfo>,
    args: &[FunctionArg],
) -> Result<Vec<Expr>, TranslationError> {
    let translator = ExpressionTranslator::new(&NoColumns);
    let mut positional = Vec::new();
    let mut named: Vec<(String, Expr)> = Vec::new();

    for arg in args {
        match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => {
                if !named.is_empty() {
                    return Err(TranslationError::unsupported_with_context(
                        arg.to_string(),
                        "after named arguments",
                    ));
                }
                positional.push(translator.translate(e)?);
            }
            FunctionArg::Named {
                name: arg_name,
                arg: FunctionArgExpr::Expr(e),
                ..
            } => named.push((arg_name.value.clone(), translator.translate(e)?)),
            other => {
                return Err(TranslationError::unsupported_with_context(
                    other.to_string(),
                    "as a procedure argument",
                ))
            }
        }
    }

    if named.is_empty() {
        return Ok(positional);
    }
    let Some(procedure) = procedure else {
        return Err(TranslationError::UnknownParameter {
            procedure: name.to_string(),
            parameter: named[0].0.clone(),
        });
    };
    if let Some((unknown, _)) = named.iter().find(|(n, _)| procedure.argument(n).is_none()) {
        return Err(TranslationError::UnknownParameter {
            procedure: procedure.name.clone(),
            parameter: unknown.clone(),
        });
    }

    let last_named = procedure
        .arguments
        .iter()
        .rposition(|a| named.iter().any(|(n, _)| *n == a.name))
        .unwrap_or(0);
    for (index, declared) in procedure.arguments.iter().enumerate().take(last_named + 1) {
        if index < positional.len() {
            continue;
        }
        match named.iter().position(|(n, _)| *n == declared.name) {
            Some(found) => positional.push(named.remove(found).1),
            None => match default_argument(declared) {
                Some(default) => positional.push(default),
                None => {
                    return Err(TranslationError::unsupported_with_context(
                        format!("omitting argument `{}` of `{}`", declared.name, procedure.name),
                        "while later arguments are named",
                    ))
                }
            },
        }
    }
    if let Some((duplicate, _)) = named.first() {
        return Err(TranslationError::unsupported_with_context(
            format!("argument `{}` given both by position and by name", duplicate),
            "in a procedure call",
        ));
    }
    Ok(positional)
}

/// Literal for the declared default of an omitted argument. Signatures report
/// defaults bare or as `DefaultParameterValue{value=<v>, type=<T>}`; only
/// scalar defaults can be written back as Cypher.
fn default_argument(declared: &ProcedureArgument) -> Option<Expr> {
    let raw = declared.default_value.as_deref()?;
    let value = raw
        .strip_prefix("DefaultParameterValue{value=")
        .and_then(|rest| rest.rsplit_once(", type="))
        .map(|(value, _)| value)
        .unwrap_or(raw);
    if value.eq_ignore_ascii_case("null") {
        return Some(Expr::null());
    }
    match declared.graph_type {
        GraphType::String => Some(Expr::string(value)),
        GraphType::Integer => value.parse().ok().map(Expr::integer),
        GraphType::Float => value
            .parse::<f64>()
            .ok()
            .map(|_| Expr::Literal(Literal::Float(value.to_string()))),
        GraphType::Boolean => value.parse().ok().map(|b| Expr::Literal(Literal::Boolean(b))),
        _ => None,
    }
}

/// `CALL proc(...)` as a statement of its own.
pub(crate) fn translate_call(ctx: &Context<'_>, function: &Function) -> Result<Statement, TranslationError> {
    let name = procedure_name(&function.name);
    let procedure = ctx.snapshot.procedure(&name);
    let args = match &function.args {
        FunctionArguments::None => Vec::new(),
        FunctionArguments::List(list) => arguments(&name, procedure, &list.args)?,
        FunctionArguments::Subquery(_) => {
            return Err(TranslationError::unsupported_with_context(
                function.to_string(),
                "(subquery arguments)",
            ))
        }
    };
    let name = procedure.map(|p| p.name.clone()).unwrap_or(name);

    // Functions cannot be CALLed in Cypher, their value is returned instead.
    if procedure.is_some_and(|p| p.kind == ProcedureKind::Function) {
        return Ok(Statement::new(vec![Clause::Return(Projection::items(vec![
            ProjectionItem::new(Expr::func(&name, args), None),
        ]))]));
    }
    Ok(Statement::new(vec![Clause::CallProcedure {
        name,
        args,
        yields: Vec::new(),
        filter: None,
    }]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NameCase;
    use crate::graph_catalog::SchemaSnapshot;
    use crate::sql_translator::cypher::{RenderOptions, ToCypher};
    use crate::sql_translator::statement::SqlStatement;
    use sqlparser::dialect::GenericDialect;
    use sqlparser::parser::Parser;

    fn snapshot() -> SchemaSnapshot {
        let arg = |name: &str| ProcedureArgument {
            name: name.into(),
            graph_type: GraphType::String,
            default_value: None,
        };
        SchemaSnapshot {
            procedures: vec![
                ProcedureInfo {
                    name: "apoc.text.join".into(),
                    description: String::new(),
                    kind: ProcedureKind::Function,
                    arguments: vec![arg("texts"), arg("delimiter")],
                    outputs: vec![],
                },
                ProcedureInfo {
                    name: "db.index.vector.queryNodes".into(),
                    description: String::new(),
                    kind: ProcedureKind::Procedure,
                    arguments: vec![
                        arg("indexName"),
                        ProcedureArgument {
                            name: "numberOfNearestNeighbours".into(),
                            graph_type: GraphType::Integer,
                            default_value: Some("DefaultParameterValue{value=10, type=INTEGER}".into()),
                        },
                        arg("options"),
                        arg("query"),
                    ],
                    outputs: vec![arg("node"), arg("score")],
                },
                ProcedureInfo {
                    name: "db.index.fulltext.queryNodes".into(),
                    description: String::new(),
                    kind: ProcedureKind::Procedure,
                    arguments: vec![arg("indexName"), arg("queryString")],
                    outputs: vec![arg("node"), arg("score")],
                },
            ],
            ..Default::default()
        }
    }

    fn call(sql: &str) -> Result<String, TranslationError> {
        let snapshot = snapshot();
        let ctx = Context {
            snapshot: &snapshot,
            name_case: NameCase::AsIs,
        };
        let statement = Parser::parse_sql(&GenericDialect {}, sql).unwrap().remove(0);
        let SqlStatement::Call(function) = SqlStatement::try_from(statement).unwrap() else {
            panic!("not a call");
        };
        translate_call(&ctx, &function).map(|s| s.to_cypher(&RenderOptions::default()))
    }

    #[test]
    fn test_named_arguments_are_reordered() {
        assert_eq!(
            call("CALL db.index.fulltext.queryNodes(queryString => 'x', indexName => 'titles')").unwrap(),
            "CALL db.index.fulltext.queryNodes('titles', 'x')"
        );
    }

    #[test]
    fn test_omitted_argument_takes_its_default() {
        assert_eq!(
            call("CALL db.index.vector.queryNodes(indexName => 'plots', query => 'q', options => 'o')").unwrap(),
            "CALL db.index.vector.queryNodes('plots', 10, 'o', 'q')"
        );
    }

    #[test]
    fn test_omitted_argument_without_default_is_rejected() {
        let err = call("CALL db.index.vector.queryNodes(indexName => 'plots', query => 'q')").unwrap_err();
        assert!(err.to_string().contains("omitting argument `options`"), "{}", err);
    }

    #[test]
    fn test_unknown_named_argument_is_rejected() {
        let err = call("CALL db.index.fulltext.queryNodes(foo => 'x')").unwrap_err();
        assert!(matches!(
            err,
            TranslationError::UnknownParameter { ref parameter, .. } if parameter == "foo"
        ));
        assert_eq!(err.status_code(), "42000");
    }

    #[test]
    fn test_functions_are_returned() {
        assert_eq!(
            call("CALL apoc.text.join(['a', 'b'], ',')").unwrap(),
            "RETURN apoc.text.join(['a', 'b'], ',')"
        );
    }

    #[test]
    fn test_unknown_procedure_passes_through_positionally() {
        assert_eq!(call("CALL db.labels()").unwrap(), "CALL db.labels()");
    }
}
