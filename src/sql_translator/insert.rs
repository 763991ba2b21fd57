//! INSERT translation.
//!
//! Node tables become `CREATE`, or `MERGE` for the upsert forms. Relationship
//! tables merge each endpoint that received properties, create the others, and
//! then create the relationship between them. Endpoint columns are recognised
//! by their `Label.property` qualifier, by the sampled column source, or by an
//! [`InsertTemplates`] entry learned from an earlier qualified insert.
//!
//! Several literal rows compile to one statement over `$parameters`, with one
//! parameter set per row.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use sqlparser::ast::{
    Assignment, ConflictTarget, Expr as SqlExpr, Ident, Insert, OnConflictAction, OnInsert, SetExpr,
};

use crate::executor::{GraphValue, Parameters};
use crate::graph_catalog::{ColumnSource, RelationshipInfo};

use super::cypher::{
    Clause, Expr, Literal, NodePattern, PathPattern, PatternDirection, RelPattern, SetItem, Statement, UnaryOp,
};
use super::errors::{TranslationError, ViewRestriction};
use super::expression::{ColumnResolver, ExpressionTranslator};
use super::scope::{Binding, BindingKind, Scope, Side};
use super::update::{bind_table, returning, set_items};
use super::Context;

/// Endpoint assignment of unqualified relationship-table columns, learned per
/// relationship table from inserts that qualified them.
#[derive(Debug, Default)]
pub struct InsertTemplates {
    shapes: Mutex<HashMap<String, HashMap<String, Side>>>,
}

impl InsertTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    fn side_of(&self, table: &str, property: &str) -> Option<Side> {
        let shapes = self.shapes.lock().unwrap_or_else(PoisonError::into_inner);
        shapes.get(table).and_then(|shape| shape.get(property)).copied()
    }

    /// Records the qualified endpoint columns of an insert. Returns whether
    /// anything new was learned.
    fn remember(&self, table: &str, columns: &[InsertColumn]) -> bool {
        let mut shapes = self.shapes.lock().unwrap_or_else(PoisonError::into_inner);
        let known = shapes.get(table);
        let learned: Vec<(String, Side)> = columns
            .iter()
            .filter(|c| c.qualified && c.side != Side::Whole)
            .filter(|c| known.and_then(|k| k.get(&c.property)) != Some(&c.side))
            .map(|c| (c.property.clone(), c.side))
            .collect();
        if learned.is_empty() {
            return false;
        }
        log::debug!("insert template for `{}`: {:?}", table, learned);
        shapes.entry(table.to_string()).or_default().extend(learned);
        true
    }

    /// Number of relationship tables with a learned shape.
    pub fn len(&self) -> usize {
        self.shapes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.shapes.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Statement plus the per-row parameter sets of a multi-row insert.
#[derive(Debug)]
pub(crate) struct LoweredInsert {
    pub statement: Statement,
    pub parameter_sets: Vec<Parameters>,
    /// The insert taught [`InsertTemplates`] a new endpoint column.
    pub learned: bool,
}

#[derive(Debug, Clone)]
struct InsertColumn {
    /// Column name as written.
    name: String,
    side: Side,
    property: String,
    /// Written as `Qualifier.property`.
    qualified: bool,
}

/// Properties a `MERGE` matches on.
enum MergeKeys {
    /// Every inserted property (`ON CONFLICT DO NOTHING`, `INSERT IGNORE`).
    All,
    Columns(Vec<String>),
    /// The label's key or unique constraint, else every inserted property.
    Constraint,
}

struct Upsert<'q> {
    keys: MergeKeys,
    on_match: &'q [Assignment],
}

fn upsert(insert: &Insert) -> Result<Option<Upsert<'_>>, TranslationError> {
    let all = || Upsert {
        keys: MergeKeys::All,
        on_match: &[],
    };
    match &insert.on {
        None if insert.ignore => Ok(Some(all())),
        None => Ok(None),
        Some(OnInsert::DuplicateKeyUpdate(assignments)) => Ok(Some(Upsert {
            keys: MergeKeys::Constraint,
            on_match: assignments,
        })),
        Some(OnInsert::OnConflict(conflict)) => {
            let keys = match &conflict.conflict_target {
                None => None,
                Some(ConflictTarget::Columns(columns)) => {
                    Some(columns.iter().map(|c| c.value.clone()).collect::<Vec<_>>())
                }
                Some(ConflictTarget::OnConstraint(name)) => {
                    return Err(TranslationError::unsupported_with_context(
                        format!("ON CONFLICT ON CONSTRAINT {}", name),
                        "in INSERT",
                    ))
                }
            };
            match (&conflict.action, keys) {
                (OnConflictAction::DoNothing, None) => Ok(Some(all())),
                (OnConflictAction::DoNothing, Some(keys)) => Ok(Some(Upsert {
                    keys: MergeKeys::Columns(keys),
                    on_match: &[],
                })),
                (OnConflictAction::DoUpdate(update), keys) => {
                    if update.selection.is_some() {
                        return Err(TranslationError::unsupported_with_context(
                            "WHERE",
                            "in ON CONFLICT DO UPDATE",
                        ));
                    }
                    Ok(Some(Upsert {
                        keys: keys.map_or(MergeKeys::Constraint, MergeKeys::Columns),
                        on_match: &update.assignments,
                    }))
                }
            }
        }
        Some(other) => Err(TranslationError::unsupported_with_context(
            other.to_string(),
            "in INSERT",
        )),
    }
}

/// Cypher parameter name for an inserted column.
fn parameter_name(column: &InsertColumn, taken: &[String]) -> String {
    let prefix = match column.side {
        Side::Start => "start_",
        Side::End => "end_",
        Side::Whole => "",
    };
    let base: String = format!("{}{}", prefix, column.property)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if !taken.contains(&base) {
        return base;
    }
    (1..)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base)
}

/// Parameter value of a literal row entry.
fn parameter_value(expr: &Expr) -> Result<GraphValue, TranslationError> {
    match expr {
        Expr::Literal(Literal::Null) => Ok(GraphValue::Null),
        Expr::Literal(Literal::Boolean(b)) => Ok(GraphValue::Boolean(*b)),
        Expr::Literal(Literal::Integer(i)) => Ok(GraphValue::Integer(*i)),
        Expr::Literal(Literal::Float(text)) => text
            .parse()
            .map(GraphValue::Float)
            .map_err(|_| TranslationError::Mutation(format!("`{}` is not a number", text))),
        Expr::Literal(Literal::String(s)) => Ok(GraphValue::String(s.clone())),
        Expr::Unary {
            op: UnaryOp::Minus,
            expr,
        } => match parameter_value(expr)? {
            GraphValue::Integer(i) => Ok(GraphValue::Integer(-i)),
            GraphValue::Float(f) => Ok(GraphValue::Float(-f)),
            _ => Err(TranslationError::Mutation(
                "only numbers can be negated in multi-row VALUES".to_string(),
            )),
        },
        Expr::List(items) => items
            .iter()
            .map(parameter_value)
            .collect::<Result<Vec<_>, _>>()
            .map(GraphValue::List),
        Expr::Parameter(_) => Err(TranslationError::Mutation(
            "parameters cannot be combined with multi-row VALUES, execute the statement as a batch instead"
                .to_string(),
        )),
        _ => Err(TranslationError::Mutation(
            "multi-row VALUES only accept literal values".to_string(),
        )),
    }
}

/// Row values never reference columns.
struct ValuesOnly;

impl ColumnResolver for ValuesOnly {
    fn resolve_column(&self, idents: &[Ident]) -> Result<Expr, TranslationError> {
        Err(TranslationError::Mutation(format!(
            "column reference `{}` is not allowed in VALUES",
            idents.iter().map(|i| i.value.as_str()).collect::<Vec<_>>().join(".")
        )))
    }
}

/// `EXCLUDED.column` in an upsert's update list is the inserted value.
struct Excluded<'r> {
    inner: &'r dyn ColumnResolver,
    columns: &'r [InsertColumn],
    values: &'r [Expr],
}

impl ColumnResolver for Excluded<'_> {
    fn resolve_column(&self, idents: &[Ident]) -> Result<Expr, TranslationError> {
        if let [qualifier, column] = idents {
            if qualifier.value.eq_ignore_ascii_case("excluded") {
                return self
                    .columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(&column.value))
                    .map(|i| self.values[i].clone())
                    .ok_or_else(|| TranslationError::UnknownColumn(format!("excluded.{}", column.value)));
            }
        }
        self.inner.resolve_column(idents)
    }
}

pub(crate) fn translate_insert(
    ctx: &Context<'_>,
    templates: &InsertTemplates,
    insert: &Insert,
) -> Result<LoweredInsert, TranslationError> {
    let rows = match insert.source.as_deref().map(|q| q.body.as_ref()) {
        Some(SetExpr::Values(values)) => &values.rows,
        Some(_) => {
            return Err(TranslationError::unsupported_with_context(
                "INSERT ... SELECT",
                "(only VALUES can be inserted)",
            ))
        }
        None => return Err(TranslationError::Unsupported("INSERT without VALUES".to_string())),
    };

    let mut scope = Scope::new(ctx.snapshot, ctx.name_case);
    let alias = insert.table_alias.as_ref().map(|a| scope.name(a));
    let index = bind_table(&mut scope, &insert.table_name, alias, ViewRestriction::Insert)?;

    let columns = classify(&scope, index, templates, &insert.columns)?;
    for row in rows {
        if row.len() != columns.len() {
            return Err(TranslationError::Mutation(format!(
                "INSERT has {} columns but a row of {} values",
                columns.len(),
                row.len()
            )));
        }
    }

    let translator = ExpressionTranslator::new(&ValuesOnly);
    let (values, parameter_sets) = match rows.as_slice() {
        [] => {
            return Err(TranslationError::Mutation(
                "INSERT without any row".to_string(),
            ))
        }
        [row] => (translator.translate_all(row)?, Vec::new()),
        rows => {
            let mut names: Vec<String> = Vec::new();
            for column in &columns {
                let name = parameter_name(column, &names);
                names.push(name);
            }
            let sets = rows
                .iter()
                .map(|row| {
                    names
                        .iter()
                        .zip(row)
                        .map(|(name, value)| Ok((name.clone(), parameter_value(&translator.translate(value)?)?)))
                        .collect::<Result<Parameters, TranslationError>>()
                })
                .collect::<Result<Vec<_>, _>>()?;
            (names.into_iter().map(Expr::Parameter).collect(), sets)
        }
    };

    let upsert = upsert(insert)?;
    let mut learned = false;
    let mut clauses = match scope.bindings[index].kind.clone() {
        BindingKind::Node { label } => node_clauses(&scope, index, &label, &columns, &values, upsert)?,
        BindingKind::Relationship { info, .. } => {
            if upsert.is_some() {
                return Err(TranslationError::Mutation(
                    "`ON DUPLICATE` and `ON CONFLICT` clauses are not supported for inserting relationships"
                        .to_string(),
                ));
            }
            learned = templates.remember(&info.table_name(), &columns);
            relationship_clauses(&mut scope, index, &info, &columns, &values, insert.returning.is_some())
        }
        BindingKind::View { .. } => return Err(TranslationError::View(ViewRestriction::Insert)),
    };

    let translator = ExpressionTranslator::new(&scope);
    clauses.extend(returning(&scope, &translator, insert.returning.as_deref())?);
    Ok(LoweredInsert {
        statement: Statement::new(clauses),
        parameter_sets,
        learned,
    })
}

/// Which entity and property each inserted column writes.
fn classify(
    scope: &Scope<'_>,
    index: usize,
    templates: &InsertTemplates,
    idents: &[Ident],
) -> Result<Vec<InsertColumn>, TranslationError> {
    let binding = &scope.bindings[index];
    let names: Vec<String> = if idents.is_empty() {
        let table = binding.table.as_ref().ok_or_else(|| {
            TranslationError::Mutation(format!(
                "INSERT into `{}` needs a column list, its columns are unknown",
                binding.sql_name
            ))
        })?;
        table.property_columns().map(|c| c.name.clone()).collect()
    } else {
        idents.iter().map(|i| scope.name(i)).collect()
    };

    names
        .into_iter()
        .map(|name| {
            let (qualifier, column) = match name.split_once('.') {
                Some((q, c)) => (Some(q.to_string()), c.to_string()),
                None => (None, name.clone()),
            };
            let (side, property) = match (&binding.kind, qualifier.as_deref()) {
                (BindingKind::Relationship { info, .. }, Some(q)) => (qualified_side(binding, info, q)?, column),
                (BindingKind::Relationship { info, .. }, None) => {
                    unqualified_side(scope, index, templates, info, &column)?
                }
                (_, Some(q)) if !answers_to(binding, q) => {
                    return Err(TranslationError::UnknownTable(q.to_string()))
                }
                _ => (Side::Whole, node_property(scope, index, &column)?),
            };
            Ok(InsertColumn {
                qualified: qualifier.is_some(),
                name,
                side,
                property,
            })
        })
        .collect()
}

fn answers_to(binding: &Binding, qualifier: &str) -> bool {
    [Some(binding.sql_name.as_str()), binding.alias.as_deref(), Some(binding.var.as_str())]
        .into_iter()
        .flatten()
        .chain(match &binding.kind {
            BindingKind::Node { label } => Some(label.as_str()),
            _ => None,
        })
        .any(|name| name.eq_ignore_ascii_case(qualifier))
}

fn qualified_side(
    binding: &Binding,
    info: &RelationshipInfo,
    qualifier: &str,
) -> Result<Side, TranslationError> {
    if qualifier.eq_ignore_ascii_case(&info.start_label) {
        Ok(Side::Start)
    } else if qualifier.eq_ignore_ascii_case(&info.end_label) {
        Ok(Side::End)
    } else if qualifier.eq_ignore_ascii_case(&info.rel_type) || answers_to(binding, qualifier) {
        Ok(Side::Whole)
    } else {
        Err(TranslationError::UnknownTable(qualifier.to_string()))
    }
}

fn unqualified_side(
    scope: &Scope<'_>,
    index: usize,
    templates: &InsertTemplates,
    info: &RelationshipInfo,
    column: &str,
) -> Result<(Side, String), TranslationError> {
    let binding = &scope.bindings[index];
    let sampled = binding.table.as_ref().and_then(|t| t.column_ignore_case(column));
    match sampled.map(|c| &c.source) {
        Some(ColumnSource::StartProperty(p)) => return Ok((Side::Start, p.clone())),
        Some(ColumnSource::EndProperty(p)) => return Ok((Side::End, p.clone())),
        Some(ColumnSource::Property(p)) => return Ok((Side::Whole, p.clone())),
        Some(_) => return Err(identity_column(column)),
        None => {}
    }
    if let Some(side) = templates.side_of(&info.table_name(), column) {
        return Ok((side, column.to_string()));
    }
    Ok((Side::Whole, column.to_string()))
}

fn node_property(scope: &Scope<'_>, index: usize, column: &str) -> Result<String, TranslationError> {
    match scope.column(index, Side::Whole, column)? {
        Expr::Property(_, key) => Ok(key),
        _ => Err(identity_column(column)),
    }
}

fn identity_column(column: &str) -> TranslationError {
    TranslationError::Mutation(format!(
        "Column `{}` is an identity column and cannot be inserted",
        column
    ))
}

fn properties(columns: &[InsertColumn], values: &[Expr], side: Side) -> Vec<(String, Expr)> {
    columns
        .iter()
        .zip(values)
        .filter(|(c, _)| c.side == side)
        .map(|(c, v)| (c.property.clone(), v.clone()))
        .collect()
}

fn node_clauses(
    scope: &Scope<'_>,
    index: usize,
    label: &str,
    columns: &[InsertColumn],
    values: &[Expr],
    upsert: Option<Upsert<'_>>,
) -> Result<Vec<Clause>, TranslationError> {
    let var = scope.bindings[index].var.clone();
    let all = properties(columns, values, Side::Whole);
    let Some(upsert) = upsert else {
        return Ok(vec![Clause::Create(vec![PathPattern::node(
            NodePattern::new(var, Some(label)).with_properties(all),
        )])]);
    };

    let keys: Vec<String> = match upsert.keys {
        MergeKeys::All => all.iter().map(|(k, _)| k.clone()).collect(),
        MergeKeys::Columns(keys) => {
            if let Some(missing) = keys.iter().find(|k| !columns.iter().any(|c| c.name.eq_ignore_ascii_case(k))) {
                return Err(TranslationError::Mutation(format!(
                    "conflict column `{}` is not one of the inserted columns",
                    missing
                )));
            }
            columns
                .iter()
                .filter(|c| keys.iter().any(|k| c.name.eq_ignore_ascii_case(k)))
                .map(|c| c.property.clone())
                .collect()
        }
        MergeKeys::Constraint => scope
            .snapshot
            .key_constraints(label)
            .find(|k| k.properties.iter().all(|p| all.iter().any(|(c, _)| c == p)))
            .map(|k| k.properties.clone())
            .unwrap_or_else(|| all.iter().map(|(k, _)| k.clone()).collect()),
    };
    let (merge_on, rest): (Vec<_>, Vec<_>) = all.into_iter().partition(|(k, _)| keys.contains(k));

    let on_create = rest
        .into_iter()
        .map(|(k, v)| SetItem::property(&var, &k, v))
        .collect();
    let excluded = Excluded {
        inner: scope,
        columns,
        values,
    };
    let on_match = set_items(scope, index, upsert.on_match, &ExpressionTranslator::new(&excluded))?;
    Ok(vec![Clause::Merge {
        pattern: PathPattern::node(NodePattern::new(var.as_str(), Some(label)).with_properties(merge_on)),
        on_create,
        on_match,
    }])
}

fn relationship_clauses(
    scope: &mut Scope<'_>,
    index: usize,
    info: &RelationshipInfo,
    columns: &[InsertColumn],
    values: &[Expr],
    named: bool,
) -> Vec<Clause> {
    let start = scope.fresh_var("_lhs");
    let end = scope.fresh_var("_rhs");
    let binding = &mut scope.bindings[index];
    if let BindingKind::Relationship {
        start_var, end_var, ..
    } = &mut binding.kind
    {
        start_var.clone_from(&start);
        end_var.clone_from(&end);
    }

    let mut clauses = Vec::new();
    for (var, label, side) in [
        (&start, &info.start_label, Side::Start),
        (&end, &info.end_label, Side::End),
    ] {
        let props = properties(columns, values, side);
        let node = NodePattern::new(var.as_str(), Some(label.as_str()));
        if props.is_empty() {
            clauses.push(Clause::Create(vec![PathPattern::node(node)]));
        } else {
            clauses.push(Clause::Merge {
                pattern: PathPattern::node(node.with_properties(props)),
                on_create: Vec::new(),
                on_match: Vec::new(),
            });
        }
    }
    let rel_var = named.then(|| binding.var.clone());
    clauses.push(Clause::Create(vec![PathPattern::node(NodePattern::bound(start.as_str())).then(
        RelPattern::new(rel_var, &info.rel_type, PatternDirection::Outgoing)
            .with_properties(properties(columns, values, Side::Whole)),
        NodePattern::bound(end.as_str()),
    )]));
    clauses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NameCase;
    use crate::graph_catalog::{
        ConstraintInfo, ConstraintKind, EntityKind, GraphType, SchemaSnapshot, VirtualColumn, VirtualTable,
        ViewDefinition,
    };
    use crate::sql_translator::cypher::{RenderOptions, ToCypher};
    use crate::sql_translator::statement::{parse, prepare, SqlStatement};
    use test_case::test_case;

    fn insert_with(snapshot: &SchemaSnapshot, templates: &InsertTemplates, sql: &str) -> Result<LoweredInsert, TranslationError> {
        let ctx = Context {
            snapshot,
            name_case: NameCase::AsIs,
        };
        let SqlStatement::Insert(insert) = parse(&prepare(sql, ':')?)? else {
            panic!("not an insert");
        };
        translate_insert(&ctx, templates, &insert)
    }

    fn insert(sql: &str) -> Result<String, TranslationError> {
        insert_with(&SchemaSnapshot::default(), &InsertTemplates::new(), sql)
            .map(|l| l.statement.to_cypher(&RenderOptions::default()))
    }

    #[test_case("INSERT INTO Movie (Movie.title) VALUES('a')", "CREATE (movie:Movie {title: 'a'})" ; "qualified node column")]
    #[test_case("INSERT INTO Movie(title) VALUES(?) ON DUPLICATE KEY IGNORE", "MERGE (movie:Movie {title: $1})" ; "duplicate key ignore")]
    #[test_case("INSERT IGNORE INTO Movie(title) VALUES('a')", "MERGE (movie:Movie {title: 'a'})" ; "insert ignore")]
    #[test_case(
        "INSERT INTO Movie(title, released) VALUES('a', 1999) ON CONFLICT(title) DO UPDATE SET released = excluded.released",
        "MERGE (movie:Movie {title: 'a'}) ON CREATE SET movie.released = 1999 ON MATCH SET movie.released = 1999" ;
        "on conflict do update"
    )]
    #[test_case(
        "INSERT INTO Movie(title) VALUES('a') RETURNING v$id, title",
        "CREATE (movie:Movie {title: 'a'}) RETURN elementId(movie) AS `v$id`, movie.title AS title" ;
        "returning"
    )]
    #[test_case(
        "INSERT INTO Supplier_SUPPLIES_Product (Supplier.id, Product.id) VALUES (1, 2)",
        "MERGE (_lhs:Supplier {id: 1}) MERGE (_rhs:Product {id: 2}) CREATE (_lhs)-[:SUPPLIES]->(_rhs)" ;
        "relationship with qualified endpoints"
    )]
    #[test_case(
        "INSERT INTO Person_ACTED_IN_Movie (a, b, c, ACTED_IN.d) VALUES('a', 'b', 'c', 'd')",
        "CREATE (_lhs:Person) CREATE (_rhs:Movie) CREATE (_lhs)-[:ACTED_IN {a: 'a', b: 'b', c: 'c', d: 'd'}]->(_rhs)" ;
        "unqualified columns belong to the relationship"
    )]
    #[test_case(
        "INSERT INTO Person_ACTED_IN_Movie (Person.a, b) VALUES('a', 'b')",
        "MERGE (_lhs:Person {a: 'a'}) CREATE (_rhs:Movie) CREATE (_lhs)-[:ACTED_IN {b: 'b'}]->(_rhs)" ;
        "one endpoint merged"
    )]
    fn test_insert(sql: &str, expected: &str) {
        assert_eq!(insert(sql).unwrap(), expected);
    }

    #[test]
    fn test_sampled_columns_pick_their_endpoint() {
        let columns = vec![
            VirtualColumn {
                name: "a".into(),
                graph_type: GraphType::String,
                source: ColumnSource::StartProperty("a".into()),
                nullable: true,
            },
            VirtualColumn {
                name: "c".into(),
                graph_type: GraphType::String,
                source: ColumnSource::EndProperty("c".into()),
                nullable: true,
            },
        ];
        let snapshot = SchemaSnapshot {
            tables: vec![VirtualTable::relationship_join(
                RelationshipInfo::new("Person", "ACTED_IN", "Movie"),
                columns,
            )],
            ..Default::default()
        };
        let lowered = insert_with(
            &snapshot,
            &InsertTemplates::new(),
            "INSERT INTO Person_ACTED_IN_Movie (a, b, c) VALUES('a', 'b', 'c')",
        )
        .unwrap();
        assert_eq!(
            lowered.statement.to_cypher(&RenderOptions::default()),
            "MERGE (_lhs:Person {a: 'a'}) MERGE (_rhs:Movie {c: 'c'}) CREATE (_lhs)-[:ACTED_IN {b: 'b'}]->(_rhs)"
        );
    }

    #[test]
    fn test_template_is_reused_for_unqualified_columns() {
        let snapshot = SchemaSnapshot::default();
        let templates = InsertTemplates::new();
        insert_with(
            &snapshot,
            &templates,
            "INSERT INTO Supplier_SUPPLIES_Product (Supplier.id, Product.sku) VALUES (1, 'x')",
        )
        .unwrap();
        assert_eq!(templates.len(), 1);
        assert!(!templates.remember("Supplier_SUPPLIES_Product", &[]));

        let lowered = insert_with(
            &snapshot,
            &templates,
            "INSERT INTO Supplier_SUPPLIES_Product (id, sku, since) VALUES (2, 'y', 2020)",
        )
        .unwrap();
        assert_eq!(
            lowered.statement.to_cypher(&RenderOptions::default()),
            "MERGE (_lhs:Supplier {id: 2}) MERGE (_rhs:Product {sku: 'y'}) CREATE (_lhs)-[:SUPPLIES {since: 2020}]->(_rhs)"
        );
    }

    #[test]
    fn test_multiple_rows_share_one_statement() {
        let lowered = insert_with(
            &SchemaSnapshot::default(),
            &InsertTemplates::new(),
            "INSERT INTO People (first_name, born) VALUES ('Helge', 1955), ('Bela', -1962)",
        )
        .unwrap();
        assert_eq!(
            lowered.statement.to_cypher(&RenderOptions::default()),
            "CREATE (people:People {first_name: $first_name, born: $born})"
        );
        assert_eq!(lowered.parameter_sets.len(), 2);
        assert_eq!(
            lowered.parameter_sets[1].get("born"),
            Some(&GraphValue::Integer(-1962))
        );
        assert_eq!(
            lowered.parameter_sets[0].get("first_name"),
            Some(&GraphValue::String("Helge".into()))
        );
    }

    #[test]
    fn test_multiple_rows_reject_placeholders() {
        let err = insert("INSERT INTO People (name) VALUES (?), (?)").unwrap_err();
        assert!(matches!(err, TranslationError::Mutation(_)));
    }

    #[test]
    fn test_duplicate_key_update_merges_on_key_constraint() {
        let snapshot = SchemaSnapshot {
            constraints: vec![ConstraintInfo {
                name: "movie_title".into(),
                kind: ConstraintKind::Unique,
                entity: EntityKind::Node,
                label_or_type: "Movie".into(),
                properties: vec!["title".into()],
            }],
            ..Default::default()
        };
        let lowered = insert_with(
            &snapshot,
            &InsertTemplates::new(),
            "INSERT INTO Movie (title, tagline) VALUES ('a', 'b') ON DUPLICATE KEY UPDATE tagline = 'c'",
        )
        .unwrap();
        assert_eq!(
            lowered.statement.to_cypher(&RenderOptions::default()),
            "MERGE (movie:Movie {title: 'a'}) ON CREATE SET movie.tagline = 'b' ON MATCH SET movie.tagline = 'c'"
        );
    }

    #[test]
    fn test_upsert_into_relationship_is_rejected() {
        let err = insert("INSERT INTO Person_ACTED_IN_Movie (a, b, c) VALUES('a', 'b', 'c') ON CONFLICT DO NOTHING")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "`ON DUPLICATE` and `ON CONFLICT` clauses are not supported for inserting relationships"
        );
    }

    #[test]
    fn test_views_cannot_be_inserted_to() {
        let snapshot = SchemaSnapshot::default().with_views(vec![ViewDefinition::new(
            "people",
            "MATCH (n:Person) RETURN n.name AS name",
            vec![],
        )]);
        let err = insert_with(&snapshot, &InsertTemplates::new(), "INSERT INTO people (name) VALUES ('x')")
            .unwrap_err();
        assert!(matches!(err, TranslationError::View(ViewRestriction::Insert)));
    }

    #[test]
    fn test_insert_select_is_unsupported() {
        let err = insert("INSERT INTO Movie (title) SELECT name FROM Person").unwrap_err();
        assert_eq!(err.status_code(), "0A000");
    }
}
