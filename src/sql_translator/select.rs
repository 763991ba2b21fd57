//! SELECT (and UNION) translation.
//!
//! FROM items become bindings, the join resolver turns them into MATCH
//! patterns, and the select list becomes the final RETURN. Grouping that
//! Cypher cannot express implicitly (HAVING, GROUP BY keys that are not
//! returned) goes through an intermediate `WITH`.

use std::collections::HashSet;

use sqlparser::ast::{
    Distinct, Expr as SqlExpr, FunctionArg, GroupByExpr, Ident, JoinConstraint, JoinOperator,
    ObjectName, OrderByExpr, Query, Select, SelectItem, SetExpr, SetOperator, SetQuantifier,
    TableFactor, TopQuantity, Value,
};

use crate::graph_catalog::ProcedureKind;

use super::cypher::{Clause, Expr, Projection, ProjectionItem, RenderOptions, SortItem, Statement, ToCypher};
use super::errors::{TranslationError, ViewRestriction};
use super::expression::{contains_aggregate, ColumnResolver, ExpressionTranslator};
use super::join_resolver::{self, JoinPredicate, PredicateOrigin, UsingJoin};
use super::procedure_call::{arguments, procedure_name, Yielded};
use super::scope::{object_name, resolve_table, BindingKind, Scope, Side};
use super::Context;

/// ORDER BY / LIMIT / OFFSET attached to a query body.
#[derive(Default)]
struct Tail<'q> {
    order_by: &'q [OrderByExpr],
    limit: Option<&'q SqlExpr>,
    offset: Option<&'q SqlExpr>,
}

impl Tail<'_> {
    fn is_empty(&self) -> bool {
        self.order_by.is_empty() && self.limit.is_none() && self.offset.is_none()
    }
}

pub(crate) fn translate_query(ctx: &Context<'_>, query: &Query) -> Result<Statement, TranslationError> {
    if query.with.is_some() {
        return Err(TranslationError::unsupported_with_context(
            "WITH",
            "(common table expressions)",
        ));
    }
    let tail = Tail {
        order_by: query.order_by.as_ref().map(|o| o.exprs.as_slice()).unwrap_or(&[]),
        limit: query
            .limit
            .as_ref()
            .or_else(|| query.fetch.as_ref().and_then(|f| f.quantity.as_ref())),
        offset: query.offset.as_ref().map(|o| &o.value),
    };
    Ok(Statement::new(body(ctx, &query.body, &tail)?))
}

fn body(ctx: &Context<'_>, set_expr: &SetExpr, tail: &Tail<'_>) -> Result<Vec<Clause>, TranslationError> {
    match set_expr {
        SetExpr::Select(select) => translate_select(ctx, select, tail),
        SetExpr::Query(query) if tail.is_empty() => Ok(translate_query(ctx, query)?.clauses),
        SetExpr::SetOperation {
            op: SetOperator::Union,
            set_quantifier,
            left,
            right,
        } => {
            if !tail.is_empty() {
                return Err(TranslationError::unsupported_with_context(
                    "ORDER BY, LIMIT or OFFSET",
                    "on a UNION",
                ));
            }
            let all = matches!(set_quantifier, SetQuantifier::All);
            let mut clauses = body(ctx, left, &Tail::default())?;
            clauses.push(Clause::Union { all });
            clauses.extend(body(ctx, right, &Tail::default())?);
            Ok(clauses)
        }
        other => Err(TranslationError::unsupported_with_context(
            other.to_string(),
            "as a query body",
        )),
    }
}

/// `SELECT * FROM (<query>) t WHERE 1 = 0`, used by tools to learn a result shape.
fn shape_query(select: &Select) -> Option<&Query> {
    let [from] = select.from.as_slice() else {
        return None;
    };
    let TableFactor::Derived { subquery, .. } = &from.relation else {
        return None;
    };
    let star_only = matches!(select.projection.as_slice(), [SelectItem::Wildcard(_)]);
    let never_true = match &select.selection {
        Some(SqlExpr::BinaryOp {
            left,
            op: sqlparser::ast::BinaryOperator::Eq,
            right,
        }) => match (left.as_ref(), right.as_ref()) {
            (SqlExpr::Value(Value::Number(a, _)), SqlExpr::Value(Value::Number(b, _))) => a != b,
            _ => false,
        },
        _ => false,
    };
    (from.joins.is_empty() && star_only && never_true).then_some(subquery.as_ref())
}

fn translate_select(ctx: &Context<'_>, select: &Select, tail: &Tail<'_>) -> Result<Vec<Clause>, TranslationError> {
    if let Some(inner) = shape_query(select) {
        let mut clauses = translate_query(ctx, inner)?.clauses;
        if let Some(Clause::Return(projection)) = clauses.last_mut() {
            projection.limit = Some(Expr::integer(1));
        }
        return Ok(clauses);
    }

    let distinct = match &select.distinct {
        None => false,
        Some(Distinct::Distinct) => true,
        Some(Distinct::On(_)) => {
            return Err(TranslationError::unsupported_with_context("DISTINCT ON", "in SELECT"))
        }
    };

    if let [from] = select.from.as_slice() {
        if let TableFactor::Table {
            name,
            args: Some(args),
            ..
        } = &from.relation
        {
            if !from.joins.is_empty() {
                return Err(TranslationError::unsupported_with_context(
                    "JOIN",
                    "with a procedure call in FROM",
                ));
            }
            return table_function(ctx, name, &args.args, select, distinct, tail);
        }
    }
    if select.from.is_empty() && select.selection.is_some() {
        return Err(TranslationError::unsupported_with_context("WHERE", "without FROM"));
    }

    let mut scope = Scope::new(ctx.snapshot, ctx.name_case);
    let mut predicates = Vec::new();
    let mut usings = Vec::new();
    for table in &select.from {
        let mut left = bind_factor(&mut scope, &table.relation, false)?;
        for join in &table.joins {
            let (optional, constraint) = match &join.join_operator {
                JoinOperator::Inner(c) => (false, Some(c)),
                JoinOperator::LeftOuter(c) => (true, Some(c)),
                JoinOperator::CrossJoin => (false, None),
                JoinOperator::RightOuter(_) => {
                    return Err(TranslationError::unsupported_with_context("RIGHT JOIN", "in FROM"))
                }
                JoinOperator::FullOuter(_) => {
                    return Err(TranslationError::unsupported_with_context("FULL JOIN", "in FROM"))
                }
                _ => {
                    return Err(TranslationError::unsupported_with_context(
                        join.to_string().trim().to_string(),
                        "in FROM",
                    ))
                }
            };
            let right = bind_factor(&mut scope, &join.relation, optional)?;
            if scope.bindings[left].is_view() || scope.bindings[right].is_view() {
                return Err(TranslationError::View(ViewRestriction::Join));
            }
            match constraint {
                Some(JoinConstraint::On(expr)) => predicates.push(JoinPredicate {
                    expr,
                    origin: PredicateOrigin::On {
                        binding: right,
                        optional,
                    },
                }),
                Some(JoinConstraint::Using(names)) => usings.push(UsingJoin {
                    left,
                    right,
                    names: names.clone(),
                    optional,
                }),
                Some(JoinConstraint::Natural) => {
                    return Err(TranslationError::unsupported_with_context("NATURAL JOIN", "in FROM"))
                }
                Some(JoinConstraint::None) | None => {}
            }
            left = right;
        }
    }
    if let Some(selection) = &select.selection {
        predicates.push(JoinPredicate {
            expr: selection,
            origin: PredicateOrigin::Where,
        });
    }

    let mut clauses = view_calls(&mut scope);
    let pattern = join_resolver::resolve(&mut scope, predicates, &usings)?;
    let translator = ExpressionTranslator::new(&scope);

    let mut filter = Expr::and_all(
        pattern
            .filters
            .iter()
            .map(|f| translator.translate(f))
            .collect::<Result<Vec<_>, _>>()?,
    );
    let has_optional = !pattern.optional.is_empty();
    if !pattern.patterns.is_empty() {
        clauses.push(Clause::Match {
            optional: false,
            patterns: pattern.patterns,
            filter: if has_optional { None } else { filter.take() },
        });
    }
    for optional in pattern.optional {
        if optional.patterns.is_empty() {
            return Err(TranslationError::unsupported_with_context(
                "LEFT JOIN",
                "whose condition only relates tables that are already matched",
            ));
        }
        clauses.push(Clause::Match {
            optional: true,
            patterns: optional.patterns,
            filter: Expr::and_all(
                optional
                    .filters
                    .iter()
                    .map(|f| translator.translate(f))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        });
    }
    if let Some(filter) = filter {
        clauses.push(Clause::With {
            projection: Projection::star(),
            filter: Some(filter),
        });
    }

    let (star, items) = project(&scope, &translator, &select.projection)?;
    let grouping = Grouping {
        group_by: match &select.group_by {
            GroupByExpr::Expressions(exprs, _) => exprs
                .iter()
                .map(|e| match positional(e, &items, star)? {
                    Some(item) => Ok(item.expr.clone()),
                    None => translator.translate(e),
                })
                .collect::<Result<Vec<_>, _>>()?,
            GroupByExpr::All(_) => {
                return Err(TranslationError::unsupported_with_context("GROUP BY ALL", "in SELECT"))
            }
        },
        having: select.having.as_ref().map(|h| translator.translate(h)).transpose()?,
    };
    let order_by = sort_items(&scope, tail.order_by, &items, star)?;
    let limit = match tail.limit {
        Some(limit) => Some(translator.translate(limit)?),
        None => top(&translator, select)?,
    };
    let skip = tail.offset.map(|o| translator.translate(o)).transpose()?;

    let projection = Projection {
        distinct,
        star,
        items,
        order_by,
        skip,
        limit,
    };
    clauses.extend(grouping.apply(projection)?);
    Ok(clauses)
}

fn bind_factor(scope: &mut Scope<'_>, factor: &TableFactor, optional: bool) -> Result<usize, TranslationError> {
    match factor {
        TableFactor::Table {
            name,
            alias,
            args: None,
            ..
        } => {
            let sql_name = object_name(name, scope.name_case);
            let alias = alias.as_ref().map(|a| scope.name(&a.name));
            let resolved = resolve_table(scope.snapshot, &sql_name);
            Ok(scope.bind(&sql_name, alias, resolved, optional))
        }
        TableFactor::Table { name, .. } => Err(TranslationError::unsupported_with_context(
            name.to_string(),
            "(a procedure call) combined with other tables",
        )),
        TableFactor::Derived { .. } => Err(TranslationError::unsupported_with_context(
            "derived tables",
            "in FROM",
        )),
        other => Err(TranslationError::unsupported_with_context(
            other.to_string(),
            "in FROM",
        )),
    }
}

/// `CALL { <view query> }` for every view in FROM. With more than one FROM
/// item each view's row is folded into a map variable so the next call does
/// not clash with its column names.
fn view_calls(scope: &mut Scope<'_>) -> Vec<Clause> {
    let mapped = scope.bindings.len() > 1;
    let mut clauses = Vec::new();
    let mut carried: Vec<String> = Vec::new();
    for binding in scope.bindings.iter_mut() {
        let BindingKind::View { view, mapped: is_mapped } = &mut binding.kind else {
            continue;
        };
        clauses.push(Clause::CallSubquery(view.query.clone()));
        if !mapped {
            continue;
        }
        *is_mapped = true;
        let row = Expr::Map(
            view.columns
                .iter()
                .map(|c| (c.name.clone(), Expr::var(&c.property_name)))
                .collect(),
        );
        let mut items: Vec<ProjectionItem> = carried
            .iter()
            .map(|v| ProjectionItem::new(Expr::var(v), None))
            .collect();
        items.push(ProjectionItem::new(row, Some(binding.var.clone())));
        clauses.push(Clause::With {
            projection: Projection::items(items),
            filter: None,
        });
        carried.push(binding.var.clone());
    }
    clauses
}

/// Select list to RETURN items. Returns `true` first when the list keeps a bare `*`.
pub(super) fn project(
    scope: &Scope<'_>,
    translator: &ExpressionTranslator<'_>,
    select_items: &[SelectItem],
) -> Result<(bool, Vec<ProjectionItem>), TranslationError> {
    let mut star = false;
    let mut items = Vec::new();
    for item in select_items {
        match item {
            SelectItem::Wildcard(_) => {
                if scope.bindings.is_empty() {
                    return Err(TranslationError::unsupported_with_context("SELECT *", "without FROM"));
                }
                if scope.bindings.iter().all(|b| !b.star_columns().is_empty()) {
                    for index in 0..scope.bindings.len() {
                        expand(scope, index, &mut items)?;
                    }
                } else {
                    star = true;
                }
            }
            SelectItem::QualifiedWildcard(name, _) => {
                let qualifier = object_name(name, scope.name_case);
                let (index, side) = scope
                    .qualifier(&qualifier)
                    .ok_or_else(|| TranslationError::UnknownTable(qualifier.clone()))?;
                let binding = &scope.bindings[index];
                match (&binding.kind, side) {
                    (BindingKind::Relationship { start_var, .. }, Side::Start) => {
                        items.push(ProjectionItem::new(Expr::var(start_var), None))
                    }
                    (BindingKind::Relationship { end_var, .. }, Side::End) => {
                        items.push(ProjectionItem::new(Expr::var(end_var), None))
                    }
                    _ if binding.star_columns().is_empty() => {
                        items.push(ProjectionItem::new(scope.whole(binding), None))
                    }
                    _ => expand(scope, index, &mut items)?,
                }
            }
            SelectItem::UnnamedExpr(expr) => {
                let alias = match expr {
                    SqlExpr::Identifier(ident) => Some(scope.name(ident)),
                    _ => None,
                };
                items.push(ProjectionItem::new(translator.translate(expr)?, alias));
            }
            SelectItem::ExprWithAlias { expr, alias } => {
                items.push(ProjectionItem::new(
                    translator.translate(expr)?,
                    Some(scope.name(alias)),
                ));
            }
        }
    }
    disambiguate(&mut items);
    Ok((star, items))
}

fn expand(scope: &Scope<'_>, index: usize, items: &mut Vec<ProjectionItem>) -> Result<(), TranslationError> {
    for column in scope.bindings[index].star_columns() {
        let expr = scope.column(index, Side::Whole, &column)?;
        items.push(ProjectionItem::new(expr, Some(column)));
    }
    Ok(())
}

/// Repeated result names become `name1`, `name2`, ... in select-list order.
fn disambiguate(items: &mut [ProjectionItem]) {
    let mut seen = HashSet::new();
    for item in items.iter_mut() {
        let Some(alias) = &mut item.alias else {
            continue;
        };
        if seen.insert(alias.clone()) {
            continue;
        }
        let unique = (1..)
            .map(|n| format!("{}{}", alias, n))
            .find(|candidate| !seen.contains(candidate))
            .unwrap_or_else(|| alias.clone());
        seen.insert(unique.clone());
        *alias = unique;
    }
}

/// `ORDER BY 2` style references into the select list.
fn positional<'i>(
    expr: &SqlExpr,
    items: &'i [ProjectionItem],
    star: bool,
) -> Result<Option<&'i ProjectionItem>, TranslationError> {
    let SqlExpr::Value(Value::Number(text, _)) = expr else {
        return Ok(None);
    };
    let position: usize = text
        .parse()
        .map_err(|_| TranslationError::UnknownColumn(text.clone()))?;
    if star {
        return Err(TranslationError::unsupported_with_context(
            format!("position {}", position),
            "together with SELECT *",
        ));
    }
    position
        .checked_sub(1)
        .and_then(|i| items.get(i))
        .map(Some)
        .ok_or_else(|| TranslationError::UnknownColumn(text.clone()))
}

/// Select-list aliases are visible to ORDER BY.
struct WithAliases<'r> {
    inner: &'r dyn ColumnResolver,
    items: &'r [ProjectionItem],
}

impl ColumnResolver for WithAliases<'_> {
    fn resolve_column(&self, idents: &[Ident]) -> Result<Expr, TranslationError> {
        if let [single] = idents {
            if let Some(item) = self
                .items
                .iter()
                .find(|i| i.alias.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(&single.value)))
            {
                return Ok(item.expr.clone());
            }
        }
        self.inner.resolve_column(idents)
    }
}

fn sort_items(
    columns: &dyn ColumnResolver,
    order_by: &[OrderByExpr],
    items: &[ProjectionItem],
    star: bool,
) -> Result<Vec<SortItem>, TranslationError> {
    let resolver = WithAliases {
        inner: columns,
        items,
    };
    let translator = ExpressionTranslator::new(&resolver);
    order_by
        .iter()
        .map(|o| {
            let expr = match positional(&o.expr, items, star)? {
                Some(item) => item.expr.clone(),
                None => translator.translate(&o.expr)?,
            };
            Ok(SortItem {
                expr,
                descending: o.asc == Some(false),
            })
        })
        .collect()
}

fn top(translator: &ExpressionTranslator<'_>, select: &Select) -> Result<Option<Expr>, TranslationError> {
    let Some(quantity) = select.top.as_ref().and_then(|t| t.quantity.as_ref()) else {
        return Ok(None);
    };
    Ok(Some(match quantity {
        TopQuantity::Constant(n) => Expr::integer(i64::try_from(*n).unwrap_or(i64::MAX)),
        TopQuantity::Expr(e) => translator.translate(e)?,
    }))
}

struct Grouping {
    group_by: Vec<Expr>,
    having: Option<Expr>,
}

impl Grouping {
    /// Final RETURN, preceded by a grouping `WITH` when Cypher's implicit
    /// grouping keys would not match the requested ones.
    fn apply(self, projection: Projection) -> Result<Vec<Clause>, TranslationError> {
        if !self.group_by.is_empty() {
            if projection.star {
                return Err(TranslationError::unsupported_with_context("SELECT *", "with GROUP BY"));
            }
            if let Some(loose) = projection
                .items
                .iter()
                .find(|i| !contains_aggregate(&i.expr) && !self.group_by.contains(&i.expr))
            {
                return Err(TranslationError::Unsupported(format!(
                    "`{}` must appear in GROUP BY or be used in an aggregate function",
                    item_name(loose)
                )));
            }
        }
        let regroup = self.having.is_some()
            || self
                .group_by
                .iter()
                .any(|g| !projection.items.iter().any(|i| i.expr == *g));
        if !regroup {
            return Ok(vec![Clause::Return(projection)]);
        }

        let mut keys: Vec<ProjectionItem> = self
            .group_by
            .iter()
            .enumerate()
            .map(|(n, g)| ProjectionItem::new(g.clone(), Some(format!("__group_{}", n))))
            .collect();
        let mut aggregates: Vec<Expr> = Vec::new();
        let sources = projection
            .items
            .iter()
            .map(|i| &i.expr)
            .chain(projection.order_by.iter().map(|s| &s.expr))
            .chain(self.having.iter());
        for expr in sources {
            expr.walk(&mut |e| {
                if is_aggregate_call(e) && !aggregates.contains(e) {
                    aggregates.push(e.clone());
                }
            });
        }
        keys.extend(
            aggregates
                .into_iter()
                .enumerate()
                .map(|(n, a)| ProjectionItem::new(a, Some(format!("__agg_{}", n)))),
        );

        let substitute = |e: &Expr| {
            keys.iter()
                .find(|k| k.expr == *e)
                .and_then(|k| k.alias.as_ref())
                .map(Expr::var)
        };
        let items = projection
            .items
            .iter()
            .map(|i| {
                ProjectionItem::new(
                    i.expr.replace(&substitute),
                    Some(i.alias.clone().unwrap_or_else(|| item_name(i))),
                )
            })
            .collect();
        let order_by = projection
            .order_by
            .iter()
            .map(|s| SortItem {
                expr: s.expr.replace(&substitute),
                descending: s.descending,
            })
            .collect();
        let having = self.having.as_ref().map(|h| h.replace(&substitute));

        Ok(vec![
            Clause::With {
                projection: Projection::items(keys),
                filter: having,
            },
            Clause::Return(Projection {
                items,
                order_by,
                ..projection
            }),
        ])
    }
}

fn is_aggregate_call(expr: &Expr) -> bool {
    match expr {
        Expr::CountStar => true,
        Expr::Function { name, .. } => super::function_registry::is_aggregate(name),
        _ => false,
    }
}

/// Result column name Cypher would give an un-aliased item.
fn item_name(item: &ProjectionItem) -> String {
    item.alias
        .clone()
        .unwrap_or_else(|| item.expr.to_cypher(&RenderOptions::default()))
}

/// `SELECT ... FROM proc(args)`: the procedure's outputs are the columns.
fn table_function(
    ctx: &Context<'_>,
    name: &ObjectName,
    args: &[FunctionArg],
    select: &Select,
    distinct: bool,
    tail: &Tail<'_>,
) -> Result<Vec<Clause>, TranslationError> {
    let written = procedure_name(name);
    let procedure = ctx.snapshot.procedure(&written);
    if procedure.is_some_and(|p| p.kind == ProcedureKind::Function) {
        return Err(TranslationError::unsupported_with_context(
            format!("function `{}`", written),
            "in FROM, use it in the select list instead",
        ));
    }
    let cypher_args = arguments(&written, procedure, args)?;
    let resolver = Yielded { procedure };
    let translator = ExpressionTranslator::new(&resolver);

    let mut items = Vec::new();
    for item in &select.projection {
        match item {
            SelectItem::Wildcard(_) => match procedure {
                Some(p) if !p.outputs.is_empty() => {
                    items.extend(p.outputs.iter().map(|o| ProjectionItem::new(Expr::var(&o.name), None)))
                }
                _ => {
                    return Err(TranslationError::unsupported_with_context(
                        format!("SELECT * FROM {}", written),
                        "for a procedure with unknown outputs",
                    ))
                }
            },
            SelectItem::UnnamedExpr(expr) => items.push(ProjectionItem::new(translator.translate(expr)?, None)),
            SelectItem::ExprWithAlias { expr, alias } => items.push(ProjectionItem::new(
                translator.translate(expr)?,
                Some(alias.value.clone()),
            )),
            SelectItem::QualifiedWildcard(..) => {
                return Err(TranslationError::unsupported_with_context(
                    item.to_string(),
                    "on a procedure call",
                ))
            }
        }
    }
    let filter = select.selection.as_ref().map(|s| translator.translate(s)).transpose()?;
    let order_by = sort_items(&resolver, tail.order_by, &items, false)?;

    let mut yields: Vec<String> = Vec::new();
    let referenced = items
        .iter()
        .map(|i| &i.expr)
        .chain(filter.iter())
        .chain(order_by.iter().map(|s| &s.expr));
    for expr in referenced {
        expr.walk(&mut |e| {
            if let Expr::Variable(v) = e {
                if !yields.contains(v) {
                    yields.push(v.clone());
                }
            }
        });
    }

    let limit = match tail.limit {
        Some(limit) => Some(translator.translate(limit)?),
        None => top(&translator, select)?,
    };
    Ok(vec![
        Clause::CallProcedure {
            name: procedure.map(|p| p.name.clone()).unwrap_or(written),
            args: cypher_args,
            yields,
            filter,
        },
        Clause::Return(Projection {
            distinct,
            star: false,
            items,
            order_by,
            skip: tail.offset.map(|o| translator.translate(o)).transpose()?,
            limit,
        }),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NameCase;
    use crate::graph_catalog::{
        ColumnSource, GraphType, RelationshipInfo, SchemaSnapshot, ViewColumn, ViewDefinition, VirtualColumn,
        VirtualTable,
    };
    use sqlparser::dialect::GenericDialect;
    use sqlparser::parser::Parser;
    use test_case::test_case;

    fn snapshot() -> SchemaSnapshot {
        let mut snapshot = SchemaSnapshot {
            tables: vec![
                VirtualTable::node("Person", vec![]),
                VirtualTable::node("Movie", vec![]),
                VirtualTable::relationship_join(RelationshipInfo::new("Person", "ACTED_IN", "Movie"), vec![]),
            ],
            views: vec![ViewDefinition {
                name: "people".into(),
                query: "MATCH (n:Person) RETURN n.name AS name".into(),
                columns: vec![ViewColumn {
                    name: "name".into(),
                    property_name: "name".into(),
                    graph_type: GraphType::String,
                }],
            }],
            ..Default::default()
        };
        snapshot.table_mappings.insert("Customers".into(), "Customer".into());
        snapshot.table_mappings.insert("Orders".into(), "Order".into());
        snapshot
            .join_column_mappings
            .insert("Orders.CustomerID".into(), "PURCHASED".into());
        snapshot
    }

    fn select_with(snapshot: &SchemaSnapshot, sql: &str) -> Result<String, TranslationError> {
        let ctx = Context {
            snapshot,
            name_case: NameCase::AsIs,
        };
        let statement = Parser::parse_sql(&GenericDialect {}, sql).unwrap().remove(0);
        let sqlparser::ast::Statement::Query(query) = statement else {
            panic!("not a query");
        };
        translate_query(&ctx, &query).map(|s| s.to_cypher(&RenderOptions::default()))
    }

    fn select(sql: &str) -> Result<String, TranslationError> {
        select_with(&snapshot(), sql)
    }

    #[test_case("SELECT 1", "RETURN 1" ; "select without from")]
    #[test_case("SELECT * FROM Customers", "MATCH (customers:Customer) RETURN *" ; "mapped table")]
    #[test_case("SELECT c FROM Customers c", "MATCH (c:Customer) RETURN c" ; "whole entity")]
    #[test_case("SELECT name, born FROM Person p", "MATCH (p:Person) RETURN p.name AS name, p.born AS born" ; "unqualified columns")]
    #[test_case("SELECT p.name, p.born FROM Person p", "MATCH (p:Person) RETURN p.name, p.born" ; "qualified columns")]
    #[test_case("SELECT count(*) FROM test_write__c", "MATCH (test_write__c:test_write__c) RETURN count(*)" ; "count star")]
    #[test_case(
        "SELECT * FROM Genre WHERE name IN ('action comedy film', 'romcom')",
        "MATCH (genre:Genre) WHERE genre.name IN ['action comedy film', 'romcom'] RETURN *" ;
        "in list"
    )]
    #[test_case(
        "SELECT p, m FROM Person p JOIN Movie m USING (ACTED_IN)",
        "MATCH (p:Person)-[acted_in:ACTED_IN]->(m:Movie) RETURN p, m" ;
        "join using relationship type"
    )]
    #[test_case(
        "SELECT TOP 25 Country FROM Customers ORDER BY Country, ContactName",
        "MATCH (customers:Customer) RETURN customers.Country AS Country ORDER BY customers.Country, customers.ContactName LIMIT 25" ;
        "top and order by"
    )]
    #[test_case(
        "SELECT * FROM Orders o INNER JOIN Customers c ON o.CustomerID = c.CustomerID WHERE YEAR(o.OrderDate) = 1996",
        "MATCH (o:Order)<-[purchased:PURCHASED]-(c:Customer) WHERE o.OrderDate.year = 1996 RETURN *" ;
        "join column mapping"
    )]
    #[test_case(
        "SELECT c.City, COUNT(*) FROM Orders o INNER JOIN Customers c ON o.CustomerID = c.CustomerID GROUP BY c.City",
        "MATCH (o:Order)<-[purchased:PURCHASED]-(c:Customer) RETURN c.City, count(*)" ;
        "implicit grouping"
    )]
    #[test_case(
        "SELECT name FROM Person LIMIT 10 OFFSET 5",
        "MATCH (person:Person) RETURN person.name AS name SKIP 5 LIMIT 10" ;
        "limit and offset"
    )]
    #[test_case(
        "SELECT name FROM Person UNION ALL SELECT title FROM Movie",
        "MATCH (person:Person) RETURN person.name AS name UNION ALL MATCH (movie:Movie) RETURN movie.title AS title" ;
        "union all"
    )]
    fn test_select(sql: &str, expected: &str) {
        assert_eq!(select(sql).unwrap(), expected);
    }

    #[test]
    fn test_having_goes_through_with() {
        let cypher = select("SELECT p.born, count(*) AS c FROM Person p GROUP BY p.born HAVING count(*) > 1").unwrap();
        assert_eq!(
            cypher,
            "MATCH (p:Person) WITH p.born AS __group_0, count(*) AS __agg_0 WHERE __agg_0 > 1 \
             RETURN __group_0 AS `p.born`, __agg_0 AS c"
        );
    }

    #[test]
    fn test_ungrouped_column_is_rejected() {
        let err = select("SELECT p.name, count(*) FROM Person p GROUP BY p.born").unwrap_err();
        assert!(matches!(err, TranslationError::Unsupported(_)));
    }

    #[test]
    fn test_shape_query_is_limited() {
        assert_eq!(
            select("SELECT * FROM (SELECT name FROM Person) t WHERE 1 = 0").unwrap(),
            "MATCH (person:Person) RETURN person.name AS name LIMIT 1"
        );
    }

    #[test]
    fn test_left_join_is_optional_match() {
        let cypher = select(
            "SELECT p.name, r.role FROM Person p LEFT JOIN Person_ACTED_IN_Movie r ON p.v$id = r.v$start_id WHERE p.born > 1960",
        )
        .unwrap();
        assert_eq!(
            cypher,
            "MATCH (p:Person) OPTIONAL MATCH (p)-[r:ACTED_IN]->(_rhs:Movie) WITH * WHERE p.born > 1960 RETURN p.name, r.role"
        );
    }

    #[test]
    fn test_views() {
        assert_eq!(
            select("SELECT name FROM people").unwrap(),
            "CALL {MATCH (n:Person) RETURN n.name AS name} RETURN name"
        );
        assert!(matches!(
            select("SELECT * FROM people p JOIN Person x ON p.name = x.name"),
            Err(TranslationError::View(ViewRestriction::Join))
        ));
        let cypher = select("SELECT a.name, b.name FROM people a, people b").unwrap();
        assert!(cypher.contains("WITH {name: name} AS a"));
        assert!(cypher.contains("WITH a, {name: name} AS b"));
        assert!(cypher.ends_with("RETURN a.name, b.name"));
    }

    #[test]
    fn test_star_expands_known_columns_with_suffixes() {
        let snapshot = SchemaSnapshot {
            tables: vec![
                VirtualTable::node(
                    "Origin",
                    vec![
                        VirtualColumn::identity("v$id", ColumnSource::ElementId),
                        VirtualColumn::property("col", GraphType::String, false),
                    ],
                ),
                VirtualTable::node(
                    "Target",
                    vec![
                        VirtualColumn::identity("v$id", ColumnSource::ElementId),
                        VirtualColumn::property("col", GraphType::String, false),
                    ],
                ),
            ],
            ..Default::default()
        };
        let cypher = select_with(&snapshot, "SELECT * FROM Origin s, Target e").unwrap();
        assert_eq!(
            cypher,
            "MATCH (s:Origin), (e:Target) RETURN elementId(s) AS `v$id`, s.col AS col, elementId(e) AS `v$id1`, e.col AS col1"
        );
    }

    #[test]
    fn test_right_join_is_unsupported() {
        let err = select("SELECT * FROM Person p RIGHT JOIN Movie m ON p.v$id = m.v$id").unwrap_err();
        assert_eq!(err.status_code(), "0A000");
    }
}
