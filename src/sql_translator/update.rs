//! UPDATE translation and the single-target helpers shared by the mutating statements.

use sqlparser::ast::{
    Assignment, AssignmentTarget, Expr as SqlExpr, ObjectName, SelectItem, TableFactor, TableWithJoins,
};

use super::cypher::{
    Clause, NodePattern, PathPattern, PatternDirection, Projection, RelPattern, SetItem, Statement,
};
use super::errors::{TranslationError, ViewRestriction};
use super::expression::ExpressionTranslator;
use super::scope::{object_name, resolve_table, BindingKind, Scope, Side};
use super::select::project;
use super::Context;

/// Binds the one table a mutation acts on.
pub(super) fn bind_target(
    scope: &mut Scope<'_>,
    target: &TableWithJoins,
    statement: &str,
    restriction: ViewRestriction,
) -> Result<usize, TranslationError> {
    if !target.joins.is_empty() {
        return Err(TranslationError::Mutation(format!(
            "{} supports a single target table, joins are not allowed",
            statement
        )));
    }
    match &target.relation {
        TableFactor::Table {
            name,
            alias,
            args: None,
            ..
        } => {
            let alias = alias.as_ref().map(|a| scope.name(&a.name));
            bind_table(scope, name, alias, restriction)
        }
        other => Err(TranslationError::Mutation(format!(
            "{} target `{}` is not a table",
            statement, other
        ))),
    }
}

pub(super) fn bind_table(
    scope: &mut Scope<'_>,
    name: &ObjectName,
    alias: Option<String>,
    restriction: ViewRestriction,
) -> Result<usize, TranslationError> {
    let sql_name = object_name(name, scope.name_case);
    let resolved = resolve_table(scope.snapshot, &sql_name);
    let index = scope.bind(&sql_name, alias, resolved, false);
    if scope.bindings[index].is_view() {
        return Err(TranslationError::View(restriction));
    }
    Ok(index)
}

/// Pattern matching every row of a single bound table.
///
/// Relationship tables are matched with both endpoints, named `_lhs` and
/// `_rhs`, so that endpoint columns stay addressable.
pub(super) fn target_pattern(scope: &mut Scope<'_>, index: usize) -> PathPattern {
    let start = scope.fresh_var("_lhs");
    let end = scope.fresh_var("_rhs");
    let binding = &mut scope.bindings[index];
    match &mut binding.kind {
        BindingKind::Node { label } => {
            PathPattern::node(NodePattern::new(binding.var.as_str(), Some(label.as_str())))
        }
        BindingKind::Relationship {
            info,
            start_var,
            end_var,
        } => {
            *start_var = start;
            *end_var = end;
            PathPattern::node(NodePattern::new(start_var.as_str(), Some(info.start_label.as_str()))).then(
                RelPattern::new(Some(binding.var.clone()), &info.rel_type, PatternDirection::Outgoing),
                NodePattern::new(end_var.as_str(), Some(info.end_label.as_str())),
            )
        }
        BindingKind::View { .. } => PathPattern::node(NodePattern::bound(&binding.var)),
    }
}

/// `SET` items for assignments against the bound table at `index`.
pub(super) fn set_items(
    scope: &Scope<'_>,
    index: usize,
    assignments: &[Assignment],
    translator: &ExpressionTranslator<'_>,
) -> Result<Vec<SetItem>, TranslationError> {
    assignments
        .iter()
        .map(|assignment| {
            let AssignmentTarget::ColumnName(column) = &assignment.target else {
                return Err(TranslationError::unsupported_with_context(
                    assignment.target.to_string(),
                    "(tuple assignment)",
                ));
            };
            let (index, side) = match column.0.as_slice() {
                [.., qualifier, _] => {
                    let qualifier = scope.name(qualifier);
                    scope
                        .qualifier(&qualifier)
                        .ok_or(TranslationError::UnknownTable(qualifier))?
                }
                _ => (index, Side::Whole),
            };
            let name = object_name(column, scope.name_case);
            let target = scope.column(index, side, &name)?;
            if !matches!(target, super::cypher::Expr::Property(..)) {
                return Err(TranslationError::Mutation(format!(
                    "Column `{}` is an identity column and cannot be assigned",
                    name
                )));
            }
            Ok(SetItem {
                target,
                value: translator.translate(&assignment.value)?,
            })
        })
        .collect()
}

/// `RETURN` for a mutation's `RETURNING` list.
pub(super) fn returning(
    scope: &Scope<'_>,
    translator: &ExpressionTranslator<'_>,
    items: Option<&[SelectItem]>,
) -> Result<Option<Clause>, TranslationError> {
    let Some(items) = items else {
        return Ok(None);
    };
    let (star, items) = project(scope, translator, items)?;
    Ok(Some(Clause::Return(Projection {
        star,
        items,
        ..Default::default()
    })))
}

pub(crate) fn translate_update(
    ctx: &Context<'_>,
    table: &TableWithJoins,
    assignments: &[Assignment],
    has_from: bool,
    selection: Option<&SqlExpr>,
    returning_items: Option<&[SelectItem]>,
) -> Result<Statement, TranslationError> {
    if has_from {
        return Err(TranslationError::Mutation(
            "UPDATE supports a single target table, UPDATE ... FROM is not allowed".to_string(),
        ));
    }
    let mut scope = Scope::new(ctx.snapshot, ctx.name_case);
    let index = bind_target(&mut scope, table, "UPDATE", ViewRestriction::Update)?;
    let pattern = target_pattern(&mut scope, index);

    let translator = ExpressionTranslator::new(&scope);
    let filter = selection.map(|s| translator.translate(s)).transpose()?;
    let mut clauses = vec![
        Clause::matching(vec![pattern], filter),
        Clause::Set(set_items(&scope, index, assignments, &translator)?),
    ];
    clauses.extend(returning(&scope, &translator, returning_items)?);
    Ok(Statement::new(clauses))
}
