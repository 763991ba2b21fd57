//! DELETE and TRUNCATE.
//!
//! Nodes are removed with `DETACH DELETE` so their relationships go with
//! them; relationship tables only ever remove the relationship.

use sqlparser::ast::{Delete, Expr as SqlExpr, FromTable, ObjectName};

use super::cypher::{Clause, Statement};
use super::errors::{TranslationError, ViewRestriction};
use super::expression::ExpressionTranslator;
use super::scope::Scope;
use super::update::{bind_table, bind_target, target_pattern};
use super::Context;

pub(crate) fn translate_delete(ctx: &Context<'_>, delete: &Delete) -> Result<Statement, TranslationError> {
    if !delete.tables.is_empty() || delete.using.is_some() {
        return Err(TranslationError::Mutation(
            "DELETE supports a single target table".to_string(),
        ));
    }
    if !delete.order_by.is_empty() || delete.limit.is_some() {
        return Err(TranslationError::unsupported_with_context(
            "ORDER BY or LIMIT",
            "in DELETE",
        ));
    }
    if delete.returning.is_some() {
        return Err(TranslationError::unsupported_with_context("RETURNING", "in DELETE"));
    }
    let targets = match &delete.from {
        FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
    };
    let [target] = targets.as_slice() else {
        return Err(TranslationError::Mutation(
            "DELETE supports a single target table".to_string(),
        ));
    };
    let mut scope = Scope::new(ctx.snapshot, ctx.name_case);
    let index = bind_target(&mut scope, target, "DELETE", ViewRestriction::Delete)?;
    remove(scope, index, delete.selection.as_ref())
}

pub(crate) fn translate_truncate(ctx: &Context<'_>, tables: &[ObjectName]) -> Result<Statement, TranslationError> {
    let [name] = tables else {
        return Err(TranslationError::Mutation(
            "TRUNCATE supports a single target table".to_string(),
        ));
    };
    let mut scope = Scope::new(ctx.snapshot, ctx.name_case);
    let index = bind_table(&mut scope, name, None, ViewRestriction::Delete)?;
    remove(scope, index, None)
}

fn remove(mut scope: Scope<'_>, index: usize, selection: Option<&SqlExpr>) -> Result<Statement, TranslationError> {
    let pattern = target_pattern(&mut scope, index);
    let translator = ExpressionTranslator::new(&scope);
    let filter = selection.map(|s| translator.translate(s)).transpose()?;
    let binding = &scope.bindings[index];
    log::debug!("removing `{}` bound to `{}`", binding.sql_name, binding.var);
    Ok(Statement::new(vec![
        Clause::matching(vec![pattern], filter),
        Clause::Delete {
            detach: !binding.is_relationship(),
            variables: vec![binding.var.clone()],
        },
    ]))
}
