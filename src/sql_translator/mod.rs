//! SQL to Cypher translation.
//!
//! A statement goes through the dialect pre-pass ([`statement`]), is parsed
//! with sqlparser, lowered per statement kind into the Cypher AST
//! ([`cypher`]) against one [`SchemaSnapshot`], and rendered. Compiled
//! results are memoized in the [`TranslationCache`]. Statements that are
//! already Cypher ([`passthrough`]) skip all of that.

pub mod cypher;
pub mod errors;
pub mod function_registry;
pub mod passthrough;
pub mod statement;
pub mod translation_cache;

mod delete;
mod expression;
mod insert;
mod join_resolver;
mod procedure_call;
mod scope;
mod select;
mod update;

use std::cell::Cell;
use std::sync::Arc;

use sqlparser::ast::{FromTable, TableFactor};

use crate::config::{NameCase, TranslatorConfig};
use crate::executor::Parameters;
use crate::graph_catalog::SchemaSnapshot;

use cypher::{RenderOptions, ToCypher};
use scope::object_name;
use statement::{parse, prepare, SqlStatement};

pub use errors::{TranslationError, ViewRestriction};
pub use insert::InsertTemplates;
pub use statement::ParameterShape;
pub use translation_cache::{CacheMetrics, TranslationCache, TranslationCacheKey};

/// What one translation works against.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Context<'a> {
    pub snapshot: &'a SchemaSnapshot,
    pub name_case: NameCase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Query,
    Insert,
    Update,
    Delete,
    Call,
    /// Blank input or only comments.
    Empty,
}

impl StatementKind {
    pub fn is_update(&self) -> bool {
        matches!(self, StatementKind::Insert | StatementKind::Update | StatementKind::Delete)
    }
}

/// A statement ready to be sent to the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTranslation {
    pub cypher: String,
    /// Cypher parameters in order of first appearance: `1`, `2`, ... for
    /// positional placeholders, the bare name for named ones.
    pub parameter_names: Vec<String>,
    /// Per-row values of a multi-row `VALUES` insert; empty otherwise.
    pub parameter_sets: Vec<Parameters>,
    pub kind: StatementKind,
    /// Table or procedure a mutation or CALL acts on.
    pub target: Option<String>,
}

pub struct Translator {
    options: RenderOptions,
    name_case: NameCase,
    named_param_prefix: char,
    templates: InsertTemplates,
    cache: TranslationCache,
}

impl Translator {
    pub fn new(config: &TranslatorConfig) -> Self {
        Self {
            options: RenderOptions {
                always_escape: config.always_escape_names,
                pretty: config.pretty_print,
            },
            name_case: config.parse_name_case,
            named_param_prefix: config.named_param_prefix,
            templates: InsertTemplates::new(),
            cache: TranslationCache::new(config.enable_cache),
        }
    }

    /// Compiles `sql` against `snapshot`, or returns the cached result of an
    /// earlier compilation of the same statement and snapshot version.
    pub fn translate(
        &self,
        sql: &str,
        snapshot: &SchemaSnapshot,
    ) -> Result<Arc<CompiledTranslation>, TranslationError> {
        if let Some(forwarded) = forward_as_cypher(sql) {
            return Ok(Arc::new(forwarded));
        }
        let prepared = prepare(sql, self.named_param_prefix)?;
        let key = TranslationCacheKey::new(&prepared.text, prepared.shape.clone(), snapshot.version);
        let learned = Cell::new(false);
        let compiled = self.cache.get_or_compile(key, || {
            let parsed = parse(&prepared)?;
            self.compile(parsed, snapshot, &learned)
        })?;
        // Unqualified inserts compiled before a template existed are stale now.
        if learned.get() {
            self.cache.clear();
        }
        Ok(compiled)
    }

    fn compile(
        &self,
        parsed: SqlStatement,
        snapshot: &SchemaSnapshot,
        learned: &Cell<bool>,
    ) -> Result<CompiledTranslation, TranslationError> {
        let ctx = Context {
            snapshot,
            name_case: self.name_case,
        };
        let target = self.target(&parsed);
        let mut parameter_sets = Vec::new();
        let (statement, kind) = match parsed {
            SqlStatement::Query(query) => (select::translate_query(&ctx, &query)?, StatementKind::Query),
            SqlStatement::Insert(insert) => {
                let lowered = insert::translate_insert(&ctx, &self.templates, &insert)?;
                learned.set(lowered.learned);
                parameter_sets = lowered.parameter_sets;
                (lowered.statement, StatementKind::Insert)
            }
            SqlStatement::Update {
                table,
                assignments,
                has_from,
                selection,
                returning,
            } => (
                update::translate_update(
                    &ctx,
                    &table,
                    &assignments,
                    has_from,
                    selection.as_ref(),
                    returning.as_deref(),
                )?,
                StatementKind::Update,
            ),
            SqlStatement::Delete(delete) => (delete::translate_delete(&ctx, &delete)?, StatementKind::Delete),
            SqlStatement::Truncate(tables) => {
                (delete::translate_truncate(&ctx, &tables)?, StatementKind::Delete)
            }
            SqlStatement::Call(function) => {
                (procedure_call::translate_call(&ctx, &function)?, StatementKind::Call)
            }
            SqlStatement::Empty => {
                return Ok(CompiledTranslation {
                    cypher: String::new(),
                    parameter_names: Vec::new(),
                    parameter_sets,
                    kind: StatementKind::Empty,
                    target,
                })
            }
        };

        let parameter_names = statement.parameter_names();
        let cypher = statement.to_cypher(&self.options);
        log::debug!("Translated {:?} statement to: {}", kind, cypher);
        Ok(CompiledTranslation {
            cypher,
            parameter_names,
            parameter_sets,
            kind,
            target,
        })
    }

    fn target(&self, parsed: &SqlStatement) -> Option<String> {
        let relation = |factor: &TableFactor| match factor {
            TableFactor::Table { name, .. } => Some(object_name(name, self.name_case)),
            _ => None,
        };
        match parsed {
            SqlStatement::Query(_) | SqlStatement::Empty => None,
            SqlStatement::Insert(insert) => Some(object_name(&insert.table_name, self.name_case)),
            SqlStatement::Update { table, .. } => relation(&table.relation),
            SqlStatement::Delete(delete) => match &delete.from {
                FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => {
                    tables.first().and_then(|t| relation(&t.relation))
                }
            },
            SqlStatement::Truncate(tables) => tables.first().map(|t| object_name(t, self.name_case)),
            SqlStatement::Call(function) => Some(procedure_call::procedure_name(&function.name)),
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        self.options
    }

    pub fn cache_metrics(&self) -> CacheMetrics {
        self.cache.metrics()
    }

    pub fn templates(&self) -> &InsertTemplates {
        &self.templates
    }
}

/// Statements sent to the graph untranslated: the force-Cypher hint, or a
/// Spark schema lookup wrapped around a Cypher query.
fn forward_as_cypher(sql: &str) -> Option<CompiledTranslation> {
    let cypher = if passthrough::forces_cypher(sql) {
        sql.trim().to_string()
    } else {
        passthrough::spark_rewrite(passthrough::spark_subquery(sql)?)
    };
    log::debug!("Forwarding statement as Cypher: {}", cypher);
    let parameter_names = passthrough::cypher_parameters(&cypher);
    Some(CompiledTranslation {
        cypher,
        parameter_names,
        parameter_sets: Vec::new(),
        kind: StatementKind::Query,
        target: None,
    })
}
