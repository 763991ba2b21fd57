//! Metadata Provider
//!
//! Relational-style introspection over the schema catalog: tables, columns,
//! keys, indexes, procedures and types, each returned as a [`QueryResult`]
//! with one of the fixed layouts in [`columns`].
//!
//! There is exactly one catalog (the active database) and one schema
//! (`public`). Table types are `TABLE` for node tables, `RELATIONSHIP` for
//! relationship-join tables and `CBV` for Cypher-backed views.

pub mod columns;
pub mod errors;

use std::sync::Arc;

use crate::executor::{GraphValue, QueryResult};
use crate::graph_catalog::catalog::pattern_filter;
use crate::graph_catalog::{
    ColumnSource, EntityKind, GraphType, NamePattern, ProcedureInfo, ProcedureKind, SchemaCatalog,
    SchemaSnapshot, TableKind, VirtualTable, ELEMENT_ID_COLUMN, END_ID_COLUMN, START_ID_COLUMN,
};

pub use errors::MetadataError;

/// The single schema name.
pub const PUBLIC_SCHEMA: &str = "public";

// Relational metadata constants, numbered the way call-level SQL tooling expects.
const COLUMN_NO_NULLS: i64 = 0;
const COLUMN_NULLABLE: i64 = 1;
const TYPE_NULLABLE: i64 = 1;
const TYPE_SEARCHABLE: i64 = 3;
const TABLE_INDEX_OTHER: i64 = 3;
const IMPORTED_KEY_NO_ACTION: i64 = 3;
const IMPORTED_KEY_NOT_DEFERRABLE: i64 = 7;
const PROCEDURE_NO_RESULT: i64 = 1;
const PROCEDURE_RETURNS_RESULT: i64 = 2;
const PROCEDURE_COLUMN_IN: i64 = 1;
const PROCEDURE_COLUMN_RESULT: i64 = 3;
const PROCEDURE_NULLABLE_UNKNOWN: i64 = 2;
const FUNCTION_NO_TABLE: i64 = 1;

fn result(layout: &[&str], rows: Vec<Vec<GraphValue>>) -> QueryResult {
    QueryResult::new(layout.iter().map(|c| c.to_string()).collect(), rows)
}

fn text(value: impl Into<String>) -> GraphValue {
    GraphValue::String(value.into())
}

fn int(value: impl Into<i64>) -> GraphValue {
    GraphValue::Integer(value.into())
}

fn yes_no(flag: bool) -> GraphValue {
    text(if flag { "YES" } else { "NO" })
}

/// Name of the table an endpoint label is exposed as.
fn label_table(snapshot: &SchemaSnapshot, label: &str) -> String {
    snapshot
        .node_table(label)
        .map(|t| t.name.clone())
        .unwrap_or_else(|| label.to_string())
}

fn primary_key_name(table: &str) -> String {
    format!("{}_elementId", table)
}

pub struct MetadataProvider {
    catalog: Arc<SchemaCatalog>,
    database_name: String,
}

impl MetadataProvider {
    pub fn new(catalog: Arc<SchemaCatalog>, database_name: impl Into<String>) -> Self {
        Self {
            catalog,
            database_name: database_name.into(),
        }
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    fn check_catalog(&self, catalog: Option<&str>) -> Result<(), MetadataError> {
        match catalog {
            None | Some("") => Ok(()),
            Some(name) if name == self.database_name => Ok(()),
            Some(name) => Err(MetadataError::UnknownCatalog {
                catalog: name.to_string(),
                database: self.database_name.clone(),
            }),
        }
    }

    /// `Ok(false)` for `""`: every object lives in `public`, so nothing is
    /// without a schema.
    fn check_schema(&self, schema_pattern: Option<&str>) -> Result<bool, MetadataError> {
        match schema_pattern {
            None => Ok(true),
            Some("") => Ok(false),
            Some(pattern) => {
                let matcher = NamePattern::new(pattern)
                    .map_err(|e| crate::graph_catalog::CatalogError::invalid_pattern(pattern, e))?;
                if matcher.matches(PUBLIC_SCHEMA) {
                    Ok(true)
                } else {
                    Err(MetadataError::UnknownSchema(pattern.to_string()))
                }
            }
        }
    }

    /// Whether the listing can have rows at all.
    fn check_scope(&self, catalog: Option<&str>, schema_pattern: Option<&str>) -> Result<bool, MetadataError> {
        self.check_catalog(catalog)?;
        self.check_schema(schema_pattern)
    }

    pub fn get_catalogs(&self) -> QueryResult {
        result(&columns::CATALOGS, vec![vec![text(&self.database_name)]])
    }

    pub fn get_schemas(
        &self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
    ) -> Result<QueryResult, MetadataError> {
        if !self.check_scope(catalog, schema_pattern)? {
            return Ok(result(&columns::SCHEMAS, Vec::new()));
        }
        Ok(result(
            &columns::SCHEMAS,
            vec![vec![text(PUBLIC_SCHEMA), text(&self.database_name)]],
        ))
    }

    pub fn get_table_types(&self) -> QueryResult {
        let rows = [TableKind::Node, TableKind::RelationshipJoin, TableKind::View]
            .iter()
            .map(|k| vec![text(k.table_type())])
            .collect();
        result(&columns::TABLE_TYPES, rows)
    }

    /// Tables matching `table_pattern`. Unknown entries in `types` match
    /// nothing; views are only listed without a type filter or when `CBV` is
    /// asked for.
    pub fn get_tables(
        &self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
        types: Option<&[&str]>,
    ) -> Result<QueryResult, MetadataError> {
        if !self.check_scope(catalog, schema_pattern)? {
            return Ok(result(&columns::TABLES, Vec::new()));
        }
        let kinds: Option<Vec<TableKind>> =
            types.map(|t| t.iter().filter_map(|tag| TableKind::from_table_type(tag)).collect());
        let tables = self.catalog.tables(table_pattern, kinds.as_deref())?;
        let rows = tables
            .iter()
            .map(|table| {
                let remarks = match &table.relationship {
                    Some(info) => text(format!("{}\n{}\n{}", info.start_label, info.rel_type, info.end_label)),
                    None => GraphValue::Null,
                };
                vec![
                    text(&self.database_name),
                    text(PUBLIC_SCHEMA),
                    text(&table.name),
                    text(table.kind.table_type()),
                    remarks,
                    GraphValue::Null,
                    GraphValue::Null,
                    GraphValue::Null,
                    GraphValue::Null,
                    GraphValue::Null,
                ]
            })
            .collect();
        Ok(result(&columns::TABLES, rows))
    }

    pub fn get_columns(
        &self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
        column_pattern: Option<&str>,
    ) -> Result<QueryResult, MetadataError> {
        if !self.check_scope(catalog, schema_pattern)? {
            return Ok(result(&columns::COLUMNS, Vec::new()));
        }
        let snapshot = self.catalog.current();
        let column_filter = pattern_filter(column_pattern)?;
        let mut rows = Vec::new();
        for table in self.catalog.tables(table_pattern, None)? {
            for (position, column) in table.columns.iter().enumerate() {
                if !column_filter.matches(&column.name) {
                    continue;
                }
                let scope_table = match (&column.source, &table.relationship) {
                    (ColumnSource::StartProperty(_), Some(info)) => text(label_table(&snapshot, &info.start_label)),
                    (ColumnSource::EndProperty(_), Some(info)) => text(label_table(&snapshot, &info.end_label)),
                    _ => GraphValue::Null,
                };
                let sql_type = column.graph_type.sql_type();
                rows.push(vec![
                    text(&self.database_name),
                    text(PUBLIC_SCHEMA),
                    text(&table.name),
                    text(&column.name),
                    int(sql_type.code()),
                    text(column.graph_type.to_string()),
                    column.graph_type.precision().map(int).unwrap_or(GraphValue::Null),
                    GraphValue::Null,
                    GraphValue::Null,
                    int(2),
                    int(if column.nullable { COLUMN_NULLABLE } else { COLUMN_NO_NULLS }),
                    GraphValue::Null,
                    GraphValue::Null,
                    GraphValue::Null,
                    GraphValue::Null,
                    GraphValue::Null,
                    int(position as i64 + 1),
                    yes_no(column.nullable),
                    GraphValue::Null,
                    GraphValue::Null,
                    scope_table,
                    GraphValue::Null,
                    text("NO"),
                    yes_no(column.source.is_identity()),
                ]);
            }
        }
        Ok(result(&columns::COLUMNS, rows))
    }

    fn table(&self, name: &str) -> Option<VirtualTable> {
        self.catalog.current().table(name).cloned()
    }

    /// Key or unique constraint of a node table, else the synthetic `v$id` key.
    pub fn get_primary_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<QueryResult, MetadataError> {
        if !self.check_scope(catalog, schema)? {
            return Ok(result(&columns::PRIMARY_KEYS, Vec::new()));
        }
        let snapshot = self.catalog.current();
        let Some(table) = snapshot.table(table) else {
            return Ok(result(&columns::PRIMARY_KEYS, Vec::new()));
        };
        if table.is_view() {
            return Ok(result(&columns::PRIMARY_KEYS, Vec::new()));
        }
        let constraint = table
            .label
            .as_deref()
            .and_then(|label| snapshot.key_constraints(label).next());
        let (name, properties) = match constraint {
            Some(c) => (c.name.clone(), c.properties.clone()),
            None => (primary_key_name(&table.name), vec![ELEMENT_ID_COLUMN.to_string()]),
        };
        let rows = properties
            .iter()
            .enumerate()
            .map(|(i, property)| {
                vec![
                    text(PUBLIC_SCHEMA),
                    text(&self.database_name),
                    text(&table.name),
                    text(property),
                    int(i as i64 + 1),
                    text(&name),
                ]
            })
            .collect();
        Ok(result(&columns::PRIMARY_KEYS, rows))
    }

    fn key_row(&self, pk_table: &str, fk_table: &str, fk_column: &str) -> Vec<GraphValue> {
        vec![
            text(&self.database_name),
            text(PUBLIC_SCHEMA),
            text(pk_table),
            text(ELEMENT_ID_COLUMN),
            text(&self.database_name),
            text(PUBLIC_SCHEMA),
            text(fk_table),
            text(fk_column),
            int(1),
            int(IMPORTED_KEY_NO_ACTION),
            int(IMPORTED_KEY_NO_ACTION),
            text(format!("{}_{}", fk_table, fk_column.trim_start_matches("v$"))),
            text(primary_key_name(pk_table)),
            int(IMPORTED_KEY_NOT_DEFERRABLE),
        ]
    }

    /// Endpoint references of a relationship-join table.
    pub fn get_imported_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<QueryResult, MetadataError> {
        if !self.check_scope(catalog, schema)? {
            return Ok(result(&columns::KEYS, Vec::new()));
        }
        let snapshot = self.catalog.current();
        let rows = match self.table(table).and_then(|t| t.relationship.map(|r| (t.name, r))) {
            Some((name, info)) => vec![
                self.key_row(&label_table(&snapshot, &info.start_label), &name, START_ID_COLUMN),
                self.key_row(&label_table(&snapshot, &info.end_label), &name, END_ID_COLUMN),
            ],
            None => Vec::new(),
        };
        Ok(result(&columns::KEYS, rows))
    }

    /// Relationship-join tables referencing a node table.
    pub fn get_exported_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<QueryResult, MetadataError> {
        if !self.check_scope(catalog, schema)? {
            return Ok(result(&columns::KEYS, Vec::new()));
        }
        let snapshot = self.catalog.current();
        let Some(label) = snapshot.table(table).and_then(|t| t.label.clone()) else {
            return Ok(result(&columns::KEYS, Vec::new()));
        };
        let mut rows = Vec::new();
        for relationship in snapshot.relationship_tables() {
            let Some(info) = &relationship.relationship else {
                continue;
            };
            if info.start_label == label {
                rows.push(self.key_row(table, &relationship.name, START_ID_COLUMN));
            }
            if info.end_label == label {
                rows.push(self.key_row(table, &relationship.name, END_ID_COLUMN));
            }
        }
        Ok(result(&columns::KEYS, rows))
    }

    /// One row per indexed property, in index then property order.
    pub fn get_index_info(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
        unique: bool,
    ) -> Result<QueryResult, MetadataError> {
        if !self.check_scope(catalog, schema)? {
            return Ok(result(&columns::INDEX_INFO, Vec::new()));
        }
        let snapshot = self.catalog.current();
        let Some(table) = snapshot.table(table) else {
            return Ok(result(&columns::INDEX_INFO, Vec::new()));
        };
        let (entity, label_or_type) = match (&table.label, &table.relationship) {
            (Some(label), _) => (EntityKind::Node, label.as_str()),
            (None, Some(info)) => (EntityKind::Relationship, info.rel_type.as_str()),
            (None, None) => return Ok(result(&columns::INDEX_INFO, Vec::new())),
        };
        let mut rows = Vec::new();
        for index in snapshot
            .indexes_for(label_or_type)
            .filter(|i| i.entity == entity && (!unique || i.unique))
        {
            for (position, property) in index.properties.iter().enumerate() {
                rows.push(vec![
                    text(&self.database_name),
                    text(PUBLIC_SCHEMA),
                    text(&table.name),
                    GraphValue::Boolean(!index.unique),
                    GraphValue::Null,
                    text(&index.name),
                    int(TABLE_INDEX_OTHER),
                    int(position as i64 + 1),
                    text(property),
                    text("A"),
                    GraphValue::Null,
                    GraphValue::Null,
                    GraphValue::Null,
                ]);
            }
        }
        Ok(result(&columns::INDEX_INFO, rows))
    }

    fn procedures(
        &self,
        kind: ProcedureKind,
        pattern: Option<&str>,
    ) -> Result<Vec<ProcedureInfo>, MetadataError> {
        let filter = pattern_filter(pattern)?;
        Ok(self
            .catalog
            .current()
            .procedures
            .iter()
            .filter(|p| p.kind == kind && filter.matches(&p.name))
            .cloned()
            .collect())
    }

    pub fn get_procedures(
        &self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        procedure_pattern: Option<&str>,
    ) -> Result<QueryResult, MetadataError> {
        if !self.check_scope(catalog, schema_pattern)? {
            return Ok(result(&columns::PROCEDURES, Vec::new()));
        }
        let rows = self
            .procedures(ProcedureKind::Procedure, procedure_pattern)?
            .into_iter()
            .map(|p| {
                let kind = if p.outputs.is_empty() {
                    PROCEDURE_NO_RESULT
                } else {
                    PROCEDURE_RETURNS_RESULT
                };
                vec![
                    text(&self.database_name),
                    text(PUBLIC_SCHEMA),
                    text(&p.name),
                    GraphValue::Null,
                    GraphValue::Null,
                    GraphValue::Null,
                    text(p.description),
                    int(kind),
                    text(p.name),
                ]
            })
            .collect();
        Ok(result(&columns::PROCEDURES, rows))
    }

    /// Arguments (`COLUMN_TYPE` in) followed by outputs (result columns).
    pub fn get_procedure_columns(
        &self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        procedure_pattern: Option<&str>,
        column_pattern: Option<&str>,
    ) -> Result<QueryResult, MetadataError> {
        if !self.check_scope(catalog, schema_pattern)? {
            return Ok(result(&columns::PROCEDURE_COLUMNS, Vec::new()));
        }
        let column_filter = pattern_filter(column_pattern)?;
        let mut rows = Vec::new();
        for procedure in self.procedures(ProcedureKind::Procedure, procedure_pattern)? {
            let groups = [
                (PROCEDURE_COLUMN_IN, &procedure.arguments),
                (PROCEDURE_COLUMN_RESULT, &procedure.outputs),
            ];
            for (column_type, columns) in groups {
                for (position, column) in columns.iter().enumerate() {
                    if !column_filter.matches(&column.name) {
                        continue;
                    }
                    rows.push(procedure_column_row(
                        &self.database_name,
                        &procedure.name,
                        column_type,
                        &column.name,
                        &column.graph_type,
                        column.default_value.as_deref(),
                        position + 1,
                    ));
                }
            }
        }
        Ok(result(&columns::PROCEDURE_COLUMNS, rows))
    }

    pub fn get_functions(
        &self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        function_pattern: Option<&str>,
    ) -> Result<QueryResult, MetadataError> {
        if !self.check_scope(catalog, schema_pattern)? {
            return Ok(result(&columns::FUNCTIONS, Vec::new()));
        }
        let rows = self
            .procedures(ProcedureKind::Function, function_pattern)?
            .into_iter()
            .map(|f| {
                vec![
                    text(&self.database_name),
                    text(PUBLIC_SCHEMA),
                    text(&f.name),
                    text(f.description),
                    int(FUNCTION_NO_TABLE),
                    text(f.name),
                ]
            })
            .collect();
        Ok(result(&columns::FUNCTIONS, rows))
    }

    /// One row per relational type a graph type is exposed as.
    pub fn get_type_info(&self) -> QueryResult {
        let graph_types = [
            GraphType::Null,
            GraphType::Boolean,
            GraphType::Integer,
            GraphType::Float,
            GraphType::String,
            GraphType::Bytes,
            GraphType::Date,
            GraphType::LocalTime,
            GraphType::Time,
            GraphType::LocalDateTime,
            GraphType::DateTime,
            GraphType::Duration,
            GraphType::Point,
            GraphType::list_of(GraphType::Any, true),
            GraphType::Any,
        ];
        let rows = graph_types
            .iter()
            .map(|graph_type| {
                let sql_type = graph_type.sql_type();
                let quoted = matches!(graph_type, GraphType::String);
                vec![
                    text(graph_type.to_string()),
                    int(sql_type.code()),
                    graph_type.precision().map(int).unwrap_or(GraphValue::Null),
                    if quoted { text("'") } else { GraphValue::Null },
                    if quoted { text("'") } else { GraphValue::Null },
                    GraphValue::Null,
                    int(TYPE_NULLABLE),
                    GraphValue::Boolean(quoted),
                    int(TYPE_SEARCHABLE),
                    GraphValue::Boolean(false),
                    GraphValue::Boolean(false),
                    GraphValue::Boolean(false),
                    text(sql_type.name()),
                    int(0),
                    int(0),
                    GraphValue::Null,
                    GraphValue::Null,
                    int(10),
                ]
            })
            .collect();
        result(&columns::TYPE_INFO, rows)
    }
}

fn procedure_column_row(
    database: &str,
    procedure: &str,
    column_type: i64,
    name: &str,
    graph_type: &GraphType,
    default_value: Option<&str>,
    position: usize,
) -> Vec<GraphValue> {
    vec![
        text(database),
        text(PUBLIC_SCHEMA),
        text(procedure),
        text(name),
        int(column_type),
        int(graph_type.sql_type().code()),
        text(graph_type.to_string()),
        graph_type.precision().map(int).unwrap_or(GraphValue::Null),
        GraphValue::Null,
        GraphValue::Null,
        int(10),
        int(PROCEDURE_NULLABLE_UNKNOWN),
        GraphValue::Null,
        default_value.map(text).unwrap_or(GraphValue::Null),
        GraphValue::Null,
        GraphValue::Null,
        GraphValue::Null,
        int(position as i64),
        text(""),
        text(procedure),
    ]
}
