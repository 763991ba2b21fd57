//! Virtual relational schema derived from a property graph.
//!
//! A [`SchemaSnapshot`] is an immutable aggregate of every virtual table,
//! declared view, constraint, index and procedure signature known at one
//! point in time. Snapshots are never mutated after construction; a refresh
//! builds a new one and swaps it in.
//!
//! # Naming conventions
//!
//! - Whole-entity identity column: `v$id`
//! - Relationship-join endpoint identity columns: `v$start_id`, `v$end_id`
//! - Endpoint identity seen from a joined node table: `v$<label>_id`
//! - Relationship-join table name: `<StartLabel>_<RELTYPE>_<EndLabel>`

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::CatalogError;
use super::type_mapper::GraphType;
use super::view_definitions::ViewDefinition;

pub const ELEMENT_ID_COLUMN: &str = "v$id";
pub const START_ID_COLUMN: &str = "v$start_id";
pub const END_ID_COLUMN: &str = "v$end_id";

/// Identity column of one endpoint as referenced from the endpoint's node table.
pub fn endpoint_id_column(label: &str) -> String {
    format!("v${}_id", label.to_lowercase())
}

/// `<StartLabel>_<RELTYPE>_<EndLabel>`
pub fn relationship_join_name(start_label: &str, rel_type: &str, end_label: &str) -> String {
    format!("{}_{}_{}", start_label, rel_type, end_label)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Node,
    RelationshipJoin,
    View,
}

impl TableKind {
    /// Table type tag reported through metadata.
    pub fn table_type(&self) -> &'static str {
        match self {
            TableKind::Node => "TABLE",
            TableKind::RelationshipJoin => "RELATIONSHIP",
            TableKind::View => "CBV",
        }
    }

    pub fn from_table_type(tag: &str) -> Option<Self> {
        match tag {
            "TABLE" => Some(TableKind::Node),
            "RELATIONSHIP" => Some(TableKind::RelationshipJoin),
            "CBV" => Some(TableKind::View),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Outgoing,
    Incoming,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Outgoing => Direction::Incoming,
            Direction::Incoming => Direction::Outgoing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipInfo {
    pub start_label: String,
    pub rel_type: String,
    pub end_label: String,
    #[serde(default)]
    pub direction: Direction,
}

impl RelationshipInfo {
    pub fn new(
        start_label: impl Into<String>,
        rel_type: impl Into<String>,
        end_label: impl Into<String>,
    ) -> Self {
        Self {
            start_label: start_label.into(),
            rel_type: rel_type.into(),
            end_label: end_label.into(),
            direction: Direction::Outgoing,
        }
    }

    pub fn table_name(&self) -> String {
        relationship_join_name(&self.start_label, &self.rel_type, &self.end_label)
    }
}

/// Where the value of a virtual column comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSource {
    ElementId,
    StartElementId,
    EndElementId,
    /// Property of the node, relationship or view row itself.
    Property(String),
    StartProperty(String),
    EndProperty(String),
}

impl ColumnSource {
    pub fn is_identity(&self) -> bool {
        matches!(
            self,
            ColumnSource::ElementId | ColumnSource::StartElementId | ColumnSource::EndElementId
        )
    }

    pub fn property_name(&self) -> Option<&str> {
        match self {
            ColumnSource::Property(p) | ColumnSource::StartProperty(p) | ColumnSource::EndProperty(p) => {
                Some(p)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub graph_type: GraphType,
    pub source: ColumnSource,
    #[serde(default)]
    pub nullable: bool,
}

impl VirtualColumn {
    pub fn identity(name: impl Into<String>, source: ColumnSource) -> Self {
        Self {
            name: name.into(),
            graph_type: GraphType::String,
            source,
            nullable: false,
        }
    }

    pub fn property(name: impl Into<String>, graph_type: GraphType, nullable: bool) -> Self {
        let name = name.into();
        Self {
            source: ColumnSource::Property(name.clone()),
            name,
            graph_type,
            nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualTable {
    pub name: String,
    pub kind: TableKind,
    /// Node label for node tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<RelationshipInfo>,
    #[serde(default)]
    pub columns: Vec<VirtualColumn>,
}

impl VirtualTable {
    pub fn node(label: impl Into<String>, columns: Vec<VirtualColumn>) -> Self {
        let label = label.into();
        Self {
            name: label.clone(),
            kind: TableKind::Node,
            label: Some(label),
            relationship: None,
            columns,
        }
    }

    pub fn relationship_join(info: RelationshipInfo, columns: Vec<VirtualColumn>) -> Self {
        Self {
            name: info.table_name(),
            kind: TableKind::RelationshipJoin,
            label: None,
            relationship: Some(info),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&VirtualColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_ignore_case(&self, name: &str) -> Option<&VirtualColumn> {
        self.column(name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn is_view(&self) -> bool {
        self.kind == TableKind::View
    }

    /// Property columns in declaration order, identity columns excluded.
    pub fn property_columns(&self) -> impl Iterator<Item = &VirtualColumn> {
        self.columns.iter().filter(|c| !c.source.is_identity())
    }
}

impl fmt::Display for VirtualTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind.table_type())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Node,
    Relationship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Unique,
    Key,
    Existence,
    Other,
}

impl ConstraintKind {
    pub fn from_graph_name(name: &str) -> Self {
        let upper = name.to_uppercase();
        if upper.contains("UNIQUE") {
            ConstraintKind::Unique
        } else if upper.contains("KEY") {
            ConstraintKind::Key
        } else if upper.contains("EXISTENCE") {
            ConstraintKind::Existence
        } else {
            ConstraintKind::Other
        }
    }

    /// Unique and key constraints identify an entity.
    pub fn is_identifying(&self) -> bool {
        matches!(self, ConstraintKind::Unique | ConstraintKind::Key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintInfo {
    pub name: String,
    pub kind: ConstraintKind,
    pub entity: EntityKind,
    pub label_or_type: String,
    /// Declaration order is preserved for composite keys.
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub entity: EntityKind,
    pub label_or_type: String,
    pub properties: Vec<String>,
    pub unique: bool,
    pub index_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureKind {
    Procedure,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureArgument {
    pub name: String,
    #[serde(rename = "type")]
    pub graph_type: GraphType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: ProcedureKind,
    #[serde(default)]
    pub arguments: Vec<ProcedureArgument>,
    #[serde(default)]
    pub outputs: Vec<ProcedureArgument>,
}

impl ProcedureInfo {
    pub fn argument(&self, name: &str) -> Option<&ProcedureArgument> {
        self.arguments.iter().find(|a| a.name == name)
    }
}

/// One immutable state of the inferred schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub version: u64,
    /// All tables sorted by name, including one `View` table per declared view.
    #[serde(default)]
    pub tables: Vec<VirtualTable>,
    #[serde(default)]
    pub views: Vec<ViewDefinition>,
    #[serde(default)]
    pub constraints: Vec<ConstraintInfo>,
    #[serde(default)]
    pub indexes: Vec<IndexInfo>,
    #[serde(default)]
    pub procedures: Vec<ProcedureInfo>,
    /// Table name -> label overrides, matched case-insensitively.
    #[serde(default)]
    pub table_mappings: BTreeMap<String, String>,
    /// `Table.column` -> relationship type, matched case-insensitively.
    #[serde(default)]
    pub join_column_mappings: BTreeMap<String, String>,
}

impl SchemaSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Replaces the declared views and their `View` tables.
    pub fn with_views(mut self, views: Vec<ViewDefinition>) -> Self {
        self.tables.retain(|t| !t.is_view());
        self.tables
            .extend(views.iter().map(ViewDefinition::to_virtual_table));
        self.views = views;
        self.sort_tables();
        self
    }

    pub fn with_mappings(
        mut self,
        table_mappings: BTreeMap<String, String>,
        join_column_mappings: BTreeMap<String, String>,
    ) -> Self {
        self.table_mappings = table_mappings;
        self.join_column_mappings = join_column_mappings;
        self
    }

    pub(crate) fn sort_tables(&mut self) {
        self.tables.sort_by(|a, b| a.name.cmp(&b.name));
    }

    pub fn table(&self, name: &str) -> Option<&VirtualTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Exact match first, then a case-insensitive one.
    pub fn table_ignore_case(&self, name: &str) -> Option<&VirtualTable> {
        self.table(name)
            .or_else(|| self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name)))
    }

    pub fn view(&self, name: &str) -> Option<&ViewDefinition> {
        self.views
            .iter()
            .find(|v| v.name == name)
            .or_else(|| self.views.iter().find(|v| v.name.eq_ignore_ascii_case(name)))
    }

    pub fn node_table(&self, label: &str) -> Option<&VirtualTable> {
        self.tables
            .iter()
            .find(|t| t.kind == TableKind::Node && t.label.as_deref() == Some(label))
    }

    pub fn relationship_tables(&self) -> impl Iterator<Item = &VirtualTable> {
        self.tables
            .iter()
            .filter(|t| t.kind == TableKind::RelationshipJoin)
    }

    pub fn mapped_label(&self, table: &str) -> Option<&str> {
        self.table_mappings
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(table))
            .map(|(_, v)| v.as_str())
    }

    /// Relationship type a `table.column` join column stands for.
    pub fn join_column_mapping(&self, table: &str, column: &str) -> Option<&str> {
        self.join_column_mappings
            .iter()
            .find(|(k, _)| match k.split_once('.') {
                Some((t, c)) => t.eq_ignore_ascii_case(table) && c.eq_ignore_ascii_case(column),
                None => false,
            })
            .map(|(_, v)| v.as_str())
    }

    pub fn procedure(&self, name: &str) -> Option<&ProcedureInfo> {
        self.procedures
            .iter()
            .find(|p| p.name == name)
            .or_else(|| self.procedures.iter().find(|p| p.name.eq_ignore_ascii_case(name)))
    }

    /// Identifying constraints of one label, in the order they were sampled.
    pub fn key_constraints(&self, label: &str) -> impl Iterator<Item = &ConstraintInfo> {
        let label = label.to_string();
        self.constraints.iter().filter(move |c| {
            c.entity == EntityKind::Node && c.kind.is_identifying() && c.label_or_type == label
        })
    }

    pub fn indexes_for(&self, label_or_type: &str) -> impl Iterator<Item = &IndexInfo> {
        let label = label_or_type.to_string();
        self.indexes
            .iter()
            .filter(move |i| i.label_or_type == label)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, CatalogError> {
        let mut snapshot: SchemaSnapshot =
            serde_yaml::from_str(content).map_err(|e| CatalogError::Snapshot {
                source_name: "<inline>".to_string(),
                message: e.to_string(),
            })?;
        let views = std::mem::take(&mut snapshot.views);
        Ok(snapshot.with_views(views))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Snapshot {
            source_name: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            CatalogError::Snapshot { message, .. } => CatalogError::Snapshot {
                source_name: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn to_yaml(&self) -> Result<String, CatalogError> {
        serde_yaml::to_string(self).map_err(|e| CatalogError::Snapshot {
            source_name: "<snapshot>".to_string(),
            message: e.to_string(),
        })
    }
}
