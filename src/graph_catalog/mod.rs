pub mod catalog;
pub mod errors;
pub mod pattern;
pub mod schema_sampler;
pub mod schema_types;
pub mod type_mapper;
pub mod view_definitions;

// Re-export commonly used types
pub use catalog::{CatalogSettings, SchemaCatalog};
pub use errors::CatalogError;
pub use pattern::{NamePattern, PatternFilter, SEARCH_STRING_ESCAPE};
pub use schema_sampler::{SamplingSettings, SchemaSampler};
pub use schema_types::{
    endpoint_id_column, relationship_join_name, ColumnSource, ConstraintInfo, ConstraintKind,
    Direction, EntityKind, IndexInfo, ProcedureArgument, ProcedureInfo, ProcedureKind,
    RelationshipInfo, SchemaSnapshot, TableKind, VirtualColumn, VirtualTable, ELEMENT_ID_COLUMN,
    END_ID_COLUMN, START_ID_COLUMN,
};
pub use type_mapper::{FromGraphValue, GraphType, SqlType, TypeError};
pub use view_definitions::{
    ViewColumn, ViewDefinition, ViewDefinitionError, ViewDefinitionReader, ViewResolver,
};
