//! Crate-level error returned by the client facade.
//!
//! Every component keeps its own error enum; this one only wraps them so a
//! caller can match on the component or just read [`SqlGraphError::status_code`].

use thiserror::Error;

use crate::config::ConfigError;
use crate::executor::ExecutorError;
use crate::graph_catalog::{CatalogError, TypeError, ViewDefinitionError};
use crate::metadata::MetadataError;
use crate::sql_translator::TranslationError;

#[derive(Debug, Error)]
pub enum SqlGraphError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    View(#[from] ViewDefinitionError),
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("Graph execution failed for `{query}`")]
    Execution {
        query: String,
        #[source]
        source: ExecutorError,
    },
    #[error("No value bound for parameter `{0}`")]
    MissingParameter(String),
    #[error("Unknown result column `{0}`")]
    UnknownColumn(String),
    #[error("Row index {index} is out of range, the result has {rows} rows")]
    RowOutOfRange { index: usize, rows: usize },
}

impl SqlGraphError {
    pub fn status_code(&self) -> &'static str {
        match self {
            SqlGraphError::Config(e) => e.status_code(),
            SqlGraphError::Catalog(e) => e.status_code(),
            SqlGraphError::View(e) => e.status_code(),
            SqlGraphError::Translation(e) => e.status_code(),
            SqlGraphError::Type(e) => e.status_code(),
            SqlGraphError::Metadata(e) => e.status_code(),
            SqlGraphError::Execution { source, .. } => source.status_code(),
            SqlGraphError::MissingParameter(_) => "07001",
            SqlGraphError::UnknownColumn(_) => "42S22",
            SqlGraphError::RowOutOfRange { .. } => "HY000",
        }
    }

    /// Wraps an executor failure with the Cypher text that caused it.
    pub fn execution_error_with_context(query: impl Into<String>, source: ExecutorError) -> Self {
        SqlGraphError::Execution {
            query: query.into(),
            source,
        }
    }
}
