//! # Catalog Error Types
//!
//! Errors raised while sampling the graph, refreshing the catalog or loading
//! a schema snapshot.
//!
//! ## Error Categories
//!
//! - **Sampling Errors**: a sampling query failed; the previous snapshot stays current
//! - **Snapshot Errors**: a YAML snapshot could not be read or parsed
//! - **View Errors**: the configured view document could not be loaded
//!
//! ## Usage Patterns
//!
//! When returning catalog errors, use context helpers to say where it happened:
//!
//! ```ignore
//! CatalogError::sampling_error_with_context(
//!     "MATCH (n:Person) WITH n LIMIT $sampleSize RETURN properties(n) AS properties",
//!     err,
//!     "While sampling label Person",
//! )
//! ```

use thiserror::Error;

use super::view_definitions::ViewDefinitionError;
use crate::executor::ExecutorError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Schema sampling query failed: {query}")]
    Sampling {
        query: String,
        #[source]
        source: ExecutorError,
    },
    #[error("Catalog refresh failed, keeping schema version {retained_version}")]
    Refresh {
        retained_version: u64,
        #[source]
        source: Box<CatalogError>,
    },
    #[error("No executor configured, the catalog can only be built from a snapshot")]
    Offline,
    #[error("Invalid schema snapshot in {source_name}: {message}")]
    Snapshot {
        source_name: String,
        message: String,
    },
    #[error("Invalid search pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error(transparent)]
    View(#[from] ViewDefinitionError),
}

impl CatalogError {
    pub fn status_code(&self) -> &'static str {
        match self {
            CatalogError::Sampling { .. } | CatalogError::Offline => "08000",
            CatalogError::Refresh { source, .. } => source.status_code(),
            CatalogError::Snapshot { .. } | CatalogError::InvalidPattern { .. } => "HY000",
            CatalogError::View(e) => e.status_code(),
        }
    }

    /// Create a sampling error that names the entity being sampled
    ///
    /// # Example
    /// ```ignore
    /// CatalogError::sampling_error_with_context(query, err, "While sampling ACTED_IN endpoints")
    /// ```
    pub fn sampling_error_with_context(
        query: impl Into<String>,
        source: ExecutorError,
        context: impl Into<String>,
    ) -> Self {
        CatalogError::Sampling {
            query: format!("{}\n  Context: {}", query.into(), context.into()),
            source,
        }
    }

    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        CatalogError::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }
}
