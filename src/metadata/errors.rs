use thiserror::Error;

use crate::graph_catalog::CatalogError;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Catalog `{catalog}` does not exist, the only catalog is `{database}`")]
    UnknownCatalog { catalog: String, database: String },
    #[error("Schema `{0}` does not exist, the only schema is `public`")]
    UnknownSchema(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl MetadataError {
    pub fn status_code(&self) -> &'static str {
        match self {
            MetadataError::UnknownCatalog { .. } => "3D000",
            MetadataError::UnknownSchema(_) => "3F000",
            MetadataError::Catalog(e) => e.status_code(),
        }
    }
}
