//! Cypher-backed views.
//!
//! A view is a named, read-only table whose rows come from a fixed Cypher
//! query. Definitions are declared in-process or read from a JSON document
//! at a `file:`, `http:` or `https:` location (a bare path is read as a file).
//!
//! Two document shapes are understood:
//!
//! ```json
//! [{"name": "cbv1", "query": "MATCH (n:Person) RETURN n.name AS a",
//!   "columns": [{"name": "a", "propertyName": "a", "type": "STRING"}]}]
//! ```
//!
//! ```json
//! {"Schemas": [{"Views": [{"Name": "cbv1", "CypherQuery": "...",
//!   "Columns": [{"Name": "a", "SourceName": "a", "Neo4jType": ["String"]}]}]}]}
//! ```

use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::schema_types::{ColumnSource, TableKind, VirtualColumn, VirtualTable};
use super::type_mapper::{GraphType, TypeError};

const SUPPORTED_SCHEMES: [&str; 3] = ["file", "http", "https"];

#[derive(Debug, Error)]
pub enum ViewDefinitionError {
    #[error("Unsupported url: {url}")]
    UnsupportedUrl { url: String },
    #[error("Unsupported scheme: {scheme}, supported schemes are [file, http, https]")]
    UnsupportedScheme { scheme: String },
    #[error("No path specified in this url: {url}")]
    NoPath { url: String },
    #[error("Column name is required")]
    MissingColumnName,
    #[error("Invalid type for view column `{column}`")]
    InvalidColumnType {
        column: String,
        #[source]
        source: TypeError,
    },
    #[error("Invalid JSON content, cannot read {source_name}: {message}")]
    InvalidContent {
        source_name: String,
        message: String,
    },
    #[error("Cannot read view definitions from {source_name}")]
    Io {
        source_name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot fetch view definitions from {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ViewDefinitionError {
    pub fn status_code(&self) -> &'static str {
        match self {
            ViewDefinitionError::UnsupportedScheme { .. } => "0A000",
            _ => "HY000",
        }
    }

    fn invalid_content(source_name: &str, message: impl Into<String>) -> Self {
        ViewDefinitionError::InvalidContent {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawViewColumn")]
pub struct ViewColumn {
    pub name: String,
    /// Key of the column in the view query's result, defaults to the column name.
    pub property_name: String,
    #[serde(rename = "type")]
    pub graph_type: GraphType,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawViewColumn {
    name: Option<String>,
    property_name: Option<String>,
    #[serde(rename = "type")]
    graph_type: Option<String>,
}

impl TryFrom<RawViewColumn> for ViewColumn {
    type Error = ViewDefinitionError;

    fn try_from(raw: RawViewColumn) -> Result<Self, Self::Error> {
        let graph_type = match raw.graph_type.as_deref() {
            Some(name) if !name.trim().is_empty() => parse_column_type(raw.name.as_deref(), name)?,
            _ => GraphType::Any,
        };
        ViewColumn::new(
            raw.name.as_deref().unwrap_or_default(),
            raw.property_name.as_deref(),
            graph_type,
        )
    }
}

fn parse_column_type(column: Option<&str>, name: &str) -> Result<GraphType, ViewDefinitionError> {
    name.parse()
        .map_err(|source| ViewDefinitionError::InvalidColumnType {
            column: column.unwrap_or_default().to_string(),
            source,
        })
}

impl ViewColumn {
    pub fn new(
        name: &str,
        property_name: Option<&str>,
        graph_type: GraphType,
    ) -> Result<Self, ViewDefinitionError> {
        if name.trim().is_empty() {
            return Err(ViewDefinitionError::MissingColumnName);
        }
        let property_name = property_name
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(name);
        Ok(Self {
            name: name.to_string(),
            property_name: property_name.to_string(),
            graph_type,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub columns: Vec<ViewColumn>,
}

impl ViewDefinition {
    pub fn new(name: impl Into<String>, query: impl Into<String>, columns: Vec<ViewColumn>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ViewColumn> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn to_virtual_table(&self) -> VirtualTable {
        VirtualTable {
            name: self.name.clone(),
            kind: TableKind::View,
            label: None,
            relationship: None,
            columns: self
                .columns
                .iter()
                .map(|c| VirtualColumn {
                    name: c.name.clone(),
                    graph_type: c.graph_type.clone(),
                    source: ColumnSource::Property(c.property_name.clone()),
                    nullable: true,
                })
                .collect(),
        }
    }
}

/// In-process storage of declared views.
#[derive(Debug, Default)]
pub struct ViewResolver {
    views: RwLock<Vec<ViewDefinition>>,
}

impl ViewResolver {
    pub fn new(views: Vec<ViewDefinition>) -> Self {
        let resolver = Self::default();
        for view in views {
            resolver.declare(view);
        }
        resolver
    }

    /// Adds a view or replaces the one with the same name. Returns the replaced definition.
    pub fn declare(&self, view: ViewDefinition) -> Option<ViewDefinition> {
        let mut views = self.views.write().unwrap_or_else(PoisonError::into_inner);
        match views.iter_mut().find(|v| v.name == view.name) {
            Some(existing) => Some(std::mem::replace(existing, view)),
            None => {
                views.push(view);
                None
            }
        }
    }

    pub fn resolve(&self, name: &str) -> Option<ViewDefinition> {
        let views = self.views.read().unwrap_or_else(PoisonError::into_inner);
        views
            .iter()
            .find(|v| v.name == name)
            .or_else(|| views.iter().find(|v| v.name.eq_ignore_ascii_case(name)))
            .cloned()
    }

    pub fn definitions(&self) -> Vec<ViewDefinition> {
        self.views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Http(Url),
}

/// Reads view definitions from one configured location.
#[derive(Debug, Clone)]
pub struct ViewDefinitionReader {
    source: String,
    location: Location,
}

impl ViewDefinitionReader {
    pub fn of(url: &str) -> Result<Self, ViewDefinitionError> {
        if url.trim().is_empty() {
            return Err(ViewDefinitionError::NoPath {
                url: url.to_string(),
            });
        }
        let location = if has_scheme(url) {
            let parsed = Url::parse(url).map_err(|_| ViewDefinitionError::UnsupportedUrl {
                url: url.to_string(),
            })?;
            Self::location_of(url, parsed)?
        } else {
            Location::File(PathBuf::from(url))
        };
        Ok(Self {
            source: url.to_string(),
            location,
        })
    }

    fn location_of(url: &str, parsed: Url) -> Result<Location, ViewDefinitionError> {
        let scheme = parsed.scheme().to_lowercase();
        if !SUPPORTED_SCHEMES.contains(&scheme.as_str()) {
            return Err(ViewDefinitionError::UnsupportedScheme { scheme });
        }
        if parsed.path().is_empty() || parsed.path() == "/" {
            return Err(ViewDefinitionError::NoPath {
                url: url.to_string(),
            });
        }
        if scheme == "file" {
            return parsed
                .to_file_path()
                .map(Location::File)
                .map_err(|_| ViewDefinitionError::NoPath {
                    url: url.to_string(),
                });
        }
        Ok(Location::Http(parsed))
    }

    pub async fn read(&self) -> Result<Vec<ViewDefinition>, ViewDefinitionError> {
        let content = match &self.location {
            Location::File(path) => {
                log::debug!("Reading view definitions from {}", path.display());
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| ViewDefinitionError::Io {
                        source_name: self.source.clone(),
                        source,
                    })?
            }
            Location::Http(url) => {
                log::debug!("Fetching view definitions from {}", url);
                let http_error = |source| ViewDefinitionError::Http {
                    url: url.to_string(),
                    source,
                };
                reqwest::get(url.clone())
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(http_error)?
                    .text()
                    .await
                    .map_err(http_error)?
            }
        };
        let views = parse_view_document(&content, &self.source)?;
        log::info!("Loaded {} view definition(s) from {}", views.len(), self.source);
        Ok(views)
    }
}

/// `scheme:` prefix per RFC 3986. Single letters are drive letters, not schemes.
fn has_scheme(url: &str) -> bool {
    match url.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Parses either supported document shape. Empty input and `{}` yield no views.
pub fn parse_view_document(
    content: &str,
    source_name: &str,
) -> Result<Vec<ViewDefinition>, ViewDefinitionError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let document: Value = serde_json::from_str(content)
        .map_err(|e| ViewDefinitionError::invalid_content(source_name, e.to_string()))?;

    match document {
        Value::Object(map) if map.contains_key("Schemas") => {
            read_schemas(map.get("Schemas").unwrap_or(&Value::Null), source_name)
        }
        Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        Value::Array(_) => serde_json::from_value(document)
            .map_err(|e| ViewDefinitionError::invalid_content(source_name, e.to_string())),
        _ => Err(ViewDefinitionError::invalid_content(
            source_name,
            "expected an array of views or a `Schemas` object",
        )),
    }
}

fn read_schemas(schemas: &Value, source_name: &str) -> Result<Vec<ViewDefinition>, ViewDefinitionError> {
    let text = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).map(str::to_string);
    let list = |v: &Value, key: &str| v.get(key).and_then(Value::as_array).cloned().unwrap_or_default();

    let schemas = schemas
        .as_array()
        .ok_or_else(|| ViewDefinitionError::invalid_content(source_name, "`Schemas` must be an array"))?;

    let mut result = Vec::new();
    for schema in schemas {
        for view in list(schema, "Views") {
            let columns = list(&view, "Columns")
                .iter()
                .map(|column| {
                    let name = text(column, "Name").unwrap_or_default();
                    let graph_type = match column.get("Neo4jType").and_then(Value::as_array) {
                        Some(types) if types.len() == 1 => match types[0].as_str() {
                            Some(t) => parse_column_type(Some(&name), t)?,
                            None => GraphType::String,
                        },
                        _ => GraphType::String,
                    };
                    ViewColumn::new(&name, text(column, "SourceName").as_deref(), graph_type)
                })
                .collect::<Result<Vec<_>, _>>()?;
            result.push(ViewDefinition::new(
                text(&view, "Name").unwrap_or_default(),
                text(&view, "CypherQuery").unwrap_or_default(),
                columns,
            ));
        }
    }
    Ok(result)
}
