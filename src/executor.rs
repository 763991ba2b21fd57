//! Graph executor boundary.
//!
//! The translation engine never talks to the network itself. Everything that
//! runs a Cypher statement (schema sampling, compiled statements, metadata
//! queries) goes through [`GraphExecutor`], which a driver implements.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named parameters passed alongside a Cypher statement.
pub type Parameters = BTreeMap<String, GraphValue>;

/// Structured failure reported by the graph executor.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct ExecutorError {
    /// Server or driver status code, e.g. `Neo.ClientError.Statement.SyntaxError`
    pub code: String,
    pub message: String,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ExecutorError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        mut self,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn status_code(&self) -> &'static str {
        "08000"
    }
}

/// Temporal amount as Cypher models it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphDuration {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanoseconds: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphPoint {
    pub srid: u32,
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub element_id: String,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, GraphValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphRelationship {
    pub element_id: String,
    pub rel_type: String,
    pub start_element_id: String,
    pub end_element_id: String,
    pub properties: BTreeMap<String, GraphValue>,
}

/// A value as returned by (or sent to) the graph database.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Bytes),
    Date(NaiveDate),
    LocalTime(NaiveTime),
    Time(NaiveTime, FixedOffset),
    LocalDateTime(NaiveDateTime),
    DateTime(DateTime<FixedOffset>),
    Duration(GraphDuration),
    Point(GraphPoint),
    List(Vec<GraphValue>),
    Map(BTreeMap<String, GraphValue>),
    Node(GraphNode),
    Relationship(GraphRelationship),
    Path(Vec<GraphValue>),
}

impl GraphValue {
    pub fn is_null(&self) -> bool {
        matches!(self, GraphValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GraphValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GraphValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            GraphValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[GraphValue]> {
        match self {
            GraphValue::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, GraphValue>> {
        match self {
            GraphValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// List of strings, skipping anything that is not a string.
    pub fn string_list(&self) -> Vec<String> {
        self.as_list()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for GraphValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphValue::Null => write!(f, "NULL"),
            GraphValue::Boolean(b) => write!(f, "{}", b),
            GraphValue::Integer(i) => write!(f, "{}", i),
            GraphValue::Float(x) => write!(f, "{}", x),
            GraphValue::String(s) => write!(f, "{}", s),
            GraphValue::Bytes(b) => write!(f, "{:?}", b),
            GraphValue::Date(d) => write!(f, "{}", d),
            GraphValue::LocalTime(t) => write!(f, "{}", t),
            GraphValue::Time(t, o) => write!(f, "{}{}", t, o),
            GraphValue::LocalDateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            GraphValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            GraphValue::Duration(d) => write!(
                f,
                "P{}M{}DT{}.{:09}S",
                d.months, d.days, d.seconds, d.nanoseconds
            ),
            GraphValue::Point(p) => match p.z {
                Some(z) => write!(f, "point({{srid:{}, x:{}, y:{}, z:{}}})", p.srid, p.x, p.y, z),
                None => write!(f, "point({{srid:{}, x:{}, y:{}}})", p.srid, p.x, p.y),
            },
            GraphValue::List(values) | GraphValue::Path(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            GraphValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            GraphValue::Node(n) => write!(f, "({}:{})", n.element_id, n.labels.join(":")),
            GraphValue::Relationship(r) => write!(f, "[{}:{}]", r.element_id, r.rel_type),
        }
    }
}

impl From<&str> for GraphValue {
    fn from(value: &str) -> Self {
        GraphValue::String(value.to_string())
    }
}

impl From<String> for GraphValue {
    fn from(value: String) -> Self {
        GraphValue::String(value)
    }
}

impl From<i64> for GraphValue {
    fn from(value: i64) -> Self {
        GraphValue::Integer(value)
    }
}

impl From<f64> for GraphValue {
    fn from(value: f64) -> Self {
        GraphValue::Float(value)
    }
}

impl From<bool> for GraphValue {
    fn from(value: bool) -> Self {
        GraphValue::Boolean(value)
    }
}

static NULL_VALUE: GraphValue = GraphValue::Null;

/// Update statistics reported with a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCounters {
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub properties_set: u64,
}

impl UpdateCounters {
    /// Number of entities touched, the way an update count is reported to relational callers.
    pub fn affected(&self) -> u64 {
        let entities = self.nodes_created
            + self.nodes_deleted
            + self.relationships_created
            + self.relationships_deleted;
        if entities > 0 {
            entities
        } else {
            self.properties_set
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryType {
    #[default]
    Read,
    Write,
    ReadWrite,
    Schema,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub query_type: QueryType,
    pub counters: UpdateCounters,
}

/// Fully materialised result of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub keys: Vec<String>,
    pub rows: Vec<Vec<GraphValue>>,
    pub summary: ResultSummary,
}

impl QueryResult {
    pub fn new(keys: Vec<String>, rows: Vec<Vec<GraphValue>>) -> Self {
        Self {
            keys,
            rows,
            summary: ResultSummary::default(),
        }
    }

    pub fn column_index(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Value of `key` in `row`, `Null` when either is missing.
    pub fn value<'a>(&'a self, row: &'a [GraphValue], key: &str) -> &'a GraphValue {
        self.column_index(key)
            .and_then(|i| row.get(i))
            .unwrap_or(&NULL_VALUE)
    }
}

/// Runs Cypher against the graph.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphExecutor: Send + Sync {
    async fn execute(
        &self,
        query: &str,
        params: &Parameters,
    ) -> Result<QueryResult, ExecutorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affected_prefers_entity_counts() {
        let counters = UpdateCounters {
            nodes_created: 1,
            relationships_created: 1,
            properties_set: 4,
            ..Default::default()
        };
        assert_eq!(counters.affected(), 2);

        let counters = UpdateCounters {
            properties_set: 3,
            ..Default::default()
        };
        assert_eq!(counters.affected(), 3);
    }

    #[test]
    fn test_value_lookup_by_key() {
        let result = QueryResult::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![GraphValue::Integer(1), GraphValue::from("x")]],
        );
        let row = &result.rows[0];
        assert_eq!(result.value(row, "b"), &GraphValue::from("x"));
        assert!(result.value(row, "missing").is_null());
    }

    #[test]
    fn test_executor_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let err = ExecutorError::new("Neo.TransientError.General", "boom").with_cause(io);
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "Neo.TransientError.General: boom");
    }
}
