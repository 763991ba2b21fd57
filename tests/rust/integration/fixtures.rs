use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlgraph::config::TranslatorConfig;
use sqlgraph::executor::{
    ExecutorError, GraphExecutor, GraphValue, Parameters, QueryResult, QueryType, ResultSummary,
    UpdateCounters,
};
use sqlgraph::GraphSqlClient;

fn result(keys: &[&str], rows: Vec<Vec<GraphValue>>) -> QueryResult {
    QueryResult::new(keys.iter().map(|k| k.to_string()).collect(), rows)
}

fn map(entries: &[(&str, GraphValue)]) -> GraphValue {
    GraphValue::Map(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn strings(values: &[&str]) -> GraphValue {
    GraphValue::List(values.iter().map(|v| GraphValue::from(*v)).collect())
}

/// Person -[ACTED_IN]-> Movie, with a unique constraint on Movie.title and
/// no index listing permission.
#[derive(Default)]
pub struct MovieGraph {
    executed: Mutex<Vec<(String, Parameters)>>,
}

impl MovieGraph {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Statements other than the sampling queries, in execution order.
    pub fn statements(&self) -> Vec<(String, Parameters)> {
        self.executed.lock().unwrap().clone()
    }

    fn sampling(query: &str) -> Option<Result<QueryResult, ExecutorError>> {
        let answer = if query.starts_with("CALL db.labels") {
            result(&["label"], vec![vec!["Movie".into()], vec!["Person".into()]])
        } else if query.starts_with("CALL db.relationshipTypes") {
            result(&["relationshipType"], vec![vec!["ACTED_IN".into()]])
        } else if query.starts_with("MATCH (n:`Person`)") {
            result(
                &["properties"],
                vec![
                    vec![map(&[("name", "Keanu".into()), ("born", 1964i64.into())])],
                    vec![map(&[("name", "Carrie".into()), ("born", 1967i64.into())])],
                ],
            )
        } else if query.starts_with("MATCH (n:`Movie`)") {
            result(
                &["properties"],
                vec![vec![map(&[("title", "The Matrix".into()), ("released", 1999i64.into())])]],
            )
        } else if query.starts_with("MATCH (s)-[r:`ACTED_IN`]->(e) RETURN DISTINCT") {
            result(
                &["startLabels", "endLabels"],
                vec![vec![strings(&["Person"]), strings(&["Movie"])]],
            )
        } else if query.starts_with("MATCH (s)-[r:`ACTED_IN`]->(e) WITH") {
            result(
                &["startLabels", "endLabels", "properties"],
                vec![vec![
                    strings(&["Person"]),
                    strings(&["Movie"]),
                    map(&[("roles", strings(&["Neo"]))]),
                ]],
            )
        } else if query.starts_with("SHOW CONSTRAINTS") {
            result(
                &["name", "type", "entityType", "labelsOrTypes", "properties"],
                vec![vec![
                    "movie_title".into(),
                    "UNIQUENESS".into(),
                    "NODE".into(),
                    strings(&["Movie"]),
                    strings(&["title"]),
                ]],
            )
        } else if query.starts_with("SHOW INDEXES") {
            return Some(Err(ExecutorError::new(
                "Neo.ClientError.Security.Forbidden",
                "not allowed to list indexes",
            )));
        } else if query.starts_with("SHOW PROCEDURES") {
            result(
                &["name", "description", "argumentDescription", "returnDescription"],
                vec![vec![
                    "db.labels".into(),
                    "List all labels".into(),
                    GraphValue::List(vec![]),
                    GraphValue::List(vec![map(&[("name", "label".into()), ("type", "STRING".into())])]),
                ]],
            )
        } else if query.starts_with("SHOW FUNCTIONS") {
            result(&["name", "description", "argumentDescription", "returnDescription"], vec![])
        } else {
            return None;
        };
        Some(Ok(answer))
    }
}

#[async_trait]
impl GraphExecutor for MovieGraph {
    async fn execute(&self, query: &str, params: &Parameters) -> Result<QueryResult, ExecutorError> {
        if let Some(answer) = Self::sampling(query) {
            return answer;
        }
        self.executed
            .lock()
            .unwrap()
            .push((query.to_string(), params.clone()));

        if query.starts_with("CREATE") {
            return Ok(QueryResult {
                summary: ResultSummary {
                    query_type: QueryType::Write,
                    counters: UpdateCounters {
                        nodes_created: 1,
                        properties_set: 2,
                        ..Default::default()
                    },
                },
                ..Default::default()
            });
        }
        if query.starts_with("MATCH (person:Person)") {
            return Ok(result(
                &["name", "born"],
                vec![
                    vec!["Keanu".into(), 1964i64.into()],
                    vec!["Carrie".into(), GraphValue::Null],
                ],
            ));
        }
        Ok(QueryResult::default())
    }
}

pub async fn connect(graph: &Arc<MovieGraph>, config: TranslatorConfig) -> GraphSqlClient {
    GraphSqlClient::connect(graph.clone(), config).await.unwrap()
}
