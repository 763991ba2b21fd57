use std::io::Write;

use sqlgraph::config::TranslatorConfig;
use sqlgraph::executor::{GraphValue, Parameters};
use sqlgraph::sql_translator::{StatementKind, TranslationError};
use sqlgraph::SqlGraphError;

use super::fixtures::{connect, MovieGraph};

fn params(entries: &[(&str, GraphValue)]) -> Parameters {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn test_query_runs_translated_cypher() {
    let graph = MovieGraph::new();
    let client = connect(&graph, TranslatorConfig::default()).await;

    let rows = client
        .execute_query(
            "SELECT name, born FROM Person WHERE born > ? ORDER BY name",
            &params(&[("1", GraphValue::Integer(1960))]),
        )
        .await
        .unwrap();

    assert_eq!(rows.keys(), ["name".to_string(), "born".to_string()]);
    assert_eq!(rows.get::<String>(0, "name").unwrap(), "Keanu");
    assert_eq!(rows.get::<i32>(0, "born").unwrap(), 1964);
    assert_eq!(rows.get::<Option<i64>>(1, "born").unwrap(), None);

    let statements = graph.statements();
    assert_eq!(statements.len(), 1);
    let (cypher, sent) = &statements[0];
    assert_eq!(
        cypher,
        "MATCH (person:Person) WHERE person.born > $1 RETURN person.name AS name, person.born AS born ORDER BY person.name"
    );
    assert_eq!(sent.get("1"), Some(&GraphValue::Integer(1960)));
}

#[tokio::test]
async fn test_named_parameters_use_configured_prefix() {
    let graph = MovieGraph::new();
    let config = TranslatorConfig {
        named_param_prefix: '$',
        ..Default::default()
    };
    let client = connect(&graph, config).await;

    client
        .execute_query(
            "SELECT name FROM Person WHERE name = $name",
            &params(&[("name", "Keanu".into())]),
        )
        .await
        .unwrap();
    let (cypher, sent) = &graph.statements()[0];
    assert!(cypher.ends_with("WHERE person.name = $name RETURN person.name AS name"));
    assert_eq!(sent.get("name"), Some(&GraphValue::from("Keanu")));
}

#[tokio::test]
async fn test_insert_reports_created_entities() {
    let graph = MovieGraph::new();
    let client = connect(&graph, TranslatorConfig::default()).await;

    let count = client
        .execute_update(
            "INSERT INTO Person (name, born) VALUES (?, ?)",
            &params(&[("1", "Laurence".into()), ("2", GraphValue::Integer(1961))]),
        )
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(
        graph.statements()[0].0,
        "CREATE (person:Person {name: $1, born: $2})"
    );
}

#[tokio::test]
async fn test_join_through_relationship_table() {
    let graph = MovieGraph::new();
    let client = connect(&graph, TranslatorConfig::default()).await;

    let compiled = client
        .translate(
            "SELECT p.name, m.title FROM Person p \
             JOIN Person_ACTED_IN_Movie r ON p.v$id = r.v$start_id \
             JOIN Movie m ON r.v$end_id = m.v$id",
        )
        .unwrap();
    assert_eq!(compiled.kind, StatementKind::Query);
    assert!(compiled.cypher.starts_with("MATCH (p:Person)-[r:ACTED_IN]->(m:Movie)"));
    assert!(compiled.cypher.ends_with("RETURN p.name, m.title"));
}

#[tokio::test]
async fn test_views_from_document() {
    let mut document = tempfile::NamedTempFile::new().unwrap();
    write!(
        document,
        r#"[{{"name": "people", "query": "MATCH (n:Person) RETURN n.name AS name",
             "columns": [{{"name": "name", "propertyName": "name", "type": "STRING"}}]}}]"#
    )
    .unwrap();

    let graph = MovieGraph::new();
    let config = TranslatorConfig {
        view_definitions: Some(document.path().to_string_lossy().into_owned()),
        ..Default::default()
    };
    let client = connect(&graph, config).await;

    let compiled = client.translate("SELECT name FROM people").unwrap();
    assert_eq!(compiled.cypher, "CALL {MATCH (n:Person) RETURN n.name AS name} RETURN name");

    let err = client.translate("DELETE FROM people").unwrap_err();
    assert!(matches!(err, SqlGraphError::Translation(TranslationError::View(_))));
    assert_eq!(err.status_code(), "0A000");

    // views survive a resample
    client.refresh().await.unwrap();
    assert!(client.translate("SELECT name FROM people").is_ok());
}

#[tokio::test]
async fn test_refresh_invalidates_cached_translations() {
    let graph = MovieGraph::new();
    let client = connect(&graph, TranslatorConfig::default()).await;

    let first = client.translate("SELECT title FROM Movie").unwrap();
    let again = client.translate("SELECT title FROM Movie").unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &again));

    assert_eq!(client.refresh().await.unwrap(), 2);
    let recompiled = client.translate("SELECT title FROM Movie").unwrap();
    assert!(!std::sync::Arc::ptr_eq(&first, &recompiled));
    assert_eq!(first.cypher, recompiled.cypher);
    assert_eq!(client.cache_metrics().invalidations, 1);
}

#[tokio::test]
async fn test_disabled_cache_still_translates() {
    let graph = MovieGraph::new();
    let config = TranslatorConfig {
        enable_cache: false,
        ..Default::default()
    };
    let client = connect(&graph, config).await;
    client.translate("SELECT title FROM Movie").unwrap();
    client.translate("SELECT title FROM Movie").unwrap();
    assert_eq!(client.cache_metrics().size, 0);
}

#[tokio::test]
async fn test_parse_error_keeps_cause() {
    let graph = MovieGraph::new();
    let client = connect(&graph, TranslatorConfig::default()).await;

    let err = client
        .execute_query("SELEC name FROM Person", &Parameters::new())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), "42000");
    assert!(std::error::Error::source(&err).is_some());
    assert!(graph.statements().is_empty());
}

#[tokio::test]
async fn test_forced_cypher_is_sent_as_written() {
    let graph = MovieGraph::new();
    let client = connect(&graph, TranslatorConfig::default()).await;

    let cypher = "MATCH (person:Person) WHERE person.born > $born RETURN person.name AS name /*+ NEO4J FORCE_CYPHER */";
    let rows = client
        .execute_query(cypher, &params(&[("born", GraphValue::Integer(1960))]))
        .await
        .unwrap();
    assert_eq!(rows.get::<String>(0, "name").unwrap(), "Keanu");

    let (sent, bound) = &graph.statements()[0];
    assert_eq!(sent, cypher);
    assert_eq!(bound.get("born"), Some(&GraphValue::Integer(1960)));

    let err = client.execute_query(cypher, &Parameters::new()).await.unwrap_err();
    assert!(matches!(err, SqlGraphError::MissingParameter(name) if name == "born"));
}
