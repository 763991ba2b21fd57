use sqlgraph::config::TranslatorConfig;
use sqlgraph::executor::{GraphValue, QueryResult};
use sqlgraph::metadata::MetadataError;

use super::fixtures::{connect, MovieGraph};

fn column_values(result: &QueryResult, key: &str) -> Vec<String> {
    result
        .rows
        .iter()
        .map(|row| result.value(row, key).to_string())
        .collect()
}

#[tokio::test]
async fn test_sampled_tables_are_listed() {
    let graph = MovieGraph::new();
    let client = connect(&graph, TranslatorConfig::default()).await;

    let tables = client.metadata().get_tables(None, Some("public"), None, None).unwrap();
    assert_eq!(
        column_values(&tables, "TABLE_NAME"),
        vec!["Movie", "Person", "Person_ACTED_IN_Movie"]
    );
    assert_eq!(
        column_values(&tables, "TABLE_TYPE"),
        vec!["TABLE", "TABLE", "RELATIONSHIP"]
    );
    assert_eq!(column_values(&tables, "TABLE_CAT"), vec!["neo4j"; 3]);
}

#[tokio::test]
async fn test_relationship_columns_follow_endpoint_order() {
    let graph = MovieGraph::new();
    let client = connect(&graph, TranslatorConfig::default()).await;

    let columns = client
        .metadata()
        .get_columns(None, None, Some("Person\\_ACTED\\_IN\\_Movie"), None)
        .unwrap();
    assert_eq!(
        column_values(&columns, "COLUMN_NAME"),
        vec!["v$id", "v$start_id", "v$end_id", "born", "name", "released", "title", "roles"]
    );
    assert_eq!(
        column_values(&columns, "SCOPE_TABLE"),
        vec!["NULL", "NULL", "NULL", "Person", "Person", "Movie", "Movie", "NULL"]
    );
    assert_eq!(
        column_values(&columns, "TYPE_NAME")[3..5],
        ["INTEGER".to_string(), "STRING".to_string()]
    );
}

#[tokio::test]
async fn test_keys_from_constraints_and_endpoints() {
    let graph = MovieGraph::new();
    let client = connect(&graph, TranslatorConfig::default()).await;
    let metadata = client.metadata();

    let movie = metadata.get_primary_keys(Some("neo4j"), None, "Movie").unwrap();
    assert_eq!(column_values(&movie, "COLUMN_NAME"), vec!["title"]);
    assert_eq!(column_values(&movie, "PK_NAME"), vec!["movie_title"]);

    let person = metadata.get_primary_keys(None, None, "Person").unwrap();
    assert_eq!(column_values(&person, "COLUMN_NAME"), vec!["v$id"]);

    let imported = metadata
        .get_imported_keys(None, None, "Person_ACTED_IN_Movie")
        .unwrap();
    assert_eq!(column_values(&imported, "PKTABLE_NAME"), vec!["Person", "Movie"]);
    let exported = metadata.get_exported_keys(None, None, "Person").unwrap();
    assert_eq!(column_values(&exported, "FKCOLUMN_NAME"), vec!["v$start_id"]);
}

#[tokio::test]
async fn test_optional_metadata_failure_is_empty() {
    let graph = MovieGraph::new();
    let client = connect(&graph, TranslatorConfig::default()).await;

    let indexes = client.metadata().get_index_info(None, None, "Movie", false).unwrap();
    assert!(indexes.rows.is_empty());
    assert_eq!(indexes.keys.len(), 13);
}

#[tokio::test]
async fn test_procedures_are_listed() {
    let graph = MovieGraph::new();
    let client = connect(&graph, TranslatorConfig::default()).await;
    let metadata = client.metadata();

    let procedures = metadata.get_procedures(None, None, Some("db.%")).unwrap();
    assert_eq!(column_values(&procedures, "PROCEDURE_NAME"), vec!["db.labels"]);
    let columns = metadata.get_procedure_columns(None, None, Some("db.labels"), None).unwrap();
    assert_eq!(column_values(&columns, "COLUMN_NAME"), vec!["label"]);
    assert!(metadata.get_functions(None, None, None).unwrap().rows.is_empty());

    let compiled = client.translate("CALL db.labels()").unwrap();
    assert_eq!(compiled.cypher, "CALL db.labels()");
}

#[tokio::test]
async fn test_unknown_catalog_and_schema_are_rejected() {
    let graph = MovieGraph::new();
    let config = TranslatorConfig {
        database_name: "movies".to_string(),
        ..Default::default()
    };
    let client = connect(&graph, config).await;
    let metadata = client.metadata();

    assert_eq!(metadata.get_catalogs().rows, vec![vec![GraphValue::from("movies")]]);
    assert!(metadata.get_tables(Some("movies"), None, None, None).is_ok());
    assert!(matches!(
        metadata.get_tables(Some("neo4j"), None, None, None),
        Err(MetadataError::UnknownCatalog { .. })
    ));
    assert!(matches!(
        metadata.get_columns(None, Some("dbo"), None, None),
        Err(MetadataError::UnknownSchema(_))
    ));
}

#[tokio::test]
async fn test_empty_schema_pattern_lists_nothing() {
    let graph = MovieGraph::new();
    let client = connect(&graph, TranslatorConfig::default()).await;
    let metadata = client.metadata();

    let tables = metadata.get_tables(None, Some(""), None, None).unwrap();
    assert!(tables.rows.is_empty());
    assert_eq!(tables.keys.len(), 10);
    assert!(metadata.get_columns(None, Some(""), None, None).unwrap().rows.is_empty());
    assert!(metadata.get_schemas(None, Some("")).unwrap().rows.is_empty());
    assert!(metadata.get_procedures(None, Some(""), None).unwrap().rows.is_empty());

    assert_eq!(metadata.get_tables(None, Some("public"), None, None).unwrap().rows.len(), 3);
}
