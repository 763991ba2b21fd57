use std::io::Write;

use sqlgraph::config::{CliConfig, NameCase, TranslatorConfig};
use sqlgraph::graph_catalog::{SchemaCatalog, SchemaSnapshot};
use sqlgraph::sql_translator::Translator;

fn cli(table_mappings: Option<&str>, join_column_mappings: Option<&str>) -> CliConfig {
    CliConfig {
        view_definitions: None,
        table_mappings: table_mappings.map(str::to_string),
        join_column_mappings: join_column_mappings.map(str::to_string),
        sample_size: 100,
        always_escape: false,
        pretty: false,
        param_prefix: ':',
        database: "neo4j".to_string(),
    }
}

#[test]
fn test_cli_mappings_reach_the_translator() {
    let config = TranslatorConfig::from_cli(cli(
        Some("Customers:Customer;Orders:Order"),
        Some("Orders.CustomerID:PURCHASED"),
    ))
    .unwrap();
    assert_eq!(config.relationship_sample_size, 100);

    let catalog = SchemaCatalog::from_snapshot(SchemaSnapshot::empty(), config.catalog_settings());
    let compiled = Translator::new(&config)
        .translate(
            "SELECT c.CompanyName FROM Customers c JOIN Orders o ON o.CustomerID = c.CustomerID",
            &catalog.current(),
        )
        .unwrap();
    assert_eq!(
        compiled.cypher,
        "MATCH (c:Customer)-[purchased:PURCHASED]->(o:Order) RETURN c.CompanyName"
    );
}

#[test]
fn test_malformed_cli_mapping_is_rejected() {
    let err = TranslatorConfig::from_cli(cli(Some("Customers"), None)).unwrap_err();
    assert_eq!(err.status_code(), "HY000");
}

#[test]
fn test_yaml_file_then_cli_override() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "database_name: movies\nparse_name_case: lower\ntable_to_label_mappings:\n  People: Person\n"
    )
    .unwrap();

    let mut config = TranslatorConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.database_name, "movies");
    assert_eq!(config.parse_name_case, NameCase::Lower);
    assert_eq!(config.node_sample_size, 1000);

    config.merge(TranslatorConfig::from_cli(cli(Some("Films:Movie"), None)).unwrap());
    assert_eq!(config.table_to_label_mappings.len(), 2);
    assert_eq!(config.database_name, "neo4j");
}
