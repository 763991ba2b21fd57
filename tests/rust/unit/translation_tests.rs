use sqlgraph::config::TranslatorConfig;
use sqlgraph::graph_catalog::{
    ColumnSource, GraphType, RelationshipInfo, SchemaSnapshot, VirtualColumn, VirtualTable,
    ELEMENT_ID_COLUMN,
};
use sqlgraph::sql_translator::{StatementKind, TranslationError, Translator};
use test_case::test_case;

fn movies() -> SchemaSnapshot {
    let mut snapshot = SchemaSnapshot {
        tables: vec![
            VirtualTable::node(
                "Movie",
                vec![
                    VirtualColumn::identity(ELEMENT_ID_COLUMN, ColumnSource::ElementId),
                    VirtualColumn::property("title", GraphType::String, false),
                    VirtualColumn::property("released", GraphType::Integer, true),
                ],
            ),
            VirtualTable::node(
                "Person",
                vec![
                    VirtualColumn::identity(ELEMENT_ID_COLUMN, ColumnSource::ElementId),
                    VirtualColumn::property("name", GraphType::String, false),
                    VirtualColumn::property("born", GraphType::Integer, true),
                ],
            ),
            VirtualTable::relationship_join(RelationshipInfo::new("Person", "ACTED_IN", "Movie"), vec![]),
        ],
        ..Default::default()
    };
    snapshot.table_mappings.insert("Customers".into(), "Customer".into());
    snapshot.table_mappings.insert("Orders".into(), "Order".into());
    snapshot
        .join_column_mappings
        .insert("Orders.CustomerID".into(), "PURCHASED".into());
    snapshot
}

fn translate(sql: &str) -> Result<String, TranslationError> {
    Translator::new(&TranslatorConfig::default())
        .translate(sql, &movies())
        .map(|compiled| compiled.cypher.clone())
}

#[test_case("SELECT 1", "RETURN 1" ; "no from clause")]
#[test_case(
    "SELECT name FROM Person LIMIT 10 OFFSET 5",
    "MATCH (person:Person) RETURN person.name AS name SKIP 5 LIMIT 10" ;
    "paging"
)]
#[test_case(
    "SELECT p, m FROM Person p JOIN Movie m USING (ACTED_IN)",
    "MATCH (p:Person)-[acted_in:ACTED_IN]->(m:Movie) RETURN p, m" ;
    "join using relationship type"
)]
#[test_case(
    "SELECT * FROM Orders o INNER JOIN Customers c ON o.CustomerID = c.CustomerID WHERE YEAR(o.OrderDate) = 1996",
    "MATCH (o:Order)<-[purchased:PURCHASED]-(c:Customer) WHERE o.OrderDate.year = 1996 RETURN *" ;
    "mapped join column"
)]
#[test_case(
    "SELECT * FROM (SELECT name FROM Person) t WHERE 1 = 0",
    "MATCH (person:Person) RETURN person.name AS name LIMIT 1" ;
    "result shape query"
)]
fn test_select(sql: &str, expected: &str) {
    assert_eq!(translate(sql).unwrap(), expected);
}

#[test_case(
    "INSERT INTO Movie (title) VALUES ('a') ON CONFLICT DO NOTHING",
    "MERGE (movie:Movie {title: 'a'})" ;
    "on conflict do nothing"
)]
#[test_case(
    "UPDATE Customers SET Phone = '000-4321' WHERE CustomerID = 'ILYA'",
    "MATCH (customers:Customer) WHERE customers.CustomerID = 'ILYA' SET customers.Phone = '000-4321'" ;
    "update mapped table"
)]
#[test_case(
    "DELETE FROM Person WHERE name = 'Ann'",
    "MATCH (person:Person) WHERE person.name = 'Ann' DETACH DELETE person" ;
    "delete node"
)]
#[test_case(
    "DELETE FROM Person_ACTED_IN_Movie WHERE v$person_id = 'x'",
    "MATCH (_lhs:Person)-[person_acted_in_movie:ACTED_IN]->(_rhs:Movie) WHERE elementId(_lhs) = 'x' DELETE person_acted_in_movie" ;
    "delete relationship only"
)]
#[test_case(
    "TRUNCATE TABLE Person",
    "MATCH (person:Person) DETACH DELETE person" ;
    "truncate"
)]
fn test_mutation(sql: &str, expected: &str) {
    assert_eq!(translate(sql).unwrap(), expected);
}

#[test]
fn test_statement_kinds_and_targets() {
    let translator = Translator::new(&TranslatorConfig::default());
    let snapshot = movies();
    let insert = translator
        .translate("INSERT INTO Person (name) VALUES (?)", &snapshot)
        .unwrap();
    assert_eq!(insert.kind, StatementKind::Insert);
    assert!(insert.kind.is_update());
    assert_eq!(insert.target.as_deref(), Some("Person"));
    assert_eq!(insert.parameter_names, vec!["1".to_string()]);

    let query = translator.translate("SELECT title FROM Movie", &snapshot).unwrap();
    assert!(!query.kind.is_update());
    assert_eq!(query.target, None);
}

#[test]
fn test_relationship_upsert_is_rejected() {
    let err = translate("INSERT INTO Person_ACTED_IN_Movie (Person.name, Movie.title) VALUES ('a', 'b') ON CONFLICT DO NOTHING")
        .unwrap_err();
    assert_eq!(err.status_code(), "0A000");
}

#[test]
fn test_multiple_statements_are_rejected() {
    let err = translate("SELECT 1; SELECT 2").unwrap_err();
    assert!(matches!(err, TranslationError::Unsupported(_)));
}

#[test]
fn test_always_escape_and_pretty() {
    let translator = Translator::new(&TranslatorConfig {
        always_escape_names: true,
        pretty_print: true,
        ..Default::default()
    });
    let compiled = translator
        .translate("SELECT title FROM Movie WHERE released > 1999", &movies())
        .unwrap();
    assert_eq!(
        compiled.cypher,
        "MATCH (movie:`Movie`) WHERE movie.released > 1999\nRETURN movie.title AS title"
    );
}
