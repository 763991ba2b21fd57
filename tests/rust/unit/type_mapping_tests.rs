use chrono::{NaiveDate, NaiveDateTime};
use sqlgraph::executor::{GraphValue, QueryResult};
use sqlgraph::graph_catalog::{GraphType, SqlType};
use sqlgraph::{RowSet, SqlGraphError};
use test_case::test_case;

#[test_case("Long", GraphType::Integer ; "legacy long")]
#[test_case("Double", GraphType::Float ; "legacy double")]
#[test_case("StringArray", GraphType::list_of(GraphType::String, false) ; "legacy array")]
#[test_case("LIST<STRING NOT NULL>", GraphType::list_of(GraphType::String, false) ; "non null list")]
#[test_case("list<integer>", GraphType::list_of(GraphType::Integer, true) ; "lower case list")]
#[test_case("ZONED DATETIME", GraphType::DateTime ; "zoned datetime")]
#[test_case("LocalDateTime", GraphType::LocalDateTime ; "legacy local datetime")]
fn test_type_names_parse(name: &str, expected: GraphType) {
    assert_eq!(name.parse::<GraphType>().unwrap(), expected);
}

#[test]
fn test_unknown_type_name() {
    let err = "Geometry".parse::<GraphType>().unwrap_err();
    assert_eq!(err.status_code(), "HY000");
}

#[test_case(GraphType::Integer, SqlType::BigInt, -5, Some(19))]
#[test_case(GraphType::Float, SqlType::Double, 8, Some(15))]
#[test_case(GraphType::String, SqlType::Varchar, 12, None)]
#[test_case(GraphType::Node, SqlType::Struct, 2002, None)]
#[test_case(GraphType::list_of(GraphType::Any, true), SqlType::Array, 2003, None)]
#[test_case(GraphType::Duration, SqlType::Other, 1111, None)]
fn test_relational_exposure(graph: GraphType, sql: SqlType, code: i32, precision: Option<u32>) {
    assert_eq!(graph.sql_type(), sql);
    assert_eq!(sql.code(), code);
    assert_eq!(graph.precision(), precision);
}

#[test]
fn test_types_deserialize_from_view_documents() {
    let types: Vec<GraphType> = serde_json::from_str(r#"["STRING", "Long", "LIST<FLOAT>"]"#).unwrap();
    assert_eq!(
        types,
        vec![
            GraphType::String,
            GraphType::Integer,
            GraphType::list_of(GraphType::Float, true)
        ]
    );
    assert!(serde_json::from_str::<GraphType>(r#""Geometry""#).is_err());
}

fn rows() -> RowSet {
    let date = NaiveDate::from_ymd_opt(1999, 3, 31).unwrap();
    RowSet::from(QueryResult::new(
        vec!["big".into(), "title".into(), "released".into(), "tags".into()],
        vec![vec![
            GraphValue::Integer(i64::from(i32::MAX) + 1),
            GraphValue::from("The Matrix"),
            GraphValue::Date(date),
            GraphValue::List(vec!["action".into(), "sci-fi".into()]),
        ]],
    ))
}

#[test]
fn test_reads_through_row_set() {
    let rows = rows();
    assert_eq!(rows.get::<i64>(0, "big").unwrap(), 2_147_483_648);
    assert_eq!(rows.get::<f64>(0, "big").unwrap(), 2_147_483_648.0);
    assert_eq!(
        rows.get::<NaiveDateTime>(0, "released").unwrap().to_string(),
        "1999-03-31 00:00:00"
    );
    assert_eq!(
        rows.get::<Vec<String>>(0, "tags").unwrap(),
        vec!["action".to_string(), "sci-fi".to_string()]
    );
    // column lookup falls back to a case-insensitive match
    assert_eq!(rows.get::<String>(0, "TITLE").unwrap(), "The Matrix");
}

#[test_case("big", "22003" ; "narrowing out of range")]
#[test_case("title", "22018" ; "string is not numeric")]
#[test_case("tags", "22018" ; "list is not numeric")]
fn test_failed_integer_reads(column: &str, code: &str) {
    let err = rows().get::<i32>(0, column).unwrap_err();
    assert!(matches!(err, SqlGraphError::Type(_)));
    assert_eq!(err.status_code(), code);
}
