//! Statements that go to the graph as Cypher without being translated.
//!
//! Two cases: the caller marks a statement with [`FORCE_CYPHER_HINT`], or a
//! Spark JDBC source wraps a Cypher query into its
//! `SELECT * FROM (<query>) SPARK_GEN_SUBQ_0 WHERE 1=0` schema lookup.
use std::sync::LazyLock;

use regex::Regex;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

pub const FORCE_CYPHER_HINT: &str = "/*+ NEO4J FORCE_CYPHER */";

/// A hint, optionally wrapped in quotes up to the nearest quote characters on
/// either side.
static HINT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(['`"])?[^'`"]*/\*\+ NEO4J FORCE_CYPHER \*/[^'`"]*(['`"])?"#)
        .expect("hint pattern is valid")
});

static SPARK_SUBQUERY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*SELECT\s+\*\s+FROM\s+\((.*?)\)\s+SPARK_GEN_SUBQ_0.*$")
        .expect("spark subquery pattern is valid")
});

/// Clauses a Cypher statement can start with.
const CYPHER_CLAUSES: &[&str] = &[
    "MATCH", "OPTIONAL", "RETURN", "UNWIND", "MERGE", "CREATE", "CALL", "WITH", "USE", "FOREACH",
];

/// True when the hint appears outside a quoted literal or identifier.
pub fn forces_cypher(sql: &str) -> bool {
    HINT_PATTERN.captures_iter(sql).any(|c| match (c.get(1), c.get(2)) {
        (Some(open), Some(close)) => open.as_str() != close.as_str(),
        _ => true,
    })
}

/// The Cypher query inside a Spark schema lookup, if there is one.
pub fn spark_subquery(sql: &str) -> Option<&str> {
    if !sql.to_uppercase().contains("SPARK_GEN_SUBQ") {
        return None;
    }
    let inner = SPARK_SUBQUERY_PATTERN.captures(sql)?.get(1)?.as_str().trim();
    looks_like_cypher(inner).then_some(inner)
}

/// Starts with a Cypher clause and is not valid SQL.
fn looks_like_cypher(query: &str) -> bool {
    let first = query
        .split(|c: char| c.is_whitespace() || c == '(' || c == '{')
        .next()
        .unwrap_or_default()
        .to_uppercase();
    CYPHER_CLAUSES.contains(&first.as_str()) && Parser::parse_sql(&GenericDialect {}, query).is_err()
}

/// The statement to send for a Spark schema lookup over Cypher.
pub fn spark_rewrite(subquery: &str) -> String {
    format!("CALL {{{}}} RETURN * LIMIT 1", subquery)
}

/// `$name` parameters of a Cypher statement, in order of first appearance.
/// Quoted text and comments are skipped.
pub fn cypher_parameters(cypher: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut chars = cypher.chars().peekable();
    let mut quote: Option<char> = None;
    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(_), '\\') => {
                chars.next();
            }
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, '/') if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = ' ';
                for c in chars.by_ref() {
                    if previous == '*' && c == '/' {
                        break;
                    }
                    previous = c;
                }
            }
            (None, '/') if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            (None, '$') => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if !(c.is_alphanumeric() || c == '_') {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                if !name.is_empty() && !names.contains(&name) {
                    names.push(name);
                }
            }
            (None, _) => {}
        }
    }
    names
}
