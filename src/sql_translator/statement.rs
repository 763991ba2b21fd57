//! SQL front end: a token-level pre-pass followed by sqlparser.
//!
//! The pre-pass rewrites the bits of the accepted dialect that the generic SQL
//! grammar does not understand (named parameters, qualified INSERT columns,
//! `ON DUPLICATE KEY IGNORE`, `//` line comments) and produces the
//! whitespace-normalised text used as translation cache key.

use sqlparser::ast::{
    Assignment, Delete, Function, Insert, ObjectName, Query, SelectItem, Statement, TableWithJoins,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace, Word};

use super::errors::TranslationError;

/// Parameters a statement references, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ParameterShape {
    pub positional: usize,
    pub named: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PreparedStatement {
    /// Rewritten, whitespace-normalised SQL.
    pub text: String,
    pub shape: ParameterShape,
}

/// One parsed SQL statement, dispatched on by the translator.
#[derive(Debug, Clone)]
pub(crate) enum SqlStatement {
    Query(Box<Query>),
    Insert(Box<Insert>),
    Update {
        table: TableWithJoins,
        assignments: Vec<Assignment>,
        /// `UPDATE ... FROM` was written; it is rejected, only its presence matters.
        has_from: bool,
        selection: Option<sqlparser::ast::Expr>,
        returning: Option<Vec<SelectItem>>,
    },
    Delete(Box<Delete>),
    Truncate(Vec<ObjectName>),
    Call(Function),
    Empty,
}

impl TryFrom<Statement> for SqlStatement {
    type Error = TranslationError;

    fn try_from(statement: Statement) -> Result<Self, Self::Error> {
        match statement {
            Statement::Query(query) => Ok(SqlStatement::Query(query)),
            Statement::Insert(insert) => Ok(SqlStatement::Insert(Box::new(insert))),
            Statement::Update {
                table,
                assignments,
                from,
                selection,
                returning,
                ..
            } => Ok(SqlStatement::Update {
                table,
                assignments,
                has_from: from.is_some(),
                selection,
                returning,
            }),
            Statement::Delete(delete) => Ok(SqlStatement::Delete(Box::new(delete))),
            Statement::Truncate { table_names, .. } => Ok(SqlStatement::Truncate(
                table_names.into_iter().map(|t| t.name).collect(),
            )),
            Statement::Call(function) => Ok(SqlStatement::Call(function)),
            other => Err(TranslationError::Unsupported(format!(
                "statement `{}`",
                first_words(&other.to_string())
            ))),
        }
    }
}

fn first_words(text: &str) -> String {
    text.split_whitespace().take(3).collect::<Vec<_>>().join(" ")
}

fn is_keyword(token: &Token, keyword: Keyword) -> bool {
    matches!(token, Token::Word(Word { keyword: k, quote_style: None, .. }) if *k == keyword)
}

/// Tokenises `sql`, applies the rewrites and records the parameter shape.
pub(crate) fn prepare(sql: &str, named_param_prefix: char) -> Result<PreparedStatement, TranslationError> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .with_unescape(false)
        .tokenize()
        .map_err(|e| TranslationError::parse_error(e.into()))?;

    let tokens = strip_line_comments(tokens);
    let tokens = collapse_whitespace(tokens);
    let (tokens, shape) = rewrite_parameters(tokens, named_param_prefix)?;
    let tokens = qualify_insert_columns(tokens);
    let tokens = rewrite_duplicate_key_ignore(tokens);

    let text = tokens
        .iter()
        .map(|t| t.to_string())
        .collect::<String>()
        .trim()
        .to_string();
    Ok(PreparedStatement { text, shape })
}

/// `//` starts a comment running to the end of the line.
fn strip_line_comments(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut in_comment = false;
    for token in tokens {
        match token {
            Token::DuckIntDiv => in_comment = true,
            Token::Whitespace(Whitespace::Newline) if in_comment => {
                in_comment = false;
                out.push(token);
            }
            _ if in_comment => {}
            _ => out.push(token),
        }
    }
    out
}

fn collapse_whitespace(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let Token::Whitespace(_) = token {
            if !matches!(out.last(), None | Some(Token::Whitespace(_))) {
                out.push(Token::Whitespace(Whitespace::Space));
            }
        } else {
            out.push(token);
        }
    }
    if matches!(out.last(), Some(Token::Whitespace(_))) {
        out.pop();
    }
    out
}

fn rewrite_parameters(
    tokens: Vec<Token>,
    prefix: char,
) -> Result<(Vec<Token>, ParameterShape), TranslationError> {
    let mut shape = ParameterShape::default();
    let mut out = Vec::with_capacity(tokens.len());
    let mut next_positional = 0usize;
    let named = |name: &str, shape: &mut ParameterShape| {
        if !shape.named.iter().any(|n| n == name) {
            shape.named.push(name.to_string());
        }
        Token::Placeholder(format!("${}", name))
    };

    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        match token {
            Token::Placeholder(p) if p.starts_with('?') => {
                let index = match p[1..].parse::<usize>() {
                    Ok(i) => i,
                    Err(_) => {
                        next_positional += 1;
                        next_positional
                    }
                };
                shape.positional = shape.positional.max(index);
                out.push(Token::Placeholder(format!("${}", index)));
            }
            Token::Placeholder(p) if p.starts_with('$') => {
                let name = &p[1..];
                if let Ok(index) = name.parse::<usize>() {
                    shape.positional = shape.positional.max(index);
                    out.push(Token::Placeholder(p));
                } else if prefix == '$' {
                    out.push(named(name, &mut shape));
                } else {
                    return Err(TranslationError::InvalidParameter {
                        name: p,
                        prefix,
                    });
                }
            }
            Token::Colon if prefix == ':' => match iter.peek() {
                Some(Token::Word(w)) if w.quote_style.is_none() => {
                    let name = w.value.clone();
                    iter.next();
                    out.push(named(&name, &mut shape));
                }
                _ => out.push(Token::Colon),
            },
            Token::Word(w) if prefix == '@' && w.quote_style.is_none() && w.value.len() > 1 && w.value.starts_with('@') => {
                out.push(named(&w.value[1..], &mut shape));
            }
            other => out.push(other),
        }
    }
    Ok((out, shape))
}

/// `INSERT INTO t (Start.id, End.id)`: joins dotted column names into one
/// quoted identifier so the generic grammar accepts them.
fn qualify_insert_columns(tokens: Vec<Token>) -> Vec<Token> {
    let first = tokens.iter().position(|t| !matches!(t, Token::Whitespace(_)));
    let Some(first) = first else {
        return tokens;
    };
    if !is_keyword(&tokens[first], Keyword::INSERT) {
        return tokens;
    }
    let open = tokens.iter().enumerate().skip(first).find_map(|(i, t)| match t {
        Token::LParen => Some(Some(i)),
        t if is_keyword(t, Keyword::VALUES)
            || is_keyword(t, Keyword::SELECT)
            || is_keyword(t, Keyword::DEFAULT) =>
        {
            Some(None)
        }
        _ => None,
    });
    let Some(Some(open)) = open else {
        return tokens;
    };

    let mut out: Vec<Token> = tokens[..=open].to_vec();
    let mut index = open + 1;
    while index < tokens.len() {
        match &tokens[index] {
            Token::RParen => break,
            Token::Word(w)
                if matches!(tokens.get(index + 1), Some(Token::Period))
                    && matches!(tokens.get(index + 2), Some(Token::Word(_))) =>
            {
                let mut parts = vec![w.value.clone()];
                index += 1;
                while let (Some(Token::Period), Some(Token::Word(next))) =
                    (tokens.get(index), tokens.get(index + 1))
                {
                    parts.push(next.value.clone());
                    index += 2;
                }
                out.push(Token::make_word(&parts.join("."), Some('"')));
                continue;
            }
            other => out.push(other.clone()),
        }
        index += 1;
    }
    out.extend_from_slice(&tokens[index.min(tokens.len())..]);
    out
}

/// `ON DUPLICATE KEY IGNORE` is spelled `ON CONFLICT DO NOTHING` in the grammar we parse with.
fn rewrite_duplicate_key_ignore(tokens: Vec<Token>) -> Vec<Token> {
    let words: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| !matches!(t, Token::Whitespace(_)))
        .map(|(i, _)| i)
        .collect();
    let pattern = [Keyword::ON, Keyword::DUPLICATE, Keyword::KEY, Keyword::IGNORE];
    let found = words.windows(4).find(|w| {
        w.iter()
            .zip(pattern.iter())
            .all(|(i, k)| is_keyword(&tokens[*i], *k))
    });
    let Some(window) = found else {
        return tokens;
    };
    let (start, end) = (window[0], window[3]);
    let mut out = tokens[..start].to_vec();
    for (i, word) in ["ON", "CONFLICT", "DO", "NOTHING"].iter().enumerate() {
        if i > 0 {
            out.push(Token::Whitespace(Whitespace::Space));
        }
        out.push(Token::make_keyword(word));
    }
    out.extend_from_slice(&tokens[end + 1..]);
    out
}

/// Parses prepared text into exactly one statement.
pub(crate) fn parse(prepared: &PreparedStatement) -> Result<SqlStatement, TranslationError> {
    let statements =
        Parser::parse_sql(&GenericDialect {}, &prepared.text).map_err(TranslationError::parse_error)?;
    let mut statements = statements.into_iter();
    match (statements.next(), statements.next()) {
        (None, _) => Ok(SqlStatement::Empty),
        (Some(statement), None) => SqlStatement::try_from(statement),
        (Some(_), Some(_)) => Err(TranslationError::Unsupported(
            "more than one statement in a single translation".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(sql: &str, prefix: char) -> String {
        prepare(sql, prefix).unwrap().text
    }

    #[test]
    fn test_whitespace_is_normalised_outside_literals() {
        assert_eq!(
            text("SELECT  a\n FROM   t WHERE b = 'x  y'", ':'),
            "SELECT a FROM t WHERE b = 'x  y'"
        );
    }

    #[test]
    fn test_string_escapes_survive() {
        assert_eq!(
            text("SELECT * FROM t WHERE name = 'it''s'", ':'),
            "SELECT * FROM t WHERE name = 'it''s'"
        );
    }

    #[test]
    fn test_positional_parameters_are_numbered() {
        let prepared = prepare("SELECT * FROM t WHERE a = ? AND b = ?", ':').unwrap();
        assert_eq!(prepared.text, "SELECT * FROM t WHERE a = $1 AND b = $2");
        assert_eq!(prepared.shape.positional, 2);
    }

    #[test]
    fn test_named_parameters_by_prefix() {
        let prepared = prepare("SELECT * FROM t WHERE a = :name AND b = :name", ':').unwrap();
        assert_eq!(prepared.text, "SELECT * FROM t WHERE a = $name AND b = $name");
        assert_eq!(prepared.shape.named, vec!["name".to_string()]);

        assert_eq!(text("SELECT * FROM t WHERE a = @x", '@'), "SELECT * FROM t WHERE a = $x");
        assert_eq!(text("SELECT * FROM t WHERE a = $x", '$'), "SELECT * FROM t WHERE a = $x");
    }

    #[test]
    fn test_dollar_names_need_dollar_prefix() {
        let err = prepare("SELECT * FROM t WHERE a = $x", ':').unwrap_err();
        assert!(matches!(err, TranslationError::InvalidParameter { .. }));
        // Numbered dollar parameters are always positional.
        assert_eq!(prepare("SELECT $1", ':').unwrap().shape.positional, 1);
    }

    #[test]
    fn test_line_comments_are_dropped() {
        assert_eq!(text("// header\nSELECT 1", ':'), "SELECT 1");
    }

    #[test]
    fn test_qualified_insert_columns() {
        assert_eq!(
            text(
                "INSERT INTO Supplier_SUPPLIES_Product (Supplier.id, Product.id) VALUES (1, 2)",
                ':'
            ),
            r#"INSERT INTO Supplier_SUPPLIES_Product ("Supplier.id", "Product.id") VALUES (1, 2)"#
        );
    }

    #[test]
    fn test_duplicate_key_ignore() {
        assert_eq!(
            text("INSERT INTO Person (name) VALUES ('a') ON DUPLICATE KEY IGNORE", ':'),
            "INSERT INTO Person (name) VALUES ('a') ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn test_parse_dispatch() {
        let parsed = parse(&prepare("TRUNCATE TABLE Person", ':').unwrap()).unwrap();
        assert!(matches!(parsed, SqlStatement::Truncate(names) if names.len() == 1));
        let parsed = parse(&prepare("   ", ':').unwrap()).unwrap();
        assert!(matches!(parsed, SqlStatement::Empty));
        let err = parse(&prepare("SELEC 1", ':').unwrap()).unwrap_err();
        assert_eq!(err.status_code(), "42000");
    }
}
