use sqlparser::parser::ParserError;
use thiserror::Error;

/// Target operation a view was illegally used in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewRestriction {
    Join,
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for ViewRestriction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewRestriction::Join => write!(f, "Cypher-backed views cannot be used with a JOIN clause"),
            ViewRestriction::Insert => write!(f, "Cypher-backed views cannot be inserted to"),
            ViewRestriction::Update => write!(f, "Cypher-backed views cannot be updated"),
            ViewRestriction::Delete => write!(f, "Cypher-backed views cannot be deleted from"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Failed to parse SQL statement: {message}")]
    Parse {
        message: String,
        #[source]
        source: ParserError,
    },
    #[error("Unsupported SQL: {0}")]
    Unsupported(String),
    #[error("Parameter `{name}` is not a valid parameter, named parameters are introduced with `{prefix}`")]
    InvalidParameter { name: String, prefix: char },
    #[error("{0}")]
    View(ViewRestriction),
    #[error("Cannot resolve join predicate `{predicate}`: it does not pair identity columns of the joined tables")]
    AmbiguousJoin { predicate: String },
    #[error("Cannot join `{left}` with `{right}`: {left_label} and {right_label} are different labels")]
    LabelMismatch {
        left: String,
        right: String,
        left_label: String,
        right_label: String,
    },
    #[error("Unknown table or alias `{0}`")]
    UnknownTable(String),
    #[error("Unknown column `{0}`")]
    UnknownColumn(String),
    #[error("Procedure `{procedure}` does not declare a parameter named `{parameter}`")]
    UnknownParameter { procedure: String, parameter: String },
    #[error("{0}")]
    Mutation(String),
    #[error("Unsupported value for date/time extraction: {0}")]
    DateTimeField(String),
}

impl TranslationError {
    pub fn status_code(&self) -> &'static str {
        match self {
            TranslationError::Parse { .. }
            | TranslationError::InvalidParameter { .. }
            | TranslationError::AmbiguousJoin { .. }
            | TranslationError::LabelMismatch { .. }
            | TranslationError::UnknownColumn(_)
            | TranslationError::UnknownParameter { .. } => "42000",
            TranslationError::UnknownTable(_) => "42S02",
            TranslationError::Unsupported(_)
            | TranslationError::View(_)
            | TranslationError::Mutation(_)
            | TranslationError::DateTimeField(_) => "0A000",
        }
    }

    pub fn parse_error(source: ParserError) -> Self {
        let message = match &source {
            ParserError::TokenizerError(m) | ParserError::ParserError(m) => m.clone(),
            ParserError::RecursionLimitExceeded => "recursion limit exceeded".to_string(),
        };
        TranslationError::Parse { message, source }
    }

    /// Create an Unsupported error naming the construct and where it appeared
    ///
    /// # Example
    /// ```ignore
    /// TranslationError::unsupported_with_context("RIGHT JOIN", "in FROM clause")
    /// ```
    pub fn unsupported_with_context(construct: impl Into<String>, context: &str) -> Self {
        TranslationError::Unsupported(format!("{} {}", construct.into(), context))
    }
}
