//! SQL expression to Cypher expression translation.
//!
//! Column references are handed to a [`ColumnResolver`]; everything else is a
//! structural rewrite: operators, `LIKE` patterns, casts, temporal accessors
//! and the function registry.

use sqlparser::ast::{
    BinaryOperator, CeilFloorKind, DataType, DateTimeField, DuplicateTreatment, Expr as SqlExpr,
    Function, FunctionArg, FunctionArgExpr, FunctionArguments, Ident, TimezoneInfo, TrimWhereField,
    UnaryOperator, Value,
};

use super::cypher::{BinaryOp, Expr, Literal, UnaryOp};
use super::errors::TranslationError;
use super::function_registry::{get_function_mapping, is_aggregate};
use super::scope::Scope;

/// Turns (possibly qualified) column references into Cypher expressions.
pub(crate) trait ColumnResolver {
    fn resolve_column(&self, idents: &[Ident]) -> Result<Expr, TranslationError>;
}

impl ColumnResolver for Scope<'_> {
    fn resolve_column(&self, idents: &[Ident]) -> Result<Expr, TranslationError> {
        // Without a FROM clause a bare name can only be a Cypher variable.
        if self.bindings.is_empty() {
            if let [single] = idents {
                return Ok(Expr::var(self.name(single)));
            }
        }
        self.resolve(idents)
    }
}

/// True when the expression aggregates (`count(*)`, `sum(..)`, ...).
pub(crate) fn contains_aggregate(expr: &Expr) -> bool {
    expr.any(&|e| match e {
        Expr::CountStar => true,
        Expr::Function { name, .. } => is_aggregate(name),
        _ => false,
    })
}

/// `Value::Placeholder` text (`$1`, `$name`) to a Cypher parameter.
pub(crate) fn placeholder(text: &str) -> Expr {
    Expr::Parameter(text.trim_start_matches('$').to_string())
}

pub(crate) fn literal(value: &Value) -> Result<Expr, TranslationError> {
    Ok(match value {
        Value::Number(text, _) => match text.parse::<i64>() {
            Ok(i) => Expr::integer(i),
            Err(_) => Expr::Literal(Literal::Float(text.clone())),
        },
        Value::SingleQuotedString(s)
        | Value::DoubleQuotedString(s)
        | Value::NationalStringLiteral(s)
        | Value::EscapedStringLiteral(s) => Expr::string(s.clone()),
        Value::Boolean(b) => Expr::Literal(Literal::Boolean(*b)),
        Value::Null => Expr::null(),
        Value::Placeholder(p) => placeholder(p),
        other => {
            return Err(TranslationError::unsupported_with_context(
                other.to_string(),
                "as a literal value",
            ))
        }
    })
}

pub(crate) struct ExpressionTranslator<'r> {
    columns: &'r dyn ColumnResolver,
}

impl<'r> ExpressionTranslator<'r> {
    pub fn new(columns: &'r dyn ColumnResolver) -> Self {
        Self { columns }
    }

    pub fn translate_all(&self, exprs: &[SqlExpr]) -> Result<Vec<Expr>, TranslationError> {
        exprs.iter().map(|e| self.translate(e)).collect()
    }

    pub fn translate(&self, expr: &SqlExpr) -> Result<Expr, TranslationError> {
        match expr {
            SqlExpr::Identifier(ident) => self.columns.resolve_column(std::slice::from_ref(ident)),
            SqlExpr::CompoundIdentifier(idents) => self.columns.resolve_column(idents),
            SqlExpr::Value(value) => literal(value),
            SqlExpr::Nested(inner) => self.translate(inner),
            SqlExpr::IsNull(inner) => Ok(Expr::IsNull {
                expr: Box::new(self.translate(inner)?),
                negated: false,
            }),
            SqlExpr::IsNotNull(inner) => Ok(Expr::IsNull {
                expr: Box::new(self.translate(inner)?),
                negated: true,
            }),
            SqlExpr::IsTrue(inner) => self.compare_boolean(inner, true, false),
            SqlExpr::IsNotTrue(inner) => self.compare_boolean(inner, true, true),
            SqlExpr::IsFalse(inner) => self.compare_boolean(inner, false, false),
            SqlExpr::IsNotFalse(inner) => self.compare_boolean(inner, false, true),
            SqlExpr::InList {
                expr,
                list,
                negated,
            } => {
                let test = Expr::binary(
                    BinaryOp::In,
                    self.translate(expr)?,
                    Expr::List(self.translate_all(list)?),
                );
                Ok(negate(test, *negated))
            }
            SqlExpr::Between {
                expr,
                negated,
                low,
                high,
            } => {
                let value = self.translate(expr)?;
                let range = Expr::binary(
                    BinaryOp::And,
                    Expr::binary(BinaryOp::GtEq, value.clone(), self.translate(low)?),
                    Expr::binary(BinaryOp::LtEq, value, self.translate(high)?),
                );
                Ok(negate(range, *negated))
            }
            SqlExpr::BinaryOp { left, op, right } => {
                let op = binary_operator(op)?;
                Ok(Expr::binary(op, self.translate(left)?, self.translate(right)?))
            }
            SqlExpr::UnaryOp { op, expr } => {
                let op = match op {
                    UnaryOperator::Not => UnaryOp::Not,
                    UnaryOperator::Minus => UnaryOp::Minus,
                    UnaryOperator::Plus => UnaryOp::Plus,
                    other => {
                        return Err(TranslationError::unsupported_with_context(
                            other.to_string(),
                            "as a unary operator",
                        ))
                    }
                };
                Ok(Expr::Unary {
                    op,
                    expr: Box::new(self.translate(expr)?),
                })
            }
            SqlExpr::Like {
                negated,
                any: false,
                expr,
                pattern,
                escape_char,
            } => self.like(expr, pattern, escape_char.as_deref(), *negated, false),
            SqlExpr::ILike {
                negated,
                any: false,
                expr,
                pattern,
                escape_char,
            } => self.like(expr, pattern, escape_char.as_deref(), *negated, true),
            SqlExpr::Cast {
                expr, data_type, ..
            } => Ok(Expr::func(cast_function(data_type)?, vec![self.translate(expr)?])),
            SqlExpr::TypedString { data_type, value } => Ok(Expr::func(
                cast_function(data_type)?,
                vec![Expr::string(value.clone())],
            )),
            SqlExpr::Extract { field, expr, .. } => {
                let accessor = temporal_accessor(field)?;
                Ok(Expr::Property(Box::new(self.translate(expr)?), accessor.to_string()))
            }
            SqlExpr::Ceil {
                expr,
                field: CeilFloorKind::DateTimeField(DateTimeField::NoDateTime),
            } => Ok(Expr::func("ceil", vec![self.translate(expr)?])),
            SqlExpr::Floor {
                expr,
                field: CeilFloorKind::DateTimeField(DateTimeField::NoDateTime),
            } => Ok(Expr::func("floor", vec![self.translate(expr)?])),
            SqlExpr::Substring {
                expr,
                substring_from,
                substring_for,
                ..
            } => {
                let mut args = vec![self.translate(expr)?];
                args.push(match substring_from {
                    Some(from) => self.translate(from)?,
                    None => Expr::integer(1),
                });
                if let Some(length) = substring_for {
                    args.push(self.translate(length)?);
                }
                self.mapped_function("substring", args, false)
            }
            SqlExpr::Trim {
                expr,
                trim_where,
                trim_what: None,
                trim_characters: None,
            } => {
                let name = match trim_where {
                    None | Some(TrimWhereField::Both) => "trim",
                    Some(TrimWhereField::Leading) => "lTrim",
                    Some(TrimWhereField::Trailing) => "rTrim",
                };
                Ok(Expr::func(name, vec![self.translate(expr)?]))
            }
            SqlExpr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => Ok(Expr::Case {
                operand: operand
                    .as_ref()
                    .map(|o| self.translate(o).map(Box::new))
                    .transpose()?,
                branches: conditions
                    .iter()
                    .zip(results)
                    .map(|(when, then)| Ok((self.translate(when)?, self.translate(then)?)))
                    .collect::<Result<_, TranslationError>>()?,
                otherwise: else_result
                    .as_ref()
                    .map(|e| self.translate(e).map(Box::new))
                    .transpose()?,
            }),
            SqlExpr::Tuple(items) => Ok(Expr::List(self.translate_all(items)?)),
            SqlExpr::Array(array) => Ok(Expr::List(self.translate_all(&array.elem)?)),
            SqlExpr::Function(function) => self.function(function),
            other => Err(TranslationError::unsupported_with_context(
                other.to_string(),
                "in an expression",
            )),
        }
    }

    fn compare_boolean(&self, inner: &SqlExpr, value: bool, negated: bool) -> Result<Expr, TranslationError> {
        let test = Expr::binary(
            BinaryOp::Eq,
            self.translate(inner)?,
            Expr::Literal(Literal::Boolean(value)),
        );
        Ok(negate(test, negated))
    }

    fn like(
        &self,
        expr: &SqlExpr,
        pattern: &SqlExpr,
        escape: Option<&str>,
        negated: bool,
        case_insensitive: bool,
    ) -> Result<Expr, TranslationError> {
        let SqlExpr::Value(Value::SingleQuotedString(text)) = pattern else {
            return Err(TranslationError::unsupported_with_context(
                pattern.to_string(),
                "as a LIKE pattern, only string literals are supported",
            ));
        };
        let value = self.translate(expr)?;
        let escape = escape.and_then(|e| e.chars().next());
        let test = like_pattern(value, &parse_like(text, escape), case_insensitive);
        Ok(negate(test, negated))
    }

    fn arguments(&self, function: &Function) -> Result<(Vec<Expr>, bool, bool), TranslationError> {
        let list = match &function.args {
            FunctionArguments::None => return Ok((Vec::new(), false, false)),
            FunctionArguments::Subquery(_) => {
                return Err(TranslationError::unsupported_with_context(
                    function.to_string(),
                    "(subquery arguments)",
                ))
            }
            FunctionArguments::List(list) => list,
        };
        let distinct = matches!(list.duplicate_treatment, Some(DuplicateTreatment::Distinct));
        let mut wildcard = false;
        let mut args = Vec::with_capacity(list.args.len());
        for arg in &list.args {
            match arg {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => args.push(self.translate(e)?),
                FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => wildcard = true,
                other => {
                    return Err(TranslationError::unsupported_with_context(
                        other.to_string(),
                        "as a function argument",
                    ))
                }
            }
        }
        Ok((args, distinct, wildcard))
    }

    fn function(&self, function: &Function) -> Result<Expr, TranslationError> {
        let name = function
            .name
            .0
            .iter()
            .map(|i| i.value.as_str())
            .collect::<Vec<_>>()
            .join(".");
        let (args, distinct, wildcard) = self.arguments(function)?;
        let lower = name.to_lowercase();

        if wildcard {
            return match lower.as_str() {
                "count" => Ok(Expr::CountStar),
                _ => Err(TranslationError::unsupported_with_context(
                    format!("{}(*)", name),
                    "in an expression",
                )),
            };
        }

        if args.len() == 1 {
            if let Some(field) = date_part(&lower) {
                let accessor = temporal_accessor_name(field)?;
                let value = args.into_iter().next().unwrap_or_else(Expr::null);
                return Ok(Expr::Property(Box::new(value), accessor.to_string()));
            }
        }
        match lower.as_str() {
            "concat" => {
                return args
                    .into_iter()
                    .rev()
                    .reduce(|acc, next| Expr::binary(BinaryOp::Add, next, acc))
                    .ok_or_else(|| TranslationError::Unsupported("CONCAT without arguments".into()))
            }
            "nullif" => {
                let [value, other]: [Expr; 2] = args
                    .try_into()
                    .map_err(|_| TranslationError::Unsupported("NULLIF takes two arguments".into()))?;
                return Ok(Expr::Case {
                    operand: None,
                    branches: vec![(Expr::binary(BinaryOp::Eq, value.clone(), other), Expr::null())],
                    otherwise: Some(Box::new(value)),
                });
            }
            "nvl2" => {
                let [test, present, absent]: [Expr; 3] = args
                    .try_into()
                    .map_err(|_| TranslationError::Unsupported("NVL2 takes three arguments".into()))?;
                return Ok(Expr::Case {
                    operand: None,
                    branches: vec![(
                        Expr::IsNull {
                            expr: Box::new(test),
                            negated: true,
                        },
                        present,
                    )],
                    otherwise: Some(Box::new(absent)),
                });
            }
            _ => {}
        }
        self.mapped_function(&name, args, distinct)
    }

    fn mapped_function(&self, name: &str, args: Vec<Expr>, distinct: bool) -> Result<Expr, TranslationError> {
        Ok(match get_function_mapping(name) {
            Some(mapping) => {
                let args = match mapping.arg_transform {
                    Some(transform) => transform(args),
                    None => args,
                };
                Expr::Function {
                    name: mapping.cypher_name.to_string(),
                    distinct,
                    args,
                }
            }
            None => Expr::Function {
                name: name.to_string(),
                distinct,
                args,
            },
        })
    }
}

fn negate(expr: Expr, negated: bool) -> Expr {
    if negated {
        Expr::not(expr)
    } else {
        expr
    }
}

fn binary_operator(op: &BinaryOperator) -> Result<BinaryOp, TranslationError> {
    Ok(match op {
        BinaryOperator::Plus | BinaryOperator::StringConcat => BinaryOp::Add,
        BinaryOperator::Minus => BinaryOp::Sub,
        BinaryOperator::Multiply => BinaryOp::Mul,
        BinaryOperator::Divide => BinaryOp::Div,
        BinaryOperator::Modulo => BinaryOp::Mod,
        BinaryOperator::PGExp => BinaryOp::Pow,
        BinaryOperator::Gt => BinaryOp::Gt,
        BinaryOperator::Lt => BinaryOp::Lt,
        BinaryOperator::GtEq => BinaryOp::GtEq,
        BinaryOperator::LtEq => BinaryOp::LtEq,
        BinaryOperator::Eq => BinaryOp::Eq,
        BinaryOperator::NotEq => BinaryOp::NotEq,
        BinaryOperator::And => BinaryOp::And,
        BinaryOperator::Or => BinaryOp::Or,
        BinaryOperator::Xor => BinaryOp::Xor,
        other => {
            return Err(TranslationError::unsupported_with_context(
                other.to_string(),
                "as a binary operator",
            ))
        }
    })
}

/// Cypher conversion function for a SQL target type.
fn cast_function(data_type: &DataType) -> Result<&'static str, TranslationError> {
    Ok(match data_type {
        DataType::Char(_)
        | DataType::Character(_)
        | DataType::CharVarying(_)
        | DataType::CharacterVarying(_)
        | DataType::Varchar(_)
        | DataType::Nvarchar(_)
        | DataType::Text
        | DataType::String(_)
        | DataType::Clob(_)
        | DataType::Uuid => "toString",
        DataType::TinyInt(_)
        | DataType::SmallInt(_)
        | DataType::Int(_)
        | DataType::Integer(_)
        | DataType::BigInt(_)
        | DataType::Int2(_)
        | DataType::Int4(_)
        | DataType::Int8(_)
        | DataType::Int64 => "toInteger",
        DataType::Float(_)
        | DataType::Real
        | DataType::Double
        | DataType::DoublePrecision
        | DataType::Float4
        | DataType::Float8
        | DataType::Float64
        | DataType::Numeric(_)
        | DataType::Decimal(_)
        | DataType::Dec(_) => "toFloat",
        DataType::Bool | DataType::Boolean => "toBoolean",
        DataType::Date => "date",
        DataType::Time(_, TimezoneInfo::WithTimeZone | TimezoneInfo::Tz) => "time",
        DataType::Time(..) => "localtime",
        DataType::Timestamp(_, TimezoneInfo::WithTimeZone | TimezoneInfo::Tz) => "datetime",
        DataType::Timestamp(..) | DataType::Datetime(_) => "localdatetime",
        other => {
            return Err(TranslationError::unsupported_with_context(
                other.to_string(),
                "as a CAST target type",
            ))
        }
    })
}

/// Function names that read one field of a temporal value (`YEAR(d)`).
fn date_part(function: &str) -> Option<&'static str> {
    Some(match function {
        "year" => "year",
        "quarter" => "quarter",
        "month" => "month",
        "week" => "week",
        "day" | "dayofmonth" => "day",
        "dayofweek" => "dayofweek",
        "dayofyear" => "dayofyear",
        "hour" => "hour",
        "minute" => "minute",
        "second" => "second",
        "millisecond" => "millisecond",
        "microsecond" => "microsecond",
        "nanosecond" => "nanosecond",
        "epoch" => "epoch",
        "century" => "century",
        "decade" => "decade",
        "millennium" => "millennium",
        _ => return None,
    })
}

fn temporal_accessor_name(field: &str) -> Result<&'static str, TranslationError> {
    Ok(match field {
        "year" => "year",
        "quarter" => "quarter",
        "month" => "month",
        "week" => "week",
        "day" => "day",
        "dayofweek" | "dow" | "isodow" => "dayOfWeek",
        "dayofyear" | "doy" => "ordinalDay",
        "hour" => "hour",
        "minute" => "minute",
        "second" => "second",
        "millisecond" | "milliseconds" => "millisecond",
        "microsecond" | "microseconds" => "microsecond",
        "nanosecond" | "nanoseconds" => "nanosecond",
        "epoch" => "epochSeconds",
        "isoyear" => "weekYear",
        "timezone" => "timezone",
        other => return Err(TranslationError::DateTimeField(other.to_uppercase())),
    })
}

fn temporal_accessor(field: &DateTimeField) -> Result<&'static str, TranslationError> {
    let name = match field {
        DateTimeField::Week(_) => "week".to_string(),
        DateTimeField::Custom(ident) => ident.value.to_lowercase(),
        other => other.to_string().to_lowercase(),
    };
    temporal_accessor_name(&name)
}

#[derive(Debug, Clone, PartialEq)]
enum LikeToken {
    Text(String),
    AnyRun,
    One,
}

fn parse_like(pattern: &str, escape: Option<char>) -> Vec<LikeToken> {
    let mut tokens: Vec<LikeToken> = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        let literal = match c {
            c if Some(c) == escape => chars.next(),
            '%' => {
                if tokens.last() != Some(&LikeToken::AnyRun) {
                    tokens.push(LikeToken::AnyRun);
                }
                None
            }
            '_' => {
                tokens.push(LikeToken::One);
                None
            }
            c => Some(c),
        };
        if let Some(c) = literal {
            match tokens.last_mut() {
                Some(LikeToken::Text(text)) => text.push(c),
                _ => tokens.push(LikeToken::Text(c.to_string())),
            }
        }
    }
    tokens
}

fn regex_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn like_pattern(value: Expr, tokens: &[LikeToken], case_insensitive: bool) -> Expr {
    if !case_insensitive {
        match tokens {
            [] => return Expr::binary(BinaryOp::Eq, value, Expr::string("")),
            [LikeToken::Text(t)] => return Expr::binary(BinaryOp::Eq, value, Expr::string(t.clone())),
            [LikeToken::AnyRun, LikeToken::Text(t), LikeToken::AnyRun] => {
                return Expr::binary(BinaryOp::Contains, value, Expr::string(t.clone()))
            }
            [LikeToken::Text(t), LikeToken::AnyRun] => {
                return Expr::binary(BinaryOp::StartsWith, value, Expr::string(t.clone()))
            }
            [LikeToken::AnyRun, LikeToken::Text(t)] => {
                return Expr::binary(BinaryOp::EndsWith, value, Expr::string(t.clone()))
            }
            _ => {}
        }
    }
    let mut regex = String::from(if case_insensitive { "(?i)" } else { "" });
    for token in tokens {
        match token {
            LikeToken::Text(t) => regex.push_str(&regex_escape(t)),
            LikeToken::AnyRun => regex.push_str(".*"),
            LikeToken::One => regex.push('.'),
        }
    }
    Expr::binary(BinaryOp::RegexMatch, value, Expr::string(regex))
}
