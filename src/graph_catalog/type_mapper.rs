//! # Type Mapper
//!
//! Conversion between graph property types and relational column types.
//!
//! - [`GraphType`] is the type category of a sampled or declared property.
//! - [`GraphType::widen`] merges the categories observed for one property.
//! - [`SqlType`] is the relational type code and name exposed through metadata.
//! - [`FromGraphValue`] coerces a returned [`GraphValue`] into a Rust scalar.
//!
//! Integers are always reported at 64-bit width. Narrower reads go through
//! [`FromGraphValue`] and fail with [`TypeError::OutOfRange`] instead of truncating.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::executor::GraphValue;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TypeError {
    #[error("Cannot convert value `{value}` of type {from} to {to}")]
    Conversion {
        value: String,
        from: String,
        to: &'static str,
    },
    #[error("Value `{value}` is out of range for {to}")]
    OutOfRange { value: String, to: &'static str },
    #[error("Unknown graph type name: {0}")]
    UnknownTypeName(String),
}

impl TypeError {
    pub fn status_code(&self) -> &'static str {
        match self {
            TypeError::Conversion { .. } => "22018",
            TypeError::OutOfRange { .. } => "22003",
            TypeError::UnknownTypeName(_) => "HY000",
        }
    }

    fn conversion(value: &GraphValue, to: &'static str) -> Self {
        TypeError::Conversion {
            value: value.to_string(),
            from: GraphType::of(value).to_string(),
            to,
        }
    }
}

/// Type category of a graph property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GraphType {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Bytes,
    Date,
    LocalTime,
    Time,
    LocalDateTime,
    DateTime,
    Duration,
    Point,
    Map,
    Node,
    Relationship,
    Path,
    /// `element` is `Any` for empty or mixed lists.
    List {
        element: Box<GraphType>,
        nullable_elements: bool,
    },
    Any,
}

impl GraphType {
    pub fn list_of(element: GraphType, nullable_elements: bool) -> Self {
        GraphType::List {
            element: Box::new(element),
            nullable_elements,
        }
    }

    /// Category of a single value. Lists infer their element type.
    pub fn of(value: &GraphValue) -> Self {
        match value {
            GraphValue::Null => GraphType::Null,
            GraphValue::Boolean(_) => GraphType::Boolean,
            GraphValue::Integer(_) => GraphType::Integer,
            GraphValue::Float(_) => GraphType::Float,
            GraphValue::String(_) => GraphType::String,
            GraphValue::Bytes(_) => GraphType::Bytes,
            GraphValue::Date(_) => GraphType::Date,
            GraphValue::LocalTime(_) => GraphType::LocalTime,
            GraphValue::Time(..) => GraphType::Time,
            GraphValue::LocalDateTime(_) => GraphType::LocalDateTime,
            GraphValue::DateTime(_) => GraphType::DateTime,
            GraphValue::Duration(_) => GraphType::Duration,
            GraphValue::Point(_) => GraphType::Point,
            GraphValue::Map(_) => GraphType::Map,
            GraphValue::Node(_) => GraphType::Node,
            GraphValue::Relationship(_) => GraphType::Relationship,
            GraphValue::Path(_) => GraphType::Path,
            GraphValue::List(values) => Self::infer_list(values),
        }
    }

    /// Element inference for list values.
    ///
    /// Homogeneous primitive lists keep their element type, a single primitive
    /// type mixed with nulls becomes a nullable list of that type, anything
    /// else (including the empty list) is a list of `ANY`.
    fn infer_list(values: &[GraphValue]) -> Self {
        let mut has_null = false;
        let mut kinds = BTreeSet::new();
        for v in values {
            match GraphType::of(v) {
                GraphType::Null => has_null = true,
                other => {
                    kinds.insert(other);
                }
            }
        }
        let mut kinds = kinds.into_iter();
        match (kinds.next(), kinds.next()) {
            (Some(only), None) if only.is_primitive() => GraphType::list_of(only, has_null),
            _ => GraphType::list_of(GraphType::Any, true),
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            GraphType::List { .. }
                | GraphType::Map
                | GraphType::Node
                | GraphType::Relationship
                | GraphType::Path
                | GraphType::Any
                | GraphType::Null
        )
    }

    fn is_numeric(&self) -> bool {
        matches!(self, GraphType::Integer | GraphType::Float)
    }

    fn is_temporal(&self) -> bool {
        matches!(
            self,
            GraphType::Date
                | GraphType::LocalTime
                | GraphType::Time
                | GraphType::LocalDateTime
                | GraphType::DateTime
        )
    }

    /// Least specific common type of all observed categories.
    ///
    /// Works on the set of categories, so the result does not depend on the
    /// order in which values were sampled. `Null` observations only affect
    /// nullability and are ignored here.
    pub fn widen<'a>(observed: impl IntoIterator<Item = &'a GraphType>) -> GraphType {
        let set: BTreeSet<&GraphType> = observed
            .into_iter()
            .filter(|t| **t != GraphType::Null)
            .collect();

        if set.is_empty() {
            return GraphType::Null;
        }
        if set.len() == 1 {
            return set.into_iter().next().cloned().unwrap_or(GraphType::Any);
        }
        if set.contains(&GraphType::String) {
            return GraphType::String;
        }
        if set.iter().all(|t| t.is_numeric()) {
            return GraphType::Float;
        }
        if set.iter().all(|t| t.is_temporal()) {
            return Self::widen_temporal(&set);
        }
        if set.iter().all(|t| matches!(t, GraphType::List { .. })) {
            let mut nullable = false;
            let elements: Vec<&GraphType> = set
                .iter()
                .filter_map(|t| match t {
                    GraphType::List {
                        element,
                        nullable_elements,
                    } => {
                        nullable |= *nullable_elements;
                        Some(element.as_ref())
                    }
                    _ => None,
                })
                .collect();
            let element = GraphType::widen(elements);
            return match element {
                GraphType::Any => GraphType::list_of(GraphType::Any, true),
                element => GraphType::list_of(element, nullable),
            };
        }
        GraphType::Any
    }

    fn widen_temporal(set: &BTreeSet<&GraphType>) -> GraphType {
        let has = |t: GraphType| set.contains(&t);
        let times = has(GraphType::LocalTime) || has(GraphType::Time);
        let dates = has(GraphType::Date) || has(GraphType::LocalDateTime) || has(GraphType::DateTime);
        match (times, dates) {
            // a time of day and a date share no common narrower type
            (true, true) => GraphType::Any,
            (true, false) => GraphType::Time,
            (false, _) if has(GraphType::DateTime) => GraphType::DateTime,
            _ => GraphType::LocalDateTime,
        }
    }

    /// Relational type this category is exposed as.
    pub fn sql_type(&self) -> SqlType {
        match self {
            GraphType::Null => SqlType::Null,
            GraphType::Boolean => SqlType::Boolean,
            GraphType::Integer => SqlType::BigInt,
            GraphType::Float => SqlType::Double,
            GraphType::String => SqlType::Varchar,
            GraphType::Bytes => SqlType::Blob,
            GraphType::Date => SqlType::Date,
            GraphType::LocalTime => SqlType::Time,
            GraphType::Time => SqlType::TimeWithTimezone,
            GraphType::LocalDateTime => SqlType::Timestamp,
            GraphType::DateTime => SqlType::TimestampWithTimezone,
            GraphType::Duration | GraphType::Any => SqlType::Other,
            GraphType::Point
            | GraphType::Map
            | GraphType::Node
            | GraphType::Relationship
            | GraphType::Path => SqlType::Struct,
            GraphType::List { .. } => SqlType::Array,
        }
    }

    /// Precision reported for numeric columns.
    pub fn precision(&self) -> Option<u32> {
        match self {
            // i64::MAX has 19 digits
            GraphType::Integer => Some(19),
            GraphType::Float => Some(15),
            _ => None,
        }
    }
}

impl fmt::Display for GraphType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GraphType::Null => "NULL",
            GraphType::Boolean => "BOOLEAN",
            GraphType::Integer => "INTEGER",
            GraphType::Float => "FLOAT",
            GraphType::String => "STRING",
            GraphType::Bytes => "BYTES",
            GraphType::Date => "DATE",
            GraphType::LocalTime => "LOCAL TIME",
            GraphType::Time => "ZONED TIME",
            GraphType::LocalDateTime => "LOCAL DATETIME",
            GraphType::DateTime => "ZONED DATETIME",
            GraphType::Duration => "DURATION",
            GraphType::Point => "POINT",
            GraphType::Map => "MAP",
            GraphType::Node => "NODE",
            GraphType::Relationship => "RELATIONSHIP",
            GraphType::Path => "PATH",
            GraphType::Any => "ANY",
            GraphType::List {
                element,
                nullable_elements,
            } => {
                return if *nullable_elements || **element == GraphType::Any {
                    write!(f, "LIST<{}>", element)
                } else {
                    write!(f, "LIST<{} NOT NULL>", element)
                };
            }
        };
        f.write_str(name)
    }
}

impl FromStr for GraphType {
    type Err = TypeError;

    /// Accepts current Cypher type names as well as the legacy property type
    /// names (`Long`, `StringArray`, ...) still found in older documents.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_uppercase();

        if let Some(inner) = upper
            .strip_prefix("LIST<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            let (inner, nullable) = match inner.trim().strip_suffix("NOT NULL") {
                Some(element) => (element.trim(), false),
                None => (inner.trim(), true),
            };
            return Ok(GraphType::list_of(inner.parse()?, nullable));
        }
        if let Some(element) = trimmed.strip_suffix("Array") {
            return Ok(GraphType::list_of(element.parse()?, false));
        }

        let parsed = match upper.as_str() {
            "NULL" => GraphType::Null,
            "BOOLEAN" | "BOOL" => GraphType::Boolean,
            "INTEGER" | "LONG" | "INT" | "BIGINT" => GraphType::Integer,
            "FLOAT" | "DOUBLE" => GraphType::Float,
            "STRING" | "VARCHAR" => GraphType::String,
            "BYTES" | "BYTE[]" => GraphType::Bytes,
            "DATE" => GraphType::Date,
            "LOCAL TIME" | "LOCALTIME" => GraphType::LocalTime,
            "ZONED TIME" | "TIME" => GraphType::Time,
            "LOCAL DATETIME" | "LOCALDATETIME" => GraphType::LocalDateTime,
            "ZONED DATETIME" | "DATETIME" => GraphType::DateTime,
            "DURATION" => GraphType::Duration,
            "POINT" => GraphType::Point,
            "MAP" => GraphType::Map,
            "NODE" => GraphType::Node,
            "RELATIONSHIP" => GraphType::Relationship,
            "PATH" => GraphType::Path,
            "LIST" => GraphType::list_of(GraphType::Any, true),
            "ANY" => GraphType::Any,
            _ => return Err(TypeError::UnknownTypeName(s.to_string())),
        };
        Ok(parsed)
    }
}

impl Serialize for GraphType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GraphType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Relational type codes (the `java.sql.Types` numbering used by call-level SQL tooling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Null,
    Boolean,
    BigInt,
    Double,
    Varchar,
    Blob,
    Date,
    Time,
    TimeWithTimezone,
    Timestamp,
    TimestampWithTimezone,
    Struct,
    Array,
    Other,
}

impl SqlType {
    pub fn code(&self) -> i32 {
        match self {
            SqlType::Null => 0,
            SqlType::Boolean => 16,
            SqlType::BigInt => -5,
            SqlType::Double => 8,
            SqlType::Varchar => 12,
            SqlType::Blob => 2004,
            SqlType::Date => 91,
            SqlType::Time => 92,
            SqlType::TimeWithTimezone => 2013,
            SqlType::Timestamp => 93,
            SqlType::TimestampWithTimezone => 2014,
            SqlType::Struct => 2002,
            SqlType::Array => 2003,
            SqlType::Other => 1111,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SqlType::Null => "NULL",
            SqlType::Boolean => "BOOLEAN",
            SqlType::BigInt => "BIGINT",
            SqlType::Double => "DOUBLE",
            SqlType::Varchar => "VARCHAR",
            SqlType::Blob => "BLOB",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::TimeWithTimezone => "TIME_WITH_TIMEZONE",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::TimestampWithTimezone => "TIMESTAMP_WITH_TIMEZONE",
            SqlType::Struct => "STRUCT",
            SqlType::Array => "ARRAY",
            SqlType::Other => "OTHER",
        }
    }
}

/// Coercion of a returned value into a caller-requested scalar.
pub trait FromGraphValue: Sized {
    fn from_graph_value(value: &GraphValue) -> Result<Self, TypeError>;
}

impl FromGraphValue for GraphValue {
    fn from_graph_value(value: &GraphValue) -> Result<Self, TypeError> {
        Ok(value.clone())
    }
}

impl<T: FromGraphValue> FromGraphValue for Option<T> {
    fn from_graph_value(value: &GraphValue) -> Result<Self, TypeError> {
        match value {
            GraphValue::Null => Ok(None),
            other => T::from_graph_value(other).map(Some),
        }
    }
}

impl<T: FromGraphValue> FromGraphValue for Vec<T> {
    fn from_graph_value(value: &GraphValue) -> Result<Self, TypeError> {
        match value {
            GraphValue::List(values) => values.iter().map(T::from_graph_value).collect(),
            other => Err(TypeError::conversion(other, "LIST")),
        }
    }
}

impl FromGraphValue for bool {
    fn from_graph_value(value: &GraphValue) -> Result<Self, TypeError> {
        match value {
            GraphValue::Boolean(b) => Ok(*b),
            other => Err(TypeError::conversion(other, "BOOLEAN")),
        }
    }
}

impl FromGraphValue for i64 {
    fn from_graph_value(value: &GraphValue) -> Result<Self, TypeError> {
        match value {
            GraphValue::Integer(i) => Ok(*i),
            other => Err(TypeError::conversion(other, "BIGINT")),
        }
    }
}

macro_rules! narrow_integer {
    ($ty:ty, $name:literal) => {
        impl FromGraphValue for $ty {
            fn from_graph_value(value: &GraphValue) -> Result<Self, TypeError> {
                match value {
                    GraphValue::Integer(i) => <$ty>::try_from(*i).map_err(|_| TypeError::OutOfRange {
                        value: i.to_string(),
                        to: $name,
                    }),
                    other => Err(TypeError::conversion(other, $name)),
                }
            }
        }
    };
}

narrow_integer!(i32, "INTEGER");
narrow_integer!(i16, "SMALLINT");
narrow_integer!(i8, "TINYINT");

impl FromGraphValue for f64 {
    fn from_graph_value(value: &GraphValue) -> Result<Self, TypeError> {
        match value {
            GraphValue::Float(x) => Ok(*x),
            GraphValue::Integer(i) => Ok(*i as f64),
            other => Err(TypeError::conversion(other, "DOUBLE")),
        }
    }
}

impl FromGraphValue for f32 {
    fn from_graph_value(value: &GraphValue) -> Result<Self, TypeError> {
        let wide = f64::from_graph_value(value).map_err(|_| TypeError::conversion(value, "REAL"))?;
        if wide.is_finite() && wide.abs() > f32::MAX as f64 {
            return Err(TypeError::OutOfRange {
                value: wide.to_string(),
                to: "REAL",
            });
        }
        Ok(wide as f32)
    }
}

impl FromGraphValue for String {
    fn from_graph_value(value: &GraphValue) -> Result<Self, TypeError> {
        match value {
            GraphValue::String(s) => Ok(s.clone()),
            GraphValue::Null
            | GraphValue::Bytes(_)
            | GraphValue::Node(_)
            | GraphValue::Relationship(_)
            | GraphValue::Path(_) => Err(TypeError::conversion(value, "VARCHAR")),
            other => Ok(other.to_string()),
        }
    }
}

impl FromGraphValue for Bytes {
    fn from_graph_value(value: &GraphValue) -> Result<Self, TypeError> {
        match value {
            GraphValue::Bytes(b) => Ok(b.clone()),
            other => Err(TypeError::conversion(other, "BLOB")),
        }
    }
}

impl FromGraphValue for NaiveDate {
    fn from_graph_value(value: &GraphValue) -> Result<Self, TypeError> {
        match value {
            GraphValue::Date(d) => Ok(*d),
            GraphValue::LocalDateTime(dt) => Ok(dt.date()),
            GraphValue::DateTime(dt) => Ok(dt.date_naive()),
            other => Err(TypeError::conversion(other, "DATE")),
        }
    }
}

impl FromGraphValue for NaiveTime {
    fn from_graph_value(value: &GraphValue) -> Result<Self, TypeError> {
        match value {
            GraphValue::LocalTime(t) | GraphValue::Time(t, _) => Ok(*t),
            GraphValue::LocalDateTime(dt) => Ok(dt.time()),
            other => Err(TypeError::conversion(other, "TIME")),
        }
    }
}

impl FromGraphValue for NaiveDateTime {
    fn from_graph_value(value: &GraphValue) -> Result<Self, TypeError> {
        match value {
            GraphValue::LocalDateTime(dt) => Ok(*dt),
            GraphValue::DateTime(dt) => Ok(dt.naive_local()),
            GraphValue::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            other => Err(TypeError::conversion(other, "TIMESTAMP")),
        }
    }
}

impl FromGraphValue for DateTime<FixedOffset> {
    fn from_graph_value(value: &GraphValue) -> Result<Self, TypeError> {
        match value {
            GraphValue::DateTime(dt) => Ok(*dt),
            other => Err(TypeError::conversion(other, "TIMESTAMP_WITH_TIMEZONE")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_wins_over_mixtures() {
        let observed = [GraphType::Integer, GraphType::String, GraphType::Date];
        assert_eq!(GraphType::widen(&observed), GraphType::String);
    }

    #[test]
    fn test_widening_is_order_independent() {
        let a = [GraphType::Float, GraphType::Integer];
        let b = [GraphType::Integer, GraphType::Float];
        assert_eq!(GraphType::widen(&a), GraphType::Float);
        assert_eq!(GraphType::widen(&a), GraphType::widen(&b));

        let c = [GraphType::Boolean, GraphType::Integer, GraphType::Point];
        let d = [GraphType::Point, GraphType::Boolean, GraphType::Integer];
        assert_eq!(GraphType::widen(&c), GraphType::Any);
        assert_eq!(GraphType::widen(&d), GraphType::Any);
    }

    #[test]
    fn test_temporal_widening() {
        assert_eq!(
            GraphType::widen(&[GraphType::Date, GraphType::LocalDateTime]),
            GraphType::LocalDateTime
        );
        assert_eq!(
            GraphType::widen(&[GraphType::LocalDateTime, GraphType::DateTime]),
            GraphType::DateTime
        );
        assert_eq!(
            GraphType::widen(&[GraphType::LocalTime, GraphType::Time]),
            GraphType::Time
        );
        assert_eq!(
            GraphType::widen(&[GraphType::LocalTime, GraphType::Date]),
            GraphType::Any
        );
    }

    #[test]
    fn test_null_only_affects_nullability() {
        assert_eq!(
            GraphType::widen(&[GraphType::Null, GraphType::Integer]),
            GraphType::Integer
        );
        assert_eq!(GraphType::widen(&[GraphType::Null]), GraphType::Null);
    }

    #[test]
    fn test_list_element_inference() {
        let homogeneous = GraphValue::List(vec![GraphValue::Integer(1), GraphValue::Integer(2)]);
        assert_eq!(
            GraphType::of(&homogeneous),
            GraphType::list_of(GraphType::Integer, false)
        );

        let with_null = GraphValue::List(vec![GraphValue::from("a"), GraphValue::Null]);
        assert_eq!(
            GraphType::of(&with_null),
            GraphType::list_of(GraphType::String, true)
        );

        let mixed = GraphValue::List(vec![GraphValue::Integer(1), GraphValue::from("a")]);
        assert_eq!(GraphType::of(&mixed), GraphType::list_of(GraphType::Any, true));

        let empty = GraphValue::List(vec![]);
        assert_eq!(GraphType::of(&empty), GraphType::list_of(GraphType::Any, true));
    }

    #[test]
    fn test_type_names_round_trip() {
        for name in ["INTEGER", "LOCAL DATETIME", "LIST<STRING NOT NULL>", "LIST<ANY>"] {
            let parsed: GraphType = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
        assert_eq!("Long".parse::<GraphType>().unwrap(), GraphType::Integer);
        assert_eq!(
            "StringArray".parse::<GraphType>().unwrap(),
            GraphType::list_of(GraphType::String, false)
        );
        assert!("Banana".parse::<GraphType>().is_err());
    }

    #[test]
    fn test_sql_type_codes() {
        assert_eq!(GraphType::Integer.sql_type().code(), -5);
        assert_eq!(GraphType::Boolean.sql_type().code(), 16);
        assert_eq!(GraphType::String.sql_type().code(), 12);
        assert_eq!(GraphType::Any.sql_type().code(), 1111);
        assert_eq!(GraphType::list_of(GraphType::Any, true).sql_type().code(), 2003);
        assert_eq!(GraphType::Integer.precision(), Some(19));
        assert_eq!(GraphType::Float.precision(), Some(15));
        assert_eq!(GraphType::String.precision(), None);
    }

    #[test]
    fn test_numeric_read_of_string_fails() {
        let err = i64::from_graph_value(&GraphValue::from("forty-two")).unwrap_err();
        assert_eq!(
            err,
            TypeError::Conversion {
                value: "forty-two".to_string(),
                from: "STRING".to_string(),
                to: "BIGINT",
            }
        );
        assert_eq!(err.status_code(), "22018");
    }

    #[test]
    fn test_narrowing_out_of_range() {
        let err = i32::from_graph_value(&GraphValue::Integer(i64::MAX)).unwrap_err();
        assert!(matches!(err, TypeError::OutOfRange { to: "INTEGER", .. }));
        assert_eq!(i16::from_graph_value(&GraphValue::Integer(12)).unwrap(), 12);
    }

    #[test]
    fn test_optional_reads() {
        assert_eq!(Option::<i64>::from_graph_value(&GraphValue::Null).unwrap(), None);
        assert_eq!(
            Option::<bool>::from_graph_value(&GraphValue::Boolean(true)).unwrap(),
            Some(true)
        );
        assert!(bool::from_graph_value(&GraphValue::Null).is_err());
    }
}
