/// SQL to Cypher Function Registry
///
/// Maps SQL function names to Cypher equivalents with optional argument transformations.
/// Functions without an entry are passed through unchanged.
use std::collections::HashMap;

use super::cypher::{BinaryOp, Expr, Literal};

/// Function mapping entry
#[derive(Clone)]
pub struct FunctionMapping {
    /// SQL function name (lowercase for lookup)
    pub sql_name: &'static str,
    /// Cypher function name
    pub cypher_name: &'static str,
    /// Optional argument transformation function
    pub arg_transform: Option<fn(Vec<Expr>) -> Vec<Expr>>,
}

/// Get function mapping for a SQL function name
pub fn get_function_mapping(sql_fn: &str) -> Option<FunctionMapping> {
    let fn_lower = sql_fn.to_lowercase();
    FUNCTION_MAPPINGS.get(fn_lower.as_str()).cloned()
}

/// True for Cypher aggregating functions (by Cypher name, case-insensitive).
pub fn is_aggregate(cypher_fn: &str) -> bool {
    matches!(
        cypher_fn.to_lowercase().as_str(),
        "count" | "sum" | "avg" | "min" | "max" | "collect" | "stdev" | "stdevp"
            | "percentilecont" | "percentiledisc"
    )
}

/// SQL strings are 1-based, Cypher's are 0-based.
fn shift_start_index(mut args: Vec<Expr>) -> Vec<Expr> {
    if args.len() > 1 {
        let start = args.remove(1);
        let shifted = match start {
            Expr::Literal(Literal::Integer(i)) => Expr::integer(i - 1),
            other => Expr::binary(BinaryOp::Sub, other, Expr::integer(1)),
        };
        args.insert(1, shifted);
    }
    args
}

fn no_args(_args: Vec<Expr>) -> Vec<Expr> {
    Vec::new()
}

macro_rules! mapping {
    ($m:ident, $sql:expr, $cypher:expr) => {
        $m.insert(
            $sql,
            FunctionMapping {
                sql_name: $sql,
                cypher_name: $cypher,
                arg_transform: None,
            },
        );
    };
    ($m:ident, $sql:expr, $cypher:expr, $transform:expr) => {
        $m.insert(
            $sql,
            FunctionMapping {
                sql_name: $sql,
                cypher_name: $cypher,
                arg_transform: Some($transform),
            },
        );
    };
}

// Static function mapping table
lazy_static::lazy_static! {
    static ref FUNCTION_MAPPINGS: HashMap<&'static str, FunctionMapping> = {
        let mut m = HashMap::new();

        // ===== STRING FUNCTIONS =====
        mapping!(m, "lower", "toLower");
        mapping!(m, "lcase", "toLower");
        mapping!(m, "upper", "toUpper");
        mapping!(m, "ucase", "toUpper");
        mapping!(m, "char_length", "size");
        mapping!(m, "character_length", "size");
        mapping!(m, "length", "size");
        mapping!(m, "len", "size");
        mapping!(m, "ltrim", "lTrim");
        mapping!(m, "rtrim", "rTrim");
        mapping!(m, "trim", "trim");
        mapping!(m, "btrim", "trim");
        mapping!(m, "substring", "substring", shift_start_index);
        mapping!(m, "substr", "substring", shift_start_index);
        mapping!(m, "left", "left");
        mapping!(m, "right", "right");
        mapping!(m, "replace", "replace");
        mapping!(m, "reverse", "reverse");
        mapping!(m, "split_part", "split");

        // ===== MATH FUNCTIONS =====
        mapping!(m, "abs", "abs");
        mapping!(m, "ceil", "ceil");
        mapping!(m, "ceiling", "ceil");
        mapping!(m, "floor", "floor");
        mapping!(m, "round", "round");
        mapping!(m, "sign", "sign");
        mapping!(m, "sqrt", "sqrt");
        mapping!(m, "exp", "exp");
        mapping!(m, "ln", "log");
        mapping!(m, "log", "log");
        mapping!(m, "log10", "log10");
        mapping!(m, "rand", "rand");
        mapping!(m, "random", "rand");
        mapping!(m, "pi", "pi");
        mapping!(m, "degrees", "degrees");
        mapping!(m, "radians", "radians");

        // ===== TRIGONOMETRIC FUNCTIONS =====
        mapping!(m, "sin", "sin");
        mapping!(m, "cos", "cos");
        mapping!(m, "tan", "tan");
        mapping!(m, "cot", "cot");
        mapping!(m, "asin", "asin");
        mapping!(m, "acos", "acos");
        mapping!(m, "atan", "atan");
        mapping!(m, "atan2", "atan2");

        // ===== AGGREGATION FUNCTIONS =====
        mapping!(m, "count", "count");
        mapping!(m, "sum", "sum");
        mapping!(m, "avg", "avg");
        mapping!(m, "min", "min");
        mapping!(m, "max", "max");
        mapping!(m, "stddev", "stDev");
        mapping!(m, "stddev_samp", "stDev");
        mapping!(m, "stddev_pop", "stDevP");
        mapping!(m, "array_agg", "collect");
        mapping!(m, "collect", "collect");

        // ===== DATETIME FUNCTIONS =====
        mapping!(m, "now", "datetime", no_args);
        mapping!(m, "current_timestamp", "datetime", no_args);
        mapping!(m, "current_date", "date", no_args);
        mapping!(m, "current_time", "time", no_args);
        mapping!(m, "localtimestamp", "localdatetime", no_args);
        mapping!(m, "localtime", "localtime", no_args);

        // ===== TYPE CONVERSION FUNCTIONS =====
        mapping!(m, "coalesce", "coalesce");
        mapping!(m, "ifnull", "coalesce");
        mapping!(m, "nvl", "coalesce");
        mapping!(m, "to_char", "toString");

        m
    };
}
