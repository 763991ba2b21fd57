//! Cypher AST emitted by the translator.
//!
//! The translator never concatenates Cypher text directly: every statement is
//! built as a [`Statement`] and rendered through [`ToCypher`], which owns
//! identifier escaping, literal quoting and operator precedence.

use std::borrow::Cow;
use std::collections::HashSet;

use lazy_static::lazy_static;

lazy_static! {
    static ref RESERVED_WORDS: HashSet<&'static str> = [
        "all", "and", "as", "asc", "ascending", "by", "call", "case", "contains", "create",
        "delete", "desc", "descending", "detach", "distinct", "else", "end", "ends", "exists",
        "false", "in", "is", "limit", "match", "merge", "not", "null", "on", "optional", "or",
        "order", "remove", "return", "set", "skip", "starts", "then", "true", "union", "unwind",
        "when", "where", "with", "xor", "yield",
    ]
    .into_iter()
    .collect();
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Backtick labels and relationship types even when they are plain identifiers.
    pub always_escape: bool,
    /// One clause per line.
    pub pretty: bool,
}

/// Render an AST node as Cypher text.
pub trait ToCypher {
    fn to_cypher(&self, options: &RenderOptions) -> String;
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Backticks `name` unless it is a plain identifier that is not a keyword.
pub fn escape_name(name: &str, force: bool) -> Cow<'_, str> {
    if !force
        && is_plain_identifier(name)
        && !RESERVED_WORDS.contains(name.to_ascii_lowercase().as_str())
    {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("`{}`", name.replace('`', "``")))
    }
}

fn escape_label(name: &str, options: &RenderOptions) -> String {
    // Labels and types are never keywords in label position.
    if !options.always_escape && is_plain_identifier(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

fn quote_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    /// Kept as written so `1.50` renders back unchanged.
    Float(String),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    Xor,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    StartsWith,
    EndsWith,
    Contains,
    RegexMatch,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "OR",
            BinaryOp::Xor => "XOR",
            BinaryOp::And => "AND",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::StartsWith => "STARTS WITH",
            BinaryOp::EndsWith => "ENDS WITH",
            BinaryOp::Contains => "CONTAINS",
            BinaryOp::RegexMatch => "=~",
            BinaryOp::In => "IN",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::Xor => 2,
            BinaryOp::And => 3,
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq
            | BinaryOp::StartsWith
            | BinaryOp::EndsWith
            | BinaryOp::Contains
            | BinaryOp::RegexMatch
            | BinaryOp::In => 5,
            BinaryOp::Add | BinaryOp::Sub => 6,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 7,
            BinaryOp::Pow => 8,
        }
    }

    fn is_associative(&self) -> bool {
        matches!(
            self,
            BinaryOp::Or | BinaryOp::Xor | BinaryOp::And | BinaryOp::Add | BinaryOp::Mul
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Parameter(String),
    Variable(String),
    Property(Box<Expr>, String),
    Function {
        name: String,
        distinct: bool,
        args: Vec<Expr>,
    },
    CountStar,
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    pub fn prop(variable: impl Into<String>, key: impl Into<String>) -> Self {
        Expr::Property(Box::new(Expr::Variable(variable.into())), key.into())
    }

    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            distinct: false,
            args,
        }
    }

    pub fn element_id(variable: impl Into<String>) -> Self {
        Expr::func("elementId", vec![Expr::var(variable)])
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn integer(value: i64) -> Self {
        Expr::Literal(Literal::Integer(value))
    }

    pub fn null() -> Self {
        Expr::Literal(Literal::Null)
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn not(expr: Expr) -> Self {
        Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        }
    }

    /// Conjunction of all `predicates`, `None` when there are none.
    pub fn and_all(predicates: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        predicates
            .into_iter()
            .reduce(|acc, next| Expr::binary(BinaryOp::And, acc, next))
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary { op: UnaryOp::Not, .. } => 4,
            Expr::IsNull { .. } => 5,
            Expr::Unary { .. } => 9,
            _ => 10,
        }
    }

    /// Visits this expression and every sub-expression, parents first.
    pub fn walk(&self, visit: &mut dyn FnMut(&Expr)) {
        visit(self);
        match self {
            Expr::Property(base, _) => base.walk(visit),
            Expr::Function { args, .. } | Expr::List(args) => {
                args.iter().for_each(|a| a.walk(visit))
            }
            Expr::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } => expr.walk(visit),
            Expr::Map(entries) => entries.iter().for_each(|(_, v)| v.walk(visit)),
            Expr::Case {
                operand,
                branches,
                otherwise,
            } => {
                if let Some(operand) = operand {
                    operand.walk(visit);
                }
                for (when, then) in branches {
                    when.walk(visit);
                    then.walk(visit);
                }
                if let Some(otherwise) = otherwise {
                    otherwise.walk(visit);
                }
            }
            Expr::Literal(_) | Expr::Parameter(_) | Expr::Variable(_) | Expr::CountStar => {}
        }
    }

    /// True when `predicate` holds for this expression or any sub-expression.
    pub fn any(&self, predicate: &dyn Fn(&Expr) -> bool) -> bool {
        let mut found = false;
        self.walk(&mut |e| found |= predicate(e));
        found
    }

    /// Rebuilds the expression top-down, replacing every sub-expression for
    /// which `substitute` returns `Some`.
    pub fn replace(&self, substitute: &dyn Fn(&Expr) -> Option<Expr>) -> Expr {
        if let Some(replacement) = substitute(self) {
            return replacement;
        }
        let boxed = |e: &Expr| Box::new(e.replace(substitute));
        match self {
            Expr::Property(base, key) => Expr::Property(boxed(base), key.clone()),
            Expr::Function {
                name,
                distinct,
                args,
            } => Expr::Function {
                name: name.clone(),
                distinct: *distinct,
                args: args.iter().map(|a| a.replace(substitute)).collect(),
            },
            Expr::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: boxed(left),
                right: boxed(right),
            },
            Expr::Unary { op, expr } => Expr::Unary {
                op: *op,
                expr: boxed(expr),
            },
            Expr::IsNull { expr, negated } => Expr::IsNull {
                expr: boxed(expr),
                negated: *negated,
            },
            Expr::List(items) => Expr::List(items.iter().map(|i| i.replace(substitute)).collect()),
            Expr::Map(entries) => Expr::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.replace(substitute)))
                    .collect(),
            ),
            Expr::Case {
                operand,
                branches,
                otherwise,
            } => Expr::Case {
                operand: operand.as_deref().map(boxed),
                branches: branches
                    .iter()
                    .map(|(w, t)| (w.replace(substitute), t.replace(substitute)))
                    .collect(),
                otherwise: otherwise.as_deref().map(boxed),
            },
            Expr::Literal(_) | Expr::Parameter(_) | Expr::Variable(_) | Expr::CountStar => {
                self.clone()
            }
        }
    }

    fn collect_parameters(&self, out: &mut Vec<String>) {
        self.walk(&mut |e| {
            if let Expr::Parameter(name) = e {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
        });
    }

    fn render_operand(&self, options: &RenderOptions, parens: bool) -> String {
        let text = self.to_cypher(options);
        if parens {
            format!("({})", text)
        } else {
            text
        }
    }
}

impl ToCypher for Literal {
    fn to_cypher(&self, _options: &RenderOptions) -> String {
        match self {
            Literal::Null => "NULL".to_string(),
            Literal::Boolean(b) => b.to_string(),
            Literal::Integer(i) => i.to_string(),
            Literal::Float(f) => f.clone(),
            Literal::String(s) => quote_string(s),
        }
    }
}

impl ToCypher for Expr {
    fn to_cypher(&self, options: &RenderOptions) -> String {
        match self {
            Expr::Literal(literal) => literal.to_cypher(options),
            Expr::Parameter(name) => {
                if name.chars().all(|c| c.is_ascii_digit()) {
                    format!("${}", name)
                } else {
                    format!("${}", escape_name(name, false))
                }
            }
            Expr::Variable(name) => escape_name(name, false).into_owned(),
            Expr::Property(base, key) => format!(
                "{}.{}",
                base.render_operand(options, base.precedence() < 10),
                escape_name(key, false)
            ),
            Expr::Function {
                name,
                distinct,
                args,
            } => format!(
                "{}({}{})",
                name,
                if *distinct { "DISTINCT " } else { "" },
                render_list(args, options)
            ),
            Expr::CountStar => "count(*)".to_string(),
            Expr::Binary { op, left, right } => {
                let prec = op.precedence();
                let right_parens = if op.is_associative() {
                    right.precedence() < prec
                } else {
                    right.precedence() <= prec
                };
                let left_parens = if prec == 5 {
                    left.precedence() <= prec
                } else {
                    left.precedence() < prec
                };
                format!(
                    "{} {} {}",
                    left.render_operand(options, left_parens),
                    op.symbol(),
                    right.render_operand(options, right_parens)
                )
            }
            Expr::Unary { op, expr } => match op {
                UnaryOp::Not => format!("NOT {}", expr.render_operand(options, expr.precedence() < 4)),
                UnaryOp::Minus => format!("-{}", expr.render_operand(options, expr.precedence() < 9)),
                UnaryOp::Plus => format!("+{}", expr.render_operand(options, expr.precedence() < 9)),
            },
            Expr::IsNull { expr, negated } => format!(
                "{} IS {}NULL",
                expr.render_operand(options, expr.precedence() < 6),
                if *negated { "NOT " } else { "" }
            ),
            Expr::List(items) => format!("[{}]", render_list(items, options)),
            Expr::Map(entries) => render_map(entries, options),
            Expr::Case {
                operand,
                branches,
                otherwise,
            } => {
                let mut text = String::from("CASE");
                if let Some(operand) = operand {
                    text.push(' ');
                    text.push_str(&operand.to_cypher(options));
                }
                for (when, then) in branches {
                    text.push_str(&format!(
                        " WHEN {} THEN {}",
                        when.to_cypher(options),
                        then.to_cypher(options)
                    ));
                }
                if let Some(otherwise) = otherwise {
                    text.push_str(&format!(" ELSE {}", otherwise.to_cypher(options)));
                }
                text.push_str(" END");
                text
            }
        }
    }
}

fn render_list(items: &[Expr], options: &RenderOptions) -> String {
    items
        .iter()
        .map(|e| e.to_cypher(options))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_map(entries: &[(String, Expr)], options: &RenderOptions) -> String {
    let body = entries
        .iter()
        .map(|(k, v)| format!("{}: {}", escape_name(k, false), v.to_cypher(options)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", body)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub labels: Vec<String>,
    pub properties: Vec<(String, Expr)>,
}

impl NodePattern {
    pub fn new(variable: impl Into<String>, label: Option<&str>) -> Self {
        Self {
            variable: Some(variable.into()),
            labels: label.map(|l| vec![l.to_string()]).unwrap_or_default(),
            properties: Vec::new(),
        }
    }

    /// A reference to an already bound variable.
    pub fn bound(variable: impl Into<String>) -> Self {
        Self::new(variable, None)
    }

    pub fn with_properties(mut self, properties: Vec<(String, Expr)>) -> Self {
        self.properties = properties;
        self
    }
}

impl ToCypher for NodePattern {
    fn to_cypher(&self, options: &RenderOptions) -> String {
        let mut text = String::from("(");
        if let Some(variable) = &self.variable {
            text.push_str(&escape_name(variable, false));
        }
        for label in &self.labels {
            text.push(':');
            text.push_str(&escape_label(label, options));
        }
        if !self.properties.is_empty() {
            text.push(' ');
            text.push_str(&render_map(&self.properties, options));
        }
        text.push(')');
        text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternDirection {
    Outgoing,
    Incoming,
    Undirected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelPattern {
    pub variable: Option<String>,
    pub rel_type: Option<String>,
    pub direction: PatternDirection,
    pub properties: Vec<(String, Expr)>,
}

impl RelPattern {
    pub fn new(variable: Option<String>, rel_type: &str, direction: PatternDirection) -> Self {
        Self {
            variable,
            rel_type: Some(rel_type.to_string()),
            direction,
            properties: Vec::new(),
        }
    }

    pub fn with_properties(mut self, properties: Vec<(String, Expr)>) -> Self {
        self.properties = properties;
        self
    }
}

impl ToCypher for RelPattern {
    fn to_cypher(&self, options: &RenderOptions) -> String {
        let mut inner = String::new();
        if let Some(variable) = &self.variable {
            inner.push_str(&escape_name(variable, false));
        }
        if let Some(rel_type) = &self.rel_type {
            inner.push(':');
            inner.push_str(&escape_label(rel_type, options));
        }
        if !self.properties.is_empty() {
            inner.push(' ');
            inner.push_str(&render_map(&self.properties, options));
        }
        match self.direction {
            PatternDirection::Outgoing => format!("-[{}]->", inner),
            PatternDirection::Incoming => format!("<-[{}]-", inner),
            PatternDirection::Undirected => format!("-[{}]-", inner),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    pub start: NodePattern,
    pub steps: Vec<(RelPattern, NodePattern)>,
}

impl PathPattern {
    pub fn node(start: NodePattern) -> Self {
        Self {
            start,
            steps: Vec::new(),
        }
    }

    pub fn then(mut self, rel: RelPattern, node: NodePattern) -> Self {
        self.steps.push((rel, node));
        self
    }
}

impl ToCypher for PathPattern {
    fn to_cypher(&self, options: &RenderOptions) -> String {
        let mut text = self.start.to_cypher(options);
        for (rel, node) in &self.steps {
            text.push_str(&rel.to_cypher(options));
            text.push_str(&node.to_cypher(options));
        }
        text
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl ProjectionItem {
    pub fn new(expr: Expr, alias: Option<String>) -> Self {
        Self { expr, alias }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortItem {
    pub expr: Expr,
    pub descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub distinct: bool,
    /// Leading `*`, carried before any explicit items.
    pub star: bool,
    pub items: Vec<ProjectionItem>,
    pub order_by: Vec<SortItem>,
    pub skip: Option<Expr>,
    pub limit: Option<Expr>,
}

impl Projection {
    pub fn items(items: Vec<ProjectionItem>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    pub fn star() -> Self {
        Self {
            star: true,
            ..Default::default()
        }
    }

    fn expressions(&self) -> impl Iterator<Item = &Expr> {
        self.items
            .iter()
            .map(|i| &i.expr)
            .chain(self.order_by.iter().map(|s| &s.expr))
            .chain(self.skip.iter())
            .chain(self.limit.iter())
    }
}

impl ToCypher for Projection {
    fn to_cypher(&self, options: &RenderOptions) -> String {
        let mut parts = Vec::new();
        if self.star {
            parts.push("*".to_string());
        }
        for item in &self.items {
            let expr = item.expr.to_cypher(options);
            match &item.alias {
                Some(alias) if *alias != expr => {
                    parts.push(format!("{} AS {}", expr, escape_name(alias, false)))
                }
                _ => parts.push(expr),
            }
        }
        let mut text = String::new();
        if self.distinct {
            text.push_str("DISTINCT ");
        }
        text.push_str(&parts.join(", "));
        if !self.order_by.is_empty() {
            let keys = self
                .order_by
                .iter()
                .map(|s| {
                    let expr = s.expr.to_cypher(options);
                    if s.descending {
                        format!("{} DESC", expr)
                    } else {
                        expr
                    }
                })
                .collect::<Vec<_>>();
            text.push_str(" ORDER BY ");
            text.push_str(&keys.join(", "));
        }
        if let Some(skip) = &self.skip {
            text.push_str(" SKIP ");
            text.push_str(&skip.to_cypher(options));
        }
        if let Some(limit) = &self.limit {
            text.push_str(" LIMIT ");
            text.push_str(&limit.to_cypher(options));
        }
        text
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetItem {
    pub target: Expr,
    pub value: Expr,
}

impl SetItem {
    pub fn property(variable: &str, key: &str, value: Expr) -> Self {
        Self {
            target: Expr::prop(variable, key),
            value,
        }
    }
}

fn render_set_items(items: &[SetItem], options: &RenderOptions) -> String {
    items
        .iter()
        .map(|i| format!("{} = {}", i.target.to_cypher(options), i.value.to_cypher(options)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_patterns(patterns: &[PathPattern], options: &RenderOptions) -> String {
    patterns
        .iter()
        .map(|p| p.to_cypher(options))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match {
        optional: bool,
        patterns: Vec<PathPattern>,
        filter: Option<Expr>,
    },
    /// `CALL { <query> }` around a view's verbatim query text.
    CallSubquery(String),
    CallProcedure {
        name: String,
        args: Vec<Expr>,
        yields: Vec<String>,
        filter: Option<Expr>,
    },
    With {
        projection: Projection,
        filter: Option<Expr>,
    },
    Return(Projection),
    Create(Vec<PathPattern>),
    Merge {
        pattern: PathPattern,
        on_create: Vec<SetItem>,
        on_match: Vec<SetItem>,
    },
    Set(Vec<SetItem>),
    Delete {
        detach: bool,
        variables: Vec<String>,
    },
    Union {
        all: bool,
    },
    Finish,
}

impl Clause {
    pub fn matching(patterns: Vec<PathPattern>, filter: Option<Expr>) -> Self {
        Clause::Match {
            optional: false,
            patterns,
            filter,
        }
    }

    fn expressions(&self) -> Vec<&Expr> {
        fn pattern_exprs(pattern: &PathPattern) -> impl Iterator<Item = &Expr> {
            pattern
                .start
                .properties
                .iter()
                .chain(
                    pattern
                        .steps
                        .iter()
                        .flat_map(|(r, n)| r.properties.iter().chain(n.properties.iter())),
                )
                .map(|(_, e)| e)
        }
        fn set_exprs(items: &[SetItem]) -> impl Iterator<Item = &Expr> {
            items.iter().flat_map(|i| [&i.target, &i.value])
        }

        match self {
            Clause::Match {
                patterns, filter, ..
            } => patterns
                .iter()
                .flat_map(pattern_exprs)
                .chain(filter.iter())
                .collect(),
            Clause::CallProcedure { args, filter, .. } => {
                args.iter().chain(filter.iter()).collect()
            }
            Clause::With { projection, filter } => {
                projection.expressions().chain(filter.iter()).collect()
            }
            Clause::Return(projection) => projection.expressions().collect(),
            Clause::Create(patterns) => patterns.iter().flat_map(pattern_exprs).collect(),
            Clause::Merge {
                pattern,
                on_create,
                on_match,
            } => pattern_exprs(pattern)
                .chain(set_exprs(on_create))
                .chain(set_exprs(on_match))
                .collect(),
            Clause::Set(items) => set_exprs(items).collect(),
            Clause::CallSubquery(_) | Clause::Delete { .. } | Clause::Union { .. } | Clause::Finish => {
                Vec::new()
            }
        }
    }
}

impl ToCypher for Clause {
    fn to_cypher(&self, options: &RenderOptions) -> String {
        match self {
            Clause::Match {
                optional,
                patterns,
                filter,
            } => {
                let mut text = format!(
                    "{}MATCH {}",
                    if *optional { "OPTIONAL " } else { "" },
                    render_patterns(patterns, options)
                );
                if let Some(filter) = filter {
                    text.push_str(" WHERE ");
                    text.push_str(&filter.to_cypher(options));
                }
                text
            }
            Clause::CallSubquery(query) => format!("CALL {{{}}}", query.trim()),
            Clause::CallProcedure {
                name,
                args,
                yields,
                filter,
            } => {
                let mut text = format!("CALL {}({})", name, render_list(args, options));
                if !yields.is_empty() {
                    let names = yields
                        .iter()
                        .map(|y| escape_name(y, false).into_owned())
                        .collect::<Vec<_>>();
                    text.push_str(" YIELD ");
                    text.push_str(&names.join(", "));
                }
                if let Some(filter) = filter {
                    text.push_str(" WHERE ");
                    text.push_str(&filter.to_cypher(options));
                }
                text
            }
            Clause::With { projection, filter } => {
                let mut text = format!("WITH {}", projection.to_cypher(options));
                if let Some(filter) = filter {
                    text.push_str(" WHERE ");
                    text.push_str(&filter.to_cypher(options));
                }
                text
            }
            Clause::Return(projection) => format!("RETURN {}", projection.to_cypher(options)),
            Clause::Create(patterns) => format!("CREATE {}", render_patterns(patterns, options)),
            Clause::Merge {
                pattern,
                on_create,
                on_match,
            } => {
                let mut text = format!("MERGE {}", pattern.to_cypher(options));
                if !on_create.is_empty() {
                    text.push_str(" ON CREATE SET ");
                    text.push_str(&render_set_items(on_create, options));
                }
                if !on_match.is_empty() {
                    text.push_str(" ON MATCH SET ");
                    text.push_str(&render_set_items(on_match, options));
                }
                text
            }
            Clause::Set(items) => format!("SET {}", render_set_items(items, options)),
            Clause::Delete { detach, variables } => format!(
                "{}DELETE {}",
                if *detach { "DETACH " } else { "" },
                variables
                    .iter()
                    .map(|v| escape_name(v, false).into_owned())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Clause::Union { all } => {
                if *all {
                    "UNION ALL".to_string()
                } else {
                    "UNION".to_string()
                }
            }
            Clause::Finish => "FINISH".to_string(),
        }
    }
}

/// A complete Cypher statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub clauses: Vec<Clause>,
}

impl Statement {
    pub fn new(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }

    /// Parameter names in order of first appearance.
    pub fn parameter_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for clause in &self.clauses {
            for expr in clause.expressions() {
                expr.collect_parameters(&mut names);
            }
        }
        names
    }
}

impl ToCypher for Statement {
    fn to_cypher(&self, options: &RenderOptions) -> String {
        let separator = if options.pretty { "\n" } else { " " };
        self.clauses
            .iter()
            .map(|c| c.to_cypher(options))
            .collect::<Vec<_>>()
            .join(separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(expr: &Expr) -> String {
        expr.to_cypher(&RenderOptions::default())
    }

    #[test]
    fn test_escape_name() {
        assert_eq!(escape_name("name", false), "name");
        assert_eq!(escape_name("first name", false), "`first name`");
        assert_eq!(escape_name("v$id", false), "`v$id`");
        assert_eq!(escape_name("order", false), "`order`");
        assert_eq!(escape_name("a`b", false), "`a``b`");
        assert_eq!(escape_name("name", true), "`name`");
    }

    #[test]
    fn test_string_literals_are_escaped() {
        assert_eq!(render(&Expr::string("it's")), r"'it\'s'");
        assert_eq!(render(&Expr::string(r"a\b")), r"'a\\b'");
    }

    #[test]
    fn test_precedence_parentheses() {
        let sum = Expr::binary(BinaryOp::Add, Expr::var("a"), Expr::var("b"));
        let product = Expr::binary(BinaryOp::Mul, sum.clone(), Expr::var("c"));
        assert_eq!(render(&product), "(a + b) * c");

        let diff = Expr::binary(BinaryOp::Sub, Expr::var("a"), sum);
        assert_eq!(render(&diff), "a - (a + b)");

        let or = Expr::binary(BinaryOp::Or, Expr::var("x"), Expr::var("y"));
        let and = Expr::binary(BinaryOp::And, or.clone(), Expr::var("z"));
        assert_eq!(render(&and), "(x OR y) AND z");
        assert_eq!(render(&Expr::not(or)), "NOT (x OR y)");
    }

    #[test]
    fn test_is_null_and_property() {
        let expr = Expr::IsNull {
            expr: Box::new(Expr::prop("n", "name")),
            negated: true,
        };
        assert_eq!(render(&expr), "n.name IS NOT NULL");
    }

    #[test]
    fn test_pattern_rendering() {
        let path = PathPattern::node(NodePattern::new("p", Some("Person"))).then(
            RelPattern::new(Some("r".into()), "ACTED_IN", PatternDirection::Outgoing),
            NodePattern::new("m", Some("Movie")),
        );
        assert_eq!(
            path.to_cypher(&RenderOptions::default()),
            "(p:Person)-[r:ACTED_IN]->(m:Movie)"
        );
        let escaped = RenderOptions {
            always_escape: true,
            pretty: false,
        };
        assert_eq!(
            path.to_cypher(&escaped),
            "(p:`Person`)-[r:`ACTED_IN`]->(m:`Movie`)"
        );
    }

    #[test]
    fn test_statement_rendering_and_parameters() {
        let statement = Statement::new(vec![
            Clause::matching(
                vec![PathPattern::node(NodePattern::new("n", Some("Movie")))],
                Some(Expr::binary(
                    BinaryOp::Eq,
                    Expr::prop("n", "title"),
                    Expr::Parameter("1".into()),
                )),
            ),
            Clause::Return(Projection {
                limit: Some(Expr::Parameter("1".into())),
                ..Projection::items(vec![ProjectionItem::new(
                    Expr::prop("n", "title"),
                    Some("title".into()),
                )])
            }),
        ]);
        assert_eq!(
            statement.to_cypher(&RenderOptions::default()),
            "MATCH (n:Movie) WHERE n.title = $1 RETURN n.title AS title LIMIT $1"
        );
        assert_eq!(
            statement.to_cypher(&RenderOptions {
                always_escape: false,
                pretty: true
            }),
            "MATCH (n:Movie) WHERE n.title = $1\nRETURN n.title AS title LIMIT $1"
        );
        assert_eq!(statement.parameter_names(), vec!["1".to_string()]);
    }

    #[test]
    fn test_replace_substitutes_subexpressions() {
        let expr = Expr::binary(BinaryOp::Gt, Expr::CountStar, Expr::integer(1));
        let replaced = expr.replace(&|e| match e {
            Expr::CountStar => Some(Expr::var("__agg_0")),
            _ => None,
        });
        assert_eq!(render(&replaced), "__agg_0 > 1");
    }
}
