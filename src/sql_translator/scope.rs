//! Name resolution: FROM items to bindings, column references to Cypher expressions.

use sqlparser::ast::{Ident, ObjectName};

use crate::config::NameCase;
use crate::graph_catalog::{
    endpoint_id_column, ColumnSource, RelationshipInfo, SchemaSnapshot, TableKind, ViewDefinition,
    VirtualTable, ELEMENT_ID_COLUMN, END_ID_COLUMN, START_ID_COLUMN,
};

use super::cypher::Expr;
use super::errors::TranslationError;

/// What a table name in a statement refers to.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ResolvedTable {
    Node {
        label: String,
        table: Option<VirtualTable>,
    },
    Relationship {
        info: RelationshipInfo,
        table: Option<VirtualTable>,
    },
    View(ViewDefinition),
}

impl ResolvedTable {
    pub fn table(&self) -> Option<&VirtualTable> {
        match self {
            ResolvedTable::Node { table, .. } | ResolvedTable::Relationship { table, .. } => {
                table.as_ref()
            }
            ResolvedTable::View(_) => None,
        }
    }
}

/// Identifier text after applying the configured case folding to unquoted names.
pub(crate) fn ident_name(ident: &Ident, case: NameCase) -> String {
    match ident.quote_style {
        Some(_) => ident.value.clone(),
        None => case.apply(&ident.value),
    }
}

/// Last part of a possibly schema-qualified name.
pub(crate) fn object_name(name: &ObjectName, case: NameCase) -> String {
    name.0
        .last()
        .map(|i| ident_name(i, case))
        .unwrap_or_default()
}

/// `Start_TYPE_End` with an upper case middle part names a relationship.
fn split_relationship_name(name: &str) -> Option<RelationshipInfo> {
    let parts: Vec<&str> = name.split('_').collect();
    if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    let middle = parts[1..parts.len() - 1].join("_");
    let is_upper = middle.chars().any(|c| c.is_alphabetic())
        && middle.chars().all(|c| !c.is_lowercase());
    if !is_upper {
        return None;
    }
    Some(RelationshipInfo::new(parts[0], &middle, parts[parts.len() - 1]))
}

/// View, then configured label mapping, then catalog table, then name shape.
pub(crate) fn resolve_table(snapshot: &SchemaSnapshot, name: &str) -> ResolvedTable {
    if let Some(view) = snapshot.view(name) {
        return ResolvedTable::View(view.clone());
    }
    if let Some(label) = snapshot.mapped_label(name) {
        return ResolvedTable::Node {
            label: label.to_string(),
            table: snapshot.node_table(label).cloned(),
        };
    }
    if let Some(table) = snapshot.table(name).or_else(|| snapshot.table_ignore_case(name)) {
        match (&table.kind, &table.relationship, &table.label) {
            (TableKind::RelationshipJoin, Some(info), _) => {
                return ResolvedTable::Relationship {
                    info: info.clone(),
                    table: Some(table.clone()),
                }
            }
            (TableKind::Node, _, Some(label)) => {
                return ResolvedTable::Node {
                    label: label.clone(),
                    table: Some(table.clone()),
                }
            }
            _ => {}
        }
    }
    match split_relationship_name(name) {
        Some(info) => ResolvedTable::Relationship { info, table: None },
        None => ResolvedTable::Node {
            label: name.to_string(),
            table: None,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BindingKind {
    Node {
        label: String,
    },
    Relationship {
        info: RelationshipInfo,
        start_var: String,
        end_var: String,
    },
    /// `mapped`: the view's rows are carried as one map variable instead of
    /// the query's own return variables.
    View {
        view: ViewDefinition,
        mapped: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Binding {
    /// Table name as written in the statement.
    pub sql_name: String,
    pub alias: Option<String>,
    pub var: String,
    pub table: Option<VirtualTable>,
    pub kind: BindingKind,
    /// Introduced by a LEFT JOIN.
    pub optional: bool,
}

impl Binding {
    pub fn is_relationship(&self) -> bool {
        matches!(self.kind, BindingKind::Relationship { .. })
    }

    pub fn is_view(&self) -> bool {
        matches!(self.kind, BindingKind::View { .. })
    }

    fn answers_to(&self, qualifier: &str) -> bool {
        match &self.alias {
            Some(alias) => alias.eq_ignore_ascii_case(qualifier),
            None => {
                self.sql_name.eq_ignore_ascii_case(qualifier)
                    || self
                        .table
                        .as_ref()
                        .is_some_and(|t| t.name.eq_ignore_ascii_case(qualifier))
            }
        }
    }

    fn catalog_column(&self, column: &str) -> Option<&ColumnSource> {
        let table = self.table.as_ref()?;
        table
            .column(column)
            .or_else(|| table.column_ignore_case(column))
            .map(|c| &c.source)
    }

    fn has_column(&self, column: &str) -> bool {
        match &self.kind {
            BindingKind::View { view, .. } => view.column(column).is_some(),
            _ => self.catalog_column(column).is_some(),
        }
    }

    /// Columns exposed by `*`, in catalog order.
    pub fn star_columns(&self) -> Vec<String> {
        match &self.kind {
            BindingKind::View { view, .. } => view.columns.iter().map(|c| c.name.clone()).collect(),
            _ => self
                .table
                .as_ref()
                .map(|t| t.columns.iter().map(|c| c.name.clone()).collect())
                .unwrap_or_default(),
        }
    }
}

/// Which entity of a binding a qualifier designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum Side {
    Whole,
    Start,
    End,
}

#[derive(Debug, Clone)]
pub(crate) struct Scope<'a> {
    pub snapshot: &'a SchemaSnapshot,
    pub name_case: NameCase,
    pub bindings: Vec<Binding>,
}

impl<'a> Scope<'a> {
    pub fn new(snapshot: &'a SchemaSnapshot, name_case: NameCase) -> Self {
        Self {
            snapshot,
            name_case,
            bindings: Vec::new(),
        }
    }

    pub fn name(&self, ident: &Ident) -> String {
        ident_name(ident, self.name_case)
    }

    fn var_taken(&self, var: &str) -> bool {
        self.bindings.iter().any(|b| {
            b.var == var
                || matches!(&b.kind, BindingKind::Relationship { start_var, end_var, .. }
                    if start_var == var || end_var == var)
        })
    }

    /// `base`, or `base` with the smallest numeric suffix not yet bound.
    pub fn fresh_var(&self, base: &str) -> String {
        if !self.var_taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{}{}", base, i))
            .find(|candidate| !self.var_taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Adds a binding for a FROM item and returns its index.
    pub fn bind(
        &mut self,
        sql_name: &str,
        alias: Option<String>,
        resolved: ResolvedTable,
        optional: bool,
    ) -> usize {
        let table = resolved.table().cloned();
        let base = alias.clone().unwrap_or_else(|| sql_name.to_lowercase());
        let var = self.fresh_var(&base);
        let kind = match resolved {
            ResolvedTable::Node { label, .. } => BindingKind::Node { label },
            ResolvedTable::Relationship { info, .. } => BindingKind::Relationship {
                info,
                start_var: String::new(),
                end_var: String::new(),
            },
            ResolvedTable::View(view) => BindingKind::View {
                view,
                mapped: false,
            },
        };
        self.bindings.push(Binding {
            sql_name: sql_name.to_string(),
            alias,
            var,
            table,
            kind,
            optional,
        });
        self.bindings.len() - 1
    }

    /// Binding (and the entity within it) a qualifier designates.
    pub fn qualifier(&self, qualifier: &str) -> Option<(usize, Side)> {
        if let Some(index) = self.bindings.iter().position(|b| b.answers_to(qualifier)) {
            return Some((index, Side::Whole));
        }
        if let Some(index) = self.bindings.iter().position(|b| b.var == qualifier) {
            return Some((index, Side::Whole));
        }
        // An endpoint label qualifies the endpoint of a relationship table.
        self.bindings.iter().enumerate().find_map(|(index, b)| match &b.kind {
            BindingKind::Relationship { info, .. } if info.start_label.eq_ignore_ascii_case(qualifier) => {
                Some((index, Side::Start))
            }
            BindingKind::Relationship { info, .. } if info.end_label.eq_ignore_ascii_case(qualifier) => {
                Some((index, Side::End))
            }
            BindingKind::Relationship { info, .. } if info.rel_type.eq_ignore_ascii_case(qualifier) => {
                Some((index, Side::Whole))
            }
            BindingKind::Node { label } if label.eq_ignore_ascii_case(qualifier) => {
                Some((index, Side::Whole))
            }
            _ => None,
        })
    }

    /// Binding an unqualified column belongs to: the first one exposing it,
    /// else the first binding.
    fn owner(&self, column: &str) -> Option<usize> {
        self.bindings
            .iter()
            .position(|b| b.has_column(column))
            .or(if self.bindings.is_empty() { None } else { Some(0) })
    }

    /// Expression for a (possibly qualified) column reference.
    pub fn resolve(&self, idents: &[Ident]) -> Result<Expr, TranslationError> {
        match idents {
            [] => Err(TranslationError::UnknownColumn(String::new())),
            [single] => {
                let column = self.name(single);
                if let Some(binding) = self
                    .bindings
                    .iter()
                    .find(|b| b.alias.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(&column)))
                {
                    return Ok(self.whole(binding));
                }
                let index = self
                    .owner(&column)
                    .ok_or_else(|| TranslationError::UnknownColumn(column.clone()))?;
                self.column(index, Side::Whole, &column)
            }
            [.., qualifier, column] => {
                let qualifier = self.name(qualifier);
                let column = self.name(column);
                let (index, side) = self
                    .qualifier(&qualifier)
                    .ok_or_else(|| TranslationError::UnknownTable(qualifier.clone()))?;
                self.column(index, side, &column)
            }
        }
    }

    /// The whole entity a binding stands for.
    pub fn whole(&self, binding: &Binding) -> Expr {
        match &binding.kind {
            BindingKind::View { view, mapped: false } => Expr::Map(
                view.columns
                    .iter()
                    .map(|c| (c.name.clone(), Expr::var(&c.property_name)))
                    .collect(),
            ),
            _ => Expr::var(&binding.var),
        }
    }

    pub fn column(&self, index: usize, side: Side, column: &str) -> Result<Expr, TranslationError> {
        let binding = &self.bindings[index];
        match &binding.kind {
            BindingKind::Node { .. } => {
                if column.eq_ignore_ascii_case(ELEMENT_ID_COLUMN) {
                    return Ok(Expr::element_id(&binding.var));
                }
                Ok(Expr::prop(&binding.var, property_of(binding, column)))
            }
            BindingKind::Relationship {
                info,
                start_var,
                end_var,
            } => {
                let endpoint = match side {
                    Side::Start => Some(start_var),
                    Side::End => Some(end_var),
                    Side::Whole => None,
                };
                if let Some(var) = endpoint {
                    if column.eq_ignore_ascii_case(ELEMENT_ID_COLUMN) {
                        return Ok(Expr::element_id(var));
                    }
                    return Ok(Expr::prop(var, column));
                }
                let lower = column.to_lowercase();
                if lower == ELEMENT_ID_COLUMN {
                    return Ok(Expr::element_id(&binding.var));
                }
                if lower == START_ID_COLUMN || lower == endpoint_id_column(&info.start_label) {
                    return Ok(Expr::element_id(start_var));
                }
                if lower == END_ID_COLUMN || lower == endpoint_id_column(&info.end_label) {
                    return Ok(Expr::element_id(end_var));
                }
                Ok(match binding.catalog_column(column) {
                    Some(ColumnSource::StartProperty(p)) => Expr::prop(start_var, p),
                    Some(ColumnSource::EndProperty(p)) => Expr::prop(end_var, p),
                    Some(ColumnSource::Property(p)) => Expr::prop(&binding.var, p),
                    _ => Expr::prop(&binding.var, column),
                })
            }
            BindingKind::View { view, mapped } => {
                let view_column = view
                    .column(column)
                    .ok_or_else(|| TranslationError::UnknownColumn(format!("{}.{}", view.name, column)))?;
                Ok(if *mapped {
                    Expr::prop(&binding.var, &view_column.name)
                } else {
                    Expr::var(&view_column.property_name)
                })
            }
        }
    }
}

fn property_of(binding: &Binding, column: &str) -> String {
    match binding.catalog_column(column) {
        Some(ColumnSource::Property(p)) => p.clone(),
        _ => column.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_catalog::{GraphType, VirtualColumn};
    use crate::sql_translator::cypher::{RenderOptions, ToCypher};

    fn snapshot() -> SchemaSnapshot {
        let info = RelationshipInfo::new("Start", "REL", "End");
        SchemaSnapshot {
            tables: vec![
                VirtualTable::node(
                    "Person",
                    vec![VirtualColumn::property("name", GraphType::String, false)],
                ),
                VirtualTable::relationship_join(
                    info,
                    vec![VirtualColumn {
                        name: "start_col".into(),
                        graph_type: GraphType::String,
                        source: ColumnSource::StartProperty("col".into()),
                        nullable: false,
                    }],
                ),
            ],
            ..Default::default()
        }
    }

    fn ident(s: &str) -> Ident {
        Ident::new(s)
    }

    #[test]
    fn test_resolve_table_order() {
        let mut snap = snapshot();
        snap.table_mappings.insert("Customers".into(), "Customer".into());
        assert!(matches!(resolve_table(&snap, "customers"), ResolvedTable::Node { label, .. } if label == "Customer"));
        assert!(matches!(resolve_table(&snap, "Start_REL_End"), ResolvedTable::Relationship { table: Some(_), .. }));
        assert!(matches!(
            resolve_table(&snap, "Person_ACTED_IN_Movie"),
            ResolvedTable::Relationship { info, table: None } if info.rel_type == "ACTED_IN" && info.end_label == "Movie"
        ));
        assert!(matches!(resolve_table(&snap, "Movies"), ResolvedTable::Node { label, .. } if label == "Movies"));
        assert!(matches!(resolve_table(&snap, "my_table_name"), ResolvedTable::Node { .. }));
    }

    #[test]
    fn test_relationship_columns() {
        let snap = snapshot();
        let mut scope = Scope::new(&snap, NameCase::AsIs);
        let resolved = resolve_table(&snap, "Start_REL_End");
        let index = scope.bind("Start_REL_End", None, resolved, false);
        if let BindingKind::Relationship { start_var, end_var, .. } = &mut scope.bindings[index].kind {
            *start_var = "_lhs".into();
            *end_var = "_rhs".into();
        }
        let render = |e: Expr| e.to_cypher(&RenderOptions::default());
        assert_eq!(render(scope.resolve(&[ident("start_col")]).unwrap()), "_lhs.col");
        assert_eq!(render(scope.resolve(&[ident("v$end_id")]).unwrap()), "elementId(_rhs)");
        assert_eq!(render(scope.resolve(&[ident("v$start_id")]).unwrap()), "elementId(_lhs)");
        assert_eq!(render(scope.resolve(&[ident("v$id")]).unwrap()), "elementId(start_rel_end)");
        assert_eq!(
            render(scope.resolve(&[ident("Start"), ident("name")]).unwrap()),
            "_lhs.name"
        );
    }

    #[test]
    fn test_alias_resolves_to_whole_entity() {
        let snap = snapshot();
        let mut scope = Scope::new(&snap, NameCase::AsIs);
        scope.bind("Person", Some("p".into()), resolve_table(&snap, "Person"), false);
        assert_eq!(scope.resolve(&[ident("p")]).unwrap(), Expr::var("p"));
        assert_eq!(scope.resolve(&[ident("name")]).unwrap(), Expr::prop("p", "name"));
        assert!(matches!(
            scope.resolve(&[ident("x"), ident("name")]),
            Err(TranslationError::UnknownTable(_))
        ));
    }

    #[test]
    fn test_fresh_vars_for_self_join() {
        let snap = snapshot();
        let mut scope = Scope::new(&snap, NameCase::AsIs);
        scope.bind("Person", None, resolve_table(&snap, "Person"), false);
        scope.bind("Person", None, resolve_table(&snap, "Person"), false);
        assert_eq!(scope.bindings[0].var, "person");
        assert_eq!(scope.bindings[1].var, "person1");
    }
}
