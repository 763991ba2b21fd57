//! Join Resolver
//!
//! Turns the tables of a FROM clause plus their join predicates into graph
//! patterns. Every node binding is one pattern term and every relationship
//! binding contributes a start and an end term; identity-column equalities
//! (`p.v$id = r.v$start_id`) merge terms into one node variable. What is left
//! is a set of relationship legs between node classes, chained greedily into
//! paths.
//!
//! Predicates that pair non-identity columns are an error inside `ON` and a
//! plain filter inside `WHERE`.

use std::collections::{BTreeMap, HashMap, HashSet};

use sqlparser::ast::{BinaryOperator, Expr as SqlExpr, Ident};

use crate::graph_catalog::{endpoint_id_column, ELEMENT_ID_COLUMN, END_ID_COLUMN, START_ID_COLUMN};

use super::cypher::{NodePattern, PathPattern, PatternDirection, RelPattern};
use super::errors::TranslationError;
use super::scope::{BindingKind, Scope, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PredicateOrigin {
    /// `ON` of the join that introduced `binding`.
    On { binding: usize, optional: bool },
    Where,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct JoinPredicate<'q> {
    pub expr: &'q SqlExpr,
    pub origin: PredicateOrigin,
}

/// `left JOIN right USING (REL_TYPE)`.
#[derive(Debug, Clone)]
pub(crate) struct UsingJoin {
    pub left: usize,
    pub right: usize,
    pub names: Vec<Ident>,
    pub optional: bool,
}

#[derive(Debug, Default)]
pub(crate) struct OptionalMatch<'q> {
    pub patterns: Vec<PathPattern>,
    pub filters: Vec<&'q SqlExpr>,
}

#[derive(Debug, Default)]
pub(crate) struct GraphPattern<'q> {
    pub patterns: Vec<PathPattern>,
    pub optional: Vec<OptionalMatch<'q>>,
    /// Predicates left for the `WHERE` of the main match.
    pub filters: Vec<&'q SqlExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Term {
    binding: usize,
    side: Side,
}

#[derive(Debug, Clone)]
struct Leg {
    var: String,
    rel_type: String,
    start: usize,
    end: usize,
    /// Binding whose LEFT JOIN made this leg optional.
    owner: Option<usize>,
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Keeps the smaller root so a class is represented by its earliest term.
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (keep, drop) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[drop] = keep;
        }
    }
}

/// Splits a predicate into its `AND`-ed conjuncts.
pub(crate) fn conjuncts(expr: &SqlExpr) -> Vec<&SqlExpr> {
    match expr {
        SqlExpr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            let mut all = conjuncts(left);
            all.extend(conjuncts(right));
            all
        }
        SqlExpr::Nested(inner) if matches!(**inner, SqlExpr::BinaryOp { op: BinaryOperator::And, .. }) => {
            conjuncts(inner)
        }
        other => vec![other],
    }
}

fn column_idents(expr: &SqlExpr) -> Option<&[Ident]> {
    match expr {
        SqlExpr::Identifier(ident) => Some(std::slice::from_ref(ident)),
        SqlExpr::CompoundIdentifier(idents) => Some(idents.as_slice()),
        SqlExpr::Nested(inner) => column_idents(inner),
        _ => None,
    }
}

struct Resolver<'s, 'a> {
    scope: &'s mut Scope<'a>,
    terms: Vec<Term>,
    index: HashMap<Term, usize>,
    classes: UnionFind,
    legs: Vec<Leg>,
}

impl<'s, 'a> Resolver<'s, 'a> {
    fn new(scope: &'s mut Scope<'a>) -> Self {
        let mut terms = Vec::new();
        for (binding, b) in scope.bindings.iter().enumerate() {
            match b.kind {
                BindingKind::Node { .. } => terms.push(Term {
                    binding,
                    side: Side::Whole,
                }),
                BindingKind::Relationship { .. } => {
                    terms.push(Term {
                        binding,
                        side: Side::Start,
                    });
                    terms.push(Term {
                        binding,
                        side: Side::End,
                    });
                }
                BindingKind::View { .. } => {}
            }
        }
        let index = terms.iter().enumerate().map(|(i, t)| (*t, i)).collect();
        let classes = UnionFind::new(terms.len());
        let mut resolver = Self {
            scope,
            terms,
            index,
            classes,
            legs: Vec::new(),
        };
        for (binding, b) in resolver.scope.bindings.iter().enumerate() {
            if let BindingKind::Relationship { info, .. } = &b.kind {
                let start = resolver.index[&Term {
                    binding,
                    side: Side::Start,
                }];
                let end = resolver.index[&Term {
                    binding,
                    side: Side::End,
                }];
                resolver.legs.push(Leg {
                    var: b.var.clone(),
                    rel_type: info.rel_type.clone(),
                    start,
                    end,
                    owner: b.optional.then_some(binding),
                });
            }
        }
        resolver
    }

    fn label(&self, term: usize) -> &str {
        let t = self.terms[term];
        match (&self.scope.bindings[t.binding].kind, t.side) {
            (BindingKind::Node { label }, _) => label,
            (BindingKind::Relationship { info, .. }, Side::End) => &info.end_label,
            (BindingKind::Relationship { info, .. }, _) => &info.start_label,
            (BindingKind::View { view, .. }, _) => &view.name,
        }
    }

    fn display(&self, term: usize) -> String {
        let t = self.terms[term];
        let b = &self.scope.bindings[t.binding];
        let name = b.alias.as_deref().unwrap_or(&b.sql_name);
        match t.side {
            Side::Whole => name.to_string(),
            Side::Start => format!("{}.{}", name, START_ID_COLUMN),
            Side::End => format!("{}.{}", name, END_ID_COLUMN),
        }
    }

    /// The pattern term an identity column reference stands for.
    fn identity_term(&self, expr: &SqlExpr) -> Option<usize> {
        let idents = column_idents(expr)?;
        let term = match idents {
            [single] => {
                let column = self.scope.name(single);
                self.scope
                    .bindings
                    .iter()
                    .enumerate()
                    .find_map(|(i, _)| self.identity_side(i, Side::Whole, &column).map(|s| (i, s)))
            }
            [.., qualifier, column] => {
                let (binding, side) = self.scope.qualifier(&self.scope.name(qualifier))?;
                let column = self.scope.name(column);
                self.identity_side(binding, side, &column).map(|s| (binding, s))
            }
            [] => None,
        }?;
        self.index
            .get(&Term {
                binding: term.0,
                side: term.1,
            })
            .copied()
    }

    fn identity_side(&self, binding: usize, side: Side, column: &str) -> Option<Side> {
        let column = column.to_lowercase();
        match (&self.scope.bindings[binding].kind, side) {
            (BindingKind::Node { .. }, Side::Whole) if column == ELEMENT_ID_COLUMN => Some(Side::Whole),
            (BindingKind::Relationship { .. }, Side::Start | Side::End) if column == ELEMENT_ID_COLUMN => {
                Some(side)
            }
            (BindingKind::Relationship { info, .. }, Side::Whole) => {
                if column == START_ID_COLUMN || column == endpoint_id_column(&info.start_label) {
                    Some(Side::Start)
                } else if column == END_ID_COLUMN || column == endpoint_id_column(&info.end_label) {
                    Some(Side::End)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Node binding and column of a join-column-mapped reference.
    fn mapped_column(&self, expr: &SqlExpr) -> Option<(usize, String)> {
        let idents = column_idents(expr)?;
        let (binding, column) = match idents {
            [single] => {
                let column = self.scope.name(single);
                let binding = self.scope.bindings.iter().position(|b| {
                    self.scope
                        .snapshot
                        .join_column_mapping(&b.sql_name, &column)
                        .is_some()
                })?;
                (binding, column)
            }
            [.., qualifier, column] => {
                let (binding, side) = self.scope.qualifier(&self.scope.name(qualifier))?;
                if side != Side::Whole {
                    return None;
                }
                (binding, self.scope.name(column))
            }
            [] => return None,
        };
        matches!(self.scope.bindings[binding].kind, BindingKind::Node { .. }).then_some((binding, column))
    }

    fn node_term(&self, binding: usize) -> Option<usize> {
        self.index
            .get(&Term {
                binding,
                side: Side::Whole,
            })
            .copied()
    }

    fn merge(&mut self, a: usize, b: usize) -> Result<(), TranslationError> {
        let (ra, rb) = (self.classes.find(a), self.classes.find(b));
        if ra == rb {
            return Ok(());
        }
        if self.label(ra) != self.label(rb) {
            return Err(TranslationError::LabelMismatch {
                left: self.display(a),
                right: self.display(b),
                left_label: self.label(ra).to_string(),
                right_label: self.label(rb).to_string(),
            });
        }
        self.classes.union(a, b);
        Ok(())
    }

    fn leg_var(&self, rel_type: &str) -> String {
        let base = rel_type.to_lowercase();
        let taken: HashSet<&str> = self.legs.iter().map(|l| l.var.as_str()).collect();
        let mut candidate = self.scope.fresh_var(&base);
        let mut suffix = 1;
        while taken.contains(candidate.as_str()) {
            candidate = self.scope.fresh_var(&format!("{}{}", base, suffix));
            suffix += 1;
        }
        candidate
    }

    /// `ON a.col = b.col` where `a.col` is mapped to a relationship type.
    fn mapped_leg(&mut self, left: &SqlExpr, right: &SqlExpr, owner: Option<usize>) -> bool {
        let (Some((lb, lc)), Some((rb, rc))) = (self.mapped_column(left), self.mapped_column(right)) else {
            return false;
        };
        let snapshot = self.scope.snapshot;
        let mapped = snapshot
            .join_column_mapping(&self.scope.bindings[lb].sql_name, &lc)
            .map(|t| (rb, lb, t))
            .or_else(|| {
                snapshot
                    .join_column_mapping(&self.scope.bindings[rb].sql_name, &rc)
                    .map(|t| (lb, rb, t))
            });
        let Some((start_binding, end_binding, rel_type)) = mapped else {
            return false;
        };
        let (Some(start), Some(end)) = (self.node_term(start_binding), self.node_term(end_binding)) else {
            return false;
        };
        let var = self.leg_var(rel_type);
        self.legs.push(Leg {
            var,
            rel_type: rel_type.to_string(),
            start,
            end,
            owner,
        });
        true
    }

    fn predicate<'q>(
        &mut self,
        predicate: JoinPredicate<'q>,
        pattern: &mut GraphPattern<'q>,
        optional_filters: &mut BTreeMap<usize, Vec<&'q SqlExpr>>,
    ) -> Result<(), TranslationError> {
        for conjunct in conjuncts(predicate.expr) {
            let equality = match conjunct {
                SqlExpr::BinaryOp {
                    left,
                    op: BinaryOperator::Eq,
                    right,
                } if column_idents(left).is_some() && column_idents(right).is_some() => {
                    Some((left.as_ref(), right.as_ref()))
                }
                _ => None,
            };
            let owner = match predicate.origin {
                PredicateOrigin::On {
                    binding,
                    optional: true,
                } => Some(binding),
                _ => None,
            };

            if let Some((left, right)) = equality {
                if let (Some(a), Some(b)) = (self.identity_term(left), self.identity_term(right)) {
                    self.merge(a, b)?;
                    continue;
                }
                if self.mapped_leg(left, right, owner) {
                    continue;
                }
                if let PredicateOrigin::On { .. } = predicate.origin {
                    return Err(TranslationError::AmbiguousJoin {
                        predicate: conjunct.to_string(),
                    });
                }
            }
            match owner {
                Some(binding) => optional_filters.entry(binding).or_default().push(conjunct),
                None => pattern.filters.push(conjunct),
            }
        }
        Ok(())
    }

    fn using(&mut self, join: &UsingJoin) -> Result<(), TranslationError> {
        let (Some(left), Some(right)) = (self.node_term(join.left), self.node_term(join.right)) else {
            return Err(TranslationError::AmbiguousJoin {
                predicate: format!(
                    "USING ({})",
                    join.names.iter().map(|n| n.value.as_str()).collect::<Vec<_>>().join(", ")
                ),
            });
        };
        for name in &join.names {
            let rel_type = self.scope.name(name);
            let (left_label, right_label) = (self.label(left).to_string(), self.label(right).to_string());
            let snapshot = self.scope.snapshot;
            let forward = snapshot.relationship_tables().any(|t| {
                t.relationship.as_ref().is_some_and(|r| {
                    r.rel_type == rel_type && r.start_label == left_label && r.end_label == right_label
                })
            });
            let backward = snapshot.relationship_tables().any(|t| {
                t.relationship.as_ref().is_some_and(|r| {
                    r.rel_type == rel_type && r.start_label == right_label && r.end_label == left_label
                })
            });
            let (start, end) = if backward && !forward { (right, left) } else { (left, right) };
            let var = self.leg_var(&rel_type);
            self.legs.push(Leg {
                var,
                rel_type,
                start,
                end,
                owner: join.optional.then_some(join.right),
            });
        }
        Ok(())
    }
}

/// One node variable shared by every term merged into it.
struct NodeClass {
    var: String,
    label: String,
    /// Binding whose LEFT JOIN made every term of this class optional.
    owner: Option<usize>,
}

pub(crate) fn resolve<'q>(
    scope: &mut Scope<'_>,
    predicates: Vec<JoinPredicate<'q>>,
    usings: &[UsingJoin],
) -> Result<GraphPattern<'q>, TranslationError> {
    let mut pattern = GraphPattern::default();
    let mut optional_filters: BTreeMap<usize, Vec<&'q SqlExpr>> = BTreeMap::new();

    let (legs, classes) = {
        let mut resolver = Resolver::new(scope);
        for predicate in predicates {
            resolver.predicate(predicate, &mut pattern, &mut optional_filters)?;
        }
        for join in usings {
            resolver.using(join)?;
        }

        let roots: Vec<usize> = (0..resolver.terms.len())
            .map(|t| resolver.classes.find(t))
            .collect();
        let relationship_count = resolver
            .scope
            .bindings
            .iter()
            .filter(|b| b.is_relationship())
            .count();

        let mut class_ids: BTreeMap<usize, usize> = BTreeMap::new();
        for root in &roots {
            let next = class_ids.len();
            class_ids.entry(*root).or_insert(next);
        }
        let mut classes = Vec::new();
        for &root in class_ids.keys() {
            let members: Vec<Term> = roots
                .iter()
                .enumerate()
                .filter(|(_, r)| **r == root)
                .map(|(t, _)| resolver.terms[t])
                .collect();
            let bindings = &resolver.scope.bindings;
            let var = match members.iter().find(|t| t.side == Side::Whole) {
                Some(node) => bindings[node.binding].var.clone(),
                None => {
                    let first = members[0];
                    let prefix = if first.side == Side::End { "_rhs" } else { "_lhs" };
                    if relationship_count > 1 {
                        format!("{}_{}", prefix, bindings[first.binding].var)
                    } else {
                        prefix.to_string()
                    }
                }
            };
            let owner = if members.iter().all(|t| bindings[t.binding].optional) {
                members.iter().map(|t| t.binding).min()
            } else {
                None
            };
            classes.push(NodeClass {
                var,
                label: resolver.label(root).to_string(),
                owner,
            });
        }

        // Publish class variables back into the bindings.
        let class_of: Vec<usize> = roots.iter().map(|r| class_ids[r]).collect();
        for (t, term) in resolver.terms.iter().enumerate() {
            let var = classes[class_of[t]].var.clone();
            let binding = &mut resolver.scope.bindings[term.binding];
            match (&mut binding.kind, term.side) {
                (BindingKind::Node { .. }, _) => binding.var = var,
                (BindingKind::Relationship { start_var, .. }, Side::Start) => *start_var = var,
                (BindingKind::Relationship { end_var, .. }, Side::End) => *end_var = var,
                _ => {}
            }
        }
        let legs = resolver
            .legs
            .iter()
            .map(|l| Leg {
                start: class_of[l.start],
                end: class_of[l.end],
                ..l.clone()
            })
            .collect::<Vec<_>>();
        (legs, classes)
    };

    let mut declared = HashSet::new();
    let mandatory: Vec<&Leg> = legs.iter().filter(|l| l.owner.is_none()).collect();
    let mandatory_classes: Vec<usize> = (0..classes.len())
        .filter(|c| classes[*c].owner.is_none())
        .collect();
    let disconnected = components(&mandatory, &mandatory_classes);
    if disconnected > 1 {
        log::warn!(
            "Join produces a cross product of {} disconnected patterns (low confidence translation)",
            disconnected
        );
    }
    pattern.patterns = chain(&mandatory, &mandatory_classes, &classes, &mut declared);

    let mut owners: Vec<usize> = legs
        .iter()
        .filter_map(|l| l.owner)
        .chain(classes.iter().filter_map(|c| c.owner))
        .chain(optional_filters.keys().copied())
        .collect();
    owners.sort_unstable();
    owners.dedup();
    for owner in owners {
        let group_legs: Vec<&Leg> = legs.iter().filter(|l| l.owner == Some(owner)).collect();
        let group_classes: Vec<usize> = (0..classes.len())
            .filter(|c| classes[*c].owner == Some(owner))
            .collect();
        let patterns = chain(&group_legs, &group_classes, &classes, &mut declared);
        let filters = optional_filters.remove(&owner).unwrap_or_default();
        if patterns.is_empty() && filters.is_empty() {
            continue;
        }
        pattern.optional.push(OptionalMatch { patterns, filters });
    }
    Ok(pattern)
}

fn components(legs: &[&Leg], classes: &[usize]) -> usize {
    let mut members: Vec<usize> = classes.to_vec();
    for leg in legs {
        members.push(leg.start);
        members.push(leg.end);
    }
    members.sort_unstable();
    members.dedup();
    if members.is_empty() {
        return 0;
    }
    let position: HashMap<usize, usize> = members.iter().enumerate().map(|(i, c)| (*c, i)).collect();
    let mut uf = UnionFind::new(members.len());
    for leg in legs {
        uf.union(position[&leg.start], position[&leg.end]);
    }
    (0..members.len())
        .map(|i| uf.find(i))
        .collect::<HashSet<_>>()
        .len()
}

fn node(class: usize, classes: &[NodeClass], declared: &mut HashSet<String>) -> NodePattern {
    let c = &classes[class];
    if declared.insert(c.var.clone()) {
        NodePattern::new(&c.var, Some(&c.label))
    } else {
        NodePattern::bound(&c.var)
    }
}

/// Chains legs into paths, starting each path at its earliest class and
/// extending the tail while a remaining leg touches it.
fn chain(
    legs: &[&Leg],
    standalone: &[usize],
    classes: &[NodeClass],
    declared: &mut HashSet<String>,
) -> Vec<PathPattern> {
    let mut remaining: Vec<&Leg> = legs.to_vec();
    let mut paths = Vec::new();
    let mut covered = HashSet::new();

    while !remaining.is_empty() {
        let first = remaining.remove(0);
        let (head, forward) = if first.end < first.start {
            (first.end, false)
        } else {
            (first.start, true)
        };
        let mut path = PathPattern::node(node(head, classes, declared));
        let mut tail = append(&mut path, first, forward, classes, declared);
        covered.insert(first.start);
        covered.insert(first.end);

        while let Some(position) = remaining
            .iter()
            .position(|l| l.start == tail || l.end == tail)
        {
            let leg = remaining.remove(position);
            let forward = leg.start == tail;
            tail = append(&mut path, leg, forward, classes, declared);
            covered.insert(leg.start);
            covered.insert(leg.end);
        }
        paths.push(path);
    }

    for class in standalone {
        if !covered.contains(class) {
            paths.push(PathPattern::node(node(*class, classes, declared)));
        }
    }
    paths
}

fn append(
    path: &mut PathPattern,
    leg: &Leg,
    forward: bool,
    classes: &[NodeClass],
    declared: &mut HashSet<String>,
) -> usize {
    let (direction, next) = if forward {
        (PatternDirection::Outgoing, leg.end)
    } else {
        (PatternDirection::Incoming, leg.start)
    };
    let rel = RelPattern::new(Some(leg.var.clone()), &leg.rel_type, direction);
    path.steps.push((rel, node(next, classes, declared)));
    next
}
