//! Schema Sampler
//!
//! Infers the virtual relational schema by sampling the graph through a
//! [`GraphExecutor`]:
//!
//! 1. every label becomes a node table (`v$id` plus the union of sampled properties)
//! 2. every relationship type is split by the `(start label, end label)` pairs
//!    actually observed, each pair becoming one `Start_TYPE_End` table
//! 3. constraints, indexes and procedure signatures are read when the server
//!    allows it; these are optional and an error there only logs a warning
//!
//! A negative sample size skips property sampling, leaving only identity columns.

use std::collections::{BTreeMap, BTreeSet};

use crate::executor::{GraphExecutor, GraphValue, Parameters, QueryResult};

use super::errors::CatalogError;
use super::schema_types::{
    ColumnSource, ConstraintInfo, ConstraintKind, EntityKind, IndexInfo, ProcedureArgument,
    ProcedureInfo, ProcedureKind, RelationshipInfo, SchemaSnapshot, VirtualColumn, VirtualTable,
    ELEMENT_ID_COLUMN, END_ID_COLUMN, START_ID_COLUMN,
};
use super::type_mapper::GraphType;

const LABELS_QUERY: &str = "CALL db.labels() YIELD label RETURN label ORDER BY label";
const RELATIONSHIP_TYPES_QUERY: &str = "CALL db.relationshipTypes() YIELD relationshipType \
     RETURN relationshipType ORDER BY relationshipType";
const CONSTRAINTS_QUERY: &str =
    "SHOW CONSTRAINTS YIELD name, type, entityType, labelsOrTypes, properties";
const INDEXES_QUERY: &str = "SHOW INDEXES YIELD name, type, entityType, labelsOrTypes, properties, owningConstraint \
     WHERE type <> 'LOOKUP'";
const PROCEDURES_QUERY: &str =
    "SHOW PROCEDURES YIELD name, description, argumentDescription, returnDescription";
const FUNCTIONS_QUERY: &str =
    "SHOW FUNCTIONS YIELD name, description, argumentDescription, returnDescription";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingSettings {
    pub node_sample_size: i64,
    /// Negative disables property inference for relationship-join tables.
    pub relationship_sample_size: i64,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            node_sample_size: 1000,
            relationship_sample_size: 1000,
        }
    }
}

impl SamplingSettings {
    pub fn uniform(sample_size: i64) -> Self {
        Self {
            node_sample_size: sample_size,
            relationship_sample_size: sample_size,
        }
    }
}

#[derive(Debug, Default)]
struct PropertyStats {
    types: BTreeSet<GraphType>,
    present: usize,
    saw_null: bool,
}

/// Union of the property maps of a set of sampled entities.
#[derive(Debug, Default)]
struct EntitySample {
    entities: usize,
    properties: BTreeMap<String, PropertyStats>,
}

impl EntitySample {
    fn observe(&mut self, properties: &BTreeMap<String, GraphValue>) {
        self.entities += 1;
        for (name, value) in properties {
            let stats = self.properties.entry(name.clone()).or_default();
            stats.present += 1;
            if value.is_null() {
                stats.saw_null = true;
            } else {
                stats.types.insert(GraphType::of(value));
            }
        }
    }

    /// Property columns sorted by name.
    fn columns(&self) -> Vec<VirtualColumn> {
        self.properties
            .iter()
            .map(|(name, stats)| {
                let graph_type = match GraphType::widen(&stats.types) {
                    GraphType::Null => GraphType::Any,
                    widened => widened,
                };
                let nullable = stats.saw_null || stats.present < self.entities;
                VirtualColumn::property(name.clone(), graph_type, nullable)
            })
            .collect()
    }
}

pub struct SchemaSampler<'a> {
    executor: &'a dyn GraphExecutor,
    settings: SamplingSettings,
}

impl<'a> SchemaSampler<'a> {
    pub fn new(executor: &'a dyn GraphExecutor, settings: SamplingSettings) -> Self {
        Self { executor, settings }
    }

    /// One full sampling pass. The returned snapshot has version 0, no views
    /// and no mappings; the catalog fills those in.
    pub async fn sample(&self) -> Result<SchemaSnapshot, CatalogError> {
        let labels = self.string_column(LABELS_QUERY, "label", "listing labels").await?;
        let rel_types = self
            .string_column(
                RELATIONSHIP_TYPES_QUERY,
                "relationshipType",
                "listing relationship types",
            )
            .await?;

        let mut tables = Vec::new();
        let mut node_columns: BTreeMap<String, Vec<VirtualColumn>> = BTreeMap::new();
        for label in &labels {
            let columns = self.sample_label(label).await?;
            node_columns.insert(label.clone(), columns.clone());
            let mut all = vec![VirtualColumn::identity(
                ELEMENT_ID_COLUMN,
                ColumnSource::ElementId,
            )];
            all.extend(columns);
            tables.push(VirtualTable::node(label.clone(), all));
        }

        for rel_type in &rel_types {
            tables.extend(self.sample_relationship_type(rel_type, &node_columns).await?);
        }

        let mut snapshot = SchemaSnapshot {
            tables,
            constraints: self.constraints().await,
            indexes: self.indexes().await,
            procedures: self.procedures().await,
            ..Default::default()
        };
        snapshot.sort_tables();
        log::debug!(
            "Sampled {} label(s), {} relationship type(s) into {} table(s)",
            labels.len(),
            rel_types.len(),
            snapshot.tables.len()
        );
        Ok(snapshot)
    }

    async fn sample_label(&self, label: &str) -> Result<Vec<VirtualColumn>, CatalogError> {
        let sample_size = self.settings.node_sample_size;
        if sample_size < 0 {
            return Ok(Vec::new());
        }
        let query = format!(
            "MATCH (n:{}) WITH n LIMIT $sampleSize RETURN properties(n) AS properties",
            quoted(label)
        );
        let result = self
            .run(&query, sample_size, &format!("While sampling label {}", label))
            .await?;
        let mut sample = EntitySample::default();
        for row in &result.rows {
            if let Some(properties) = result.value(row, "properties").as_map() {
                sample.observe(properties);
            }
        }
        Ok(sample.columns())
    }

    async fn sample_relationship_type(
        &self,
        rel_type: &str,
        node_columns: &BTreeMap<String, Vec<VirtualColumn>>,
    ) -> Result<Vec<VirtualTable>, CatalogError> {
        let sample_size = self.settings.relationship_sample_size;
        let context = format!("While sampling relationship type {}", rel_type);

        // endpoint pairs are always discovered so the tables exist even
        // when property inference is disabled
        let query = format!(
            "MATCH (s)-[r:{}]->(e) RETURN DISTINCT labels(s) AS startLabels, labels(e) AS endLabels",
            quoted(rel_type)
        );
        let result = self.run(&query, sample_size, &context).await?;
        let mut pairs = BTreeSet::new();
        for row in &result.rows {
            pairs.extend(label_pairs(&result, row));
        }

        let mut samples: BTreeMap<(String, String), EntitySample> = BTreeMap::new();
        if sample_size >= 0 {
            let query = format!(
                "MATCH (s)-[r:{}]->(e) WITH s, r, e LIMIT $sampleSize \
                 RETURN labels(s) AS startLabels, labels(e) AS endLabels, properties(r) AS properties",
                quoted(rel_type)
            );
            let result = self.run(&query, sample_size, &context).await?;
            let empty = BTreeMap::new();
            for row in &result.rows {
                let properties = result.value(row, "properties").as_map().unwrap_or(&empty);
                for pair in label_pairs(&result, row) {
                    samples.entry(pair).or_default().observe(properties);
                }
            }
        }

        let no_columns = Vec::new();
        Ok(pairs
            .into_iter()
            .map(|(start, end)| {
                let info = RelationshipInfo::new(start.clone(), rel_type, end.clone());
                if sample_size < 0 {
                    return relationship_join_table(info, &[], &[], &[]);
                }
                let rel_columns = samples
                    .get(&(start.clone(), end.clone()))
                    .map(EntitySample::columns)
                    .unwrap_or_default();
                relationship_join_table(
                    info,
                    node_columns.get(&start).unwrap_or(&no_columns),
                    node_columns.get(&end).unwrap_or(&no_columns),
                    &rel_columns,
                )
            })
            .collect())
    }

    async fn constraints(&self) -> Vec<ConstraintInfo> {
        let Some(result) = self.optional(CONSTRAINTS_QUERY, "constraints").await else {
            return Vec::new();
        };
        result
            .rows
            .iter()
            .filter_map(|row| {
                let label_or_type = result.value(row, "labelsOrTypes").string_list().into_iter().next()?;
                Some(ConstraintInfo {
                    name: result.value(row, "name").as_str()?.to_string(),
                    kind: ConstraintKind::from_graph_name(result.value(row, "type").as_str()?),
                    entity: entity_kind(result.value(row, "entityType")),
                    label_or_type,
                    properties: result.value(row, "properties").string_list(),
                })
            })
            .collect()
    }

    async fn indexes(&self) -> Vec<IndexInfo> {
        let Some(result) = self.optional(INDEXES_QUERY, "indexes").await else {
            return Vec::new();
        };
        result
            .rows
            .iter()
            .filter_map(|row| {
                let label_or_type = result.value(row, "labelsOrTypes").string_list().into_iter().next()?;
                Some(IndexInfo {
                    name: result.value(row, "name").as_str()?.to_string(),
                    entity: entity_kind(result.value(row, "entityType")),
                    label_or_type,
                    properties: result.value(row, "properties").string_list(),
                    unique: !result.value(row, "owningConstraint").is_null(),
                    index_type: result.value(row, "type").as_str().unwrap_or("RANGE").to_string(),
                })
            })
            .collect()
    }

    async fn procedures(&self) -> Vec<ProcedureInfo> {
        let mut procedures = Vec::new();
        for (query, kind, what) in [
            (PROCEDURES_QUERY, ProcedureKind::Procedure, "procedures"),
            (FUNCTIONS_QUERY, ProcedureKind::Function, "functions"),
        ] {
            let Some(result) = self.optional(query, what).await else {
                continue;
            };
            for row in &result.rows {
                let Some(name) = result.value(row, "name").as_str() else {
                    continue;
                };
                procedures.push(ProcedureInfo {
                    name: name.to_string(),
                    description: result
                        .value(row, "description")
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    kind,
                    arguments: procedure_arguments(result.value(row, "argumentDescription")),
                    outputs: procedure_arguments(result.value(row, "returnDescription")),
                });
            }
        }
        procedures
    }

    async fn string_column(
        &self,
        query: &str,
        key: &str,
        context: &str,
    ) -> Result<Vec<String>, CatalogError> {
        let result = self.run(query, 0, &format!("While {}", context)).await?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| result.value(row, key).as_str().map(str::to_string))
            .collect())
    }

    async fn run(
        &self,
        query: &str,
        sample_size: i64,
        context: &str,
    ) -> Result<QueryResult, CatalogError> {
        log::debug!("Sampling query: {}", query);
        let params = Parameters::from([("sampleSize".to_string(), GraphValue::Integer(sample_size))]);
        self.executor
            .execute(query, &params)
            .await
            .map_err(|e| CatalogError::sampling_error_with_context(query, e, context))
    }

    async fn optional(&self, query: &str, what: &str) -> Option<QueryResult> {
        log::debug!("Sampling query: {}", query);
        match self.executor.execute(query, &Parameters::new()).await {
            Ok(result) => Some(result),
            Err(e) => {
                log::warn!("Could not read {} ({}), treating them as empty", what, e);
                None
            }
        }
    }
}

/// Builds one relationship-join table from the endpoint and relationship
/// property columns.
///
/// An endpoint property is prefixed with `start_`/`end_` only when the same
/// name exists on the relationship or on the other endpoint.
pub fn relationship_join_table(
    info: RelationshipInfo,
    start: &[VirtualColumn],
    end: &[VirtualColumn],
    relationship: &[VirtualColumn],
) -> VirtualTable {
    let names = |columns: &[VirtualColumn]| -> BTreeSet<String> {
        columns.iter().map(|c| c.name.clone()).collect()
    };
    let start_names = names(start);
    let end_names = names(end);
    let rel_names = names(relationship);

    let mut columns = vec![
        VirtualColumn::identity(ELEMENT_ID_COLUMN, ColumnSource::ElementId),
        VirtualColumn::identity(START_ID_COLUMN, ColumnSource::StartElementId),
        VirtualColumn::identity(END_ID_COLUMN, ColumnSource::EndElementId),
    ];
    for column in start {
        let collides = rel_names.contains(&column.name) || end_names.contains(&column.name);
        columns.push(VirtualColumn {
            name: prefixed("start_", &column.name, collides),
            graph_type: column.graph_type.clone(),
            source: ColumnSource::StartProperty(column.name.clone()),
            nullable: column.nullable,
        });
    }
    for column in end {
        let collides = rel_names.contains(&column.name) || start_names.contains(&column.name);
        columns.push(VirtualColumn {
            name: prefixed("end_", &column.name, collides),
            graph_type: column.graph_type.clone(),
            source: ColumnSource::EndProperty(column.name.clone()),
            nullable: column.nullable,
        });
    }
    columns.extend(relationship.iter().cloned());

    VirtualTable::relationship_join(info, columns)
}

fn prefixed(prefix: &str, name: &str, collides: bool) -> String {
    if collides {
        format!("{}{}", prefix, name)
    } else {
        name.to_string()
    }
}

fn label_pairs(result: &QueryResult, row: &[GraphValue]) -> Vec<(String, String)> {
    let starts = result.value(row, "startLabels").string_list();
    let ends = result.value(row, "endLabels").string_list();
    starts
        .iter()
        .flat_map(|s| ends.iter().map(move |e| (s.clone(), e.clone())))
        .collect()
}

fn entity_kind(value: &GraphValue) -> EntityKind {
    match value.as_str() {
        Some(kind) if kind.eq_ignore_ascii_case("RELATIONSHIP") => EntityKind::Relationship,
        _ => EntityKind::Node,
    }
}

fn procedure_arguments(value: &GraphValue) -> Vec<ProcedureArgument> {
    let Some(entries) = value.as_list() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let map = entry.as_map()?;
            let name = map.get("name")?.as_str()?.to_string();
            let graph_type = map
                .get("type")
                .and_then(GraphValue::as_str)
                .map(parse_signature_type)
                .unwrap_or(GraphType::Any);
            let default_value = map
                .get("default")
                .filter(|v| !v.is_null())
                .map(|v| v.to_string());
            Some(ProcedureArgument {
                name,
                graph_type,
                default_value,
            })
        })
        .collect()
}

/// Signature types come as `STRING`, `STRING?`, `LIST<STRING>` or `LIST OF STRING`.
fn parse_signature_type(name: &str) -> GraphType {
    let name = name.trim().trim_end_matches('?');
    let normalized = match name.to_uppercase().strip_prefix("LIST OF ") {
        Some(element) => format!("LIST<{}>", element.trim_end_matches('?')),
        None => name.to_string(),
    };
    normalized.parse().unwrap_or(GraphType::Any)
}

fn quoted(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutorError, MockGraphExecutor};

    fn result(keys: &[&str], rows: Vec<Vec<GraphValue>>) -> QueryResult {
        QueryResult::new(keys.iter().map(|k| k.to_string()).collect(), rows)
    }

    fn props(entries: &[(&str, GraphValue)]) -> GraphValue {
        GraphValue::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn list(items: &[&str]) -> GraphValue {
        GraphValue::List(items.iter().map(|s| GraphValue::from(*s)).collect())
    }

    /// `(:Start {col: 'X'})-[:REL]->(:End {col: 'Y'})`
    fn start_rel_end(query: &str, _params: &Parameters) -> Result<QueryResult, ExecutorError> {
        if query.starts_with("CALL db.labels") {
            return Ok(result(&["label"], vec![vec!["End".into()], vec!["Start".into()]]));
        }
        if query.starts_with("CALL db.relationshipTypes") {
            return Ok(result(&["relationshipType"], vec![vec!["REL".into()]]));
        }
        if query.starts_with("MATCH (n:`Start`)") {
            return Ok(result(&["properties"], vec![vec![props(&[("col", "X".into())])]]));
        }
        if query.starts_with("MATCH (n:`End`)") {
            return Ok(result(&["properties"], vec![vec![props(&[("col", "Y".into())])]]));
        }
        if query.contains("RETURN DISTINCT") {
            return Ok(result(
                &["startLabels", "endLabels"],
                vec![vec![list(&["Start"]), list(&["End"])]],
            ));
        }
        if query.contains("properties(r)") {
            return Ok(result(
                &["startLabels", "endLabels", "properties"],
                vec![vec![list(&["Start"]), list(&["End"]), props(&[])]],
            ));
        }
        Err(ExecutorError::new(
            "Neo.ClientError.Security.Forbidden",
            "not allowed",
        ))
    }

    fn column_names(table: &VirtualTable) -> Vec<&str> {
        table.columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_colliding_endpoint_properties_are_prefixed() {
        let mut executor = MockGraphExecutor::new();
        executor.expect_execute().returning(start_rel_end);

        let snapshot = SchemaSampler::new(&executor, SamplingSettings::default())
            .sample()
            .await
            .unwrap();

        let table = snapshot.table("Start_REL_End").unwrap();
        assert_eq!(
            column_names(table),
            vec!["v$id", "v$start_id", "v$end_id", "start_col", "end_col"]
        );
        assert_eq!(
            table.columns[3].source,
            ColumnSource::StartProperty("col".to_string())
        );
        // optional metadata failed and is empty
        assert!(snapshot.constraints.is_empty());
        assert!(snapshot.procedures.is_empty());
    }

    #[tokio::test]
    async fn test_negative_sample_size_keeps_identity_only() {
        let mut executor = MockGraphExecutor::new();
        executor.expect_execute().returning(start_rel_end);

        let snapshot = SchemaSampler::new(&executor, SamplingSettings::uniform(-1))
            .sample()
            .await
            .unwrap();

        assert_eq!(column_names(snapshot.table("Start").unwrap()), vec!["v$id"]);
        assert_eq!(
            column_names(snapshot.table("Start_REL_End").unwrap()),
            vec!["v$id", "v$start_id", "v$end_id"]
        );
    }

    #[tokio::test]
    async fn test_required_query_failure_is_an_error() {
        let mut executor = MockGraphExecutor::new();
        executor
            .expect_execute()
            .returning(|_, _| Err(ExecutorError::new("Neo.TransientError.General", "down")));

        let err = SchemaSampler::new(&executor, SamplingSettings::default())
            .sample()
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Sampling { .. }));
    }

    #[test]
    fn test_unambiguous_names_are_not_prefixed() {
        let start = vec![VirtualColumn::property("name", GraphType::String, false)];
        let end = vec![VirtualColumn::property("title", GraphType::String, false)];
        let rel = vec![VirtualColumn::property("roles", GraphType::list_of(GraphType::String, false), true)];
        let table = relationship_join_table(
            RelationshipInfo::new("Person", "ACTED_IN", "Movie"),
            &start,
            &end,
            &rel,
        );
        assert_eq!(
            column_names(&table),
            vec!["v$id", "v$start_id", "v$end_id", "name", "title", "roles"]
        );
    }

    #[test]
    fn test_collision_with_relationship_prefixes_only_that_endpoint() {
        let start = vec![VirtualColumn::property("since", GraphType::Integer, false)];
        let end = vec![VirtualColumn::property("title", GraphType::String, false)];
        let rel = vec![VirtualColumn::property("since", GraphType::Integer, false)];
        let table = relationship_join_table(
            RelationshipInfo::new("Person", "FOLLOWS", "Topic"),
            &start,
            &end,
            &rel,
        );
        assert_eq!(
            column_names(&table),
            vec!["v$id", "v$start_id", "v$end_id", "start_since", "title", "since"]
        );
    }

    #[test]
    fn test_nullability_and_widening() {
        let mut sample = EntitySample::default();
        sample.observe(&BTreeMap::from([
            ("a".to_string(), GraphValue::Integer(1)),
            ("b".to_string(), GraphValue::Integer(1)),
        ]));
        sample.observe(&BTreeMap::from([
            ("a".to_string(), GraphValue::Float(1.5)),
            ("c".to_string(), GraphValue::Null),
        ]));
        let columns = sample.columns();
        assert_eq!(columns[0].graph_type, GraphType::Float);
        assert!(!columns[0].nullable);
        assert!(columns[1].nullable);
        assert_eq!(columns[2].graph_type, GraphType::Any);
        assert!(columns[2].nullable);
    }

    #[test]
    fn test_signature_types() {
        assert_eq!(parse_signature_type("STRING?"), GraphType::String);
        assert_eq!(
            parse_signature_type("LIST OF STRING?"),
            GraphType::list_of(GraphType::String, true)
        );
        assert_eq!(parse_signature_type("whatever"), GraphType::Any);
    }
}
