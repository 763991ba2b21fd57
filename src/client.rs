//! Client facade
//!
//! [`GraphSqlClient`] ties the pieces together the way a relational caller
//! sees them: SQL in, rows or update counts out. It owns the schema catalog,
//! the translator and the metadata provider, and sends every compiled
//! statement to the [`GraphExecutor`].

use std::sync::Arc;
use std::time::Instant;

use crate::config::TranslatorConfig;
use crate::error::SqlGraphError;
use crate::executor::{GraphExecutor, GraphValue, Parameters, QueryResult, UpdateCounters};
use crate::graph_catalog::{FromGraphValue, SchemaCatalog};
use crate::metadata::MetadataProvider;
use crate::sql_translator::{CacheMetrics, CompiledTranslation, StatementKind, Translator};

/// Timing of one executed statement
#[derive(Debug, Clone, Default)]
pub struct ExecutionMetrics {
    pub translate_time: f64,
    pub execution_time: f64,
    pub statements: usize,
    pub result_rows: usize,
}

impl ExecutionMetrics {
    pub fn log_performance(&self, sql: &str) {
        log::debug!(
            "Statement performance - Translate: {:.3}ms, Exec: {:.3}ms, Statements: {}, Rows: {}",
            self.translate_time * 1000.0,
            self.execution_time * 1000.0,
            self.statements,
            self.result_rows
        );
        if log::log_enabled!(log::Level::Trace) {
            log::trace!(
                "Performance breakdown for statement: {}",
                sql.chars().take(100).collect::<String>()
            );
        }
    }
}

/// Materialised rows of a query with typed access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    keys: Vec<String>,
    rows: Vec<Vec<GraphValue>>,
    counters: UpdateCounters,
}

impl RowSet {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn rows(&self) -> &[Vec<GraphValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn counters(&self) -> UpdateCounters {
        self.counters
    }

    /// Position of `column`, matched exactly first and then ignoring case.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.keys
            .iter()
            .position(|k| k == column)
            .or_else(|| self.keys.iter().position(|k| k.eq_ignore_ascii_case(column)))
    }

    pub fn value(&self, row: usize, column: &str) -> Result<&GraphValue, SqlGraphError> {
        let index = self
            .column_index(column)
            .ok_or_else(|| SqlGraphError::UnknownColumn(column.to_string()))?;
        self.value_at(row, index)
    }

    /// Value by zero-based column position.
    pub fn value_at(&self, row: usize, index: usize) -> Result<&GraphValue, SqlGraphError> {
        let values = self.rows.get(row).ok_or(SqlGraphError::RowOutOfRange {
            index: row,
            rows: self.rows.len(),
        })?;
        values
            .get(index)
            .ok_or_else(|| SqlGraphError::UnknownColumn(index.to_string()))
    }

    /// Reads `column` of `row` as `T`, converting through the type mapper.
    pub fn get<T: FromGraphValue>(&self, row: usize, column: &str) -> Result<T, SqlGraphError> {
        Ok(T::from_graph_value(self.value(row, column)?)?)
    }

    pub fn get_at<T: FromGraphValue>(&self, row: usize, index: usize) -> Result<T, SqlGraphError> {
        Ok(T::from_graph_value(self.value_at(row, index)?)?)
    }
}

impl From<QueryResult> for RowSet {
    fn from(result: QueryResult) -> Self {
        RowSet {
            keys: result.keys,
            rows: result.rows,
            counters: result.summary.counters,
        }
    }
}

pub struct GraphSqlClient {
    executor: Arc<dyn GraphExecutor>,
    catalog: Arc<SchemaCatalog>,
    translator: Translator,
    metadata: MetadataProvider,
}

impl GraphSqlClient {
    /// Samples the graph, loads the configured view document and returns a
    /// client ready to run statements.
    pub async fn connect(
        executor: Arc<dyn GraphExecutor>,
        config: TranslatorConfig,
    ) -> Result<Self, SqlGraphError> {
        let catalog = Arc::new(SchemaCatalog::new(executor.clone(), config.catalog_settings()));
        catalog.refresh().await?;
        if let Some(location) = &config.view_definitions {
            let count = catalog.load_views(location).await?;
            log::info!("Loaded {} view definitions from {}", count, location);
        }
        Ok(Self::from_catalog(executor, catalog, &config))
    }

    /// Client over an already built catalog; nothing is sampled.
    pub fn from_catalog(
        executor: Arc<dyn GraphExecutor>,
        catalog: Arc<SchemaCatalog>,
        config: &TranslatorConfig,
    ) -> Self {
        let metadata = MetadataProvider::new(catalog.clone(), config.database_name.clone());
        Self {
            executor,
            catalog,
            translator: Translator::new(config),
            metadata,
        }
    }

    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    pub fn metadata(&self) -> &MetadataProvider {
        &self.metadata
    }

    pub fn cache_metrics(&self) -> CacheMetrics {
        self.translator.cache_metrics()
    }

    /// Compiles `sql` against the current snapshot without running it.
    pub fn translate(&self, sql: &str) -> Result<Arc<CompiledTranslation>, SqlGraphError> {
        let snapshot = self.catalog.current();
        Ok(self.translator.translate(sql, &snapshot)?)
    }

    /// Resamples the graph. Cached translations of the old snapshot are
    /// dropped on their next lookup.
    pub async fn refresh(&self) -> Result<u64, SqlGraphError> {
        Ok(self.catalog.refresh().await?.version)
    }

    pub async fn execute_query(&self, sql: &str, params: &Parameters) -> Result<RowSet, SqlGraphError> {
        let (compiled, mut metrics) = self.compile(sql)?;
        let mut results = self.run(&compiled, params, &mut metrics).await?;
        let rows = match results.pop() {
            Some(last) => RowSet::from(last),
            None => RowSet::default(),
        };
        metrics.result_rows = rows.len();
        metrics.log_performance(sql);
        Ok(rows)
    }

    /// Runs a mutation and returns the number of entities it touched.
    pub async fn execute_update(&self, sql: &str, params: &Parameters) -> Result<u64, SqlGraphError> {
        let (compiled, mut metrics) = self.compile(sql)?;
        let results = self.run(&compiled, params, &mut metrics).await?;
        metrics.log_performance(sql);
        Ok(results.iter().map(|r| r.summary.counters.affected()).sum())
    }

    /// Runs one statement once per parameter set, translating it only once.
    pub async fn execute_batch(
        &self,
        sql: &str,
        batches: Vec<Parameters>,
    ) -> Result<Vec<u64>, SqlGraphError> {
        let (compiled, mut metrics) = self.compile(sql)?;
        let mut counts = Vec::with_capacity(batches.len());
        for params in &batches {
            let results = self.run(&compiled, params, &mut metrics).await?;
            counts.push(results.iter().map(|r| r.summary.counters.affected()).sum());
        }
        metrics.log_performance(sql);
        Ok(counts)
    }

    fn compile(&self, sql: &str) -> Result<(Arc<CompiledTranslation>, ExecutionMetrics), SqlGraphError> {
        let start = Instant::now();
        let compiled = self.translate(sql)?;
        let metrics = ExecutionMetrics {
            translate_time: start.elapsed().as_secs_f64(),
            ..Default::default()
        };
        Ok((compiled, metrics))
    }

    /// Sends `compiled` once, or once per row set of a multi-row insert.
    async fn run(
        &self,
        compiled: &CompiledTranslation,
        params: &Parameters,
        metrics: &mut ExecutionMetrics,
    ) -> Result<Vec<QueryResult>, SqlGraphError> {
        if compiled.kind == StatementKind::Empty {
            return Ok(Vec::new());
        }
        let bound = bind(compiled, params)?;
        let start = Instant::now();
        let mut results = Vec::with_capacity(bound.len());
        for params in &bound {
            let result = self
                .executor
                .execute(&compiled.cypher, params)
                .await
                .map_err(|e| SqlGraphError::execution_error_with_context(&compiled.cypher, e))?;
            results.push(result);
        }
        metrics.execution_time += start.elapsed().as_secs_f64();
        metrics.statements += bound.len();
        Ok(results)
    }
}

/// Parameter maps to send: the caller's values restricted to what the
/// statement references, merged into each row set when there are any.
fn bind(compiled: &CompiledTranslation, params: &Parameters) -> Result<Vec<Parameters>, SqlGraphError> {
    let sets = if compiled.parameter_sets.is_empty() {
        vec![Parameters::new()]
    } else {
        compiled.parameter_sets.clone()
    };
    sets.into_iter()
        .map(|mut set| {
            for name in &compiled.parameter_names {
                if set.contains_key(name) {
                    continue;
                }
                let value = params
                    .get(name)
                    .ok_or_else(|| SqlGraphError::MissingParameter(name.clone()))?;
                set.insert(name.clone(), value.clone());
            }
            Ok(set)
        })
        .collect()
}
