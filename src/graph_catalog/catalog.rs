//! Schema Catalog
//!
//! Holds exactly one current [`SchemaSnapshot`] behind an atomically swapped
//! `Arc`. Readers clone the handle and never block on a refresh; writers
//! (refresh, view declaration) are serialised by an async mutex and publish a
//! complete new snapshot with a bumped version, or nothing at all.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;

use crate::executor::GraphExecutor;

use super::errors::CatalogError;
use super::pattern::PatternFilter;
use super::schema_sampler::{SamplingSettings, SchemaSampler};
use super::schema_types::{SchemaSnapshot, TableKind, VirtualColumn, VirtualTable};
use super::view_definitions::{ViewDefinition, ViewDefinitionReader, ViewResolver};

#[derive(Debug, Clone, Default)]
pub struct CatalogSettings {
    pub sampling: SamplingSettings,
    pub table_mappings: BTreeMap<String, String>,
    pub join_column_mappings: BTreeMap<String, String>,
}

pub struct SchemaCatalog {
    executor: Option<Arc<dyn GraphExecutor>>,
    settings: CatalogSettings,
    current: RwLock<Arc<SchemaSnapshot>>,
    /// Single writer at a time; readers go through `current` only.
    writer: Mutex<()>,
    views: ViewResolver,
}

impl SchemaCatalog {
    /// Catalog backed by a live graph. The snapshot stays empty (version 0)
    /// until the first [`refresh`](Self::refresh).
    pub fn new(executor: Arc<dyn GraphExecutor>, settings: CatalogSettings) -> Self {
        let snapshot = SchemaSnapshot::empty().with_mappings(
            settings.table_mappings.clone(),
            settings.join_column_mappings.clone(),
        );
        Self {
            executor: Some(executor),
            settings,
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
            views: ViewResolver::default(),
        }
    }

    /// Offline catalog over a fixed snapshot. Configured mappings are added
    /// on top of the snapshot's own.
    pub fn from_snapshot(snapshot: SchemaSnapshot, settings: CatalogSettings) -> Self {
        let mut table_mappings = snapshot.table_mappings.clone();
        table_mappings.extend(settings.table_mappings.clone());
        let mut join_column_mappings = snapshot.join_column_mappings.clone();
        join_column_mappings.extend(settings.join_column_mappings.clone());

        let views = ViewResolver::new(snapshot.views.clone());
        let snapshot = snapshot.with_mappings(table_mappings, join_column_mappings);
        Self {
            executor: None,
            settings,
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
            views,
        }
    }

    /// Last successfully built snapshot.
    pub fn current(&self) -> Arc<SchemaSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn version(&self) -> u64 {
        self.current().version
    }

    pub fn views(&self) -> &ViewResolver {
        &self.views
    }

    fn publish(&self, snapshot: SchemaSnapshot) -> Arc<SchemaSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        snapshot
    }

    /// Resamples the graph and swaps in the new snapshot. On failure the
    /// previous snapshot stays current.
    pub async fn refresh(&self) -> Result<Arc<SchemaSnapshot>, CatalogError> {
        let _writer = self.writer.lock().await;
        let previous = self.current();

        let sampled = match &self.executor {
            Some(executor) => {
                SchemaSampler::new(executor.as_ref(), self.settings.sampling)
                    .sample()
                    .await
            }
            None => Err(CatalogError::Offline),
        };

        match sampled {
            Ok(sampled) => {
                let snapshot = sampled
                    .with_views(self.views.definitions())
                    .with_mappings(
                        previous.table_mappings.clone(),
                        previous.join_column_mappings.clone(),
                    )
                    .with_version(previous.version + 1);
                let published = self.publish(snapshot);
                log::info!(
                    "Schema catalog refreshed to version {} ({} tables)",
                    published.version,
                    published.tables.len()
                );
                Ok(published)
            }
            Err(e) => {
                log::warn!(
                    "Schema catalog refresh failed, keeping version {}: {}",
                    previous.version,
                    e
                );
                Err(CatalogError::Refresh {
                    retained_version: previous.version,
                    source: Box::new(e),
                })
            }
        }
    }

    /// Alias of [`refresh`](Self::refresh).
    pub async fn flush(&self) -> Result<Arc<SchemaSnapshot>, CatalogError> {
        self.refresh().await
    }

    /// Adds or replaces a view without resampling the graph.
    pub async fn declare_view(&self, view: ViewDefinition) -> Arc<SchemaSnapshot> {
        self.declare_views(vec![view]).await
    }

    pub async fn declare_views(&self, views: Vec<ViewDefinition>) -> Arc<SchemaSnapshot> {
        let _writer = self.writer.lock().await;
        for view in views {
            log::debug!("Declaring view {}", view.name);
            self.views.declare(view);
        }
        let previous = self.current();
        let snapshot = (*previous)
            .clone()
            .with_views(self.views.definitions())
            .with_version(previous.version + 1);
        self.publish(snapshot)
    }

    /// Reads a view document and declares every view in it.
    pub async fn load_views(&self, location: &str) -> Result<usize, CatalogError> {
        let views = ViewDefinitionReader::of(location)?.read().await?;
        let count = views.len();
        self.declare_views(views).await;
        Ok(count)
    }

    /// Tables whose name matches `pattern`, sorted by name.
    ///
    /// Views are listed only when `kinds` is `None` or explicitly contains
    /// [`TableKind::View`].
    pub fn tables(
        &self,
        pattern: Option<&str>,
        kinds: Option<&[TableKind]>,
    ) -> Result<Vec<VirtualTable>, CatalogError> {
        let filter = pattern_filter(pattern)?;
        let snapshot = self.current();
        Ok(snapshot
            .tables
            .iter()
            .filter(|t| kinds.map(|k| k.contains(&t.kind)).unwrap_or(true))
            .filter(|t| filter.matches(&t.name))
            .cloned()
            .collect())
    }

    /// `(table, column)` pairs matching both patterns, in table then column order.
    pub fn columns(
        &self,
        table_pattern: Option<&str>,
        column_pattern: Option<&str>,
    ) -> Result<Vec<(VirtualTable, VirtualColumn)>, CatalogError> {
        let column_filter = pattern_filter(column_pattern)?;
        Ok(self
            .tables(table_pattern, None)?
            .into_iter()
            .flat_map(|table| {
                table
                    .columns
                    .iter()
                    .filter(|c| column_filter.matches(&c.name))
                    .cloned()
                    .map(|c| (table.clone(), c))
                    .collect::<Vec<_>>()
            })
            .collect())
    }
}

pub(crate) fn pattern_filter(pattern: Option<&str>) -> Result<PatternFilter, CatalogError> {
    PatternFilter::new(pattern)
        .map_err(|e| CatalogError::invalid_pattern(pattern.unwrap_or_default(), e))
}
