/// Translation cache
///
/// Memoizes compiled translations so that repeated statements skip parsing,
/// join resolution and rendering.
///
/// # Architecture
///
/// Cache Key: (pre-pass statement text, parameter shape, snapshot version)
/// Cache Value: the shared [`CompiledTranslation`]
///
/// There is no eviction beyond wholesale invalidation: the first lookup with a
/// newer snapshot version drops every entry compiled against an older one.
/// Compilation runs outside the lock, so two callers racing on the same key
/// may both compile; the first to store wins and both get the stored entry.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::errors::TranslationError;
use super::statement::ParameterShape;
use super::CompiledTranslation;

/// Key for cache lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslationCacheKey {
    /// Statement text after the dialect pre-pass. Whitespace between tokens
    /// is already collapsed there; literals are kept byte for byte.
    pub normalized_text: String,
    pub shape: ParameterShape,
    /// Snapshot version the statement was compiled against
    pub version: u64,
}

impl TranslationCacheKey {
    pub fn new(text: &str, shape: ParameterShape, version: u64) -> Self {
        TranslationCacheKey {
            normalized_text: text.to_string(),
            shape,
            version,
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    /// Newest snapshot version seen; entries never outlive it.
    version: u64,
    entries: HashMap<TranslationCacheKey, Arc<CompiledTranslation>>,
}

pub struct TranslationCache {
    state: Arc<Mutex<CacheState>>,
    enabled: bool,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    invalidations: Arc<AtomicU64>,
}

impl TranslationCache {
    pub fn new(enabled: bool) -> Self {
        TranslationCache {
            state: Arc::new(Mutex::new(CacheState::default())),
            enabled,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            invalidations: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops all entries when `version` is newer than anything cached.
    fn observe_version(&self, state: &mut CacheState, version: u64) {
        if version > state.version {
            if !state.entries.is_empty() {
                log::debug!(
                    "Translation cache invalidated: snapshot version {} -> {}, {} entries dropped",
                    state.version,
                    version,
                    state.entries.len()
                );
                self.invalidations.fetch_add(1, Ordering::Relaxed);
            }
            state.entries.clear();
            state.version = version;
        }
    }

    /// Get a compiled translation from the cache
    pub fn get(&self, key: &TranslationCacheKey) -> Option<Arc<CompiledTranslation>> {
        if !self.enabled {
            return None;
        }
        let mut state = self.lock();
        self.observe_version(&mut state, key.version);
        match state.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                log::debug!("Translation cache hit: {}", key.normalized_text);
                Some(entry.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                log::debug!("Translation cache miss: {}", key.normalized_text);
                None
            }
        }
    }

    /// Stores `compiled` unless an entry for `key` already exists, and returns
    /// the entry that ends up cached.
    pub fn insert(&self, key: TranslationCacheKey, compiled: CompiledTranslation) -> Arc<CompiledTranslation> {
        let compiled = Arc::new(compiled);
        if !self.enabled {
            return compiled;
        }
        let mut state = self.lock();
        self.observe_version(&mut state, key.version);
        // Compiled against a snapshot that has been replaced meanwhile.
        if key.version < state.version {
            return compiled;
        }
        state.entries.entry(key).or_insert(compiled).clone()
    }

    pub fn get_or_compile<F>(
        &self,
        key: TranslationCacheKey,
        compile: F,
    ) -> Result<Arc<CompiledTranslation>, TranslationError>
    where
        F: FnOnce() -> Result<CompiledTranslation, TranslationError>,
    {
        if let Some(cached) = self.get(&key) {
            return Ok(cached);
        }
        let compiled = compile()?;
        Ok(self.insert(key, compiled))
    }

    /// Clear entire cache
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn metrics(&self) -> CacheMetrics {
        let state = self.lock();
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            size: state.entries.len(),
            version: state.version,
        }
    }
}

/// Cache metrics for monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub size: usize,
    pub version: u64,
}

impl CacheMetrics {
    /// Calculate cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql_translator::StatementKind;

    fn compiled(cypher: &str) -> CompiledTranslation {
        CompiledTranslation {
            cypher: cypher.to_string(),
            parameter_names: Vec::new(),
            parameter_sets: Vec::new(),
            kind: StatementKind::Query,
            target: None,
        }
    }

    #[test]
    fn test_cache_key_keeps_literal_whitespace() {
        let key1 = TranslationCacheKey::new("SELECT 'a  b'", ParameterShape::default(), 1);
        let key2 = TranslationCacheKey::new("SELECT 'a b'", ParameterShape::default(), 1);
        assert_ne!(key1, key2);
        assert_eq!(key1, TranslationCacheKey::new("SELECT 'a  b'", ParameterShape::default(), 1));
    }

    #[test]
    fn test_cache_basic_operations() {
        let cache = TranslationCache::new(true);
        let key = TranslationCacheKey::new("SELECT 1", ParameterShape::default(), 0);

        assert!(cache.get(&key).is_none());
        assert_eq!(cache.metrics().misses, 1);

        cache.insert(key.clone(), compiled("RETURN 1"));
        assert_eq!(cache.get(&key).map(|c| c.cypher.clone()), Some("RETURN 1".to_string()));
        assert_eq!(cache.metrics().hits, 1);
    }

    #[test]
    fn test_same_statement_returns_the_same_entry() {
        let cache = TranslationCache::new(true);
        let key = TranslationCacheKey::new("SELECT 1", ParameterShape::default(), 3);
        let first = cache.get_or_compile(key.clone(), || Ok(compiled("RETURN 1"))).unwrap();
        let second = cache
            .get_or_compile(key, || panic!("compiled twice"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_first_insert_wins() {
        let cache = TranslationCache::new(true);
        let key = TranslationCacheKey::new("SELECT 1", ParameterShape::default(), 0);
        let first = cache.insert(key.clone(), compiled("RETURN 1"));
        let second = cache.insert(key, compiled("RETURN 1 AS other"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.cypher, "RETURN 1");
    }

    #[test]
    fn test_new_version_invalidates_everything() {
        let cache = TranslationCache::new(true);
        let old = TranslationCacheKey::new("SELECT 1", ParameterShape::default(), 1);
        cache.insert(old.clone(), compiled("RETURN 1"));
        cache.insert(
            TranslationCacheKey::new("SELECT 2", ParameterShape::default(), 1),
            compiled("RETURN 2"),
        );

        let new = TranslationCacheKey::new("SELECT 1", ParameterShape::default(), 2);
        assert!(cache.get(&new).is_none());
        let metrics = cache.metrics();
        assert_eq!(metrics.size, 0);
        assert_eq!(metrics.invalidations, 1);
        assert_eq!(metrics.version, 2);

        // Late results for the old snapshot are not stored.
        cache.insert(old.clone(), compiled("RETURN 1"));
        assert_eq!(cache.metrics().size, 0);
    }

    #[test]
    fn test_parameter_shape_is_part_of_the_key() {
        let cache = TranslationCache::new(true);
        let positional = ParameterShape {
            positional: 1,
            named: Vec::new(),
        };
        let named = ParameterShape {
            positional: 0,
            named: vec!["name".to_string()],
        };
        cache.insert(
            TranslationCacheKey::new("SELECT * FROM Person WHERE name = x", positional, 0),
            compiled("a"),
        );
        assert!(cache
            .get(&TranslationCacheKey::new("SELECT * FROM Person WHERE name = x", named, 0))
            .is_none());
    }

    #[test]
    fn test_disabled_cache_never_stores() {
        let cache = TranslationCache::new(false);
        let key = TranslationCacheKey::new("SELECT 1", ParameterShape::default(), 0);
        cache.insert(key.clone(), compiled("RETURN 1"));
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.metrics(), CacheMetrics {
            hits: 0,
            misses: 0,
            invalidations: 0,
            size: 0,
            version: 0,
        });
    }

    #[test]
    fn test_hit_rate() {
        let cache = TranslationCache::new(true);
        let key = TranslationCacheKey::new("SELECT 1", ParameterShape::default(), 0);
        cache.insert(key.clone(), compiled("RETURN 1"));
        cache.get(&key);
        cache.get(&key);
        cache.get(&TranslationCacheKey::new("SELECT 2", ParameterShape::default(), 0));
        assert_eq!(cache.metrics().hit_rate(), 2.0 / 3.0);
    }
}
