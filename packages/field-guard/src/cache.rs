use crate::{
    config::CacheConfig,
    log::MAPPER,
    metrics::{STATEMENTS_TOTAL, STATEMENTS_UNMAPPABLE_TOTAL, STATEMENT_CACHE_HITS_TOTAL},
};
use metrics::counter;
use sql_gather::{analyze, SqlGather};
use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tracing::{debug, warn};

type Statements = HashMap<String, Arc<SqlGather>>;

///
/// Analysis results keyed by SQL text.
///
/// Analysis is deterministic, so two threads analyzing the same text at once both compute it and the first insert
/// wins. Once `capacity` statements are cached, new statements are analyzed but not stored.
///
#[derive(Debug)]
pub struct StatementCache {
    enabled: bool,
    capacity: usize,
    statements: RwLock<Statements>,
}

impl StatementCache {
    pub fn new(capacity: usize) -> Self {
        StatementCache {
            enabled: capacity > 0,
            capacity,
            statements: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        if config.enabled {
            Self::new(config.capacity)
        } else {
            Self::new(0)
        }
    }

    pub fn get_or_analyze(&self, sql: &str) -> Arc<SqlGather> {
        if let Some(gather) = self.get(sql) {
            counter!(STATEMENT_CACHE_HITS_TOTAL).increment(1);
            return gather;
        }

        counter!(STATEMENTS_TOTAL).increment(1);

        let gather = Arc::new(analyze(sql));
        if !gather.is_fully_mapped() {
            counter!(STATEMENTS_UNMAPPABLE_TOTAL).increment(1);
        }

        if !self.enabled {
            return gather;
        }

        let mut statements = self.write();
        if let Some(existing) = statements.get(sql) {
            return existing.clone();
        }
        if statements.len() < self.capacity {
            statements.insert(sql.to_string(), gather.clone());
        } else {
            debug!(target: MAPPER, msg = "Statement cache is full", capacity = self.capacity);
        }
        gather
    }

    pub fn get(&self, sql: &str) -> Option<Arc<SqlGather>> {
        if !self.enabled {
            return None;
        }
        self.read().get(sql).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    // Entries are only ever inserted whole, so a map left behind by a panicking writer is still usable.
    fn read(&self) -> RwLockReadGuard<'_, Statements> {
        self.statements.read().unwrap_or_else(|poisoned| {
            warn!(target: MAPPER, msg = "Statement cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Statements> {
        self.statements.write().unwrap_or_else(|poisoned| {
            warn!(target: MAPPER, msg = "Statement cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lookup_is_cached() {
        let cache = StatementCache::new(4);
        let sql = "SELECT * FROM users WHERE email = ?";

        let first = cache.get_or_analyze(sql);
        let second = cache.get_or_analyze(sql);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn full_cache_still_analyzes() {
        let cache = StatementCache::new(1);

        cache.get_or_analyze("SELECT * FROM a WHERE x = ?");
        let gather = cache.get_or_analyze("SELECT * FROM b WHERE y = ?");

        assert_eq!(gather.placeholder_count(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("SELECT * FROM b WHERE y = ?").is_none());
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let cache = StatementCache::from_config(&CacheConfig {
            enabled: false,
            capacity: 10,
        });

        cache.get_or_analyze("SELECT 1");
        assert!(cache.is_empty());
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let cache = Arc::new(StatementCache::new(4));
        cache.get_or_analyze("SELECT * FROM a WHERE x = ?");

        let poisoner = cache.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.statements.write().unwrap();
            panic!("writer failed");
        })
        .join();

        assert!(cache.statements.is_poisoned());
        assert_eq!(cache.len(), 1);
        assert!(cache.get("SELECT * FROM a WHERE x = ?").is_some());

        cache.get_or_analyze("SELECT * FROM b WHERE y = ?");
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_is_shared_across_threads() {
        let cache = Arc::new(StatementCache::new(8));
        let sql = "UPDATE users SET email = ? WHERE id = ?";

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.get_or_analyze(sql))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(cache.len(), 1);
        assert!(results.iter().all(|g| g.placeholder_count() == 2));

        cache.clear();
        assert!(cache.is_empty());
    }
}
