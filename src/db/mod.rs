mod error;
pub mod memory;
pub mod repos;

use std::sync::Arc;

pub use error::{StoreError, StoreResult};
pub use repos::*;

/// Cached repository trait objects, created once at startup.
struct CachedRepos {
    usage: Arc<dyn UsageRepo>,
    budgets: Arc<dyn BudgetRepo>,
    tags: Arc<dyn TagRepo>,
    cache_aggregates: Arc<dyn CacheAggregateRepo>,
}

/// Aggregate handle over the platform's stores.
///
/// Repositories are cached at construction time to avoid allocation on each
/// access. The concrete backing store is the embedder's choice; this crate
/// ships a concurrent in-memory implementation.
pub struct Store {
    repos: CachedRepos,
}

impl Store {
    /// Assemble a store from individually supplied repositories.
    pub fn from_parts(
        usage: Arc<dyn UsageRepo>,
        budgets: Arc<dyn BudgetRepo>,
        tags: Arc<dyn TagRepo>,
        cache_aggregates: Arc<dyn CacheAggregateRepo>,
    ) -> Self {
        Store {
            repos: CachedRepos {
                usage,
                budgets,
                tags,
                cache_aggregates,
            },
        }
    }

    /// In-memory store backed by concurrent maps.
    /// Used by tests and single-process embedders; data is lost on drop.
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::new());
        Store::from_parts(store.clone(), store.clone(), store.clone(), store)
    }

    pub fn usage(&self) -> &dyn UsageRepo {
        self.repos.usage.as_ref()
    }

    pub fn budgets(&self) -> &dyn BudgetRepo {
        self.repos.budgets.as_ref()
    }

    pub fn tags(&self) -> &dyn TagRepo {
        self.repos.tags.as_ref()
    }

    pub fn cache_aggregates(&self) -> &dyn CacheAggregateRepo {
        self.repos.cache_aggregates.as_ref()
    }
}
