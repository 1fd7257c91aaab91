use async_trait::async_trait;

use super::TimeRange;
use crate::{
    db::error::StoreResult,
    models::{CacheAggregate, CacheTotals},
};

/// Store of explicit daily cache performance aggregates.
///
/// A day's row is considered inside a window when its midnight-UTC instant
/// falls within the half-open range.
#[async_trait]
pub trait CacheAggregateRepo: Send + Sync {
    async fn insert(&self, aggregate: CacheAggregate) -> StoreResult<()>;

    /// Sums over the aggregates in the window.
    async fn totals(&self, range: TimeRange) -> StoreResult<CacheTotals>;

    /// Raw daily rows in the window, ascending by date.
    async fn daily(&self, range: TimeRange) -> StoreResult<Vec<CacheAggregate>>;
}
