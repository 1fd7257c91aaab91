use async_trait::async_trait;

use super::{TimeRange, UsageQuery};
use crate::{
    db::error::StoreResult,
    models::{KeyUsage, ModelUsage, TeamUsage, UsageRecord, UsageTotals, UserUsage},
};

/// Query interface over the usage record store.
///
/// The store is append-only from this crate's point of view; records are
/// immutable once written. Aggregation methods take a dimension filter and a
/// half-open time window and return raw sums; ratios, percentiles, and
/// percentages are derived in the service layer.
#[async_trait]
pub trait UsageRepo: Send + Sync {
    /// Append a single usage record. A duplicate `request_id` is rejected
    /// with `Conflict` so retried deliveries cannot double-charge budgets.
    async fn log(&self, record: UsageRecord) -> StoreResult<()>;

    /// Append a batch of records. Returns the number inserted; records with
    /// an already-seen `request_id` are skipped.
    async fn log_batch(&self, records: Vec<UsageRecord>) -> StoreResult<usize>;

    /// Raw sums over the filtered window.
    async fn totals(&self, query: &UsageQuery, range: TimeRange) -> StoreResult<UsageTotals>;

    /// All latencies (ms) in the filtered window, in no particular order.
    async fn latencies(&self, query: &UsageQuery, range: TimeRange) -> StoreResult<Vec<i64>>;

    /// Per-model sums, ordered by cost descending. Requests are grouped by
    /// the (model, provider) pair that served them.
    async fn by_model(&self, query: &UsageQuery, range: TimeRange)
    -> StoreResult<Vec<ModelUsage>>;

    /// Per-team sums, ordered by cost descending. Records without a team
    /// attribution are not part of any group.
    async fn by_team(&self, query: &UsageQuery, range: TimeRange) -> StoreResult<Vec<TeamUsage>>;

    /// Per-key sums, ordered by cost descending, truncated to `limit` when
    /// given (top-spenders view).
    async fn by_key(
        &self,
        query: &UsageQuery,
        range: TimeRange,
        limit: Option<usize>,
    ) -> StoreResult<Vec<KeyUsage>>;

    /// Per-user sums, ordered by cost descending. Records without a user
    /// attribution are not part of any group.
    async fn by_user(&self, query: &UsageQuery, range: TimeRange) -> StoreResult<Vec<UserUsage>>;

    /// Number of distinct users with at least one record in the window.
    async fn distinct_user_count(&self, query: &UsageQuery, range: TimeRange)
    -> StoreResult<i64>;
}
