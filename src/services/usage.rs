use std::sync::Arc;

use uuid::Uuid;

use super::budgets::BudgetService;
use crate::{
    db::{Store, StoreResult, TimeRange, UsageQuery},
    models::{
        KeyUsage, ModelUsage, TagUsage, TeamUsage, UsageKpis, UsageRecord, UsageTotals, UserUsage,
    },
};

/// Nearest-rank percentile: sort ascending and index `floor(n * q)`, clamped
/// to the last element. Not linear-interpolated; callers needing other
/// percentile semantics must compute them explicitly.
fn nearest_rank(latencies: &mut [i64], quantile: f64) -> i64 {
    if latencies.is_empty() {
        return 0;
    }
    latencies.sort_unstable();
    let index = (latencies.len() as f64 * quantile) as usize;
    latencies[index.min(latencies.len() - 1)]
}

/// Share of `whole` in percent, 0 when `whole` is not positive.
fn share_of(part: i64, whole: i64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

/// Derive the KPI set from raw sums and the window's latency sample.
///
/// Degenerate windows resolve to defined defaults rather than errors: an
/// empty window reports a 100% success rate and zeroed averages.
fn kpis_from(totals: UsageTotals, mut latencies: Vec<i64>) -> UsageKpis {
    let requests = totals.requests;
    let success_rate = if requests > 0 {
        totals.success_count as f64 / requests as f64 * 100.0
    } else {
        100.0
    };
    let avg_cost_per_request_microcents = if requests > 0 {
        totals.total_cost_microcents as f64 / requests as f64
    } else {
        0.0
    };
    let avg_latency_ms = if requests > 0 {
        totals.latency_ms_sum as f64 / requests as f64
    } else {
        0.0
    };
    let cache_hit_rate = if totals.total_tokens > 0 {
        totals.cache_read_tokens as f64 / totals.total_tokens as f64 * 100.0
    } else {
        0.0
    };
    UsageKpis {
        total_spend_microcents: totals.total_cost_microcents,
        total_requests: requests,
        prompt_tokens: totals.prompt_tokens,
        completion_tokens: totals.completion_tokens,
        total_tokens: totals.total_tokens,
        success_rate,
        avg_cost_per_request_microcents,
        avg_latency_ms,
        p95_latency_ms: nearest_rank(&mut latencies, 0.95),
        cache_hit_rate,
    }
}

/// Usage aggregation over the record store: scalar KPIs for a window plus
/// grouped share-of-spend breakdowns.
///
/// Grouped percentages are taken over the summed spend of the returned
/// groups in the same filtered window, so they add up to 100 whenever any
/// spend exists and are all zero otherwise.
#[derive(Clone)]
pub struct UsageAnalyticsService {
    store: Arc<Store>,
    budgets: BudgetService,
}

impl UsageAnalyticsService {
    pub fn new(store: Arc<Store>) -> Self {
        let budgets = BudgetService::new(store.clone());
        Self { store, budgets }
    }

    /// Record a completed request and accrue its cost into every budget
    /// attached to the request's key, user, team, or organization.
    ///
    /// Ingestion is idempotent by `request_id`: a duplicate delivery fails
    /// with `Conflict` before any budget is charged.
    pub async fn record(&self, record: UsageRecord) -> StoreResult<()> {
        self.store.usage().log(record.clone()).await?;
        self.budgets.record_spend(&record).await
    }

    /// Scalar KPIs over the filtered window.
    pub async fn aggregate(&self, range: TimeRange, query: &UsageQuery) -> StoreResult<UsageKpis> {
        tracing::debug!(start = %range.start, end = %range.end, "aggregating usage KPIs");
        let totals = self.store.usage().totals(query, range).await?;
        let latencies = self.store.usage().latencies(query, range).await?;
        Ok(kpis_from(totals, latencies))
    }

    /// Per-model spend breakdown with share-of-spend percentages.
    pub async fn by_model(
        &self,
        range: TimeRange,
        query: &UsageQuery,
    ) -> StoreResult<Vec<ModelUsage>> {
        let mut rows = self.store.usage().by_model(query, range).await?;
        let whole: i64 = rows.iter().map(|r| r.total_cost_microcents).sum();
        for row in &mut rows {
            row.percentage = share_of(row.total_cost_microcents, whole);
        }
        Ok(rows)
    }

    /// Per-team spend breakdown. Records without a team attribution are not
    /// part of any group.
    pub async fn by_team(
        &self,
        range: TimeRange,
        query: &UsageQuery,
    ) -> StoreResult<Vec<TeamUsage>> {
        let mut rows = self.store.usage().by_team(query, range).await?;
        let whole: i64 = rows.iter().map(|r| r.total_cost_microcents).sum();
        for row in &mut rows {
            row.percentage = share_of(row.total_cost_microcents, whole);
        }
        Ok(rows)
    }

    /// Top-spending API keys, truncated to `limit` when given.
    pub async fn by_key(
        &self,
        range: TimeRange,
        query: &UsageQuery,
        limit: Option<usize>,
    ) -> StoreResult<Vec<KeyUsage>> {
        let mut rows = self.store.usage().by_key(query, range, limit).await?;
        let whole: i64 = rows.iter().map(|r| r.total_cost_microcents).sum();
        for row in &mut rows {
            row.percentage = share_of(row.total_cost_microcents, whole);
        }
        Ok(rows)
    }

    /// Per-user spend breakdown.
    pub async fn by_user(
        &self,
        range: TimeRange,
        query: &UsageQuery,
    ) -> StoreResult<Vec<UserUsage>> {
        let mut rows = self.store.usage().by_user(query, range).await?;
        let whole: i64 = rows.iter().map(|r| r.total_cost_microcents).sum();
        for row in &mut rows {
            row.percentage = share_of(row.total_cost_microcents, whole);
        }
        Ok(rows)
    }

    /// Per-tag spend across an organization's tags, ordered by spend
    /// descending. A record carrying several tags contributes to each of
    /// them; shares are taken over the summed per-tag spend so they still
    /// add up to 100.
    pub async fn by_tag(
        &self,
        org_id: Uuid,
        range: TimeRange,
        query: &UsageQuery,
    ) -> StoreResult<Vec<TagUsage>> {
        let tags = self.store.tags().list_by_org(org_id).await?;
        let mut rows = Vec::with_capacity(tags.len());
        for tag in tags {
            let tagged = UsageQuery {
                tag_id: Some(tag.id),
                ..query.clone()
            };
            let totals = self.store.usage().totals(&tagged, range).await?;
            rows.push(TagUsage {
                tag_id: tag.id,
                tag_name: tag.name,
                color: tag.color,
                total_cost_microcents: totals.total_cost_microcents,
                request_count: totals.requests,
                total_tokens: totals.total_tokens,
                percentage: 0.0,
            });
        }
        let whole: i64 = rows.iter().map(|r| r.total_cost_microcents).sum();
        for row in &mut rows {
            row.percentage = share_of(row.total_cost_microcents, whole);
        }
        rows.sort_by(|a, b| {
            b.total_cost_microcents
                .cmp(&a.total_cost_microcents)
                .then_with(|| a.tag_name.cmp(&b.tag_name))
        });
        Ok(rows)
    }
}
