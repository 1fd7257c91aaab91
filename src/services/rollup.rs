use std::sync::Arc;

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{
    db::{Store, StoreResult, TimeRange, UsageQuery},
    models::{SpendTrendPoint, TokenBucket, UsageBucket},
};

/// Width of a rollup bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketWidth {
    Hour,
    SixHours,
    Day,
    Week,
}

impl BucketWidth {
    pub fn duration(&self) -> Duration {
        match self {
            BucketWidth::Hour => Duration::hours(1),
            BucketWidth::SixHours => Duration::hours(6),
            BucketWidth::Day => Duration::days(1),
            BucketWidth::Week => Duration::days(7),
        }
    }

    /// Trend views use hourly buckets for a day or less and six-hour buckets
    /// beyond that. The width is part of the range's semantics, not a
    /// caller-tunable knob.
    pub fn for_trend_range(range: &TimeRange) -> Self {
        if range.duration() <= Duration::hours(24) {
            BucketWidth::Hour
        } else {
            BucketWidth::SixHours
        }
    }
}

/// Fixed-width chunks anchored at `range.start`, covering `[start, end)`
/// with no gaps. Produces exactly ceil((end - start) / width) chunks; the
/// last one is truncated when the range end falls mid-chunk.
pub(crate) fn anchored_buckets(range: TimeRange, width: Duration) -> Vec<TimeRange> {
    let mut buckets = Vec::new();
    let mut cursor = range.start;
    while cursor < range.end {
        let next = cursor + width;
        buckets.push(TimeRange::new(cursor, next.min(range.end)));
        cursor = next;
    }
    buckets
}

/// One bucket per calendar day (UTC) touched by the range, inclusive of the
/// end date; each spans the full day regardless of the range's time of day.
pub(crate) fn day_buckets(range: TimeRange) -> Vec<TimeRange> {
    let mut buckets = Vec::new();
    let mut day = range.start.date_naive();
    let last = range.end.date_naive();
    while day <= last {
        let start = day.and_time(NaiveTime::MIN).and_utc();
        buckets.push(TimeRange::new(start, start + Duration::days(1)));
        day = day + Duration::days(1);
    }
    buckets
}

/// Time-bucketed usage series for trend charts.
///
/// Every bucket in the range is emitted even when it holds no records, so
/// chart series stay continuous.
#[derive(Clone)]
pub struct RollupService {
    store: Arc<Store>,
}

impl RollupService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Ordered per-bucket sums. `Day` buckets follow calendar days; `Hour`,
    /// `SixHours`, and `Week` buckets are fixed chunks anchored at the range
    /// start.
    pub async fn bucketed(
        &self,
        range: TimeRange,
        width: BucketWidth,
        query: &UsageQuery,
    ) -> StoreResult<Vec<UsageBucket>> {
        let windows = match width {
            BucketWidth::Day => day_buckets(range),
            _ => anchored_buckets(range, width.duration()),
        };
        tracing::debug!(
            start = %range.start,
            end = %range.end,
            buckets = windows.len(),
            "computing bucketed usage series"
        );
        let mut series = Vec::with_capacity(windows.len());
        for window in windows {
            let totals = self.store.usage().totals(query, window).await?;
            series.push(UsageBucket {
                bucket_start: window.start,
                total_cost_microcents: totals.total_cost_microcents,
                request_count: totals.requests,
                prompt_tokens: totals.prompt_tokens,
                completion_tokens: totals.completion_tokens,
                error_count: totals.requests - totals.success_count,
            });
        }
        Ok(series)
    }

    /// Daily spend/request series.
    pub async fn daily_spend(
        &self,
        range: TimeRange,
        query: &UsageQuery,
    ) -> StoreResult<Vec<SpendTrendPoint>> {
        let mut points = Vec::new();
        for window in day_buckets(range) {
            let totals = self.store.usage().totals(query, window).await?;
            points.push(SpendTrendPoint {
                date: window.start.date_naive(),
                total_cost_microcents: totals.total_cost_microcents,
                request_count: totals.requests,
            });
        }
        Ok(points)
    }

    /// Daily prompt/completion token split.
    pub async fn tokens_over_time(
        &self,
        range: TimeRange,
        query: &UsageQuery,
    ) -> StoreResult<Vec<TokenBucket>> {
        let mut points = Vec::new();
        for window in day_buckets(range) {
            let totals = self.store.usage().totals(query, window).await?;
            points.push(TokenBucket {
                date: window.start.date_naive(),
                prompt_tokens: totals.prompt_tokens,
                completion_tokens: totals.completion_tokens,
            });
        }
        Ok(points)
    }
}
