use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Explicit daily cache performance aggregate, written by the gateway's
/// caching layer. When a reporting window contains none of these, cache
/// efficiency is estimated from raw usage records instead; the two sources
/// are never combined within one computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheAggregate {
    pub id: Uuid,
    pub date: NaiveDate,
    /// None aggregates across all models
    pub model: Option<String>,
    pub total_hits: i64,
    pub total_misses: i64,
    pub tokens_saved: i64,
    /// Cost saved in microcents (1/1,000,000 of a dollar)
    pub cost_saved_microcents: i64,
    pub org_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Sums over the aggregates in a window.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheTotals {
    pub hits: i64,
    pub misses: i64,
    pub tokens_saved: i64,
    /// Cost saved in microcents (1/1,000,000 of a dollar)
    pub cost_saved_microcents: i64,
}

/// Cache efficiency report for a window.
#[derive(Debug, Clone, Serialize)]
pub struct CacheMetrics {
    /// Hits as a percentage of hits plus misses
    pub hit_rate: f64,
    pub total_hits: i64,
    pub total_misses: i64,
    pub tokens_saved: i64,
    /// Cost saved in microcents (1/1,000,000 of a dollar)
    pub cost_saved_microcents: i64,
    /// True when hit/miss counts were estimated from raw usage records
    /// rather than read from explicit aggregates. Estimated numbers are a
    /// coarse proxy, not a measurement.
    pub estimated: bool,
}

/// One entry of a cache hit/miss trend series.
#[derive(Debug, Clone, Serialize)]
pub struct CacheTrendPoint {
    pub bucket_start: DateTime<Utc>,
    pub hits: i64,
    pub misses: i64,
    /// True when this bucket's counts came from the usage-record heuristic
    pub estimated: bool,
}

/// Daily cache savings data point.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSavingsPoint {
    pub date: NaiveDate,
    pub tokens_saved: i64,
    /// Cost saved in microcents (1/1,000,000 of a dollar)
    pub cost_saved_microcents: i64,
}
