use std::sync::Arc;

use super::rollup::{BucketWidth, anchored_buckets, day_buckets};
use crate::{
    config::CacheEstimatorConfig,
    db::{Store, StoreResult, TimeRange, UsageQuery},
    models::{CacheMetrics, CacheSavingsPoint, CacheTrendPoint},
};

/// Heuristic hit estimate from raw usage: a baseline fraction of requests
/// plus a contribution proportional to the cache-read token volume, clamped
/// so hits never exceed the request count. Returns (hits, misses).
fn estimate_hits(
    config: &CacheEstimatorConfig,
    total_requests: i64,
    cache_read_tokens: i64,
) -> (i64, i64) {
    if total_requests <= 0 {
        return (0, 0);
    }
    let ratio =
        config.base_hit_ratio + cache_read_tokens as f64 / config.tokens_scale * config.tokens_weight;
    let hits = ((total_requests as f64) * ratio).floor() as i64;
    let hits = hits.clamp(0, total_requests);
    (hits, total_requests - hits)
}

fn hit_rate(hits: i64, misses: i64) -> f64 {
    let total = hits + misses;
    if total > 0 {
        hits as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Cache efficiency reporting.
///
/// Prefers explicit daily cache aggregates; if and only if a window's
/// aggregates sum to zero hits and misses, falls back to a heuristic over
/// raw usage records. The two sources are never mixed within one
/// computation, and heuristic results are flagged as estimates.
#[derive(Clone)]
pub struct CacheMetricsService {
    store: Arc<Store>,
    config: CacheEstimatorConfig,
}

impl CacheMetricsService {
    pub fn new(store: Arc<Store>, config: CacheEstimatorConfig) -> Self {
        Self { store, config }
    }

    /// Hit rate and savings over the window.
    ///
    /// On the heuristic path, cost savings are unknown (they are only
    /// recorded by explicit aggregates) and tokens saved are the observed
    /// cache-read tokens.
    pub async fn metrics(&self, range: TimeRange) -> StoreResult<CacheMetrics> {
        let totals = self.store.cache_aggregates().totals(range).await?;
        if totals.hits + totals.misses > 0 {
            return Ok(CacheMetrics {
                hit_rate: hit_rate(totals.hits, totals.misses),
                total_hits: totals.hits,
                total_misses: totals.misses,
                tokens_saved: totals.tokens_saved,
                cost_saved_microcents: totals.cost_saved_microcents,
                estimated: false,
            });
        }

        let usage = self
            .store
            .usage()
            .totals(&UsageQuery::default(), range)
            .await?;
        let (hits, misses) = estimate_hits(&self.config, usage.requests, usage.cache_read_tokens);
        if usage.requests > 0 {
            tracing::warn!(
                start = %range.start,
                end = %range.end,
                requests = usage.requests,
                "no cache aggregates in window, estimating hit counts from usage records"
            );
        }
        Ok(CacheMetrics {
            hit_rate: hit_rate(hits, misses),
            total_hits: hits,
            total_misses: misses,
            tokens_saved: usage.cache_read_tokens,
            cost_saved_microcents: 0,
            estimated: usage.requests > 0,
        })
    }

    /// Hit/miss trend series. Hourly buckets for ranges up to a day,
    /// six-hour buckets beyond; every bucket is emitted, zero-filled when
    /// neither source has data.
    pub async fn hits_trend(&self, range: TimeRange) -> StoreResult<Vec<CacheTrendPoint>> {
        let width = BucketWidth::for_trend_range(&range);
        let mut points = Vec::new();
        for window in anchored_buckets(range, width.duration()) {
            let totals = self.store.cache_aggregates().totals(window).await?;
            if totals.hits + totals.misses > 0 {
                points.push(CacheTrendPoint {
                    bucket_start: window.start,
                    hits: totals.hits,
                    misses: totals.misses,
                    estimated: false,
                });
                continue;
            }
            let usage = self
                .store
                .usage()
                .totals(&UsageQuery::default(), window)
                .await?;
            let (hits, misses) =
                estimate_hits(&self.config, usage.requests, usage.cache_read_tokens);
            points.push(CacheTrendPoint {
                bucket_start: window.start,
                hits,
                misses,
                estimated: usage.requests > 0,
            });
        }
        Ok(points)
    }

    /// Daily tokens/cost saved from explicit aggregates, zero-filled across
    /// every day of the range. No heuristic applies here; savings are only
    /// known when aggregates exist.
    pub async fn daily_savings(&self, range: TimeRange) -> StoreResult<Vec<CacheSavingsPoint>> {
        let mut points = Vec::new();
        for window in day_buckets(range) {
            let totals = self.store.cache_aggregates().totals(window).await?;
            points.push(CacheSavingsPoint {
                date: window.start.date_naive(),
                tokens_saved: totals.tokens_saved,
                cost_saved_microcents: totals.cost_saved_microcents,
            });
        }
        Ok(points)
    }
}
