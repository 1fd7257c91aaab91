use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Usage record for a single LLM API request.
///
/// Costs are stored in microcents (1/1,000,000 of a dollar) for precision.
/// For example, $0.000207 = 207 microcents.
///
/// Attribution context is stored at write time for efficient aggregation
/// queries. `team_id` and `user_id` are None for org-scoped API keys.
/// Records are immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: Uuid,
    /// Unique request identifier for idempotency (prevents duplicate charges)
    pub request_id: String,
    pub api_key_id: Uuid,
    pub org_id: Uuid,
    pub team_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    /// Model the caller asked for, before routing and aliasing
    pub model_requested: String,
    /// Model that actually served the request
    pub model_used: String,
    pub provider: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    /// Prompt tokens served from the provider-side prompt cache
    pub cache_read_tokens: i64,
    /// Prompt tokens written into the provider-side prompt cache
    pub cache_creation_tokens: i64,
    /// Cost in microcents (1/1,000,000 of a dollar)
    pub prompt_cost_microcents: i64,
    pub completion_cost_microcents: i64,
    pub total_cost_microcents: i64,
    /// Total request latency in milliseconds
    pub latency_ms: i64,
    /// Whether this was a streaming request
    pub streamed: bool,
    pub success: bool,
    pub error_type: Option<String>,
    /// HTTP status code of the response
    pub status_code: Option<i16>,
    /// Cost-allocation tag ids attached to this request. Stored decoded;
    /// membership checks are exact set membership, never substring matching.
    pub tag_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Raw sums over a filtered window, as returned by the record store.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct UsageTotals {
    pub requests: i64,
    pub success_count: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub cache_read_tokens: i64,
    pub cache_creation_tokens: i64,
    /// Total cost in microcents (1/1,000,000 of a dollar)
    pub total_cost_microcents: i64,
    pub latency_ms_sum: i64,
}

/// Derived KPI set for a reporting window.
#[derive(Debug, Clone, Serialize)]
pub struct UsageKpis {
    /// Total cost in microcents (1/1,000,000 of a dollar)
    pub total_spend_microcents: i64,
    pub total_requests: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    /// Percentage of successful requests. An empty window reports 100.
    pub success_rate: f64,
    /// Mean cost per request in microcents, 0 for an empty window.
    pub avg_cost_per_request_microcents: f64,
    pub avg_latency_ms: f64,
    /// Nearest-rank 95th percentile latency, 0 for an empty window.
    pub p95_latency_ms: i64,
    /// Cache-read tokens as a percentage of all tokens in the window.
    /// A token-based ratio, distinct from hit/miss request counts.
    pub cache_hit_rate: f64,
}

/// Usage breakdown by model
#[derive(Debug, Clone, Serialize)]
pub struct ModelUsage {
    pub model: String,
    pub provider: String,
    /// Total cost in microcents (1/1,000,000 of a dollar)
    pub total_cost_microcents: i64,
    pub request_count: i64,
    pub total_tokens: i64,
    /// Share of the window's grouped spend, filled by the service layer.
    pub percentage: f64,
}

/// Usage breakdown by team
#[derive(Debug, Clone, Serialize)]
pub struct TeamUsage {
    pub team_id: Uuid,
    /// Total cost in microcents (1/1,000,000 of a dollar)
    pub total_cost_microcents: i64,
    pub request_count: i64,
    pub total_tokens: i64,
    /// Share of the window's grouped spend, filled by the service layer.
    pub percentage: f64,
}

/// Usage breakdown by cost-allocation tag
#[derive(Debug, Clone, Serialize)]
pub struct TagUsage {
    pub tag_id: Uuid,
    pub tag_name: String,
    pub color: String,
    /// Total cost in microcents (1/1,000,000 of a dollar)
    pub total_cost_microcents: i64,
    pub request_count: i64,
    pub total_tokens: i64,
    /// Share of the window's grouped spend, filled by the service layer.
    pub percentage: f64,
}

/// Usage breakdown by API key
#[derive(Debug, Clone, Serialize)]
pub struct KeyUsage {
    pub api_key_id: Uuid,
    /// Total cost in microcents (1/1,000,000 of a dollar)
    pub total_cost_microcents: i64,
    pub request_count: i64,
    pub total_tokens: i64,
    /// Share of the window's grouped spend, filled by the service layer.
    pub percentage: f64,
}

/// Usage breakdown by user
#[derive(Debug, Clone, Serialize)]
pub struct UserUsage {
    pub user_id: Uuid,
    /// Total cost in microcents (1/1,000,000 of a dollar)
    pub total_cost_microcents: i64,
    pub request_count: i64,
    pub total_tokens: i64,
    /// Share of the window's grouped spend, filled by the service layer.
    pub percentage: f64,
}

/// One entry of a time-bucketed usage series. Buckets with no records are
/// emitted zero-filled so chart series stay continuous.
#[derive(Debug, Clone, Serialize)]
pub struct UsageBucket {
    pub bucket_start: DateTime<Utc>,
    /// Total cost in microcents (1/1,000,000 of a dollar)
    pub total_cost_microcents: i64,
    pub request_count: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub error_count: i64,
}

/// Daily spend/request data point for trend charts.
#[derive(Debug, Clone, Serialize)]
pub struct SpendTrendPoint {
    pub date: NaiveDate,
    /// Total cost in microcents (1/1,000,000 of a dollar)
    pub total_cost_microcents: i64,
    pub request_count: i64,
}

/// Daily prompt/completion token split.
#[derive(Debug, Clone, Serialize)]
pub struct TokenBucket {
    pub date: NaiveDate,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
}

/// Daily success/failure split for a model view.
#[derive(Debug, Clone, Serialize)]
pub struct SuccessSplitPoint {
    pub date: NaiveDate,
    pub success_count: i64,
    pub error_count: i64,
}

/// Request count per fixed 7-day chunk anchored at the range start.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityPoint {
    pub week_start: DateTime<Utc>,
    pub request_count: i64,
}

/// Daily cache token flow (reads vs writes) for a team view.
#[derive(Debug, Clone, Serialize)]
pub struct CacheTokenPoint {
    pub date: NaiveDate,
    pub cache_read_tokens: i64,
    pub cache_creation_tokens: i64,
}

/// Team dashboard view: KPIs plus budget utilization and activity series.
#[derive(Debug, Clone, Serialize)]
pub struct TeamAnalytics {
    pub team_id: Uuid,
    pub kpis: UsageKpis,
    /// Utilization of the team's active budgets (spent over cap), 0 when the
    /// team has no active budget.
    pub budget_used_percent: f64,
    /// Distinct users with at least one request in the window.
    pub active_members: i64,
    /// Tokens processed per dollar spent, 0 when the window had no spend.
    pub token_efficiency: f64,
    pub daily_spend: Vec<SpendTrendPoint>,
    pub cache_tokens: Vec<CacheTokenPoint>,
}

/// Model dashboard view.
#[derive(Debug, Clone, Serialize)]
pub struct ModelAnalytics {
    pub model: String,
    pub provider: String,
    pub kpis: UsageKpis,
    pub cache_hit_rate: f64,
    pub success_split: Vec<SuccessSplitPoint>,
    pub requests_per_day: Vec<SpendTrendPoint>,
}

/// User dashboard view.
#[derive(Debug, Clone, Serialize)]
pub struct UserAnalytics {
    pub user_id: Uuid,
    pub kpis: UsageKpis,
    pub cache_hit_rate: f64,
    pub activity_timeline: Vec<ActivityPoint>,
}
