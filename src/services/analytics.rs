use std::sync::Arc;

use uuid::Uuid;

use super::{
    budgets::{BudgetService, percent_used},
    rollup::{RollupService, anchored_buckets, day_buckets},
    usage::UsageAnalyticsService,
};
use crate::{
    db::{Store, StoreResult, TimeRange, UsageQuery},
    models::{
        ActivityPoint, BudgetEntity, CacheTokenPoint, ModelAnalytics, SuccessSplitPoint,
        TeamAnalytics, UserAnalytics,
    },
};

/// Entity dashboard views composed from the aggregation primitives: one call
/// per team, model, or user detail page.
#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<Store>,
    usage: UsageAnalyticsService,
    budgets: BudgetService,
    rollup: RollupService,
}

impl AnalyticsService {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            usage: UsageAnalyticsService::new(store.clone()),
            budgets: BudgetService::new(store.clone()),
            rollup: RollupService::new(store.clone()),
            store,
        }
    }

    /// Team detail view: KPIs, budget utilization, member activity, and
    /// daily spend/cache series.
    pub async fn team(&self, team_id: Uuid, range: TimeRange) -> StoreResult<TeamAnalytics> {
        let query = UsageQuery {
            team_id: Some(team_id),
            ..Default::default()
        };
        let kpis = self.usage.aggregate(range, &query).await?;
        let active_members = self.store.usage().distinct_user_count(&query, range).await?;
        let daily_spend = self.rollup.daily_spend(range, &query).await?;

        // utilization of the team's own ledger, not of the reporting window
        let mut cap = 0;
        let mut spent = 0;
        for budget in self
            .store
            .budgets()
            .find_active_for_entity(&BudgetEntity::Team { team_id })
            .await?
        {
            let entry = self.budgets.get(budget.id).await?;
            cap += entry.budget.max_budget_microcents;
            spent += entry.budget.spent_microcents;
        }
        let budget_used_percent = percent_used(spent, cap);

        let mut cache_tokens = Vec::new();
        for window in day_buckets(range) {
            let totals = self.store.usage().totals(&query, window).await?;
            cache_tokens.push(CacheTokenPoint {
                date: window.start.date_naive(),
                cache_read_tokens: totals.cache_read_tokens,
                cache_creation_tokens: totals.cache_creation_tokens,
            });
        }

        let token_efficiency = if kpis.total_spend_microcents > 0 {
            kpis.total_tokens as f64 / (kpis.total_spend_microcents as f64 / 1_000_000.0)
        } else {
            0.0
        };

        Ok(TeamAnalytics {
            team_id,
            kpis,
            budget_used_percent,
            active_members,
            token_efficiency,
            daily_spend,
            cache_tokens,
        })
    }

    /// Model detail view: KPIs, cache efficiency, and daily success/volume
    /// series.
    pub async fn model(&self, model: &str, range: TimeRange) -> StoreResult<ModelAnalytics> {
        let query = UsageQuery {
            model: Some(model.to_string()),
            ..Default::default()
        };
        let kpis = self.usage.aggregate(range, &query).await?;

        let provider = self
            .store
            .usage()
            .by_model(&query, range)
            .await?
            .into_iter()
            .next()
            .map(|row| row.provider)
            .unwrap_or_else(|| "unknown".to_string());

        let mut success_split = Vec::new();
        for window in day_buckets(range) {
            let totals = self.store.usage().totals(&query, window).await?;
            success_split.push(SuccessSplitPoint {
                date: window.start.date_naive(),
                success_count: totals.success_count,
                error_count: totals.requests - totals.success_count,
            });
        }
        let requests_per_day = self.rollup.daily_spend(range, &query).await?;

        Ok(ModelAnalytics {
            model: model.to_string(),
            provider,
            cache_hit_rate: kpis.cache_hit_rate,
            kpis,
            success_split,
            requests_per_day,
        })
    }

    /// User detail view: KPIs, cache efficiency, and a weekly activity
    /// timeline of fixed 7-day chunks anchored at the range start.
    pub async fn user(&self, user_id: Uuid, range: TimeRange) -> StoreResult<UserAnalytics> {
        let query = UsageQuery {
            user_id: Some(user_id),
            ..Default::default()
        };
        let kpis = self.usage.aggregate(range, &query).await?;

        let mut activity_timeline = Vec::new();
        for window in anchored_buckets(range, chrono::Duration::days(7)) {
            let totals = self.store.usage().totals(&query, window).await?;
            activity_timeline.push(ActivityPoint {
                week_start: window.start,
                request_count: totals.requests,
            });
        }

        Ok(UserAnalytics {
            user_id,
            cache_hit_rate: kpis.cache_hit_rate,
            kpis,
            activity_timeline,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::models::{BudgetPeriod, CreateBudget, UsageRecord};

    fn usd(dollars: i64) -> i64 {
        dollars * 1_000_000
    }

    fn window_days(days: i64) -> TimeRange {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        TimeRange::new(start, start + Duration::days(days))
    }

    fn make_record(
        org_id: Uuid,
        cost_microcents: i64,
        created_at: DateTime<Utc>,
    ) -> UsageRecord {
        UsageRecord {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4().to_string(),
            api_key_id: Uuid::new_v4(),
            org_id,
            team_id: None,
            user_id: None,
            model_requested: "gpt-4".to_string(),
            model_used: "gpt-4".to_string(),
            provider: "openai".to_string(),
            prompt_tokens: 1000,
            completion_tokens: 500,
            total_tokens: 1500,
            cache_read_tokens: 0,
            cache_creation_tokens: 0,
            prompt_cost_microcents: cost_microcents / 2,
            completion_cost_microcents: cost_microcents - cost_microcents / 2,
            total_cost_microcents: cost_microcents,
            latency_ms: 700,
            streamed: false,
            success: true,
            error_type: None,
            status_code: Some(200),
            tag_ids: Vec::new(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_team_analytics_members_and_utilization() {
        let store = Arc::new(Store::in_memory());
        let service = AnalyticsService::new(store.clone());
        let budgets = BudgetService::new(store.clone());
        let org = Uuid::new_v4();
        let team = Uuid::new_v4();
        let range = window_days(7);

        let budget = budgets
            .create(CreateBudget {
                name: "team".to_string(),
                description: None,
                max_budget_microcents: usd(200),
                period: BudgetPeriod::Monthly,
                alert_threshold: 0.8,
                entity: BudgetEntity::Team { team_id: team },
                org_id: org,
            })
            .await
            .unwrap();
        store.budgets().add_spend(budget.id, usd(50)).await.unwrap();

        for i in 0..2 {
            let mut record = make_record(org, usd(3), range.start + Duration::hours(i));
            record.team_id = Some(team);
            record.user_id = Some(Uuid::new_v4());
            store.usage().log(record).await.unwrap();
        }
        // another team's traffic stays out of the view
        let mut other = make_record(org, usd(9), range.start);
        other.team_id = Some(Uuid::new_v4());
        store.usage().log(other).await.unwrap();

        let analytics = service.team(team, range).await.unwrap();
        assert_eq!(analytics.kpis.total_requests, 2);
        assert_eq!(analytics.kpis.total_spend_microcents, usd(6));
        assert_eq!(analytics.active_members, 2);
        assert_eq!(analytics.budget_used_percent, 25.0);
        // 3000 tokens for $6
        assert_eq!(analytics.token_efficiency, 500.0);
        assert_eq!(analytics.daily_spend.len(), 8);
        assert_eq!(analytics.cache_tokens.len(), 8);
    }

    #[tokio::test]
    async fn test_model_analytics_success_split() {
        let store = Arc::new(Store::in_memory());
        let service = AnalyticsService::new(store.clone());
        let org = Uuid::new_v4();
        let range = window_days(2);

        store
            .usage()
            .log(make_record(org, usd(1), range.start))
            .await
            .unwrap();
        let mut failed = make_record(org, 0, range.start + Duration::days(1));
        failed.success = false;
        store.usage().log(failed).await.unwrap();

        let analytics = service.model("gpt-4", range).await.unwrap();
        assert_eq!(analytics.provider, "openai");
        assert_eq!(analytics.kpis.total_requests, 2);
        assert_eq!(analytics.success_split[0].success_count, 1);
        assert_eq!(analytics.success_split[0].error_count, 0);
        assert_eq!(analytics.success_split[1].error_count, 1);
    }

    #[tokio::test]
    async fn test_model_analytics_unknown_model_is_empty_not_error() {
        let store = Arc::new(Store::in_memory());
        let service = AnalyticsService::new(store.clone());
        let analytics = service.model("does-not-exist", window_days(2)).await.unwrap();
        assert_eq!(analytics.provider, "unknown");
        assert_eq!(analytics.kpis.total_requests, 0);
        assert_eq!(analytics.kpis.success_rate, 100.0);
    }

    #[tokio::test]
    async fn test_user_analytics_weekly_timeline() {
        let store = Arc::new(Store::in_memory());
        let service = AnalyticsService::new(store.clone());
        let org = Uuid::new_v4();
        let user = Uuid::new_v4();
        // 17 days: ceil(17/7) = 3 anchored chunks
        let range = window_days(17);

        for day in [0, 1, 8] {
            let mut record = make_record(org, usd(1), range.start + Duration::days(day));
            record.user_id = Some(user);
            store.usage().log(record).await.unwrap();
        }

        let analytics = service.user(user, range).await.unwrap();
        assert_eq!(analytics.activity_timeline.len(), 3);
        assert_eq!(analytics.activity_timeline[0].request_count, 2);
        assert_eq!(analytics.activity_timeline[1].request_count, 1);
        assert_eq!(analytics.activity_timeline[2].request_count, 0);
    }
}
