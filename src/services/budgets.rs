use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use super::rollup::day_buckets;
use crate::{
    db::{BudgetListFilter, Store, StoreError, StoreResult, TimeRange, UsageQuery},
    models::{
        AlertSeverity, Budget, BudgetAlert, BudgetEntity, BudgetEntityKind, BudgetMetrics,
        BudgetPeriod, BudgetStatus, BudgetStatusReport, CreateBudget, EntityTypeRollup,
        SpendTrendPoint, UpdateBudget, UsageRecord,
    },
};

/// A budget row together with its derived state.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetWithStatus {
    pub budget: Budget,
    pub report: BudgetStatusReport,
}

/// Percentage of the cap consumed. A zero cap reports 0, never an error.
pub fn percent_used(spent_microcents: i64, max_budget_microcents: i64) -> f64 {
    if max_budget_microcents > 0 {
        spent_microcents as f64 / max_budget_microcents as f64 * 100.0
    } else {
        0.0
    }
}

/// Classify consumption into a status tier and the set of percentage
/// thresholds crossed. Evaluated top-down, first match wins.
pub fn classify_budget(
    spent_microcents: i64,
    max_budget_microcents: i64,
    alert_threshold: f64,
) -> (BudgetStatus, Vec<u32>) {
    let pct = percent_used(spent_microcents, max_budget_microcents);
    if pct >= 100.0 {
        (BudgetStatus::Exceeded, vec![50, 75, 90, 100])
    } else if pct >= 90.0 {
        (BudgetStatus::Critical, vec![50, 75, 90])
    } else if pct >= alert_threshold * 100.0 {
        let alerts = if pct >= 75.0 { vec![50, 75] } else { vec![50] };
        (BudgetStatus::Warning, alerts)
    } else if pct >= 50.0 {
        (BudgetStatus::Healthy, vec![50])
    } else {
        (BudgetStatus::Healthy, Vec::new())
    }
}

pub fn alert_severity(threshold: u32) -> AlertSeverity {
    if threshold >= 90 {
        AlertSeverity::Critical
    } else if threshold >= 75 {
        AlertSeverity::Warning
    } else {
        AlertSeverity::Info
    }
}

/// Walk `period_start` forward by whole periods until the next reset lies in
/// the future. Returns None when the budget is not due for a rollover, which
/// includes `Total` budgets that never reset.
fn advance_period_start(
    period: BudgetPeriod,
    period_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let mut new_start = period_start;
    while let Some(next) = period.next_reset(new_start) {
        if now < next {
            break;
        }
        new_start = next;
    }
    (new_start != period_start).then_some(new_start)
}

/// Budget ledger and alert classifier.
///
/// Status, alerts, and acknowledgment are derived on every read from the
/// budget row's current snapshot; nothing is stored per alert. Period
/// rollover happens lazily on read and on accrual, through a conditional
/// store update that zeroes the spend at most once per boundary crossing.
#[derive(Clone)]
pub struct BudgetService {
    store: Arc<Store>,
}

impl BudgetService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Derive status, crossed thresholds, and the next reset boundary.
    pub fn compute_status(&self, budget: &Budget) -> BudgetStatusReport {
        let (status, alerts_triggered) = classify_budget(
            budget.spent_microcents,
            budget.max_budget_microcents,
            budget.alert_threshold,
        );
        BudgetStatusReport {
            status,
            alerts_triggered,
            percent_used: percent_used(budget.spent_microcents, budget.max_budget_microcents),
            reset_date: budget.period.next_reset(budget.period_start),
        }
    }

    pub async fn create(&self, create: CreateBudget) -> StoreResult<Budget> {
        create
            .validate()
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        self.store.budgets().create(create).await
    }

    pub async fn update(&self, id: Uuid, changes: UpdateBudget) -> StoreResult<Budget> {
        changes
            .validate()
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        self.store.budgets().update(id, changes).await
    }

    pub async fn deactivate(&self, id: Uuid) -> StoreResult<Budget> {
        self.store.budgets().deactivate(id).await
    }

    /// Fetch one budget with rollover applied and its derived state.
    pub async fn get(&self, id: Uuid) -> StoreResult<BudgetWithStatus> {
        let budget = self
            .store
            .budgets()
            .get(id)
            .await?
            .ok_or(StoreError::NotFound)?;
        let budget = self.rollover_if_due(budget, Utc::now()).await?;
        let report = self.compute_status(&budget);
        Ok(BudgetWithStatus { budget, report })
    }

    /// List budgets with rollover applied, optionally narrowed to one
    /// derived status tier.
    pub async fn list(
        &self,
        filter: &BudgetListFilter,
        status_filter: Option<BudgetStatus>,
    ) -> StoreResult<Vec<BudgetWithStatus>> {
        let now = Utc::now();
        let budgets = self.store.budgets().list(filter).await?;
        let mut out = Vec::with_capacity(budgets.len());
        for budget in budgets {
            let budget = self.rollover_if_due(budget, now).await?;
            let report = self.compute_status(&budget);
            if status_filter.is_some_and(|status| report.status != status) {
                continue;
            }
            out.push(BudgetWithStatus { budget, report });
        }
        Ok(out)
    }

    /// Accrue a usage record's cost into every active budget attached to any
    /// of the record's entity dimensions. Each increment is atomic per
    /// budget; the period is rolled over first so spend lands in the period
    /// the record belongs to.
    pub async fn record_spend(&self, record: &UsageRecord) -> StoreResult<()> {
        let now = Utc::now();
        for entity in record_entities(record) {
            for budget in self.store.budgets().find_active_for_entity(&entity).await? {
                let budget = self.rollover_if_due(budget, now).await?;
                let updated = self
                    .store
                    .budgets()
                    .add_spend(budget.id, record.total_cost_microcents)
                    .await?;
                tracing::debug!(
                    budget_id = %updated.id,
                    entity_kind = entity.kind().as_str(),
                    entity_id = %entity.id(),
                    amount_microcents = record.total_cost_microcents,
                    spent_microcents = updated.spent_microcents,
                    "accrued usage into budget"
                );
            }
        }
        Ok(())
    }

    /// Materialize one alert per crossed threshold per active budget,
    /// newest first. Severity and acknowledgment are derived; an alert is
    /// acknowledged once its budget drops back below the critical line.
    pub async fn list_alerts(
        &self,
        severity_filter: Option<AlertSeverity>,
        acknowledged_filter: Option<bool>,
    ) -> StoreResult<Vec<BudgetAlert>> {
        let filter = BudgetListFilter {
            is_active: Some(true),
            ..Default::default()
        };
        let budgets = self.list(&filter, None).await?;

        let mut alerts = Vec::new();
        for entry in &budgets {
            let budget = &entry.budget;
            let pct = entry.report.percent_used;
            let acknowledged = pct < 90.0;
            for &threshold in &entry.report.alerts_triggered {
                let severity = alert_severity(threshold);
                if severity_filter.is_some_and(|s| s != severity) {
                    continue;
                }
                if acknowledged_filter.is_some_and(|a| a != acknowledged) {
                    continue;
                }
                alerts.push(BudgetAlert {
                    id: format!("{}-{}", budget.id, threshold),
                    budget_id: budget.id,
                    budget_name: budget.name.clone(),
                    entity: budget.entity,
                    threshold,
                    percent_used: pct,
                    severity,
                    acknowledged,
                    triggered_at: budget.updated_at,
                });
            }
        }
        alerts.sort_by(|a, b| {
            b.triggered_at
                .cmp(&a.triggered_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(alerts)
    }

    /// Dashboard counters over all active budgets. A budget in the critical
    /// or exceeded tier counts as one unacknowledged alert.
    pub async fn metrics(&self) -> StoreResult<BudgetMetrics> {
        let filter = BudgetListFilter {
            is_active: Some(true),
            ..Default::default()
        };
        let budgets = self.list(&filter, None).await?;

        let mut metrics = BudgetMetrics {
            total_budgets: budgets.len() as i64,
            total_allocated_microcents: 0,
            total_spent_microcents: 0,
            budgets_exceeded: 0,
            budgets_critical: 0,
            budgets_warning: 0,
            budgets_healthy: 0,
            unacknowledged_alerts: 0,
        };
        for entry in &budgets {
            metrics.total_allocated_microcents += entry.budget.max_budget_microcents;
            metrics.total_spent_microcents += entry.budget.spent_microcents;
            match entry.report.status {
                BudgetStatus::Exceeded => {
                    metrics.budgets_exceeded += 1;
                    metrics.unacknowledged_alerts += 1;
                }
                BudgetStatus::Critical => {
                    metrics.budgets_critical += 1;
                    metrics.unacknowledged_alerts += 1;
                }
                BudgetStatus::Warning => {
                    metrics.budgets_warning += 1;
                }
                BudgetStatus::Healthy => {
                    metrics.budgets_healthy += 1;
                }
            }
        }
        Ok(metrics)
    }

    /// Active budgets rolled up by the kind of entity they are attached to.
    pub async fn by_entity_type(&self) -> StoreResult<Vec<EntityTypeRollup>> {
        let filter = BudgetListFilter {
            is_active: Some(true),
            ..Default::default()
        };
        let budgets = self.list(&filter, None).await?;

        const KINDS: [BudgetEntityKind; 4] = [
            BudgetEntityKind::Organization,
            BudgetEntityKind::Team,
            BudgetEntityKind::User,
            BudgetEntityKind::Key,
        ];
        let mut rollups = Vec::new();
        for kind in KINDS {
            let mut rollup = EntityTypeRollup {
                entity_kind: kind,
                total_budget_microcents: 0,
                total_spent_microcents: 0,
                count: 0,
            };
            for entry in &budgets {
                if entry.budget.entity.kind() == kind {
                    rollup.total_budget_microcents += entry.budget.max_budget_microcents;
                    rollup.total_spent_microcents += entry.budget.spent_microcents;
                    rollup.count += 1;
                }
            }
            if rollup.count > 0 {
                rollups.push(rollup);
            }
        }
        Ok(rollups)
    }

    /// Gateway-wide daily spend series for the budget dashboard.
    pub async fn spend_trend(&self, range: TimeRange) -> StoreResult<Vec<SpendTrendPoint>> {
        let query = UsageQuery::default();
        let mut points = Vec::new();
        for bucket in day_buckets(range) {
            let totals = self.store.usage().totals(&query, bucket).await?;
            points.push(SpendTrendPoint {
                date: bucket.start.date_naive(),
                total_cost_microcents: totals.total_cost_microcents,
                request_count: totals.requests,
            });
        }
        Ok(points)
    }

    async fn rollover_if_due(&self, mut budget: Budget, now: DateTime<Utc>) -> StoreResult<Budget> {
        loop {
            let Some(new_start) = advance_period_start(budget.period, budget.period_start, now)
            else {
                return Ok(budget);
            };
            tracing::debug!(
                budget_id = %budget.id,
                period = budget.period.as_str(),
                new_period_start = %new_start,
                "rolling budget period over"
            );
            match self
                .store
                .budgets()
                .reset_period(budget.id, budget.period_start, new_start)
                .await?
            {
                Some(updated) => return Ok(updated),
                // Another reader rolled it over first; pick up their state.
                None => {
                    budget = self
                        .store
                        .budgets()
                        .get(budget.id)
                        .await?
                        .ok_or(StoreError::NotFound)?;
                }
            }
        }
    }
}

fn record_entities(record: &UsageRecord) -> Vec<BudgetEntity> {
    let mut entities = vec![
        BudgetEntity::Key {
            api_key_id: record.api_key_id,
        },
        BudgetEntity::Organization {
            org_id: record.org_id,
        },
    ];
    if let Some(team_id) = record.team_id {
        entities.push(BudgetEntity::Team { team_id });
    }
    if let Some(user_id) = record.user_id {
        entities.push(BudgetEntity::User { user_id });
    }
    entities
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rstest::rstest;

    use super::*;

    /// Dollars to microcents.
    fn usd(dollars: i64) -> i64 {
        dollars * 1_000_000
    }

    #[rstest]
    #[case(0, BudgetStatus::Healthy, &[])]
    #[case(usd(49), BudgetStatus::Healthy, &[])]
    #[case(usd(50), BudgetStatus::Healthy, &[50])]
    #[case(usd(79), BudgetStatus::Healthy, &[50])]
    #[case(usd(80), BudgetStatus::Warning, &[50, 75])]
    #[case(usd(89), BudgetStatus::Warning, &[50, 75])]
    #[case(usd(90), BudgetStatus::Critical, &[50, 75, 90])]
    #[case(usd(95), BudgetStatus::Critical, &[50, 75, 90])]
    #[case(usd(100), BudgetStatus::Exceeded, &[50, 75, 90, 100])]
    #[case(usd(130), BudgetStatus::Exceeded, &[50, 75, 90, 100])]
    fn test_classify_budget_tiers(
        #[case] spent: i64,
        #[case] expected_status: BudgetStatus,
        #[case] expected_alerts: &[u32],
    ) {
        let (status, alerts) = classify_budget(spent, usd(100), 0.8);
        assert_eq!(status, expected_status);
        assert_eq!(alerts, expected_alerts);
    }

    #[test]
    fn test_classify_low_threshold_warns_before_75() {
        // threshold 0.6: warning begins at 60% but the 75 alert only fires
        // once 75% is crossed
        let (status, alerts) = classify_budget(usd(65), usd(100), 0.6);
        assert_eq!(status, BudgetStatus::Warning);
        assert_eq!(alerts, vec![50]);
    }

    #[test]
    fn test_classify_zero_cap_is_healthy() {
        let (status, alerts) = classify_budget(usd(10), 0, 0.8);
        assert_eq!(status, BudgetStatus::Healthy);
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_status_moves_only_forward_as_spend_grows() {
        let mut previous = BudgetStatus::Healthy;
        let mut previous_pct = 0.0;
        for spent_dollars in 0..=130 {
            let spent = usd(spent_dollars);
            let (status, _) = classify_budget(spent, usd(100), 0.8);
            let pct = percent_used(spent, usd(100));
            assert!(status >= previous, "status regressed at {spent_dollars}%");
            assert!(pct >= previous_pct);
            previous = status;
            previous_pct = pct;
        }
    }

    #[rstest]
    #[case(50, AlertSeverity::Info)]
    #[case(75, AlertSeverity::Warning)]
    #[case(90, AlertSeverity::Critical)]
    #[case(100, AlertSeverity::Critical)]
    fn test_alert_severity_mapping(#[case] threshold: u32, #[case] expected: AlertSeverity) {
        assert_eq!(alert_severity(threshold), expected);
    }

    #[test]
    fn test_advance_period_start_not_due() {
        let start = Utc::now();
        assert_eq!(
            advance_period_start(BudgetPeriod::Daily, start, start + Duration::hours(12)),
            None
        );
        assert_eq!(
            advance_period_start(BudgetPeriod::Total, start, start + Duration::days(400)),
            None
        );
    }

    #[test]
    fn test_advance_period_start_catches_up_missed_periods() {
        let start = Utc::now() - Duration::days(10);
        let now = Utc::now();
        let new_start =
            advance_period_start(BudgetPeriod::Daily, start, now).expect("rollover due");
        assert!(new_start <= now);
        assert!(now - new_start < Duration::days(1));
    }

    #[test]
    fn test_advance_period_start_weekly_single_step() {
        let start = Utc::now() - Duration::days(8);
        let now = Utc::now();
        let new_start =
            advance_period_start(BudgetPeriod::Weekly, start, now).expect("rollover due");
        assert_eq!(new_start, start + Duration::days(7));
    }

    mod service {
        use chrono::TimeZone;

        use super::*;

        fn make_record(
            api_key_id: Uuid,
            org_id: Uuid,
            cost_microcents: i64,
        ) -> UsageRecord {
            UsageRecord {
                id: Uuid::new_v4(),
                request_id: Uuid::new_v4().to_string(),
                api_key_id,
                org_id,
                team_id: None,
                user_id: None,
                model_requested: "gpt-4".to_string(),
                model_used: "gpt-4".to_string(),
                provider: "openai".to_string(),
                prompt_tokens: 100,
                completion_tokens: 50,
                total_tokens: 150,
                cache_read_tokens: 0,
                cache_creation_tokens: 0,
                prompt_cost_microcents: cost_microcents / 2,
                completion_cost_microcents: cost_microcents - cost_microcents / 2,
                total_cost_microcents: cost_microcents,
                latency_ms: 800,
                streamed: false,
                success: true,
                error_type: None,
                status_code: Some(200),
                tag_ids: Vec::new(),
                created_at: Utc::now(),
            }
        }

        fn make_create(
            name: &str,
            cap_microcents: i64,
            period: BudgetPeriod,
            entity: BudgetEntity,
            org_id: Uuid,
        ) -> CreateBudget {
            CreateBudget {
                name: name.to_string(),
                description: None,
                max_budget_microcents: cap_microcents,
                period,
                alert_threshold: 0.8,
                entity,
                org_id,
            }
        }

        #[tokio::test]
        async fn test_create_rejects_invalid_threshold() {
            let service = BudgetService::new(Arc::new(Store::in_memory()));
            let org = Uuid::new_v4();
            let mut create = make_create(
                "eng",
                usd(100),
                BudgetPeriod::Monthly,
                BudgetEntity::Organization { org_id: org },
                org,
            );
            create.alert_threshold = 2.0;
            let err = service.create(create).await.unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)));
        }

        #[tokio::test]
        async fn test_record_spend_accrues_into_all_matching_budgets() {
            let store = Arc::new(Store::in_memory());
            let service = BudgetService::new(store.clone());
            let org = Uuid::new_v4();
            let team = Uuid::new_v4();
            let key = Uuid::new_v4();

            let org_budget = service
                .create(make_create(
                    "org",
                    usd(1000),
                    BudgetPeriod::Monthly,
                    BudgetEntity::Organization { org_id: org },
                    org,
                ))
                .await
                .unwrap();
            let team_budget = service
                .create(make_create(
                    "team",
                    usd(100),
                    BudgetPeriod::Monthly,
                    BudgetEntity::Team { team_id: team },
                    org,
                ))
                .await
                .unwrap();
            let key_budget = service
                .create(make_create(
                    "key",
                    usd(50),
                    BudgetPeriod::Monthly,
                    BudgetEntity::Key { api_key_id: key },
                    org,
                ))
                .await
                .unwrap();
            // a budget on an unrelated team must not accrue
            let other_budget = service
                .create(make_create(
                    "other",
                    usd(100),
                    BudgetPeriod::Monthly,
                    BudgetEntity::Team {
                        team_id: Uuid::new_v4(),
                    },
                    org,
                ))
                .await
                .unwrap();

            let mut record = make_record(key, org, usd(10));
            record.team_id = Some(team);
            service.record_spend(&record).await.unwrap();

            for id in [org_budget.id, team_budget.id, key_budget.id] {
                let entry = service.get(id).await.unwrap();
                assert_eq!(entry.budget.spent_microcents, usd(10));
            }
            let untouched = service.get(other_budget.id).await.unwrap();
            assert_eq!(untouched.budget.spent_microcents, 0);
        }

        #[tokio::test]
        async fn test_get_applies_lazy_rollover() {
            let store = Arc::new(Store::in_memory());
            let service = BudgetService::new(store.clone());
            let org = Uuid::new_v4();
            let budget = service
                .create(make_create(
                    "daily",
                    usd(100),
                    BudgetPeriod::Daily,
                    BudgetEntity::Organization { org_id: org },
                    org,
                ))
                .await
                .unwrap();

            // back-date the period two days, then accrue into it
            let stale_start = Utc::now() - Duration::days(2);
            store
                .budgets()
                .reset_period(budget.id, budget.period_start, stale_start)
                .await
                .unwrap()
                .expect("back-date");
            store.budgets().add_spend(budget.id, usd(30)).await.unwrap();

            let entry = service.get(budget.id).await.unwrap();
            assert_eq!(entry.budget.spent_microcents, 0, "rollover zeroes spend");
            assert!(Utc::now() - entry.budget.period_start < Duration::days(1));
            assert_eq!(entry.report.status, BudgetStatus::Healthy);
        }

        #[tokio::test]
        async fn test_total_budget_never_rolls_over() {
            let store = Arc::new(Store::in_memory());
            let service = BudgetService::new(store.clone());
            let org = Uuid::new_v4();
            let budget = service
                .create(make_create(
                    "lifetime",
                    usd(100),
                    BudgetPeriod::Total,
                    BudgetEntity::Organization { org_id: org },
                    org,
                ))
                .await
                .unwrap();
            let stale_start = Utc::now() - Duration::days(365);
            store
                .budgets()
                .reset_period(budget.id, budget.period_start, stale_start)
                .await
                .unwrap();
            store.budgets().add_spend(budget.id, usd(60)).await.unwrap();

            let entry = service.get(budget.id).await.unwrap();
            assert_eq!(entry.budget.spent_microcents, usd(60));
            assert_eq!(entry.report.reset_date, None);
        }

        #[tokio::test]
        async fn test_list_filters_by_derived_status() {
            let store = Arc::new(Store::in_memory());
            let service = BudgetService::new(store.clone());
            let org = Uuid::new_v4();
            let warning = service
                .create(make_create(
                    "warning",
                    usd(100),
                    BudgetPeriod::Monthly,
                    BudgetEntity::Organization { org_id: org },
                    org,
                ))
                .await
                .unwrap();
            service
                .create(make_create(
                    "healthy",
                    usd(100),
                    BudgetPeriod::Monthly,
                    BudgetEntity::Organization { org_id: org },
                    org,
                ))
                .await
                .unwrap();
            store.budgets().add_spend(warning.id, usd(82)).await.unwrap();

            let rows = service
                .list(&BudgetListFilter::default(), Some(BudgetStatus::Warning))
                .await
                .unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].budget.id, warning.id);
            assert_eq!(rows[0].report.alerts_triggered, vec![50, 75]);
        }

        #[tokio::test]
        async fn test_list_alerts_filters_and_ordering() {
            let store = Arc::new(Store::in_memory());
            let service = BudgetService::new(store.clone());
            let org = Uuid::new_v4();

            let critical = service
                .create(make_create(
                    "critical",
                    usd(100),
                    BudgetPeriod::Monthly,
                    BudgetEntity::Organization { org_id: org },
                    org,
                ))
                .await
                .unwrap();
            let healthy = service
                .create(make_create(
                    "halfway",
                    usd(100),
                    BudgetPeriod::Monthly,
                    BudgetEntity::Organization { org_id: org },
                    org,
                ))
                .await
                .unwrap();
            store.budgets().add_spend(critical.id, usd(95)).await.unwrap();
            store.budgets().add_spend(healthy.id, usd(60)).await.unwrap();

            let all = service.list_alerts(None, None).await.unwrap();
            // 3 thresholds from the critical budget, 1 from the healthy one
            assert_eq!(all.len(), 4);
            // most recently touched budget first
            assert_eq!(all[0].budget_id, healthy.id);

            let critical_only = service
                .list_alerts(Some(AlertSeverity::Critical), None)
                .await
                .unwrap();
            assert_eq!(critical_only.len(), 1);
            assert_eq!(critical_only[0].threshold, 90);
            assert!(!critical_only[0].acknowledged);

            let unacknowledged = service.list_alerts(None, Some(false)).await.unwrap();
            assert_eq!(unacknowledged.len(), 3);
            assert!(unacknowledged.iter().all(|a| a.budget_id == critical.id));

            let acknowledged = service.list_alerts(None, Some(true)).await.unwrap();
            assert_eq!(acknowledged.len(), 1);
            assert_eq!(acknowledged[0].budget_id, healthy.id);
            assert_eq!(acknowledged[0].threshold, 50);
        }

        #[tokio::test]
        async fn test_metrics_counts_tiers() {
            let store = Arc::new(Store::in_memory());
            let service = BudgetService::new(store.clone());
            let org = Uuid::new_v4();

            let spends = [usd(20), usd(85), usd(95), usd(110)];
            for (i, spend) in spends.iter().enumerate() {
                let budget = service
                    .create(make_create(
                        &format!("b{i}"),
                        usd(100),
                        BudgetPeriod::Monthly,
                        BudgetEntity::Team {
                            team_id: Uuid::new_v4(),
                        },
                        org,
                    ))
                    .await
                    .unwrap();
                store.budgets().add_spend(budget.id, *spend).await.unwrap();
            }

            let metrics = service.metrics().await.unwrap();
            assert_eq!(metrics.total_budgets, 4);
            assert_eq!(metrics.total_allocated_microcents, usd(400));
            assert_eq!(metrics.total_spent_microcents, usd(20 + 85 + 95 + 110));
            assert_eq!(metrics.budgets_healthy, 1);
            assert_eq!(metrics.budgets_warning, 1);
            assert_eq!(metrics.budgets_critical, 1);
            assert_eq!(metrics.budgets_exceeded, 1);
            assert_eq!(metrics.unacknowledged_alerts, 2);
        }

        #[tokio::test]
        async fn test_by_entity_type_groups_active_budgets() {
            let store = Arc::new(Store::in_memory());
            let service = BudgetService::new(store.clone());
            let org = Uuid::new_v4();

            for _ in 0..2 {
                service
                    .create(make_create(
                        "team",
                        usd(100),
                        BudgetPeriod::Monthly,
                        BudgetEntity::Team {
                            team_id: Uuid::new_v4(),
                        },
                        org,
                    ))
                    .await
                    .unwrap();
            }
            let retired = service
                .create(make_create(
                    "key",
                    usd(50),
                    BudgetPeriod::Monthly,
                    BudgetEntity::Key {
                        api_key_id: Uuid::new_v4(),
                    },
                    org,
                ))
                .await
                .unwrap();
            service.deactivate(retired.id).await.unwrap();

            let rollups = service.by_entity_type().await.unwrap();
            assert_eq!(rollups.len(), 1);
            assert_eq!(rollups[0].entity_kind, BudgetEntityKind::Team);
            assert_eq!(rollups[0].count, 2);
            assert_eq!(rollups[0].total_budget_microcents, usd(200));
        }

        #[tokio::test]
        async fn test_spend_trend_is_zero_filled_per_day() {
            let store = Arc::new(Store::in_memory());
            let service = BudgetService::new(store.clone());
            let org = Uuid::new_v4();
            let key = Uuid::new_v4();

            let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
            let range = TimeRange::new(start, start + Duration::days(3));
            let mut record = make_record(key, org, usd(4));
            record.created_at = start + Duration::hours(30);
            store.usage().log(record).await.unwrap();

            let trend = service.spend_trend(range).await.unwrap();
            assert_eq!(trend.len(), 4, "three full days plus the end date");
            assert_eq!(trend[0].total_cost_microcents, 0);
            assert_eq!(trend[1].total_cost_microcents, usd(4));
            assert_eq!(trend[1].request_count, 1);
            assert_eq!(trend[2].total_cost_microcents, 0);
        }
    }
}
