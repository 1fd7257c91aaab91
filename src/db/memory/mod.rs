//! Concurrent in-memory store implementation.
//!
//! Backs all repository traits with `DashMap`s. Budget mutation goes through
//! per-entry locking, which gives `add_spend` and the conditional
//! `reset_period` the atomicity the ledger requires. Suitable for tests and
//! single-process embedders; data is lost on drop.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use dashmap::{DashMap, Entry};
use uuid::Uuid;

use super::{
    error::{StoreError, StoreResult},
    repos::{
        BudgetListFilter, BudgetRepo, CacheAggregateRepo, TagRepo, TimeRange, UsageQuery,
        UsageRepo,
    },
};
use crate::models::{
    Budget, BudgetEntity, CacheAggregate, CacheTotals, CreateBudget, CreateTag, KeyUsage,
    ModelUsage, Tag, TeamUsage, UpdateBudget, UsageRecord, UsageTotals, UserUsage,
};

pub struct MemoryStore {
    records: DashMap<Uuid, UsageRecord>,
    /// request_id -> record id, guards idempotent ingestion
    request_ids: DashMap<String, Uuid>,
    budgets: DashMap<Uuid, Budget>,
    tags: DashMap<Uuid, Tag>,
    /// (org_id, name) -> tag id, guards per-org name uniqueness
    tag_names: DashMap<(Uuid, String), Uuid>,
    cache_aggregates: DashMap<Uuid, CacheAggregate>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            request_ids: DashMap::new(),
            budgets: DashMap::new(),
            tags: DashMap::new(),
            tag_names: DashMap::new(),
            cache_aggregates: DashMap::new(),
        }
    }

    fn for_each_match(&self, query: &UsageQuery, range: TimeRange, mut f: impl FnMut(&UsageRecord)) {
        for entry in self.records.iter() {
            let record = entry.value();
            if range.contains(record.created_at) && query.matches(record) {
                f(record);
            }
        }
    }

    fn insert_record(&self, record: UsageRecord) -> StoreResult<bool> {
        match self.request_ids.entry(record.request_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(record.id);
                self.records.insert(record.id, record);
                Ok(true)
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageRepo for MemoryStore {
    async fn log(&self, record: UsageRecord) -> StoreResult<()> {
        let request_id = record.request_id.clone();
        if self.insert_record(record)? {
            Ok(())
        } else {
            Err(StoreError::Conflict(format!(
                "usage record with request_id {request_id} already logged"
            )))
        }
    }

    async fn log_batch(&self, records: Vec<UsageRecord>) -> StoreResult<usize> {
        let mut inserted = 0;
        for record in records {
            if self.insert_record(record)? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn totals(&self, query: &UsageQuery, range: TimeRange) -> StoreResult<UsageTotals> {
        let mut totals = UsageTotals::default();
        self.for_each_match(query, range, |record| {
            totals.requests += 1;
            if record.success {
                totals.success_count += 1;
            }
            totals.prompt_tokens += record.prompt_tokens;
            totals.completion_tokens += record.completion_tokens;
            totals.total_tokens += record.total_tokens;
            totals.cache_read_tokens += record.cache_read_tokens;
            totals.cache_creation_tokens += record.cache_creation_tokens;
            totals.total_cost_microcents += record.total_cost_microcents;
            totals.latency_ms_sum += record.latency_ms;
        });
        Ok(totals)
    }

    async fn latencies(&self, query: &UsageQuery, range: TimeRange) -> StoreResult<Vec<i64>> {
        let mut latencies = Vec::new();
        self.for_each_match(query, range, |record| latencies.push(record.latency_ms));
        Ok(latencies)
    }

    async fn by_model(
        &self,
        query: &UsageQuery,
        range: TimeRange,
    ) -> StoreResult<Vec<ModelUsage>> {
        let mut groups: HashMap<(String, String), ModelUsage> = HashMap::new();
        self.for_each_match(query, range, |record| {
            let key = (record.model_used.clone(), record.provider.clone());
            let group = groups.entry(key).or_insert_with(|| ModelUsage {
                model: record.model_used.clone(),
                provider: record.provider.clone(),
                total_cost_microcents: 0,
                request_count: 0,
                total_tokens: 0,
                percentage: 0.0,
            });
            group.total_cost_microcents += record.total_cost_microcents;
            group.request_count += 1;
            group.total_tokens += record.total_tokens;
        });
        let mut rows: Vec<ModelUsage> = groups.into_values().collect();
        rows.sort_by(|a, b| {
            b.total_cost_microcents
                .cmp(&a.total_cost_microcents)
                .then_with(|| a.model.cmp(&b.model))
        });
        Ok(rows)
    }

    async fn by_team(&self, query: &UsageQuery, range: TimeRange) -> StoreResult<Vec<TeamUsage>> {
        let mut groups: HashMap<Uuid, TeamUsage> = HashMap::new();
        self.for_each_match(query, range, |record| {
            let Some(team_id) = record.team_id else {
                return;
            };
            let group = groups.entry(team_id).or_insert_with(|| TeamUsage {
                team_id,
                total_cost_microcents: 0,
                request_count: 0,
                total_tokens: 0,
                percentage: 0.0,
            });
            group.total_cost_microcents += record.total_cost_microcents;
            group.request_count += 1;
            group.total_tokens += record.total_tokens;
        });
        let mut rows: Vec<TeamUsage> = groups.into_values().collect();
        rows.sort_by(|a, b| {
            b.total_cost_microcents
                .cmp(&a.total_cost_microcents)
                .then_with(|| a.team_id.cmp(&b.team_id))
        });
        Ok(rows)
    }

    async fn by_key(
        &self,
        query: &UsageQuery,
        range: TimeRange,
        limit: Option<usize>,
    ) -> StoreResult<Vec<KeyUsage>> {
        let mut groups: HashMap<Uuid, KeyUsage> = HashMap::new();
        self.for_each_match(query, range, |record| {
            let group = groups.entry(record.api_key_id).or_insert_with(|| KeyUsage {
                api_key_id: record.api_key_id,
                total_cost_microcents: 0,
                request_count: 0,
                total_tokens: 0,
                percentage: 0.0,
            });
            group.total_cost_microcents += record.total_cost_microcents;
            group.request_count += 1;
            group.total_tokens += record.total_tokens;
        });
        let mut rows: Vec<KeyUsage> = groups.into_values().collect();
        rows.sort_by(|a, b| {
            b.total_cost_microcents
                .cmp(&a.total_cost_microcents)
                .then_with(|| a.api_key_id.cmp(&b.api_key_id))
        });
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn by_user(&self, query: &UsageQuery, range: TimeRange) -> StoreResult<Vec<UserUsage>> {
        let mut groups: HashMap<Uuid, UserUsage> = HashMap::new();
        self.for_each_match(query, range, |record| {
            let Some(user_id) = record.user_id else {
                return;
            };
            let group = groups.entry(user_id).or_insert_with(|| UserUsage {
                user_id,
                total_cost_microcents: 0,
                request_count: 0,
                total_tokens: 0,
                percentage: 0.0,
            });
            group.total_cost_microcents += record.total_cost_microcents;
            group.request_count += 1;
            group.total_tokens += record.total_tokens;
        });
        let mut rows: Vec<UserUsage> = groups.into_values().collect();
        rows.sort_by(|a, b| {
            b.total_cost_microcents
                .cmp(&a.total_cost_microcents)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(rows)
    }

    async fn distinct_user_count(
        &self,
        query: &UsageQuery,
        range: TimeRange,
    ) -> StoreResult<i64> {
        let mut users = HashSet::new();
        self.for_each_match(query, range, |record| {
            if let Some(user_id) = record.user_id {
                users.insert(user_id);
            }
        });
        Ok(users.len() as i64)
    }
}

#[async_trait]
impl BudgetRepo for MemoryStore {
    async fn create(&self, create: CreateBudget) -> StoreResult<Budget> {
        let now = Utc::now();
        let budget = Budget {
            id: Uuid::new_v4(),
            name: create.name,
            description: create.description,
            max_budget_microcents: create.max_budget_microcents,
            period: create.period,
            alert_threshold: create.alert_threshold,
            entity: create.entity,
            spent_microcents: 0,
            period_start: now,
            org_id: create.org_id,
            created_at: now,
            updated_at: now,
            is_active: true,
        };
        self.budgets.insert(budget.id, budget.clone());
        Ok(budget)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Budget>> {
        Ok(self.budgets.get(&id).map(|b| b.value().clone()))
    }

    async fn list(&self, filter: &BudgetListFilter) -> StoreResult<Vec<Budget>> {
        let mut budgets: Vec<Budget> = self
            .budgets
            .iter()
            .filter(|b| {
                filter.org_id.is_none_or(|org_id| b.org_id == org_id)
                    && filter
                        .entity_kind
                        .is_none_or(|kind| b.entity.kind() == kind)
                    && filter.is_active.is_none_or(|active| b.is_active == active)
            })
            .map(|b| b.value().clone())
            .collect();
        budgets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(budgets)
    }

    async fn update(&self, id: Uuid, changes: UpdateBudget) -> StoreResult<Budget> {
        let mut budget = self.budgets.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(name) = changes.name {
            budget.name = name;
        }
        if let Some(description) = changes.description {
            budget.description = Some(description);
        }
        if let Some(max_budget) = changes.max_budget_microcents {
            budget.max_budget_microcents = max_budget;
        }
        if let Some(threshold) = changes.alert_threshold {
            budget.alert_threshold = threshold;
        }
        if let Some(is_active) = changes.is_active {
            budget.is_active = is_active;
        }
        budget.updated_at = Utc::now();
        Ok(budget.value().clone())
    }

    async fn deactivate(&self, id: Uuid) -> StoreResult<Budget> {
        let mut budget = self.budgets.get_mut(&id).ok_or(StoreError::NotFound)?;
        budget.is_active = false;
        budget.updated_at = Utc::now();
        Ok(budget.value().clone())
    }

    async fn find_active_for_entity(&self, entity: &BudgetEntity) -> StoreResult<Vec<Budget>> {
        let mut budgets: Vec<Budget> = self
            .budgets
            .iter()
            .filter(|b| b.is_active && b.entity == *entity)
            .map(|b| b.value().clone())
            .collect();
        budgets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(budgets)
    }

    async fn add_spend(&self, id: Uuid, amount_microcents: i64) -> StoreResult<Budget> {
        let mut budget = self.budgets.get_mut(&id).ok_or(StoreError::NotFound)?;
        budget.spent_microcents += amount_microcents;
        budget.updated_at = Utc::now();
        Ok(budget.value().clone())
    }

    async fn reset_period(
        &self,
        id: Uuid,
        observed_period_start: DateTime<Utc>,
        new_period_start: DateTime<Utc>,
    ) -> StoreResult<Option<Budget>> {
        let mut budget = self.budgets.get_mut(&id).ok_or(StoreError::NotFound)?;
        if budget.period_start != observed_period_start {
            return Ok(None);
        }
        budget.spent_microcents = 0;
        budget.period_start = new_period_start;
        budget.updated_at = Utc::now();
        Ok(Some(budget.value().clone()))
    }
}

#[async_trait]
impl TagRepo for MemoryStore {
    async fn create(&self, create: CreateTag) -> StoreResult<Tag> {
        match self.tag_names.entry((create.org_id, create.name.clone())) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "tag '{}' already exists in organization",
                create.name
            ))),
            Entry::Vacant(slot) => {
                let tag = Tag {
                    id: Uuid::new_v4(),
                    name: create.name,
                    description: create.description,
                    color: create.color,
                    org_id: create.org_id,
                    created_at: Utc::now(),
                    is_active: true,
                };
                slot.insert(tag.id);
                self.tags.insert(tag.id, tag.clone());
                Ok(tag)
            }
        }
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Tag>> {
        Ok(self.tags.get(&id).map(|t| t.value().clone()))
    }

    async fn list_by_org(&self, org_id: Uuid) -> StoreResult<Vec<Tag>> {
        let mut tags: Vec<Tag> = self
            .tags
            .iter()
            .filter(|t| t.org_id == org_id)
            .map(|t| t.value().clone())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[async_trait]
impl CacheAggregateRepo for MemoryStore {
    async fn insert(&self, aggregate: CacheAggregate) -> StoreResult<()> {
        self.cache_aggregates.insert(aggregate.id, aggregate);
        Ok(())
    }

    async fn totals(&self, range: TimeRange) -> StoreResult<CacheTotals> {
        let mut totals = CacheTotals::default();
        for entry in self.cache_aggregates.iter() {
            let row = entry.value();
            if range.contains(day_start(row.date)) {
                totals.hits += row.total_hits;
                totals.misses += row.total_misses;
                totals.tokens_saved += row.tokens_saved;
                totals.cost_saved_microcents += row.cost_saved_microcents;
            }
        }
        Ok(totals)
    }

    async fn daily(&self, range: TimeRange) -> StoreResult<Vec<CacheAggregate>> {
        let mut rows: Vec<CacheAggregate> = self
            .cache_aggregates
            .iter()
            .filter(|row| range.contains(day_start(row.date)))
            .map(|row| row.value().clone())
            .collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(rows)
    }
}
