use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::error::StoreResult,
    models::{Budget, BudgetEntity, BudgetEntityKind, CreateBudget, UpdateBudget},
};

#[derive(Debug, Clone, Default)]
pub struct BudgetListFilter {
    pub org_id: Option<Uuid>,
    pub entity_kind: Option<BudgetEntityKind>,
    pub is_active: Option<bool>,
}

/// Read/write interface over budget rows.
///
/// `add_spend` and `reset_period` are the two mutations the ledger relies
/// on; both must be atomic per budget so concurrent ingestion cannot lose
/// updates and concurrent readers cannot double-reset a period.
#[async_trait]
pub trait BudgetRepo: Send + Sync {
    /// Create a budget with zero spend and a period starting now.
    async fn create(&self, create: CreateBudget) -> StoreResult<Budget>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Budget>>;

    /// Ordered by creation time, newest first.
    async fn list(&self, filter: &BudgetListFilter) -> StoreResult<Vec<Budget>>;

    async fn update(&self, id: Uuid, changes: UpdateBudget) -> StoreResult<Budget>;

    /// Mark a budget inactive. Budgets are never physically deleted.
    async fn deactivate(&self, id: Uuid) -> StoreResult<Budget>;

    /// Active budgets attached to the given entity.
    async fn find_active_for_entity(&self, entity: &BudgetEntity) -> StoreResult<Vec<Budget>>;

    /// Atomically add to `spent_microcents`, returning the updated row.
    async fn add_spend(&self, id: Uuid, amount_microcents: i64) -> StoreResult<Budget>;

    /// Zero the spend and advance the period, but only if `period_start`
    /// still equals `observed_period_start`. Returns the updated row, or
    /// None when another caller already rolled the period over.
    async fn reset_period(
        &self,
        id: Uuid,
        observed_period_start: DateTime<Utc>,
        new_period_start: DateTime<Utc>,
    ) -> StoreResult<Option<Budget>>;
}
