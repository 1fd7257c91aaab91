use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Budget accrual cycle. `spent_microcents` resets to zero when the period
/// rolls over; `Total` budgets never reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    Daily,
    Weekly,
    Monthly,
    Total,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetPeriod::Daily => "daily",
            BudgetPeriod::Weekly => "weekly",
            BudgetPeriod::Monthly => "monthly",
            BudgetPeriod::Total => "total",
        }
    }

    /// Next reset boundary after `period_start`, or None for `Total`.
    ///
    /// Monthly addition clamps the day-of-month to the last valid day of the
    /// target month (Jan 31 rolls to Feb 28, or Feb 29 in a leap year); the
    /// time of day is preserved.
    pub fn next_reset(&self, period_start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            BudgetPeriod::Daily => Some(period_start + Duration::days(1)),
            BudgetPeriod::Weekly => Some(period_start + Duration::days(7)),
            BudgetPeriod::Monthly => {
                let date = period_start.date_naive();
                let (year, month) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                let day = date.day().min(days_in_month(year, month));
                NaiveDate::from_ymd_opt(year, month, day)
                    .map(|d| d.and_time(period_start.time()).and_utc())
            }
            BudgetPeriod::Total => None,
        }
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// Entity a budget is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BudgetEntity {
    Organization { org_id: Uuid },
    Team { team_id: Uuid },
    User { user_id: Uuid },
    Key { api_key_id: Uuid },
}

impl BudgetEntity {
    pub fn kind(&self) -> BudgetEntityKind {
        match self {
            BudgetEntity::Organization { .. } => BudgetEntityKind::Organization,
            BudgetEntity::Team { .. } => BudgetEntityKind::Team,
            BudgetEntity::User { .. } => BudgetEntityKind::User,
            BudgetEntity::Key { .. } => BudgetEntityKind::Key,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            BudgetEntity::Organization { org_id } => *org_id,
            BudgetEntity::Team { team_id } => *team_id,
            BudgetEntity::User { user_id } => *user_id,
            BudgetEntity::Key { api_key_id } => *api_key_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetEntityKind {
    Organization,
    Team,
    User,
    Key,
}

impl BudgetEntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetEntityKind::Organization => "organization",
            BudgetEntityKind::Team => "team",
            BudgetEntityKind::User => "user",
            BudgetEntityKind::Key => "key",
        }
    }
}

/// Spending cap attached to one entity.
///
/// `spent_microcents` is monotone non-decreasing within a period and is
/// zeroed exactly once when the period rolls over. Budgets are deactivated,
/// never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Cap in microcents (1/1,000,000 of a dollar)
    pub max_budget_microcents: i64,
    pub period: BudgetPeriod,
    /// Fraction of the cap at which the warning tier begins
    pub alert_threshold: f64,
    pub entity: BudgetEntity,
    /// Spend accrued since `period_start`, in microcents
    pub spent_microcents: i64,
    pub period_start: DateTime<Utc>,
    pub org_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Consumption tier. Ordering follows spend growth: a budget only moves
/// forward through these as `spent_microcents` increases within a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    Healthy,
    Warning,
    Critical,
    Exceeded,
}

impl BudgetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetStatus::Healthy => "healthy",
            BudgetStatus::Warning => "warning",
            BudgetStatus::Critical => "critical",
            BudgetStatus::Exceeded => "exceeded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

/// Derived budget state, recomputed on every read.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatusReport {
    pub status: BudgetStatus,
    /// Percentage thresholds crossed, ascending
    pub alerts_triggered: Vec<u32>,
    pub percent_used: f64,
    /// Next reset boundary, None for `Total` budgets
    pub reset_date: Option<DateTime<Utc>>,
}

/// One crossed threshold of one budget, materialized on read.
///
/// `acknowledged` is derived, not stored: an alert counts as acknowledged
/// once the budget is no longer critical (`percent_used < 90`).
#[derive(Debug, Clone, Serialize)]
pub struct BudgetAlert {
    pub id: String,
    pub budget_id: Uuid,
    pub budget_name: String,
    pub entity: BudgetEntity,
    pub threshold: u32,
    pub percent_used: f64,
    pub severity: AlertSeverity,
    pub acknowledged: bool,
    pub triggered_at: DateTime<Utc>,
}

/// Fleet-wide budget dashboard counters over active budgets.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetMetrics {
    pub total_budgets: i64,
    /// Sum of caps in microcents (1/1,000,000 of a dollar)
    pub total_allocated_microcents: i64,
    pub total_spent_microcents: i64,
    pub budgets_exceeded: i64,
    pub budgets_critical: i64,
    pub budgets_warning: i64,
    pub budgets_healthy: i64,
    pub unacknowledged_alerts: i64,
}

/// Active budgets rolled up by the kind of entity they are attached to.
#[derive(Debug, Clone, Serialize)]
pub struct EntityTypeRollup {
    pub entity_kind: BudgetEntityKind,
    /// Sum of caps in microcents (1/1,000,000 of a dollar)
    pub total_budget_microcents: i64,
    pub total_spent_microcents: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBudget {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    /// Cap in microcents (1/1,000,000 of a dollar)
    #[validate(range(min = 0))]
    pub max_budget_microcents: i64,
    pub period: BudgetPeriod,
    /// Warning tier begins at this fraction of the cap
    #[serde(default = "default_alert_threshold")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub alert_threshold: f64,
    pub entity: BudgetEntity,
    pub org_id: Uuid,
}

pub fn default_alert_threshold() -> f64 {
    0.8
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateBudget {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    /// Cap in microcents (1/1,000,000 of a dollar)
    #[validate(range(min = 0))]
    pub max_budget_microcents: Option<i64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub alert_threshold: Option<f64>,
    pub is_active: Option<bool>,
}
