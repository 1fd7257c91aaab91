mod budgets;
mod cache_aggregates;
mod tags;
mod usage;

pub use budgets::*;
pub use cache_aggregates::*;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
pub use tags::*;
pub use usage::*;
use uuid::Uuid;

use crate::models::UsageRecord;

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The start instant is included, the end instant is not.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Named reporting windows, resolved against a caller-supplied "now".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportingWindow {
    Last7Days,
    #[default]
    Last30Days,
    Last90Days,
}

impl ReportingWindow {
    pub fn resolve(&self, now: DateTime<Utc>) -> TimeRange {
        let days = match self {
            ReportingWindow::Last7Days => 7,
            ReportingWindow::Last30Days => 30,
            ReportingWindow::Last90Days => 90,
        };
        TimeRange::new(now - Duration::days(days), now)
    }
}

/// Dimension filters applied to usage queries. All set fields are
/// conjunctive; an empty query matches every record.
#[derive(Debug, Clone, Default)]
pub struct UsageQuery {
    pub org_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub api_key_id: Option<Uuid>,
    /// Matches on the model that served the request
    pub model: Option<String>,
    pub provider: Option<String>,
    /// Matches records whose tag-id set contains this id
    pub tag_id: Option<Uuid>,
}

impl UsageQuery {
    /// Whether a record satisfies every set filter. Tag filtering is exact
    /// set membership over the record's decoded tag ids.
    pub fn matches(&self, record: &UsageRecord) -> bool {
        if self.org_id.is_some_and(|id| record.org_id != id) {
            return false;
        }
        if self.team_id.is_some_and(|id| record.team_id != Some(id)) {
            return false;
        }
        if self.user_id.is_some_and(|id| record.user_id != Some(id)) {
            return false;
        }
        if self.api_key_id.is_some_and(|id| record.api_key_id != id) {
            return false;
        }
        if self
            .model
            .as_deref()
            .is_some_and(|model| record.model_used != model)
        {
            return false;
        }
        if self
            .provider
            .as_deref()
            .is_some_and(|provider| record.provider != provider)
        {
            return false;
        }
        if self.tag_id.is_some_and(|id| !record.tag_ids.contains(&id)) {
            return false;
        }
        true
    }
}
