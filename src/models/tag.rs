use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Cost-allocation tag, scoped to an organization.
///
/// Tags group spend independently of the team/user hierarchy. Names are
/// unique within an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Display color as a hex string
    pub color: String,
    pub org_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTag {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_tag_color")]
    pub color: String,
    pub org_id: Uuid,
}

pub fn default_tag_color() -> String {
    "#3B82F6".to_string()
}
