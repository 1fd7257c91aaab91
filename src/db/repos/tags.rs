use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::error::StoreResult,
    models::{CreateTag, Tag},
};

#[async_trait]
pub trait TagRepo: Send + Sync {
    /// Tag names are unique within an organization; a duplicate name is a
    /// `Conflict`.
    async fn create(&self, create: CreateTag) -> StoreResult<Tag>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Tag>>;

    /// All of an organization's tags, ordered by name.
    async fn list_by_org(&self, org_id: Uuid) -> StoreResult<Vec<Tag>>;
}
