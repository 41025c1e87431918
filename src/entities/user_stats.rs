use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-user aggregate storage counters, created lazily on first use.
/// `total_storage_used` counts only originals (deduplicated bytes);
/// `original_storage_used` counts every upload as if dedup did not exist.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_stats")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub owner_id: String,
    pub total_storage_used: i64,
    pub original_storage_used: i64,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
