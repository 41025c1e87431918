use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A stored file. Originals (`is_reference = false`) own physical content
/// under `storage_key`; references point at an original via `original_id`
/// and carry no content of their own. References never chain: `original_id`
/// always names a non-reference row.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_id: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub content_hash: String,
    pub is_reference: bool,
    pub original_id: Option<String>,
    pub storage_key: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::OriginalId",
        to = "Column::Id"
    )]
    Original,
}

impl ActiveModelBehavior for ActiveModel {}
