use crate::api::error::AppError;
use crate::entities::{prelude::*, user_stats};
use crate::utils::validation::validate_owner_id;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use serde::Serialize;
use utoipa::ToSchema;

/// User-facing storage statistics derived from the two counters.
#[derive(Debug, Serialize, ToSchema)]
pub struct StorageStats {
    pub owner_id: String,
    /// Bytes physically stored for this user's originals
    pub total_storage_used: i64,
    /// Bytes the user would consume with no deduplication
    pub original_storage_used: i64,
    pub storage_savings: i64,
    pub savings_percentage: f64,
}

pub struct StatsService;

impl StatsService {
    /// Fetch the counters row for `owner_id`, creating a zeroed one on
    /// first use. Losing a create race to a concurrent writer is fine; the
    /// row exists either way.
    pub async fn get_or_create(
        db: &impl sea_orm::ConnectionTrait,
        owner_id: &str,
    ) -> Result<user_stats::Model, DbErr> {
        if let Some(stats) = UserStats::find_by_id(owner_id).one(db).await? {
            return Ok(stats);
        }

        let created = user_stats::ActiveModel {
            owner_id: Set(owner_id.to_string()),
            total_storage_used: Set(0),
            original_storage_used: Set(0),
            updated_at: Set(Utc::now()),
        }
        .insert(db)
        .await;

        match created {
            Ok(stats) => Ok(stats),
            Err(_) => UserStats::find_by_id(owner_id)
                .one(db)
                .await?
                .ok_or_else(|| DbErr::RecordNotFound(format!("user_stats {}", owner_id))),
        }
    }

    /// Read-only savings report. Never fails for an unknown owner; a
    /// zeroed row is created lazily instead.
    pub async fn storage_stats(
        db: &DatabaseConnection,
        owner_id: &str,
    ) -> Result<StorageStats, AppError> {
        let owner_id = validate_owner_id(owner_id)?;

        let stats = Self::get_or_create(db, owner_id).await?;

        let storage_savings = (stats.original_storage_used - stats.total_storage_used).max(0);
        let savings_percentage = if stats.original_storage_used > 0 {
            let pct = storage_savings as f64 / stats.original_storage_used as f64 * 100.0;
            (pct * 100.0).round() / 100.0
        } else {
            0.0
        };

        let result = StorageStats {
            owner_id: owner_id.to_string(),
            total_storage_used: stats.total_storage_used,
            original_storage_used: stats.original_storage_used,
            storage_savings,
            savings_percentage,
        };

        tracing::debug!("Storage stats for owner={}: {:?}", owner_id, result);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive(total: i64, original: i64) -> (i64, f64) {
        let savings = (original - total).max(0);
        let pct = if original > 0 {
            (savings as f64 / original as f64 * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };
        (savings, pct)
    }

    #[test]
    fn test_savings_derivation() {
        assert_eq!(derive(100, 250), (150, 60.0));
        assert_eq!(derive(0, 0), (0, 0.0));
        assert_eq!(derive(50, 50), (0, 0.0));
    }

    #[test]
    fn test_savings_percentage_rounds_to_two_decimals() {
        // 100 of 300 saved -> 33.333... -> 33.33
        let (savings, pct) = derive(200, 300);
        assert_eq!(savings, 100);
        assert_eq!(pct, 33.33);
    }

    #[test]
    fn test_savings_never_negative() {
        // Counters mutated out-of-band should not yield negative savings
        assert_eq!(derive(300, 100), (0, 0.0));
    }
}
