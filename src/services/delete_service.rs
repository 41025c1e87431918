use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::services::VaultLocks;
use crate::services::stats_service::StatsService;
use crate::services::storage::StorageService;
use crate::utils::validation::validate_owner_id;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, Set, TransactionTrait,
};
use std::sync::Arc;

/// Removes file records while keeping originals safe from deletion as long
/// as any owner still references them, and rolls the storage counters back.
pub struct DeleteService {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
    locks: VaultLocks,
}

impl DeleteService {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn StorageService>, locks: VaultLocks) -> Self {
        Self { db, storage, locks }
    }

    /// Delete the record `file_id` owned by `owner_id`. A record owned by
    /// someone else is indistinguishable from a missing one.
    pub async fn delete(&self, owner_id: &str, file_id: &str) -> Result<(), AppError> {
        let owner_id = validate_owner_id(owner_id)?;

        tracing::info!(
            "Processing deletion for owner={}, file={}",
            owner_id,
            file_id
        );

        let _owner_guard = self.locks.lock_owner(owner_id).await;

        // Peek to learn the content hash for lock acquisition; the record is
        // re-fetched under the content lock inside the transaction.
        let peek = Files::find_by_id(file_id)
            .filter(files::Column::OwnerId.eq(owner_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        let _content_guard = self.locks.lock_content(&peek.content_hash).await;

        let txn = self.db.begin().await?;

        let record = Files::find_by_id(file_id)
            .filter(files::Column::OwnerId.eq(owner_id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        let stats = StatsService::get_or_create(&txn, owner_id).await?;

        if record.is_reference {
            let original_storage_used = (stats.original_storage_used - record.size).max(0);
            let mut active: user_stats::ActiveModel = stats.into();
            active.original_storage_used = Set(original_storage_used);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;

            record.delete(&txn).await?;
            txn.commit().await?;

            tracing::info!("Reference deleted: file={}", file_id);
            return Ok(());
        }

        // It's an original: refuse deletion while anyone, the caller
        // included, still references it.
        let reference_count = Files::find()
            .filter(files::Column::OriginalId.eq(file_id))
            .count(&txn)
            .await?;
        if reference_count > 0 {
            tracing::warn!(
                "Cannot delete original file={}: {} reference(s) exist",
                file_id,
                reference_count
            );
            txn.rollback().await?;
            return Err(AppError::Conflict(
                "Cannot delete original file with active references".to_string(),
            ));
        }

        let storage_key = record.storage_key.clone();
        let size = record.size;

        let total_storage_used = (stats.total_storage_used - size).max(0);
        let original_storage_used = (stats.original_storage_used - size).max(0);
        let mut active: user_stats::ActiveModel = stats.into();
        active.total_storage_used = Set(total_storage_used);
        active.original_storage_used = Set(original_storage_used);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        record.delete(&txn).await?;
        txn.commit().await?;

        // The committed metadata deletion is authoritative; a failed blob
        // removal leaves an orphan, never a dangling record.
        if let Some(key) = storage_key
            && let Err(e) = self.storage.delete_file(&key).await
        {
            tracing::warn!("Failed to delete content for file={}: {}", file_id, e);
        }

        tracing::info!("Original deleted: file={}, owner={}", file_id, owner_id);
        Ok(())
    }
}
