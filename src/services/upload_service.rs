use crate::api::error::AppError;
use crate::config::VaultConfig;
use crate::entities::{prelude::*, *};
use crate::services::VaultLocks;
use crate::services::hashing::{self, SpooledContent};
use crate::services::stats_service::StatsService;
use crate::services::storage::StorageService;
use crate::utils::validation::{sanitize_filename, validate_owner_id};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use std::sync::Arc;
use tokio::io::AsyncRead;
use uuid::Uuid;

/// Decides whether an upload becomes an original or a reference, and keeps
/// the per-owner storage counters consistent with that decision.
pub struct UploadService {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
    locks: VaultLocks,
    config: VaultConfig,
}

impl UploadService {
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn StorageService>,
        locks: VaultLocks,
        config: VaultConfig,
    ) -> Self {
        Self {
            db,
            storage,
            locks,
            config,
        }
    }

    /// Upload one file for `owner_id`. Identical content already stored by
    /// any owner yields a reference record; new content is quota-checked
    /// and persisted as an original. All record and counter mutations
    /// happen in one transaction.
    pub async fn upload(
        &self,
        owner_id: &str,
        reader: impl AsyncRead + Unpin + Send,
        filename: &str,
        content_type: &str,
    ) -> Result<files::Model, AppError> {
        let owner_id = validate_owner_id(owner_id)?;
        let filename = sanitize_filename(filename);

        tracing::info!(
            "Processing upload for owner={}, filename={}",
            owner_id,
            filename
        );

        let spooled = hashing::spool_and_hash(reader, Some(self.config.max_file_size)).await?;
        tracing::debug!(
            "Upload spooled: hash={}..., size={}",
            &spooled.hash[..8],
            spooled.size
        );

        // Owner lock covers the quota check-then-update; content lock keeps
        // reference creation and original deletion mutually exclusive for
        // this digest. Owner always before content.
        let _owner_guard = self.locks.lock_owner(owner_id).await;
        let _content_guard = self.locks.lock_content(&spooled.hash).await;

        let txn = self.db.begin().await?;

        // Dedup is global: any owner's original with this digest matches
        let existing_original = Files::find()
            .filter(files::Column::ContentHash.eq(&spooled.hash))
            .filter(files::Column::IsReference.eq(false))
            .one(&txn)
            .await?;

        let stats = StatsService::get_or_create(&txn, owner_id).await?;

        if let Some(original) = existing_original {
            self.create_reference(txn, owner_id, filename, content_type, &spooled, stats, original)
                .await
        } else {
            self.create_original(txn, owner_id, filename, content_type, &spooled, stats)
                .await
        }
    }

    async fn create_reference(
        &self,
        txn: DatabaseTransaction,
        owner_id: &str,
        filename: String,
        content_type: &str,
        spooled: &SpooledContent,
        stats: user_stats::Model,
        original: files::Model,
    ) -> Result<files::Model, AppError> {
        tracing::info!(
            "Duplicate content detected, creating reference to file {}",
            original.id
        );

        let record = files::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            owner_id: Set(owner_id.to_string()),
            filename: Set(filename),
            content_type: Set(content_type.to_string()),
            size: Set(spooled.size),
            content_hash: Set(spooled.hash.clone()),
            is_reference: Set(true),
            original_id: Set(Some(original.id)),
            storage_key: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        // References cost the user nothing physically; only the no-dedup
        // total moves.
        let original_storage_used = stats.original_storage_used + spooled.size;
        let mut active: user_stats::ActiveModel = stats.into();
        active.original_storage_used = Set(original_storage_used);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        txn.commit().await?;

        tracing::info!("Upload successful: file={}, owner={}", record.id, owner_id);
        Ok(record)
    }

    async fn create_original(
        &self,
        txn: DatabaseTransaction,
        owner_id: &str,
        filename: String,
        content_type: &str,
        spooled: &SpooledContent,
        stats: user_stats::Model,
    ) -> Result<files::Model, AppError> {
        let quota = self.config.storage_quota_bytes as i64;
        if stats.total_storage_used + spooled.size > quota {
            tracing::warn!(
                "Quota exceeded for owner={}: current={}, requested={}, quota={}",
                owner_id,
                stats.total_storage_used,
                spooled.size,
                quota
            );
            // Discards the pending stats row creation too
            txn.rollback().await?;
            return Err(AppError::QuotaExceeded);
        }

        let storage_key = format!("{}/{}", spooled.hash, filename);

        let spool_reader = spooled
            .reader()
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        if let Err(e) = self
            .storage
            .put_stream(&storage_key, Box::new(spool_reader))
            .await
        {
            txn.rollback().await?;
            let _ = self.storage.delete_file(&storage_key).await;
            return Err(AppError::Internal(format!("Content upload failed: {}", e)));
        }

        let original_storage_used = stats.original_storage_used + spooled.size;
        let total_storage_used = stats.total_storage_used + spooled.size;

        let persisted = async {
            let record = files::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                owner_id: Set(owner_id.to_string()),
                filename: Set(filename),
                content_type: Set(content_type.to_string()),
                size: Set(spooled.size),
                content_hash: Set(spooled.hash.clone()),
                is_reference: Set(false),
                original_id: Set(None),
                storage_key: Set(Some(storage_key.clone())),
                created_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;

            let mut active: user_stats::ActiveModel = stats.into();
            active.original_storage_used = Set(original_storage_used);
            active.total_storage_used = Set(total_storage_used);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;

            txn.commit().await?;
            Ok::<files::Model, AppError>(record)
        }
        .await;

        match persisted {
            Ok(record) => {
                tracing::info!(
                    "Upload successful: file={}, owner={}, stored {} bytes",
                    record.id,
                    owner_id,
                    record.size
                );
                Ok(record)
            }
            Err(e) => {
                // The blob landed but the metadata did not; remove the orphan
                let _ = self.storage.delete_file(&storage_key).await;
                Err(e)
            }
        }
    }
}
