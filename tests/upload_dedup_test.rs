use file_vault::api::error::AppError;
use file_vault::config::VaultConfig;
use file_vault::entities::{prelude::*, *};
use file_vault::infrastructure::database::create_schema;
use file_vault::services::VaultLocks;
use file_vault::services::storage::{InMemoryStorageService, StorageService};
use file_vault::services::upload_service::UploadService;
use sea_orm::{ColumnTrait, Database, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use std::sync::Arc;

fn test_config(quota: u64) -> VaultConfig {
    VaultConfig {
        storage_quota_bytes: quota,
        storage_backend: "memory".to_string(),
        ..VaultConfig::default()
    }
}

async fn setup(quota: u64) -> (DatabaseConnection, Arc<dyn StorageService>, UploadService) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    create_schema(&db).await.unwrap();

    let storage: Arc<dyn StorageService> = Arc::new(InMemoryStorageService::new());
    let upload = UploadService::new(
        db.clone(),
        storage.clone(),
        VaultLocks::new(),
        test_config(quota),
    );

    (db, storage, upload)
}

async fn stats_row(db: &DatabaseConnection, owner: &str) -> user_stats::Model {
    UserStats::find_by_id(owner).one(db).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_duplicate_upload_creates_reference() {
    let (db, _storage, upload) = setup(1024 * 1024).await;
    let content = b"identical bytes".as_slice();

    let first = upload
        .upload("alice", content, "a.txt", "text/plain")
        .await
        .unwrap();
    let second = upload
        .upload("alice", content, "copy-of-a.txt", "text/plain")
        .await
        .unwrap();

    assert!(!first.is_reference);
    assert!(first.storage_key.is_some());

    assert!(second.is_reference);
    assert_eq!(second.original_id.as_deref(), Some(first.id.as_str()));
    assert!(second.storage_key.is_none());
    assert_eq!(second.content_hash, first.content_hash);

    // Only the first upload counts toward physical storage
    let stats = stats_row(&db, "alice").await;
    assert_eq!(stats.total_storage_used, content.len() as i64);
    assert_eq!(stats.original_storage_used, 2 * content.len() as i64);
}

#[tokio::test]
async fn test_cross_user_dedup_is_global() {
    let (db, _storage, upload) = setup(1024 * 1024).await;
    let content = b"shared across tenants".as_slice();

    let original = upload
        .upload("alice", content, "report.pdf", "application/pdf")
        .await
        .unwrap();
    let reference = upload
        .upload("bob", content, "same-report.pdf", "application/pdf")
        .await
        .unwrap();

    assert_eq!(reference.original_id.as_deref(), Some(original.id.as_str()));
    assert_eq!(reference.owner_id, "bob");

    // Bob pays nothing physically; Alice's counters are untouched
    let alice = stats_row(&db, "alice").await;
    assert_eq!(alice.total_storage_used, content.len() as i64);
    assert_eq!(alice.original_storage_used, content.len() as i64);

    let bob = stats_row(&db, "bob").await;
    assert_eq!(bob.total_storage_used, 0);
    assert_eq!(bob.original_storage_used, content.len() as i64);
}

#[tokio::test]
async fn test_repeated_uploads_accounting() {
    let (db, _storage, upload) = setup(1024 * 1024).await;
    let content = b"counted every time".as_slice();

    for i in 0..4 {
        upload
            .upload("alice", content, &format!("copy-{}.txt", i), "text/plain")
            .await
            .unwrap();
    }

    let stats = stats_row(&db, "alice").await;
    assert_eq!(stats.total_storage_used, content.len() as i64);
    assert_eq!(stats.original_storage_used, 4 * content.len() as i64);

    let originals = Files::find()
        .filter(files::Column::IsReference.eq(false))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(originals, 1);
}

#[tokio::test]
async fn test_empty_file_upload() {
    let (db, _storage, upload) = setup(1024 * 1024).await;

    let record = upload
        .upload("alice", b"".as_slice(), "empty.txt", "text/plain")
        .await
        .unwrap();

    assert_eq!(record.size, 0);
    assert!(!record.is_reference);

    let stats = stats_row(&db, "alice").await;
    assert_eq!(stats.total_storage_used, 0);
    assert_eq!(stats.original_storage_used, 0);
}

#[tokio::test]
async fn test_blank_owner_rejected() {
    let (_db, _storage, upload) = setup(1024 * 1024).await;

    let err = upload
        .upload("   ", b"bytes".as_slice(), "a.txt", "text/plain")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_original_content_persisted_and_rereadable() {
    let (_db, storage, upload) = setup(1024 * 1024).await;
    let content = b"stream me to the store".as_slice();

    let record = upload
        .upload("alice", content, "data.bin", "application/octet-stream")
        .await
        .unwrap();

    let key = record.storage_key.unwrap();
    assert!(storage.file_exists(&key).await.unwrap());
    assert_eq!(storage.get_file(&key).await.unwrap(), content);
}
