use async_trait::async_trait;
use file_vault::api::error::AppError;
use file_vault::config::VaultConfig;
use file_vault::entities::{prelude::*, *};
use file_vault::infrastructure::database::create_schema;
use file_vault::services::VaultLocks;
use file_vault::services::delete_service::DeleteService;
use file_vault::services::storage::{InMemoryStorageService, StorageService};
use file_vault::services::upload_service::UploadService;
use sea_orm::{Database, DatabaseConnection, EntityTrait};
use std::sync::Arc;
use tokio::io::AsyncRead;

fn test_config() -> VaultConfig {
    VaultConfig {
        storage_quota_bytes: 1024 * 1024,
        storage_backend: "memory".to_string(),
        ..VaultConfig::default()
    }
}

struct TestVault {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
    upload: UploadService,
    delete: DeleteService,
}

async fn setup_with_storage(storage: Arc<dyn StorageService>) -> TestVault {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    create_schema(&db).await.unwrap();

    let locks = VaultLocks::new();
    TestVault {
        upload: UploadService::new(db.clone(), storage.clone(), locks.clone(), test_config()),
        delete: DeleteService::new(db.clone(), storage.clone(), locks),
        db,
        storage,
    }
}

async fn setup() -> TestVault {
    setup_with_storage(Arc::new(InMemoryStorageService::new())).await
}

async fn stats_row(db: &DatabaseConnection, owner: &str) -> user_stats::Model {
    UserStats::find_by_id(owner).one(db).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_delete_original_with_references_is_refused() {
    let vault = setup().await;
    let content = b"pinned by a reference".as_slice();

    let original = vault
        .upload
        .upload("alice", content, "a.txt", "text/plain")
        .await
        .unwrap();
    vault
        .upload
        .upload("bob", content, "b.txt", "text/plain")
        .await
        .unwrap();

    let err = vault.delete.delete("alice", &original.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Refusal must leave the record and the counters alone
    assert!(
        Files::find_by_id(&original.id)
            .one(&vault.db)
            .await
            .unwrap()
            .is_some()
    );
    let alice = stats_row(&vault.db, "alice").await;
    assert_eq!(alice.total_storage_used, content.len() as i64);
}

#[tokio::test]
async fn test_delete_reference_then_original_succeeds() {
    let vault = setup().await;
    let content = b"delete in the right order".as_slice();

    let original = vault
        .upload
        .upload("alice", content, "a.txt", "text/plain")
        .await
        .unwrap();
    let reference = vault
        .upload
        .upload("bob", content, "b.txt", "text/plain")
        .await
        .unwrap();

    let storage_key = original.storage_key.clone().unwrap();

    vault.delete.delete("bob", &reference.id).await.unwrap();
    vault.delete.delete("alice", &original.id).await.unwrap();

    let alice = stats_row(&vault.db, "alice").await;
    assert_eq!(alice.total_storage_used, 0);
    assert_eq!(alice.original_storage_used, 0);

    let bob = stats_row(&vault.db, "bob").await;
    assert_eq!(bob.total_storage_used, 0);
    assert_eq!(bob.original_storage_used, 0);

    assert_eq!(Files::find().all(&vault.db).await.unwrap().len(), 0);
    assert!(!vault.storage.file_exists(&storage_key).await.unwrap());
}

#[tokio::test]
async fn test_delete_reference_only_touches_original_counter() {
    let vault = setup().await;
    let content = b"reference accounting".as_slice();

    vault
        .upload
        .upload("alice", content, "a.txt", "text/plain")
        .await
        .unwrap();
    let reference = vault
        .upload
        .upload("alice", content, "a-copy.txt", "text/plain")
        .await
        .unwrap();

    vault.delete.delete("alice", &reference.id).await.unwrap();

    let stats = stats_row(&vault.db, "alice").await;
    assert_eq!(stats.total_storage_used, content.len() as i64);
    assert_eq!(stats.original_storage_used, content.len() as i64);
}

#[tokio::test]
async fn test_delete_is_scoped_to_owner() {
    let vault = setup().await;

    let record = vault
        .upload
        .upload("alice", b"mine".as_slice(), "a.txt", "text/plain")
        .await
        .unwrap();

    // Someone else's record and a nonexistent id look the same
    let err = vault.delete.delete("bob", &record.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = vault.delete.delete("alice", "no-such-id").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(
        Files::find_by_id(&record.id)
            .one(&vault.db)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_blank_owner_rejected() {
    let vault = setup().await;

    let err = vault.delete.delete("  ", "any-id").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
}

/// Storage whose deletes always fail, for exercising cleanup behavior.
struct FailingDeleteStorage {
    inner: InMemoryStorageService,
}

#[async_trait]
impl StorageService for FailingDeleteStorage {
    async fn put_stream(
        &self,
        key: &str,
        reader: Box<dyn AsyncRead + Unpin + Send>,
    ) -> anyhow::Result<i64> {
        self.inner.put_stream(key, reader).await
    }

    async fn get_file(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        self.inner.get_file(key).await
    }

    async fn delete_file(&self, _key: &str) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("simulated storage outage"))
    }

    async fn file_exists(&self, key: &str) -> anyhow::Result<bool> {
        self.inner.file_exists(key).await
    }

    async fn get_download_url(&self, key: &str) -> anyhow::Result<String> {
        self.inner.get_download_url(key).await
    }
}

#[tokio::test]
async fn test_content_cleanup_failure_does_not_fail_delete() {
    let vault = setup_with_storage(Arc::new(FailingDeleteStorage {
        inner: InMemoryStorageService::new(),
    }))
    .await;
    let content = b"orphaned blob".as_slice();

    let record = vault
        .upload
        .upload("alice", content, "a.txt", "text/plain")
        .await
        .unwrap();

    // Metadata deletion is authoritative; the failed blob removal is only
    // logged
    vault.delete.delete("alice", &record.id).await.unwrap();

    assert!(
        Files::find_by_id(&record.id)
            .one(&vault.db)
            .await
            .unwrap()
            .is_none()
    );
    let stats = stats_row(&vault.db, "alice").await;
    assert_eq!(stats.total_storage_used, 0);
    assert_eq!(stats.original_storage_used, 0);
}
