use crate::entities::{files, user_stats};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;
use std::time::Duration;
use tracing::info;

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db, &db_url).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection, db_url: &str) -> anyhow::Result<()> {
    if db_url.starts_with("postgres://") {
        info!("🔄 Running SQLx migrations for PostgreSQL...");
        let pool = sqlx::PgPool::connect(db_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
    } else {
        info!("🔄 Running SeaORM auto-migrations for SQLite...");
        create_schema(db).await?;
    }

    Ok(())
}

/// Create the schema directly from the entities. Used for SQLite (dev and
/// tests); PostgreSQL goes through the checked-in migrations instead.
pub async fn create_schema(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let stmts = vec![
        schema
            .create_table_from_entity(files::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(user_stats::Entity)
            .if_not_exists()
            .to_owned(),
    ];

    for stmt in stmts {
        let stmt = builder.build(&stmt);
        db.execute(stmt).await?;
    }

    // One original per content digest, enforced at the store so a lookup
    // race between concurrent uploads cannot slip in a second original.
    let index_statements = vec![
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_files_original_hash ON files(content_hash) WHERE is_reference = FALSE",
        "CREATE INDEX IF NOT EXISTS idx_files_owner ON files(owner_id)",
        "CREATE INDEX IF NOT EXISTS idx_files_hash ON files(content_hash)",
        "CREATE INDEX IF NOT EXISTS idx_files_original_id ON files(original_id)",
        "CREATE INDEX IF NOT EXISTS idx_files_owner_created ON files(owner_id, created_at)",
    ];

    for query in index_statements {
        db.execute(sea_orm::Statement::from_string(builder, query.to_owned()))
            .await?;
    }

    Ok(())
}
