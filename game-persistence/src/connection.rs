use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection, DbErr};

pub async fn connect_to_database() -> Result<DatabaseConnection, DbErr> {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://typing_arena.db?mode=rwc".to_string());

    Database::connect(&database_url).await
}

pub async fn connect_to_memory_database() -> Result<DatabaseConnection, DbErr> {
    Database::connect("sqlite::memory:").await
}

/// Connects and applies any pending migrations. The server calls this on
/// startup so a fresh deployment needs no separate migration step.
pub async fn connect_and_migrate() -> Result<DatabaseConnection, DbErr> {
    let db = connect_to_database().await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}
