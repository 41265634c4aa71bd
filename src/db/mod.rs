use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::user::{DeleteOutcome, User, UserChanges, UserWriteError};

use crate::entities::users;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        // An in-memory SQLite database exists per connection, so the pool
        // must stay at a single connection to see the migrated schema.
        let max_connections = if in_memory { 1 } else { max_connections };
        let min_connections = min_connections.min(max_connections);

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<users::Model, UserWriteError> {
        self.user_repo()
            .create(username, email, password_hash, role)
            .await
    }

    pub async fn apply_user_changes(
        &self,
        id: i32,
        changes: UserChanges,
    ) -> Result<Option<users::Model>, UserWriteError> {
        self.user_repo().apply_changes(id, changes).await
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn find_user_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<(User, String)>> {
        self.user_repo()
            .find_by_identifier_with_hash(identifier)
            .await
    }

    pub async fn username_taken(&self, username: &str, exclude_id: Option<i32>) -> Result<bool> {
        self.user_repo().username_taken(username, exclude_id).await
    }

    pub async fn email_taken(&self, email: &str, exclude_id: Option<i32>) -> Result<bool> {
        self.user_repo().email_taken(email, exclude_id).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list_all().await
    }

    pub async fn search_users(&self, query: &str, limit: u64) -> Result<Vec<User>> {
        self.user_repo().search(query, limit).await
    }

    pub async fn count_users(&self) -> Result<u64> {
        self.user_repo().count_all().await
    }

    pub async fn count_users_with_role(&self, role: &str) -> Result<u64> {
        self.user_repo().count_role(role).await
    }

    pub async fn recent_users(&self, limit: u64) -> Result<Vec<User>> {
        self.user_repo().recent(limit).await
    }

    pub async fn touch_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().touch(id).await
    }

    pub async fn delete_user(&self, id: i32, protected_role: &str) -> Result<DeleteOutcome> {
        self.user_repo().delete(id, protected_role).await
    }
}
