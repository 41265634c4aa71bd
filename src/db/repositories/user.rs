use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use thiserror::Error;

use crate::entities::users;

/// User data returned from the repository (without the password hash)
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            role: model.role,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Field set applied by [`UserRepository::apply_changes`]. `None` fields are
/// left untouched.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<String>,
}

impl UserChanges {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.role.is_none()
    }
}

/// Write-path errors. Unique-constraint violations are mapped to their
/// column so the workflow can report which field collided, even when a
/// concurrent writer slipped past the pre-checks.
#[derive(Debug, Error)]
pub enum UserWriteError {
    #[error("username already taken")]
    UsernameTaken,

    #[error("email already taken")]
    EmailTaken,

    #[error(transparent)]
    Db(#[from] DbErr),
}

fn map_unique_violation(err: DbErr) -> UserWriteError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg)) if msg.contains("username") => {
            UserWriteError::UsernameTaken
        }
        Some(SqlErr::UniqueConstraintViolation(msg)) if msg.contains("email") => {
            UserWriteError::EmailTaken
        }
        _ => UserWriteError::Db(err),
    }
}

/// Result of a guarded delete.
#[derive(Debug)]
pub enum DeleteOutcome {
    Deleted(User),
    NotFound,
    RoleProtected,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a new user inside a transaction. Uniqueness is pre-checked on
    /// the transaction (username first, then email) and the table's unique
    /// constraints act as the backstop for concurrent registrations.
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<users::Model, UserWriteError> {
        let txn = self.conn.begin().await?;

        let username_exists = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&txn)
            .await?
            .is_some();
        if username_exists {
            return Err(UserWriteError::UsernameTaken);
        }

        let email_exists = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&txn)
            .await?
            .is_some();
        if email_exists {
            return Err(UserWriteError::EmailTaken);
        }

        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash.to_string()),
            role: Set(role.to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(&txn).await.map_err(map_unique_violation)?;

        txn.commit().await?;

        Ok(model)
    }

    /// Apply a set of field changes and refresh `updated_at`, all inside a
    /// transaction. Returns `Ok(None)` if the row no longer exists.
    pub async fn apply_changes(
        &self,
        id: i32,
        changes: UserChanges,
    ) -> Result<Option<users::Model>, UserWriteError> {
        let txn = self.conn.begin().await?;

        let Some(user) = users::Entity::find_by_id(id).one(&txn).await? else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = user.into();

        if let Some(username) = changes.username {
            active.username = Set(username);
        }
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(password_hash) = changes.password_hash {
            active.password_hash = Set(password_hash);
        }
        if let Some(role) = changes.role {
            active.role = Set(role);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active.update(&txn).await.map_err(map_unique_violation)?;

        txn.commit().await?;

        Ok(Some(model))
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    /// Find a user by username or email (exact match) together with the
    /// stored password hash, for credential verification.
    pub async fn find_by_identifier_with_hash(
        &self,
        identifier: &str,
    ) -> Result<Option<(User, String)>> {
        let user = users::Entity::find()
            .filter(
                Condition::any()
                    .add(users::Column::Username.eq(identifier))
                    .add(users::Column::Email.eq(identifier)),
            )
            .one(&self.conn)
            .await
            .context("Failed to query user by identifier")?;

        Ok(user.map(|u| {
            let password_hash = u.password_hash.clone();
            (User::from(u), password_hash)
        }))
    }

    /// Whether a username is held by an account other than `exclude_id`.
    pub async fn username_taken(&self, username: &str, exclude_id: Option<i32>) -> Result<bool> {
        let mut query = users::Entity::find().filter(users::Column::Username.eq(username));

        if let Some(id) = exclude_id {
            query = query.filter(users::Column::Id.ne(id));
        }

        let existing = query
            .one(&self.conn)
            .await
            .context("Failed to check username availability")?;

        Ok(existing.is_some())
    }

    /// Whether an email is held by an account other than `exclude_id`.
    pub async fn email_taken(&self, email: &str, exclude_id: Option<i32>) -> Result<bool> {
        let mut query = users::Entity::find().filter(users::Column::Email.eq(email));

        if let Some(id) = exclude_id {
            query = query.filter(users::Column::Id.ne(id));
        }

        let existing = query
            .one(&self.conn)
            .await
            .context("Failed to check email availability")?;

        Ok(existing.is_some())
    }

    /// All users, newest first
    pub async fn list_all(&self) -> Result<Vec<User>> {
        let users = users::Entity::find()
            .order_by_desc(users::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(users.into_iter().map(User::from).collect())
    }

    /// Case-insensitive substring search over username and email
    pub async fn search(&self, query: &str, limit: u64) -> Result<Vec<User>> {
        let users = users::Entity::find()
            .filter(
                Condition::any()
                    .add(users::Column::Username.contains(query))
                    .add(users::Column::Email.contains(query)),
            )
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to search users")?;

        Ok(users.into_iter().map(User::from).collect())
    }

    pub async fn count_all(&self) -> Result<u64> {
        users::Entity::find()
            .count(&self.conn)
            .await
            .context("Failed to count users")
    }

    pub async fn count_role(&self, role: &str) -> Result<u64> {
        users::Entity::find()
            .filter(users::Column::Role.eq(role))
            .count(&self.conn)
            .await
            .context("Failed to count users by role")
    }

    /// The `limit` most recently created users
    pub async fn recent(&self, limit: u64) -> Result<Vec<User>> {
        let users = users::Entity::find()
            .order_by_desc(users::Column::CreatedAt)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to list recent users")?;

        Ok(users.into_iter().map(User::from).collect())
    }

    /// Delete by ID inside a transaction, refusing to remove the last
    /// account holding `protected_role`. The role count and the row removal
    /// run in the same transaction.
    pub async fn delete(&self, id: i32, protected_role: &str) -> Result<DeleteOutcome> {
        let txn = self
            .conn
            .begin()
            .await
            .context("Failed to open transaction for delete")?;

        let Some(user) = users::Entity::find_by_id(id)
            .one(&txn)
            .await
            .context("Failed to query user for delete")?
        else {
            return Ok(DeleteOutcome::NotFound);
        };

        if user.role == protected_role {
            let remaining = users::Entity::find()
                .filter(users::Column::Role.eq(protected_role))
                .count(&txn)
                .await
                .context("Failed to count protected role holders")?;
            if remaining <= 1 {
                return Ok(DeleteOutcome::RoleProtected);
            }
        }

        users::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .context("Failed to delete user")?;

        txn.commit().await.context("Failed to commit delete")?;

        Ok(DeleteOutcome::Deleted(User::from(user)))
    }

    /// Refresh `updated_at`, used as the access-time touch on login.
    /// Returns the updated user, or `None` if the row no longer exists.
    pub async fn touch(&self, id: i32) -> Result<Option<User>> {
        let Some(user) = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for touch")?
        else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = user.into();
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        let model = active
            .update(&self.conn)
            .await
            .context("Failed to touch user")?;

        Ok(Some(User::from(model)))
    }

}
