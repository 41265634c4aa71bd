//! `SeaORM` implementation of the `UserService` trait.

use async_trait::async_trait;
use tokio::task;

use crate::config::SecurityConfig;
use crate::db::{DeleteOutcome, Store, User, UserChanges};
use crate::password;
use crate::services::user_service::{
    MIN_PASSWORD_LEN, RECENT_USERS_LIMIT, Role, SEARCH_RESULT_LIMIT, UserError, UserService,
    UserStats, UserUpdate,
};

pub struct SeaOrmUserService {
    store: Store,
    security: SecurityConfig,
}

impl SeaOrmUserService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self { store, security }
    }

    /// Argon2 hashing is CPU-intensive and would block the async runtime if
    /// run directly, so it goes through `spawn_blocking`.
    async fn hash_password(&self, password: &str) -> Result<String, UserError> {
        let password = password.to_string();
        let security = self.security.clone();

        let hash = task::spawn_blocking(move || {
            password::hash_password(&password, Some(&security))
        })
        .await
        .map_err(|e| UserError::Internal(format!("Password hashing task panicked: {e}")))??;

        Ok(hash)
    }

    async fn verify_password(encoded: String, candidate: &str) -> Result<bool, UserError> {
        let candidate = candidate.to_string();

        task::spawn_blocking(move || password::verify_password(&encoded, &candidate))
            .await
            .map_err(|e| UserError::Internal(format!("Password verification task panicked: {e}")))
    }
}

#[async_trait]
impl UserService for SeaOrmUserService {
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, UserError> {
        if username.is_empty() {
            return Err(UserError::MissingField("username"));
        }
        if email.is_empty() {
            return Err(UserError::MissingField("email"));
        }
        if password.is_empty() {
            return Err(UserError::MissingField("password"));
        }

        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(UserError::PasswordTooShort);
        }

        let username = username.trim();
        let email = email.trim().to_lowercase();

        let password_hash = self.hash_password(password).await?;

        let model = self
            .store
            .create_user(username, &email, &password_hash, Role::User.as_str())
            .await?;

        tracing::info!("Registered user '{}' (id {})", model.username, model.id);

        Ok(User::from(model))
    }

    async fn authenticate(&self, identifier: &str, password: &str) -> Result<User, UserError> {
        if identifier.is_empty() {
            return Err(UserError::MissingField("username"));
        }
        if password.is_empty() {
            return Err(UserError::MissingField("password"));
        }

        let Some((user, password_hash)) = self.store.find_user_by_identifier(identifier).await?
        else {
            return Err(UserError::NotFound);
        };

        let is_valid = Self::verify_password(password_hash, password).await?;

        if !is_valid {
            return Err(UserError::InvalidCredentials);
        }

        // Successful login counts as an access-time touch.
        let user = self
            .store
            .touch_user(user.id)
            .await?
            .ok_or(UserError::NotFound)?;

        Ok(user)
    }

    async fn update(&self, id: i32, update: UserUpdate) -> Result<User, UserError> {
        let current = self.store.get_user(id).await?.ok_or(UserError::NotFound)?;

        let mut changes = UserChanges::default();

        if let Some(username) = update.username.as_deref().filter(|s| !s.is_empty()) {
            let username = username.trim();
            if username != current.username {
                if self.store.username_taken(username, Some(id)).await? {
                    return Err(UserError::UsernameTaken);
                }
                changes.username = Some(username.to_string());
            }
        }

        if let Some(email) = update.email.as_deref().filter(|s| !s.is_empty()) {
            let email = email.trim().to_lowercase();
            if email != current.email {
                if self.store.email_taken(&email, Some(id)).await? {
                    return Err(UserError::EmailTaken);
                }
                changes.email = Some(email);
            }
        }

        if let Some(new_password) = update.password.as_deref().filter(|s| !s.is_empty()) {
            if new_password.chars().count() < MIN_PASSWORD_LEN {
                return Err(UserError::PasswordTooShort);
            }
            changes.password_hash = Some(self.hash_password(new_password).await?);
        }

        // Unrecognized role values are ignored rather than rejected.
        if let Some(role) = update.role.as_deref().and_then(Role::parse) {
            changes.role = Some(role.as_str().to_string());
        }

        if changes.is_empty() {
            return Ok(current);
        }

        let model = self
            .store
            .apply_user_changes(id, changes)
            .await?
            .ok_or(UserError::NotFound)?;

        Ok(User::from(model))
    }

    async fn delete(&self, id: i32) -> Result<i32, UserError> {
        match self.store.delete_user(id, Role::Admin.as_str()).await? {
            DeleteOutcome::Deleted(user) => {
                tracing::info!("Deleted user '{}' (id {})", user.username, id);
                Ok(id)
            }
            DeleteOutcome::NotFound => Err(UserError::NotFound),
            DeleteOutcome::RoleProtected => Err(UserError::LastAdminProtected),
        }
    }

    async fn list(&self) -> Result<Vec<User>, UserError> {
        Ok(self.store.list_users().await?)
    }

    async fn get(&self, id: i32) -> Result<User, UserError> {
        self.store.get_user(id).await?.ok_or(UserError::NotFound)
    }

    async fn search(&self, query: &str) -> Result<Vec<User>, UserError> {
        if query.is_empty() {
            return Err(UserError::EmptyQuery);
        }

        Ok(self.store.search_users(query, SEARCH_RESULT_LIMIT).await?)
    }

    async fn stats(&self) -> Result<UserStats, UserError> {
        let total_users = self.store.count_users().await?;
        let admin_users = self
            .store
            .count_users_with_role(Role::Admin.as_str())
            .await?;
        let regular_users = self
            .store
            .count_users_with_role(Role::User.as_str())
            .await?;
        let recent_users = self.store.recent_users(RECENT_USERS_LIMIT).await?;

        Ok(UserStats {
            total_users,
            admin_users,
            regular_users,
            recent_users,
        })
    }
}
