//! Domain service for account registration, authentication and management.

use thiserror::Error;

use crate::db::{User, UserWriteError};

/// Minimum accepted password length, enforced before hashing.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Maximum number of results returned by a search.
pub const SEARCH_RESULT_LIMIT: u64 = 20;

/// Number of accounts included in the recent-users stat.
pub const RECENT_USERS_LIMIT: u64 = 5;

/// Errors specific to account operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Field '{0}' is required")]
    MissingField(&'static str),

    #[error("Password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("Email is already in use")]
    EmailTaken,

    #[error("User not found")]
    NotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Cannot delete the last administrator")]
    LastAdminProtected,

    #[error("Search query must not be empty")]
    EmptyQuery,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for UserError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<UserWriteError> for UserError {
    fn from(err: UserWriteError) -> Self {
        match err {
            UserWriteError::UsernameTaken => Self::UsernameTaken,
            UserWriteError::EmailTaken => Self::EmailTaken,
            UserWriteError::Db(e) => Self::Database(e.to_string()),
        }
    }
}

/// Closed set of account roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Parse a role label. Anything outside the closed set yields `None`;
    /// update treats that as "leave the role alone" rather than an error.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Partial field set for an update. Empty strings are treated the same as
/// absent fields.
#[derive(Debug, Default, Clone)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Aggregate account statistics.
#[derive(Debug, Clone)]
pub struct UserStats {
    pub total_users: u64,
    pub admin_users: u64,
    pub regular_users: u64,
    pub recent_users: Vec<User>,
}

/// Domain service trait for the account workflow.
#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// Register a new account with role `user`.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::MissingField`], [`UserError::PasswordTooShort`],
    /// [`UserError::UsernameTaken`] or [`UserError::EmailTaken`], checked in
    /// that order.
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, UserError>;

    /// Verify credentials for a username or email and touch `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::NotFound`] for an unknown identifier and
    /// [`UserError::InvalidCredentials`] for a wrong password.
    async fn authenticate(&self, identifier: &str, password: &str) -> Result<User, UserError>;

    /// Apply a partial update; only present, non-empty fields are considered.
    async fn update(&self, id: i32, update: UserUpdate) -> Result<User, UserError>;

    /// Delete an account, refusing to remove the last administrator.
    async fn delete(&self, id: i32) -> Result<i32, UserError>;

    /// All accounts, newest first.
    async fn list(&self) -> Result<Vec<User>, UserError>;

    /// Single account by ID.
    async fn get(&self, id: i32) -> Result<User, UserError>;

    /// Case-insensitive substring search over username and email.
    async fn search(&self, query: &str) -> Result<Vec<User>, UserError>;

    /// Total and per-role counts plus the most recently created accounts.
    async fn stats(&self) -> Result<UserStats, UserError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_known_values_only() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::parse("Admin"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn db_errors_convert_to_database_variant() {
        let db_err = sea_orm::DbErr::Custom("test".to_string());
        let err: UserError = db_err.into();
        assert!(matches!(err, UserError::Database(_)));
    }

    #[test]
    fn write_errors_map_to_taxonomy() {
        assert!(matches!(
            UserError::from(UserWriteError::UsernameTaken),
            UserError::UsernameTaken
        ));
        assert!(matches!(
            UserError::from(UserWriteError::EmailTaken),
            UserError::EmailTaken
        ));
    }
}
