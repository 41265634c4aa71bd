use serde::{Deserialize, Serialize};

use crate::db::User;
use crate::services::UserStats;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Account representation; never carries the credential.
#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Absent fields deserialize to empty strings so the workflow can report
/// which one is missing instead of failing at the JSON layer.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// `username` accepts either the username or the email address.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub count: usize,
    pub users: Vec<UserDto>,
}

impl UserListResponse {
    #[must_use]
    pub fn new(users: Vec<User>) -> Self {
        let users: Vec<UserDto> = users.into_iter().map(UserDto::from).collect();
        Self {
            count: users.len(),
            users,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted_user_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct StatsDto {
    pub total_users: u64,
    pub admin_users: u64,
    pub regular_users: u64,
    pub recent_users: Vec<UserDto>,
}

impl From<UserStats> for StatsDto {
    fn from(stats: UserStats) -> Self {
        Self {
            total_users: stats.total_users,
            admin_users: stats.admin_users,
            regular_users: stats.regular_users,
            recent_users: stats.recent_users.into_iter().map(UserDto::from).collect(),
        }
    }
}
