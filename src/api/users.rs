//! Account API endpoints.
//!
//! Handlers validate nothing beyond extraction; all business rules live in
//! [`UserService`] so they can be tested without the HTTP layer.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, DeleteResponse, LoginRequest, RegisterRequest, SearchQuery,
    StatsDto, UpdateUserRequest, UserDto, UserListResponse,
};
use crate::services::{UserError, UserUpdate};

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::MissingField(_)
            | UserError::PasswordTooShort
            | UserError::UsernameTaken
            | UserError::EmailTaken
            | UserError::LastAdminProtected
            | UserError::EmptyQuery => Self::validation(err.to_string()),
            UserError::NotFound => Self::not_found(err.to_string()),
            UserError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            UserError::Database(msg) => Self::DatabaseError(msg),
            UserError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

/// POST /api/register
/// Create a new account with role `user`, returns 201 on success
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserDto>>), ApiError> {
    let user = state
        .users()
        .register(&payload.username, &payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserDto::from(user))),
    ))
}

/// POST /api/login
/// Authenticate with username or email plus password
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state
        .users()
        .authenticate(payload.username.trim(), &payload.password)
        .await?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// GET /api/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<UserListResponse>>, ApiError> {
    let users = state.users().list().await?;

    Ok(Json(ApiResponse::success(UserListResponse::new(users))))
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state.users().get(id).await?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// PUT /api/users/{id}
/// Partial update; absent or empty fields are left unchanged
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let update = UserUpdate {
        username: payload.username,
        email: payload.email,
        password: payload.password,
        role: payload.role,
    };

    let user = state.users().update(id, update).await?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<DeleteResponse>>, ApiError> {
    let deleted_user_id = state.users().delete(id).await?;

    Ok(Json(ApiResponse::success(DeleteResponse {
        deleted_user_id,
    })))
}

/// GET /api/users/search?q=
pub async fn search_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<UserListResponse>>, ApiError> {
    let users = state.users().search(&query.q).await?;

    Ok(Json(ApiResponse::success(UserListResponse::new(users))))
}

/// GET /api/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<StatsDto>>, ApiError> {
    let stats = state.users().stats().await?;

    Ok(Json(ApiResponse::success(StatsDto::from(stats))))
}
