//! User management endpoints.
//!
//! A password change re-hashes the secret and bumps the token version in
//! the same statement, so every refresh token minted before the change is
//! rejected on its next use.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::api::error::{ApiError, ValidationErrorBuilder};
use crate::api::guard::AuthUser;
use crate::api::validation;
use crate::db::{UpdateProfileRequest, User, UserResponse};
use crate::AppState;

/// List all users. Admin only.
///
/// GET /api/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Fetch a single user's public profile.
///
/// GET /api/users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    validation::validate_uuid(&id, "user id").map_err(ApiError::bad_request)?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(|| ApiError::not_found("User not found."))?;
    Ok(Json(user.into()))
}

/// Update the calling user's profile, optionally changing the password.
///
/// PUT /api/users/me
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(first_name) = &request.first_name {
        if let Err(e) = validation::validate_name(first_name, "First name") {
            errors.add("first_name", e);
        }
    }
    if let Some(last_name) = &request.last_name {
        if let Err(e) = validation::validate_name(last_name, "Last name") {
            errors.add("last_name", e);
        }
    }
    if let Some(new_password) = &request.new_password {
        if let Err(e) = validation::validate_password(new_password) {
            errors.add("new_password", e);
        }
        if request.current_password.is_none() {
            errors.add(
                "current_password",
                "Current password is required to set a new one",
            );
        }
    }
    errors.finish()?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&auth_user.id)
        .fetch_optional(&state.db)
        .await?;
    let user = user.ok_or_else(|| ApiError::not_found("User not found."))?;

    let first_name = request.first_name.unwrap_or(user.first_name);
    let last_name = request.last_name.unwrap_or(user.last_name);
    let now = Utc::now().to_rfc3339();

    if let Some(new_password) = &request.new_password {
        let current = request
            .current_password
            .as_deref()
            .unwrap_or_default();
        if !state.hasher.verify(current, &user.password_hash)? {
            return Err(ApiError::bad_request("Invalid credentials."));
        }

        let password_hash = state.hasher.hash(new_password)?;

        // One statement: the new hash lands together with the version bump,
        // which revokes every previously issued refresh token
        sqlx::query(
            "UPDATE users SET first_name = ?, last_name = ?, password_hash = ?,
             token_version = token_version + 1, updated_at = ? WHERE id = ?",
        )
        .bind(&first_name)
        .bind(&last_name)
        .bind(&password_hash)
        .bind(&now)
        .bind(&user.id)
        .execute(&state.db)
        .await?;

        tracing::info!(user_id = %user.id, "Password changed, sessions revoked");
    } else {
        sqlx::query("UPDATE users SET first_name = ?, last_name = ?, updated_at = ? WHERE id = ?")
            .bind(&first_name)
            .bind(&last_name)
            .bind(&now)
            .bind(&user.id)
            .execute(&state.db)
            .await?;
    }

    let updated: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&user.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(updated.into()))
}

/// Delete a user. Admin only.
///
/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validation::validate_uuid(&id, "user id").map_err(ApiError::bad_request)?;

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found."));
    }

    tracing::info!(user_id = %id, "User deleted");

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "User deleted successfully" })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, RecordingMailer};

    async fn seed_user(state: &Arc<AppState>, email: &str, password: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let hash = state.hasher.hash(password).unwrap();
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, password_hash, role)
             VALUES (?, 'Test', 'User', ?, ?, 'user')",
        )
        .bind(&id)
        .bind(email)
        .bind(&hash)
        .execute(&state.db)
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn test_password_change_bumps_token_version() {
        let state = test_state(Arc::new(RecordingMailer::default())).await;
        let id = seed_user(&state, "a@b.com", "Aa1!aaaa").await;

        let auth_user = AuthUser {
            id: id.clone(),
            role: "user".to_string(),
        };
        let request = UpdateProfileRequest {
            first_name: None,
            last_name: None,
            current_password: Some("Aa1!aaaa".to_string()),
            new_password: Some("Bb2?bbbb".to_string()),
        };

        update_me(State(state.clone()), auth_user, Json(request))
            .await
            .unwrap();

        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(&state.db)
            .await
            .unwrap();

        assert_eq!(user.token_version, 2);
        assert!(state.hasher.verify("Bb2?bbbb", &user.password_hash).unwrap());
        assert!(!state.hasher.verify("Aa1!aaaa", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_password_change_requires_current_password() {
        let state = test_state(Arc::new(RecordingMailer::default())).await;
        let id = seed_user(&state, "a@b.com", "Aa1!aaaa").await;

        let auth_user = AuthUser {
            id: id.clone(),
            role: "user".to_string(),
        };
        let request = UpdateProfileRequest {
            first_name: None,
            last_name: None,
            current_password: None,
            new_password: Some("Bb2?bbbb".to_string()),
        };

        assert!(update_me(State(state.clone()), auth_user, Json(request))
            .await
            .is_err());

        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(user.token_version, 1);
    }

    #[tokio::test]
    async fn test_wrong_current_password_is_rejected() {
        let state = test_state(Arc::new(RecordingMailer::default())).await;
        let id = seed_user(&state, "a@b.com", "Aa1!aaaa").await;

        let auth_user = AuthUser {
            id,
            role: "user".to_string(),
        };
        let request = UpdateProfileRequest {
            first_name: None,
            last_name: None,
            current_password: Some("Wrong1!aa".to_string()),
            new_password: Some("Bb2?bbbb".to_string()),
        };

        assert!(update_me(State(state), auth_user, Json(request))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_name_only_update_keeps_sessions() {
        let state = test_state(Arc::new(RecordingMailer::default())).await;
        let id = seed_user(&state, "a@b.com", "Aa1!aaaa").await;

        let auth_user = AuthUser {
            id: id.clone(),
            role: "user".to_string(),
        };
        let request = UpdateProfileRequest {
            first_name: Some("Grace".to_string()),
            last_name: None,
            current_password: None,
            new_password: None,
        };

        let response = update_me(State(state.clone()), auth_user, Json(request))
            .await
            .unwrap();
        assert_eq!(response.0.first_name, "Grace");

        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(user.token_version, 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_user_is_404() {
        let state = test_state(Arc::new(RecordingMailer::default())).await;
        let id = uuid::Uuid::new_v4().to_string();

        let result = delete_user(State(state), Path(id)).await;
        assert!(result.is_err());
    }
}
