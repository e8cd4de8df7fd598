//! Challenge CRUD endpoints with a cache-aside read path.
//!
//! Reads check the injected cache first and populate it on miss. Every
//! write invalidates the entity key and the collection key so the next
//! read observes the store.

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
use crate::cache::{challenge_key, CHALLENGES_COLLECTION_KEY};
use crate::db::{
    is_valid_status_transition, Challenge, ChallengeResponse, CreateChallengeRequest,
    UpdateChallengeRequest, STATUS_COMPLETED, STATUS_ONGOING, STATUS_OPEN,
};
use crate::AppState;

/// List all challenges.
///
/// GET /api/challenges
pub async fn list_challenges(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(cached) = state.cache.get(CHALLENGES_COLLECTION_KEY) {
        tracing::debug!(key = CHALLENGES_COLLECTION_KEY, "Cache hit");
        return Ok(Json(cached));
    }

    let challenges: Vec<Challenge> =
        sqlx::query_as("SELECT * FROM challenges ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?;

    let responses: Vec<ChallengeResponse> = challenges
        .into_iter()
        .map(ChallengeResponse::from)
        .collect();

    let value = serde_json::to_value(&responses)
        .map_err(|_| ApiError::internal("Internal server error"))?;
    state.cache.set(CHALLENGES_COLLECTION_KEY, value.clone());

    Ok(Json(value))
}

/// Fetch a single challenge.
///
/// GET /api/challenges/:id
pub async fn get_challenge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::validate_uuid(&id, "challenge id").map_err(ApiError::bad_request)?;

    let key = challenge_key(&id);
    if let Some(cached) = state.cache.get(&key) {
        tracing::debug!(key = %key, "Cache hit");
        return Ok(Json(cached));
    }

    let challenge: Option<Challenge> = sqlx::query_as("SELECT * FROM challenges WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;

    let challenge = challenge.ok_or_else(|| ApiError::not_found("Challenge not found."))?;
    let value = serde_json::to_value(ChallengeResponse::from(challenge))
        .map_err(|_| ApiError::internal("Internal server error"))?;
    state.cache.set(key, value.clone());

    Ok(Json(value))
}

/// Create a challenge. Admin only.
///
/// POST /api/challenges
pub async fn create_challenge(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateChallengeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validation::validate_text(&request.title, "Title", 255) {
        errors.add("title", e);
    }
    if let Err(e) = validation::validate_future_deadline(&request.deadline) {
        errors.add("deadline", e);
    }
    if let Err(e) = validation::validate_text(&request.duration, "Duration", 64) {
        errors.add("duration", e);
    }
    if let Err(e) = validation::validate_text(&request.money_prize, "Money prize", 64) {
        errors.add("money_prize", e);
    }
    if let Err(e) = validation::validate_email(&request.contact_email) {
        errors.add("contact_email", e);
    }
    if let Err(e) = validation::validate_text(&request.project_description, "Project description", 10_000) {
        errors.add("project_description", e);
    }
    if let Err(e) = validation::validate_text(&request.project_brief, "Project brief", 10_000) {
        errors.add("project_brief", e);
    }
    if request.project_tasks.is_empty() {
        errors.add("project_tasks", "At least one task is required");
    }
    errors.finish()?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let tasks = serde_json::to_string(&request.project_tasks)
        .map_err(|_| ApiError::internal("Internal server error"))?;

    sqlx::query(
        "INSERT INTO challenges (id, title, deadline, duration, money_prize, status,
         contact_email, project_description, project_brief, project_tasks, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&request.title)
    .bind(&request.deadline)
    .bind(&request.duration)
    .bind(&request.money_prize)
    .bind(STATUS_OPEN)
    .bind(&request.contact_email)
    .bind(&request.project_description)
    .bind(&request.project_brief)
    .bind(&tasks)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    state.cache.invalidate(CHALLENGES_COLLECTION_KEY);

    tracing::info!(challenge_id = %id, title = %request.title, "Challenge created");

    let challenge: Challenge = sqlx::query_as("SELECT * FROM challenges WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ChallengeResponse::from(challenge)),
    ))
}

/// Update a challenge. Admin only. Status may only move forward:
/// open -> ongoing -> completed.
///
/// PUT /api/challenges/:id
pub async fn update_challenge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateChallengeRequest>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    validation::validate_uuid(&id, "challenge id").map_err(ApiError::bad_request)?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(title) = &request.title {
        if let Err(e) = validation::validate_text(title, "Title", 255) {
            errors.add("title", e);
        }
    }
    if let Some(deadline) = &request.deadline {
        if let Err(e) = validation::validate_future_deadline(deadline) {
            errors.add("deadline", e);
        }
    }
    if let Some(contact_email) = &request.contact_email {
        if let Err(e) = validation::validate_email(contact_email) {
            errors.add("contact_email", e);
        }
    }
    if let Some(status) = &request.status {
        if ![STATUS_OPEN, STATUS_ONGOING, STATUS_COMPLETED].contains(&status.as_str()) {
            errors.add("status", "Status must be 'open', 'ongoing' or 'completed'");
        }
    }
    errors.finish()?;

    let challenge: Option<Challenge> = sqlx::query_as("SELECT * FROM challenges WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let challenge = challenge.ok_or_else(|| ApiError::not_found("Challenge not found."))?;

    let status = match &request.status {
        Some(next) if *next != challenge.status => {
            if !is_valid_status_transition(&challenge.status, next) {
                return Err(ApiError::bad_request(format!(
                    "Invalid status transition from '{}' to '{}'.",
                    challenge.status, next
                )));
            }
            next.clone()
        }
        _ => challenge.status.clone(),
    };

    let tasks = match &request.project_tasks {
        Some(tasks) => serde_json::to_string(tasks)
            .map_err(|_| ApiError::internal("Internal server error"))?,
        None => challenge.project_tasks.clone(),
    };

    sqlx::query(
        "UPDATE challenges SET title = ?, deadline = ?, duration = ?, money_prize = ?,
         status = ?, contact_email = ?, project_description = ?, project_brief = ?,
         project_tasks = ?, updated_at = ? WHERE id = ?",
    )
    .bind(request.title.as_ref().unwrap_or(&challenge.title))
    .bind(request.deadline.as_ref().unwrap_or(&challenge.deadline))
    .bind(request.duration.as_ref().unwrap_or(&challenge.duration))
    .bind(request.money_prize.as_ref().unwrap_or(&challenge.money_prize))
    .bind(&status)
    .bind(request.contact_email.as_ref().unwrap_or(&challenge.contact_email))
    .bind(
        request
            .project_description
            .as_ref()
            .unwrap_or(&challenge.project_description),
    )
    .bind(request.project_brief.as_ref().unwrap_or(&challenge.project_brief))
    .bind(&tasks)
    .bind(Utc::now().to_rfc3339())
    .bind(&id)
    .execute(&state.db)
    .await?;

    let updated: Challenge = sqlx::query_as("SELECT * FROM challenges WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    let response = ChallengeResponse::from(updated);

    // Refresh the entity entry, invalidate the listing
    if let Ok(value) = serde_json::to_value(&response) {
        state.cache.set(challenge_key(&id), value);
    }
    state.cache.invalidate(CHALLENGES_COLLECTION_KEY);

    tracing::info!(challenge_id = %id, "Challenge updated");

    Ok(Json(response))
}

/// Delete a challenge. Admin only.
///
/// DELETE /api/challenges/:id
pub async fn delete_challenge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validation::validate_uuid(&id, "challenge id").map_err(ApiError::bad_request)?;

    let result = sqlx::query("DELETE FROM challenges WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Challenge not found."));
    }

    state.cache.invalidate(&challenge_key(&id));
    state.cache.invalidate(CHALLENGES_COLLECTION_KEY);

    tracing::info!(challenge_id = %id, "Challenge deleted");

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Challenge deleted successfully" })),
    ))
}

/// Join a challenge as the calling user.
///
/// POST /api/challenges/:id/join
pub async fn join_challenge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    validation::validate_uuid(&id, "challenge id").map_err(ApiError::bad_request)?;

    let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM challenges WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::not_found("Challenge not found."));
    }

    let result = sqlx::query(
        "INSERT OR IGNORE INTO challenge_members (challenge_id, user_id, joined_at)
         VALUES (?, ?, ?)",
    )
    .bind(&id)
    .bind(&auth_user.id)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Already joined this challenge."));
    }

    tracing::info!(challenge_id = %id, user_id = %auth_user.id, "User joined challenge");

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Joined challenge successfully" })),
    ))
}

/// Leave a challenge.
///
/// POST /api/challenges/:id/leave
pub async fn leave_challenge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    validation::validate_uuid(&id, "challenge id").map_err(ApiError::bad_request)?;

    let result = sqlx::query("DELETE FROM challenge_members WHERE challenge_id = ? AND user_id = ?")
        .bind(&id)
        .bind(&auth_user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("Not a member of this challenge."));
    }

    tracing::info!(challenge_id = %id, user_id = %auth_user.id, "User left challenge");

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Left challenge successfully" })),
    ))
}
