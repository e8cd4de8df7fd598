//! Challenge models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const STATUS_OPEN: &str = "open";
pub const STATUS_ONGOING: &str = "ongoing";
pub const STATUS_COMPLETED: &str = "completed";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Challenge {
    pub id: String,
    pub title: String,
    pub deadline: String,
    pub duration: String,
    pub money_prize: String,
    pub status: String,
    pub contact_email: String,
    pub project_description: String,
    pub project_brief: String,
    /// JSON-encoded list of task descriptions
    pub project_tasks: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Challenge as exposed over the API, with tasks decoded into a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub id: String,
    pub title: String,
    pub deadline: String,
    pub duration: String,
    pub money_prize: String,
    pub status: String,
    pub contact_email: String,
    pub project_description: String,
    pub project_brief: String,
    pub project_tasks: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Challenge> for ChallengeResponse {
    fn from(challenge: Challenge) -> Self {
        let project_tasks =
            serde_json::from_str(&challenge.project_tasks).unwrap_or_default();
        Self {
            id: challenge.id,
            title: challenge.title,
            deadline: challenge.deadline,
            duration: challenge.duration,
            money_prize: challenge.money_prize,
            status: challenge.status,
            contact_email: challenge.contact_email,
            project_description: challenge.project_description,
            project_brief: challenge.project_brief,
            project_tasks,
            created_at: challenge.created_at,
            updated_at: challenge.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateChallengeRequest {
    pub title: String,
    pub deadline: String,
    pub duration: String,
    pub money_prize: String,
    pub contact_email: String,
    pub project_description: String,
    pub project_brief: String,
    pub project_tasks: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateChallengeRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub money_prize: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub project_description: Option<String>,
    #[serde(default)]
    pub project_brief: Option<String>,
    #[serde(default)]
    pub project_tasks: Option<Vec<String>>,
}

/// Valid status transitions: open -> ongoing -> completed.
pub fn is_valid_status_transition(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        (STATUS_OPEN, STATUS_ONGOING) | (STATUS_ONGOING, STATUS_COMPLETED)
    )
}
