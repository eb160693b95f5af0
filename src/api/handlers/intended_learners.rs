use crate::AppState;
use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema, Default)]
pub struct IntendedLearnersRequest {
    pub learning_outcomes: Option<Vec<String>>,
    pub skills_needed: Option<Vec<String>>,
    pub target_audience: Option<Vec<String>>,
    pub career_goals: Option<Vec<String>>,
    pub participation_encouragement: Option<Vec<String>>,
}

#[derive(Serialize, ToSchema)]
pub struct IntendedLearnersResponse {
    pub id: String,
    pub course: String,
    pub learning_outcomes: Vec<String>,
    pub skills_needed: Vec<String>,
    pub target_audience: Vec<String>,
    pub career_goals: Vec<String>,
    pub participation_encouragement: Vec<String>,
}

/// Stored lists are JSON arrays; anything unreadable comes back empty.
fn decode_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn encode_list(items: &[String]) -> Result<String, AppError> {
    serde_json::to_string(items).map_err(|e| AppError::Internal(e.to_string()))
}

impl From<intended_learners::Model> for IntendedLearnersResponse {
    fn from(m: intended_learners::Model) -> Self {
        Self {
            id: m.id,
            course: m.course_id,
            learning_outcomes: decode_list(&m.learning_outcomes),
            skills_needed: decode_list(&m.skills_needed),
            target_audience: decode_list(&m.target_audience),
            career_goals: decode_list(&m.career_goals),
            participation_encouragement: decode_list(&m.participation_encouragement),
        }
    }
}

/// Only the course's own instructor sees or edits its audience; everyone
/// else gets the same 404 as for a missing course.
async fn owned_course(
    state: &AppState,
    course_id: &str,
    claims: &Claims,
) -> Result<courses::Model, AppError> {
    Courses::find_by_id(course_id)
        .filter(courses::Column::InstructorId.eq(claims.sub.as_str()))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/courses/{id}/intended-learners",
    params(
        ("id" = String, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Intended learners, or an empty object when none are stored", body = IntendedLearnersResponse),
        (status = 404, description = "Course not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "courses"
)]
pub async fn get_intended_learners(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let course = owned_course(&state, &course_id, &claims).await?;

    let row = IntendedLearners::find()
        .filter(intended_learners::Column::CourseId.eq(course.id.as_str()))
        .one(&state.db)
        .await?;

    let body = match row {
        Some(row) => serde_json::to_value(IntendedLearnersResponse::from(row))
            .map_err(|e| AppError::Internal(e.to_string()))?,
        None => serde_json::json!({}),
    };
    Ok(Json(body))
}

#[utoipa::path(
    post,
    path = "/courses/{id}/intended-learners",
    params(
        ("id" = String, Path, description = "Course ID")
    ),
    request_body = IntendedLearnersRequest,
    responses(
        (status = 200, description = "Intended learners saved", body = IntendedLearnersResponse),
        (status = 404, description = "Course not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "courses"
)]
pub async fn save_intended_learners(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<String>,
    Json(payload): Json<IntendedLearnersRequest>,
) -> Result<Json<IntendedLearnersResponse>, AppError> {
    let course = owned_course(&state, &course_id, &claims).await?;
    let now = Utc::now();

    let existing = IntendedLearners::find()
        .filter(intended_learners::Column::CourseId.eq(course.id.as_str()))
        .one(&state.db)
        .await?;

    let (mut active, is_new): (intended_learners::ActiveModel, bool) = match existing {
        Some(row) => (row.into(), false),
        None => {
            let empty = encode_list(&[])?;
            (
                intended_learners::ActiveModel {
                    id: Set(uuid::Uuid::new_v4().to_string()),
                    course_id: Set(course.id.clone()),
                    learning_outcomes: Set(empty.clone()),
                    skills_needed: Set(empty.clone()),
                    target_audience: Set(empty.clone()),
                    career_goals: Set(empty.clone()),
                    participation_encouragement: Set(empty),
                    created_at: Set(now),
                    updated_at: Set(now),
                },
                true,
            )
        }
    };

    // Partial update: only lists present in the body are replaced.
    if let Some(v) = &payload.learning_outcomes {
        active.learning_outcomes = Set(encode_list(v)?);
    }
    if let Some(v) = &payload.skills_needed {
        active.skills_needed = Set(encode_list(v)?);
    }
    if let Some(v) = &payload.target_audience {
        active.target_audience = Set(encode_list(v)?);
    }
    if let Some(v) = &payload.career_goals {
        active.career_goals = Set(encode_list(v)?);
    }
    if let Some(v) = &payload.participation_encouragement {
        active.participation_encouragement = Set(encode_list(v)?);
    }
    active.updated_at = Set(now);

    let saved = if is_new {
        active.insert(&state.db).await?
    } else {
        active.update(&state.db).await?
    };

    Ok(Json(saved.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_lists_decode_empty() {
        assert_eq!(decode_list(r#"["a","b"]"#), vec!["a", "b"]);
        assert!(decode_list("").is_empty());
        assert!(decode_list("not json").is_empty());
    }
}
