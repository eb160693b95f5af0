use crate::AppState;
use crate::api::error::AppError;
use crate::entities::{assignments, prelude::*};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct AssignmentRequest {
    pub question: String,
}

#[derive(Serialize, ToSchema)]
pub struct AssignmentResponse {
    pub id: String,
    pub course: String,
    pub question: String,
    pub created_at: DateTime<Utc>,
}

impl From<assignments::Model> for AssignmentResponse {
    fn from(m: assignments::Model) -> Self {
        Self {
            id: m.id,
            course: m.course_id,
            question: m.question,
            created_at: m.created_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/courses/{id}/assignments",
    params(
        ("id" = String, Path, description = "Course ID")
    ),
    request_body = AssignmentRequest,
    responses(
        (status = 201, description = "Assignment created", body = AssignmentResponse),
        (status = 403, description = "Not the course owner")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "courses"
)]
pub async fn create_assignment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<String>,
    Json(payload): Json<AssignmentRequest>,
) -> Result<(StatusCode, Json<AssignmentResponse>), AppError> {
    let course = state.courses.find_owned(&course_id, &claims).await?;
    if payload.question.trim().is_empty() {
        return Err(AppError::BadRequest("Question is required".to_string()));
    }

    let now = Utc::now();
    let row = assignments::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        course_id: Set(course.id),
        question: Set(payload.question),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(row.into())))
}

#[utoipa::path(
    delete,
    path = "/assignments/{id}",
    params(
        ("id" = String, Path, description = "Assignment ID")
    ),
    responses(
        (status = 204, description = "Assignment deleted"),
        (status = 404, description = "Assignment not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "courses"
)]
pub async fn delete_assignment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let row = Assignments::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Assignment not found".to_string()))?;
    state.courses.find_owned(&row.course_id, &claims).await?;
    Assignments::delete_by_id(row.id).exec(&state.db).await?;
    Ok(StatusCode::NO_CONTENT)
}
