use crate::AppState;
use crate::api::error::AppError;
use crate::entities::{code_questions, prelude::*};
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
pub struct CodeQuestionRequest {
    pub question: String,
    pub answer: String,
}

#[derive(Serialize, ToSchema)]
pub struct CodeQuestionResponse {
    pub id: String,
    pub course: String,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

impl From<code_questions::Model> for CodeQuestionResponse {
    fn from(m: code_questions::Model) -> Self {
        Self {
            id: m.id,
            course: m.course_id,
            question: m.question,
            answer: m.answer,
            created_at: m.created_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/courses/{id}/code-questions",
    params(
        ("id" = String, Path, description = "Course ID")
    ),
    request_body = CodeQuestionRequest,
    responses(
        (status = 201, description = "Code question created", body = CodeQuestionResponse),
        (status = 403, description = "Not the course owner")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "courses"
)]
pub async fn create_code_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<String>,
    Json(payload): Json<CodeQuestionRequest>,
) -> Result<(StatusCode, Json<CodeQuestionResponse>), AppError> {
    let course = state.courses.find_owned(&course_id, &claims).await?;
    if payload.question.trim().is_empty() || payload.answer.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Question and answer are required".to_string(),
        ));
    }

    let now = Utc::now();
    let row = code_questions::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        course_id: Set(course.id),
        question: Set(payload.question),
        answer: Set(payload.answer),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(row.into())))
}

#[utoipa::path(
    delete,
    path = "/code-questions/{id}",
    params(
        ("id" = String, Path, description = "Code question ID")
    ),
    responses(
        (status = 204, description = "Code question deleted"),
        (status = 404, description = "Code question not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "courses"
)]
pub async fn delete_code_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let row = CodeQuestions::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Code question not found".to_string()))?;
    state.courses.find_owned(&row.course_id, &claims).await?;
    CodeQuestions::delete_by_id(row.id).exec(&state.db).await?;
    Ok(StatusCode::NO_CONTENT)
}
