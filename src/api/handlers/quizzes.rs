use crate::AppState;
use crate::api::error::{AppError, conflict_on_unique};
use crate::entities::{prelude::*, *};
use crate::models::QuestionKind;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateQuizRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub max_score: i32,
    /// Minutes
    pub duration: i32,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateQuestionRequest {
    pub question_text: String,
    pub question_type: QuestionKind,
    pub order: i32,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateOptionRequest {
    pub option_text: String,
    #[serde(default)]
    pub is_correct: bool,
    pub why_correct: Option<String>,
    pub why_not_correct: Option<String>,
    pub order: i32,
}

#[derive(Serialize, ToSchema)]
pub struct OptionResponse {
    pub id: String,
    pub option_text: String,
    pub is_correct: bool,
    pub why_correct: Option<String>,
    pub why_not_correct: Option<String>,
    pub order: i32,
}

#[derive(Serialize, ToSchema)]
pub struct QuestionResponse {
    pub id: String,
    pub question_text: String,
    pub question_type: String,
    pub order: i32,
    pub options: Vec<OptionResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct QuizResponse {
    pub id: String,
    pub course: String,
    pub title: String,
    pub description: String,
    pub total_questions: i32,
    pub max_score: i32,
    pub duration: i32,
    pub questions: Vec<QuestionResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<question_options::Model> for OptionResponse {
    fn from(m: question_options::Model) -> Self {
        Self {
            id: m.id,
            option_text: m.option_text,
            is_correct: m.is_correct,
            why_correct: m.why_correct,
            why_not_correct: m.why_not_correct,
            order: m.position,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// A correct option must say why it is correct; an incorrect one why it is not.
pub fn check_explanation(
    is_correct: bool,
    why_correct: Option<&str>,
    why_not_correct: Option<&str>,
) -> Result<(), AppError> {
    if is_correct && why_correct.is_none() {
        return Err(AppError::BadRequest(
            "Correct options must have an explanation".to_string(),
        ));
    }
    if !is_correct && why_not_correct.is_none() {
        return Err(AppError::BadRequest(
            "Incorrect options must have an explanation".to_string(),
        ));
    }
    Ok(())
}

async fn owned_quiz(
    state: &AppState,
    quiz_id: &str,
    claims: &Claims,
) -> Result<quizzes::Model, AppError> {
    let quiz = Quizzes::find_by_id(quiz_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;
    state.courses.find_owned(&quiz.course_id, claims).await?;
    Ok(quiz)
}

async fn count_questions<C: ConnectionTrait>(db: &C, quiz_id: &str) -> Result<i32, AppError> {
    let count = Questions::find()
        .filter(questions::Column::QuizId.eq(quiz_id))
        .count(db)
        .await?;
    Ok(i32::try_from(count).unwrap_or(i32::MAX))
}

async fn load_quiz(state: &AppState, quiz: quizzes::Model) -> Result<QuizResponse, AppError> {
    let rows = Questions::find()
        .filter(questions::Column::QuizId.eq(quiz.id.as_str()))
        .order_by_asc(questions::Column::Position)
        .find_with_related(QuestionOptions)
        .all(&state.db)
        .await?;

    let questions = rows
        .into_iter()
        .map(|(q, mut options)| {
            options.sort_by_key(|o| o.position);
            QuestionResponse {
                id: q.id,
                question_text: q.question_text,
                question_type: q.question_type,
                order: q.position,
                options: options.into_iter().map(Into::into).collect(),
            }
        })
        .collect();

    Ok(QuizResponse {
        id: quiz.id,
        course: quiz.course_id,
        title: quiz.title,
        description: quiz.description,
        total_questions: quiz.total_questions,
        max_score: quiz.max_score,
        duration: quiz.duration_minutes,
        questions,
        created_at: quiz.created_at,
    })
}

#[utoipa::path(
    post,
    path = "/courses/{id}/quizzes",
    params(
        ("id" = String, Path, description = "Course ID")
    ),
    request_body = CreateQuizRequest,
    responses(
        (status = 201, description = "Quiz created", body = QuizResponse),
        (status = 403, description = "Not the course owner")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "quizzes"
)]
pub async fn create_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<String>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<(StatusCode, Json<QuizResponse>), AppError> {
    let course = state.courses.find_owned(&course_id, &claims).await?;

    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title is required".to_string()));
    }
    if payload.max_score < 0 || payload.duration < 0 {
        return Err(AppError::BadRequest(
            "Max score and duration must be zero or positive".to_string(),
        ));
    }

    let now = Utc::now();
    let quiz = quizzes::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        course_id: Set(course.id),
        title: Set(title),
        description: Set(payload.description),
        total_questions: Set(0),
        max_score: Set(payload.max_score),
        duration_minutes: Set(payload.duration),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    let body = load_quiz(&state, quiz).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

#[utoipa::path(
    get,
    path = "/quizzes/{id}",
    params(
        ("id" = String, Path, description = "Quiz ID")
    ),
    responses(
        (status = 200, description = "Quiz with its questions and options", body = QuizResponse),
        (status = 404, description = "Quiz not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "quizzes"
)]
pub async fn get_quiz(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QuizResponse>, AppError> {
    let quiz = Quizzes::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;
    Ok(Json(load_quiz(&state, quiz).await?))
}

#[utoipa::path(
    delete,
    path = "/quizzes/{id}",
    params(
        ("id" = String, Path, description = "Quiz ID")
    ),
    responses(
        (status = 204, description = "Quiz deleted"),
        (status = 404, description = "Quiz not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "quizzes"
)]
pub async fn delete_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let quiz = owned_quiz(&state, &id, &claims).await?;
    Quizzes::delete_by_id(quiz.id).exec(&state.db).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/quizzes/{id}/questions",
    params(
        ("id" = String, Path, description = "Quiz ID")
    ),
    request_body = CreateQuestionRequest,
    responses(
        (status = 201, description = "Question added", body = QuestionResponse),
        (status = 409, description = "Order already taken in this quiz")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "quizzes"
)]
pub async fn add_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<(StatusCode, Json<QuestionResponse>), AppError> {
    let quiz = owned_quiz(&state, &quiz_id, &claims).await?;

    let text = payload.question_text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::BadRequest("Question text is required".to_string()));
    }
    if payload.order < 0 {
        return Err(AppError::BadRequest("Order must be zero or positive".to_string()));
    }

    let now = Utc::now();
    let txn = state.db.begin().await?;
    let question = questions::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        quiz_id: Set(quiz.id.clone()),
        question_text: Set(text),
        question_type: Set(payload.question_type.as_str().to_string()),
        position: Set(payload.order),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await
    .map_err(|e| conflict_on_unique(e, "Another question already uses this order"))?;

    let total = count_questions(&txn, &quiz.id).await?;
    let mut active: quizzes::ActiveModel = quiz.into();
    active.total_questions = Set(total);
    active.updated_at = Set(now);
    active.update(&txn).await?;
    txn.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(QuestionResponse {
            id: question.id,
            question_text: question.question_text,
            question_type: question.question_type,
            order: question.position,
            options: Vec::new(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/questions/{id}/options",
    params(
        ("id" = String, Path, description = "Question ID")
    ),
    request_body = CreateOptionRequest,
    responses(
        (status = 201, description = "Option added", body = OptionResponse),
        (status = 400, description = "Missing explanation"),
        (status = 409, description = "Order already taken in this question")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "quizzes"
)]
pub async fn add_option(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<String>,
    Json(payload): Json<CreateOptionRequest>,
) -> Result<(StatusCode, Json<OptionResponse>), AppError> {
    let question = Questions::find_by_id(question_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;
    owned_quiz(&state, &question.quiz_id, &claims).await?;

    let text = payload.option_text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::BadRequest("Option text is required".to_string()));
    }
    let why_correct = non_blank(payload.why_correct);
    let why_not_correct = non_blank(payload.why_not_correct);
    check_explanation(
        payload.is_correct,
        why_correct.as_deref(),
        why_not_correct.as_deref(),
    )?;

    let now = Utc::now();
    let option = question_options::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        question_id: Set(question.id),
        option_text: Set(text),
        is_correct: Set(payload.is_correct),
        why_correct: Set(why_correct),
        why_not_correct: Set(why_not_correct),
        position: Set(payload.order),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await
    .map_err(|e| conflict_on_unique(e, "Another option already uses this order"))?;

    Ok((StatusCode::CREATED, Json(option.into())))
}
