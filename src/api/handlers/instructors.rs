use crate::AppState;
use crate::api::error::{AppError, conflict_on_unique};
use crate::entities::{prelude::*, *};
use crate::models::Role;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
pub struct InstructorFilter {
    /// Case-insensitive substring of the expertise field
    pub expertise: Option<String>,
    pub min_rating: Option<f64>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateInstructorRequest {
    pub expertise: String,
    #[serde(default)]
    pub bio: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateInstructorRequest {
    pub expertise: Option<String>,
    pub bio: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RateInstructorRequest {
    pub rating: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct RateInstructorResponse {
    pub message: String,
    pub new_rating: f64,
}

#[derive(Serialize, ToSchema)]
pub struct InstructorResponse {
    pub id: String,
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub expertise: String,
    pub rating: f64,
    pub rating_count: i32,
    pub average_rating: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstructorResponse {
    fn new(m: instructors::Model, user: Option<users::Model>) -> Self {
        Self {
            average_rating: format!("{:.1}", m.rating),
            id: m.id,
            user_id: m.user_id,
            name: user.as_ref().map(|u| u.name.clone()),
            email: user.map(|u| u.email),
            expertise: m.expertise,
            rating: m.rating,
            rating_count: m.rating_count,
            bio: m.bio,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Folds one more rating into the running average.
pub fn add_rating(current: f64, count: i32, rating: f64) -> f64 {
    let count = f64::from(count.max(0));
    (current * count + rating) / (count + 1.0)
}

async fn find_instructor(
    state: &AppState,
    id: &str,
) -> Result<(instructors::Model, Option<users::Model>), AppError> {
    Instructors::find_by_id(id)
        .find_also_related(Users)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Instructor not found".to_string()))
}

fn ensure_can_edit(profile: &instructors::Model, claims: &Claims) -> Result<(), AppError> {
    let is_admin = claims.role.and_then(Role::from_id) == Some(Role::Administration);
    if profile.user_id != claims.sub && !is_admin {
        return Err(AppError::Forbidden(
            "You can only modify your own instructor profile".to_string(),
        ));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/instructors",
    params(InstructorFilter),
    responses(
        (status = 200, description = "Instructor profiles", body = Vec<InstructorResponse>)
    ),
    security(
        ("jwt" = [])
    ),
    tag = "instructors"
)]
pub async fn list_instructors(
    State(state): State<AppState>,
    Query(filter): Query<InstructorFilter>,
) -> Result<Json<Vec<InstructorResponse>>, AppError> {
    let mut query = Instructors::find().order_by_desc(instructors::Column::Rating);
    if let Some(min_rating) = filter.min_rating {
        query = query.filter(instructors::Column::Rating.gte(min_rating));
    }
    let rows = query.find_also_related(Users).all(&state.db).await?;

    // Filtered here so the match is case-insensitive on every backend.
    let needle = filter
        .expertise
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    let out = rows
        .into_iter()
        .filter(|(profile, _)| {
            needle
                .as_deref()
                .is_none_or(|n| profile.expertise.to_lowercase().contains(n))
        })
        .map(|(profile, user)| InstructorResponse::new(profile, user))
        .collect();
    Ok(Json(out))
}

#[utoipa::path(
    post,
    path = "/instructors",
    request_body = CreateInstructorRequest,
    responses(
        (status = 201, description = "Instructor profile created for the caller", body = InstructorResponse),
        (status = 409, description = "Caller already has a profile")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "instructors"
)]
pub async fn create_instructor(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateInstructorRequest>,
) -> Result<(StatusCode, Json<InstructorResponse>), AppError> {
    let expertise = payload.expertise.trim().to_string();
    if expertise.is_empty() {
        return Err(AppError::BadRequest("Expertise is required".to_string()));
    }

    let user = Users::find_by_id(&claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let now = Utc::now();
    let txn = state.db.begin().await?;
    let profile = instructors::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        user_id: Set(user.id.clone()),
        expertise: Set(expertise),
        rating: Set(0.0),
        rating_count: Set(0),
        bio: Set(payload.bio),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await
    .map_err(|e| conflict_on_unique(e, "You already have an instructor profile"))?;

    // Administrators keep their role; everyone else becomes an instructor.
    let user = if user.role() == Some(Role::Administration) {
        user
    } else {
        let mut active: users::ActiveModel = user.into();
        active.role_id = Set(Some(Role::Instructor.id()));
        active.updated_at = Set(now);
        active.update(&txn).await?
    };
    txn.commit().await?;

    tracing::info!("🎓 Instructor profile {} created for user {}", profile.id, user.id);
    Ok((
        StatusCode::CREATED,
        Json(InstructorResponse::new(profile, Some(user))),
    ))
}

#[utoipa::path(
    get,
    path = "/instructors/{id}",
    params(
        ("id" = String, Path, description = "Instructor ID")
    ),
    responses(
        (status = 200, description = "Instructor profile", body = InstructorResponse),
        (status = 404, description = "Instructor not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "instructors"
)]
pub async fn get_instructor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InstructorResponse>, AppError> {
    let (profile, user) = find_instructor(&state, &id).await?;
    Ok(Json(InstructorResponse::new(profile, user)))
}

#[utoipa::path(
    put,
    path = "/instructors/{id}",
    params(
        ("id" = String, Path, description = "Instructor ID")
    ),
    request_body = UpdateInstructorRequest,
    responses(
        (status = 200, description = "Instructor profile updated", body = InstructorResponse),
        (status = 403, description = "Not your profile"),
        (status = 404, description = "Instructor not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "instructors"
)]
pub async fn update_instructor(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateInstructorRequest>,
) -> Result<Json<InstructorResponse>, AppError> {
    let (profile, user) = find_instructor(&state, &id).await?;
    ensure_can_edit(&profile, &claims)?;

    let mut active: instructors::ActiveModel = profile.into();
    if let Some(expertise) = payload.expertise {
        let expertise = expertise.trim().to_string();
        if expertise.is_empty() {
            return Err(AppError::BadRequest("Expertise is required".to_string()));
        }
        active.expertise = Set(expertise);
    }
    if let Some(bio) = payload.bio {
        active.bio = Set(bio);
    }
    active.updated_at = Set(Utc::now());
    let profile = active.update(&state.db).await?;

    Ok(Json(InstructorResponse::new(profile, user)))
}

#[utoipa::path(
    delete,
    path = "/instructors/{id}",
    params(
        ("id" = String, Path, description = "Instructor ID")
    ),
    responses(
        (status = 204, description = "Instructor profile deleted"),
        (status = 403, description = "Not your profile"),
        (status = 404, description = "Instructor not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "instructors"
)]
pub async fn delete_instructor(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let (profile, _) = find_instructor(&state, &id).await?;
    ensure_can_edit(&profile, &claims)?;
    Instructors::delete_by_id(profile.id).exec(&state.db).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/instructors/{id}/rate",
    params(
        ("id" = String, Path, description = "Instructor ID")
    ),
    request_body = RateInstructorRequest,
    responses(
        (status = 200, description = "Rating recorded", body = RateInstructorResponse),
        (status = 400, description = "Rating outside 0..=5"),
        (status = 404, description = "Instructor not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "instructors"
)]
pub async fn rate_instructor(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<RateInstructorRequest>,
) -> Result<Json<RateInstructorResponse>, AppError> {
    let rating = payload
        .rating
        .filter(|r| (0.0..=5.0).contains(r))
        .ok_or_else(|| AppError::BadRequest("Rating must be between 0 and 5".to_string()))?;

    let (profile, _) = find_instructor(&state, &id).await?;
    let new_rating = add_rating(profile.rating, profile.rating_count, rating);
    let count = profile.rating_count + 1;

    let mut active: instructors::ActiveModel = profile.into();
    active.rating = Set(new_rating);
    active.rating_count = Set(count);
    active.updated_at = Set(Utc::now());
    active.update(&state.db).await?;

    Ok(Json(RateInstructorResponse {
        message: "Rating added successfully".to_string(),
        new_rating,
    }))
}
