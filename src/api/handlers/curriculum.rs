use crate::AppState;
use crate::api::error::{AppError, conflict_on_unique};
use crate::entities::{curriculum_items, prelude::*};
use crate::models::CurriculumKind;
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
pub struct CurriculumItemRequest {
    #[serde(rename = "type")]
    pub kind: CurriculumKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub resource_url: String,
    pub order: i32,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateCurriculumItemRequest {
    #[serde(rename = "type")]
    pub kind: Option<CurriculumKind>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub resource_url: Option<String>,
    pub order: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct CurriculumItemResponse {
    pub id: String,
    pub course: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    pub resource_url: String,
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

impl From<curriculum_items::Model> for CurriculumItemResponse {
    fn from(m: curriculum_items::Model) -> Self {
        Self {
            id: m.id,
            course: m.course_id,
            kind: m.kind,
            title: m.title,
            description: m.description,
            resource_url: m.resource_url,
            order: m.position,
            created_at: m.created_at,
        }
    }
}

const DUPLICATE_ORDER: &str = "Another curriculum item already uses this order";

fn check_resource_url(raw: &str) -> Result<String, AppError> {
    let raw = raw.trim();
    url::Url::parse(raw).map_err(|_| AppError::BadRequest("Enter a valid resource URL".to_string()))?;
    Ok(raw.to_string())
}

fn check_order(order: i32) -> Result<i32, AppError> {
    if order < 0 {
        return Err(AppError::BadRequest("Order must be zero or positive".to_string()));
    }
    Ok(order)
}

/// Loads an item together with an ownership check on its course.
async fn owned_item(
    state: &AppState,
    item_id: &str,
    claims: &Claims,
) -> Result<curriculum_items::Model, AppError> {
    let item = CurriculumItems::find_by_id(item_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Curriculum item not found".to_string()))?;
    state.courses.find_owned(&item.course_id, claims).await?;
    Ok(item)
}

#[utoipa::path(
    post,
    path = "/courses/{id}/curriculum",
    params(
        ("id" = String, Path, description = "Course ID")
    ),
    request_body = CurriculumItemRequest,
    responses(
        (status = 201, description = "Curriculum item created", body = CurriculumItemResponse),
        (status = 403, description = "Not the course owner"),
        (status = 409, description = "Order already taken")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "curriculum"
)]
pub async fn create_curriculum_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<String>,
    Json(payload): Json<CurriculumItemRequest>,
) -> Result<(StatusCode, Json<CurriculumItemResponse>), AppError> {
    let course = state.courses.find_owned(&course_id, &claims).await?;

    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title is required".to_string()));
    }

    let now = Utc::now();
    let item = curriculum_items::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        course_id: Set(course.id),
        kind: Set(payload.kind.as_str().to_string()),
        title: Set(title),
        description: Set(payload.description),
        resource_url: Set(check_resource_url(&payload.resource_url)?),
        position: Set(check_order(payload.order)?),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await
    .map_err(|e| conflict_on_unique(e, DUPLICATE_ORDER))?;

    Ok((StatusCode::CREATED, Json(item.into())))
}

#[utoipa::path(
    put,
    path = "/curriculum/{id}",
    params(
        ("id" = String, Path, description = "Curriculum item ID")
    ),
    request_body = UpdateCurriculumItemRequest,
    responses(
        (status = 200, description = "Curriculum item updated", body = CurriculumItemResponse),
        (status = 404, description = "Curriculum item not found"),
        (status = 409, description = "Order already taken")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "curriculum"
)]
pub async fn update_curriculum_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCurriculumItemRequest>,
) -> Result<Json<CurriculumItemResponse>, AppError> {
    let item = owned_item(&state, &id, &claims).await?;

    let mut active: curriculum_items::ActiveModel = item.into();
    if let Some(kind) = payload.kind {
        active.kind = Set(kind.as_str().to_string());
    }
    if let Some(title) = payload.title {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::BadRequest("Title is required".to_string()));
        }
        active.title = Set(title);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(resource_url) = payload.resource_url {
        active.resource_url = Set(check_resource_url(&resource_url)?);
    }
    if let Some(order) = payload.order {
        active.position = Set(check_order(order)?);
    }
    active.updated_at = Set(Utc::now());

    let item = active
        .update(&state.db)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_ORDER))?;
    Ok(Json(item.into()))
}

#[utoipa::path(
    delete,
    path = "/curriculum/{id}",
    params(
        ("id" = String, Path, description = "Curriculum item ID")
    ),
    responses(
        (status = 204, description = "Curriculum item deleted"),
        (status = 404, description = "Curriculum item not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "curriculum"
)]
pub async fn delete_curriculum_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let item = owned_item(&state, &id, &claims).await?;
    CurriculumItems::delete_by_id(item.id).exec(&state.db).await?;
    Ok(StatusCode::NO_CONTENT)
}
