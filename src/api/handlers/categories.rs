use crate::AppState;
use crate::api::error::{AppError, conflict_on_unique};
use crate::entities::{categories, prelude::*};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CategoryRequest {
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<categories::Model> for CategoryResponse {
    fn from(m: categories::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            created_at: m.created_at,
        }
    }
}

fn required_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".to_string()));
    }
    Ok(name.to_string())
}

async fn find_category(state: &AppState, id: &str) -> Result<categories::Model, AppError> {
    Categories::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/categories",
    responses(
        (status = 200, description = "Categories ordered by name", body = Vec<CategoryResponse>)
    ),
    security(
        ("jwt" = [])
    ),
    tag = "taxonomy"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryResponse>>, AppError> {
    let rows = Categories::find()
        .order_by_asc(categories::Column::Name)
        .all(&state.db)
        .await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 409, description = "Category name already exists")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "taxonomy"
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), AppError> {
    let now = Utc::now();
    let category = categories::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        name: Set(required_name(&payload.name)?),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await
    .map_err(|e| conflict_on_unique(e, "A category with this name already exists"))?;

    Ok((StatusCode::CREATED, Json(category.into())))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    params(
        ("id" = String, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Category", body = CategoryResponse),
        (status = 404, description = "Category not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "taxonomy"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CategoryResponse>, AppError> {
    Ok(Json(find_category(&state, &id).await?.into()))
}

#[utoipa::path(
    put,
    path = "/categories/{id}",
    params(
        ("id" = String, Path, description = "Category ID")
    ),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category renamed", body = CategoryResponse),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category name already exists")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "taxonomy"
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<CategoryResponse>, AppError> {
    let name = required_name(&payload.name)?;
    let mut active: categories::ActiveModel = find_category(&state, &id).await?.into();
    active.name = Set(name);
    active.updated_at = Set(Utc::now());
    let category = active
        .update(&state.db)
        .await
        .map_err(|e| conflict_on_unique(e, "A category with this name already exists"))?;
    Ok(Json(category.into()))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    params(
        ("id" = String, Path, description = "Category ID")
    ),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "taxonomy"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let result = Categories::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Category not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
