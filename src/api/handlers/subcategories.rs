use crate::AppState;
use crate::api::error::{AppError, conflict_on_unique};
use crate::entities::{prelude::*, *};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
pub struct SubcategoryFilter {
    pub category_id: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SubcategoryRequest {
    pub name: String,
    pub category: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateSubcategoryRequest {
    pub name: Option<String>,
    pub category: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SubcategoryResponse {
    pub id: String,
    pub name: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

impl From<subcategories::Model> for SubcategoryResponse {
    fn from(m: subcategories::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            category: m.category_id,
            created_at: m.created_at,
        }
    }
}

const DUPLICATE: &str = "This subcategory already exists in the category";

async fn ensure_category(state: &AppState, id: &str) -> Result<(), AppError> {
    if Categories::find_by_id(id).one(&state.db).await?.is_none() {
        return Err(AppError::BadRequest(format!("Invalid category: {}", id)));
    }
    Ok(())
}

async fn find_subcategory(state: &AppState, id: &str) -> Result<subcategories::Model, AppError> {
    Subcategories::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Subcategory not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/subcategories",
    params(SubcategoryFilter),
    responses(
        (status = 200, description = "Subcategories ordered by category and name", body = Vec<SubcategoryResponse>)
    ),
    security(
        ("jwt" = [])
    ),
    tag = "taxonomy"
)]
pub async fn list_subcategories(
    State(state): State<AppState>,
    Query(filter): Query<SubcategoryFilter>,
) -> Result<Json<Vec<SubcategoryResponse>>, AppError> {
    let mut query = Subcategories::find()
        .order_by_asc(subcategories::Column::CategoryId)
        .order_by_asc(subcategories::Column::Name);
    if let Some(category_id) = filter.category_id.filter(|c| !c.is_empty()) {
        query = query.filter(subcategories::Column::CategoryId.eq(category_id));
    }
    let rows = query.all(&state.db).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/subcategories/by-category",
    responses(
        (status = 200, description = "Subcategories keyed by category name")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "taxonomy"
)]
pub async fn subcategories_by_category(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Vec<SubcategoryResponse>>>, AppError> {
    let rows = Categories::find()
        .order_by_asc(categories::Column::Name)
        .find_with_related(Subcategories)
        .all(&state.db)
        .await?;

    let grouped = rows
        .into_iter()
        .map(|(category, subs)| {
            let mut subs: Vec<SubcategoryResponse> = subs.into_iter().map(Into::into).collect();
            subs.sort_by(|a, b| a.name.cmp(&b.name));
            (category.name, subs)
        })
        .collect();
    Ok(Json(grouped))
}

#[utoipa::path(
    post,
    path = "/subcategories",
    request_body = SubcategoryRequest,
    responses(
        (status = 201, description = "Subcategory created", body = SubcategoryResponse),
        (status = 400, description = "Unknown category"),
        (status = 409, description = "Duplicate name in the category")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "taxonomy"
)]
pub async fn create_subcategory(
    State(state): State<AppState>,
    Json(payload): Json<SubcategoryRequest>,
) -> Result<(StatusCode, Json<SubcategoryResponse>), AppError> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".to_string()));
    }
    ensure_category(&state, &payload.category).await?;

    let now = Utc::now();
    let sub = subcategories::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        name: Set(name),
        category_id: Set(payload.category),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await
    .map_err(|e| conflict_on_unique(e, DUPLICATE))?;

    Ok((StatusCode::CREATED, Json(sub.into())))
}

#[utoipa::path(
    get,
    path = "/subcategories/{id}",
    params(
        ("id" = String, Path, description = "Subcategory ID")
    ),
    responses(
        (status = 200, description = "Subcategory", body = SubcategoryResponse),
        (status = 404, description = "Subcategory not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "taxonomy"
)]
pub async fn get_subcategory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SubcategoryResponse>, AppError> {
    Ok(Json(find_subcategory(&state, &id).await?.into()))
}

#[utoipa::path(
    put,
    path = "/subcategories/{id}",
    params(
        ("id" = String, Path, description = "Subcategory ID")
    ),
    request_body = UpdateSubcategoryRequest,
    responses(
        (status = 200, description = "Subcategory updated", body = SubcategoryResponse),
        (status = 404, description = "Subcategory not found"),
        (status = 409, description = "Duplicate name in the category")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "taxonomy"
)]
pub async fn update_subcategory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateSubcategoryRequest>,
) -> Result<Json<SubcategoryResponse>, AppError> {
    let mut active: subcategories::ActiveModel = find_subcategory(&state, &id).await?.into();

    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("Name is required".to_string()));
        }
        active.name = Set(name);
    }
    if let Some(category) = payload.category {
        ensure_category(&state, &category).await?;
        active.category_id = Set(category);
    }
    active.updated_at = Set(Utc::now());

    let sub = active
        .update(&state.db)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE))?;
    Ok(Json(sub.into()))
}

#[utoipa::path(
    delete,
    path = "/subcategories/{id}",
    params(
        ("id" = String, Path, description = "Subcategory ID")
    ),
    responses(
        (status = 204, description = "Subcategory deleted"),
        (status = 404, description = "Subcategory not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "taxonomy"
)]
pub async fn delete_subcategory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let result = Subcategories::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Subcategory not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
