use crate::AppState;
use crate::api::error::AppError;
use crate::entities::prelude::*;
use crate::utils::auth::Claims;
use axum::{Extension, Json, extract::State};
use sea_orm::EntityTrait;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct UserProfileResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub profile_image: Option<String>,
    pub bio: Option<String>,
}

#[utoipa::path(
    get,
    path = "/user/me",
    responses(
        (status = 200, description = "Current user", body = UserProfileResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "users"
)]
pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserProfileResponse>, AppError> {
    let user = Users::find_by_id(&claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let role = user.role().map(|r| r.name().to_string());
    Ok(Json(UserProfileResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        role,
        country: user.country,
        city: user.city,
        profile_image: user.profile_image,
        bio: user.bio,
    }))
}
