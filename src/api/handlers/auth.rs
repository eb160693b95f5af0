use crate::AppState;
use crate::api::error::AppError;
use crate::entities::{prelude::*, users};
use crate::models::Role;
use crate::utils::auth::{create_jwt, hash_password, verify_password};
use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    pub username: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct TokenPair {
    pub access: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Option<String>,
    pub is_instructor: bool,
    pub profile_image: Option<String>,
    pub bio: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub status: String,
    pub tokens: TokenPair,
    pub user: LoginUser,
}

#[derive(Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PasswordResetConfirm {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Serialize, ToSchema)]
pub struct DetailResponse {
    pub detail: String,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = RegisterResponse),
        (status = 400, description = "Missing fields, password mismatch or email taken")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let required = [
        ("username", &payload.username),
        ("email", &payload.email),
        ("password", &payload.password),
        ("country", &payload.country),
        ("city", &payload.city),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| !present(value))
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let password = payload.password.clone().unwrap_or_default();
    if let Some(confirm) = payload.confirm_password.as_deref()
        && confirm != password
    {
        return Err(AppError::BadRequest("Passwords do not match".to_string()));
    }

    let email = payload.email.clone().unwrap_or_default().trim().to_lowercase();
    let taken = Users::find()
        .filter(users::Column::Email.eq(email.as_str()))
        .one(&state.db)
        .await?
        .is_some();
    if taken {
        return Err(AppError::BadRequest(
            "A user with this email already exists".to_string(),
        ));
    }

    let now = Utc::now();
    let user = users::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        email: Set(email),
        name: Set(payload.username.clone().unwrap_or_default().trim().to_string()),
        password_hash: Set(hash_password(&password)?),
        country: Set(payload.country.clone()),
        city: Set(payload.city.clone()),
        role_id: Set(Some(Role::Student.id())),
        profile_image: Set(None),
        bio: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    tracing::info!("👤 Registered user {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user_id: user.id,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 404, description = "User not found")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = Users::find()
        .filter(users::Column::Email.eq(payload.email.trim().to_lowercase()))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !user.is_active || !verify_password(&payload.password, &user.password_hash) {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let access = create_jwt(
        &user.id,
        user.role_id,
        &state.config.jwt_secret,
        state.config.jwt_ttl_hours,
    )?;
    let role = user.role();

    Ok(Json(LoginResponse {
        status: "success".to_string(),
        tokens: TokenPair { access },
        user: LoginUser {
            id: user.id,
            email: user.email,
            name: user.name,
            role: role.map(|r| r.name().to_string()),
            is_instructor: role == Some(Role::Instructor),
            profile_image: user.profile_image,
            bio: user.bio,
        },
    }))
}

#[utoipa::path(
    post,
    path = "/password-reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset link issued", body = DetailResponse),
        (status = 400, description = "Email missing"),
        (status = 404, description = "No user with this email")
    ),
    tag = "auth"
)]
pub async fn password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<DetailResponse>, AppError> {
    state.password_reset.request(&payload.email).await?;
    Ok(Json(DetailResponse {
        detail: "Password reset email has been sent.".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/password-reset-confirm",
    request_body = PasswordResetConfirm,
    responses(
        (status = 200, description = "Password changed", body = DetailResponse),
        (status = 400, description = "Invalid or expired reset link")
    ),
    tag = "auth"
)]
pub async fn password_reset_confirm(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetConfirm>,
) -> Result<Json<DetailResponse>, AppError> {
    state
        .password_reset
        .confirm(&payload.token, &payload.new_password)
        .await?;
    Ok(Json(DetailResponse {
        detail: "Password has been reset successfully".to_string(),
    }))
}
