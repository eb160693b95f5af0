use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::{media_intents, prelude::MediaIntents};
use crate::models::IntentStatus;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub image_store: String,
    pub video_host: String,
    /// Remote operations still waiting for the reconciler
    pub pending_media_intents: u64,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_status = if state.db.ping().await.is_ok() {
        "connected"
    } else {
        "disconnected"
    };

    let pending = MediaIntents::find()
        .filter(media_intents::Column::Status.eq(IntentStatus::Pending.as_str()))
        .count(&state.db)
        .await
        .unwrap_or(0);

    Json(HealthResponse {
        status: "ok".to_string(),
        database: db_status.to_string(),
        image_store: state.media.images().provider_id().to_string(),
        video_host: state.media.videos().provider_id().to_string(),
        pending_media_intents: pending,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
