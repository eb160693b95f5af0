use crate::config::AppConfig;
use crate::services::image_store::credentials::{ServiceAccountAuth, ServiceAccountKey};
use crate::services::image_store::{GoogleDriveStore, ImageStore};
use crate::services::video_host::{VideoHost, VimeoHost};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Shared HTTP client for both providers. No overall request timeout: video
/// transfers can run for a long time.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(concat!("lms-backend/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")
}

pub fn setup_image_store(
    config: &AppConfig,
    http: reqwest::Client,
) -> anyhow::Result<Arc<dyn ImageStore>> {
    let key = ServiceAccountKey::from_file(&config.google_credentials_file).with_context(|| {
        format!(
            "loading Google service account from {}",
            config.google_credentials_file.display()
        )
    })?;
    info!("🔑 Google Drive service account: {}", key.client_email);

    let auth = Arc::new(ServiceAccountAuth::new(
        key,
        config.google_drive_scopes.clone(),
        http.clone(),
    ));
    Ok(Arc::new(GoogleDriveStore::new(
        http,
        auth,
        config.drive_api_base.clone(),
        config.drive_upload_base.clone(),
    )))
}

pub fn setup_video_host(config: &AppConfig, http: reqwest::Client) -> Arc<dyn VideoHost> {
    let token = match config.vimeo_access_token.clone() {
        Some(token) => token,
        None => {
            warn!("⚠️ VIMEO_ACCESS_TOKEN is not set; video uploads will be rejected by Vimeo");
            String::new()
        }
    };
    Arc::new(VimeoHost::new(http, token, config.vimeo_api_base.clone()))
}
