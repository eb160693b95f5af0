use crate::services::remote::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod video_ref;
pub mod vimeo;

pub use video_ref::{VideoRefError, parse_video_id};
pub use vimeo::VimeoHost;

/// What the course record needs from an uploaded video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub link: String,
    pub thumbnail_url: Option<String>,
}

/// A video resource created on the host, waiting for its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    pub video_id: u64,
    pub upload_link: String,
    pub size: u64,
}

/// Hosted video provider.
///
/// Uploading is two calls so the caller can record the video id before any
/// bytes move: once `create_upload` returns, the video exists remotely and
/// must be deleted if `transfer` fails.
#[async_trait]
pub trait VideoHost: Send + Sync {
    fn provider_id(&self) -> &'static str;

    async fn create_upload(
        &self,
        size: u64,
        name: &str,
        description: &str,
    ) -> Result<UploadTicket, ProviderError>;

    /// Sends the file at `path` to a video created by `create_upload`.
    async fn transfer(&self, ticket: &UploadTicket, path: &Path) -> Result<(), ProviderError>;

    async fn fetch(&self, video_id: u64) -> Result<VideoMetadata, ProviderError>;

    async fn delete(&self, video_id: u64) -> Result<(), ProviderError>;

    async fn exists(&self, video_id: u64) -> Result<bool, ProviderError> {
        match self.fetch(video_id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
