use super::{UploadTicket, VideoHost, VideoMetadata, parse_video_id};
use crate::services::remote::{ProviderError, check_response};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tokio_util::io::ReaderStream;

const PROVIDER: &str = "vimeo";
const ACCEPT_VERSION: &str = "application/vnd.vimeo.*+json;version=3.4";
const TUS_VERSION: &str = "1.0.0";

#[derive(Debug, Deserialize)]
struct CreatedVideo {
    uri: String,
    upload: CreatedUpload,
}

#[derive(Debug, Deserialize)]
struct CreatedUpload {
    upload_link: String,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    link: String,
    pictures: Option<Pictures>,
}

#[derive(Debug, Deserialize)]
struct Pictures {
    #[serde(default)]
    sizes: Vec<PictureSize>,
}

#[derive(Debug, Deserialize)]
struct PictureSize {
    link: String,
}

/// Vimeo API client using the tus upload approach.
pub struct VimeoHost {
    http: reqwest::Client,
    access_token: String,
    api_base: String,
}

impl VimeoHost {
    pub fn new(
        http: reqwest::Client,
        access_token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            access_token: access_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("bearer {}", self.access_token))
            .header(ACCEPT, ACCEPT_VERSION)
    }
}

#[async_trait]
impl VideoHost for VimeoHost {
    fn provider_id(&self) -> &'static str {
        PROVIDER
    }

    async fn create_upload(
        &self,
        size: u64,
        name: &str,
        description: &str,
    ) -> Result<UploadTicket, ProviderError> {
        let res = self
            .authorized(self.http.post(format!("{}/me/videos", self.api_base)))
            .json(&json!({
                "upload": { "approach": "tus", "size": size },
                "name": name,
                "description": description,
            }))
            .send()
            .await;
        let created: CreatedVideo = check_response(PROVIDER, res)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER, e))?;

        let video_id = parse_video_id(&created.uri)
            .map_err(|e| ProviderError::permanent(PROVIDER, e.to_string()))?;
        tracing::debug!("Created Vimeo video {} for '{}' ({} bytes)", video_id, name, size);

        Ok(UploadTicket {
            video_id,
            upload_link: created.upload.upload_link,
            size,
        })
    }

    async fn transfer(&self, ticket: &UploadTicket, path: &Path) -> Result<(), ProviderError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| ProviderError::permanent(PROVIDER, format!("scratch file unreadable: {}", e)))?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let res = self
            .http
            .patch(&ticket.upload_link)
            .header("Tus-Resumable", TUS_VERSION)
            .header("Upload-Offset", "0")
            .header(CONTENT_TYPE, "application/offset+octet-stream")
            .body(body)
            .send()
            .await;
        let res = check_response(PROVIDER, res).await?;

        let offset = res
            .headers()
            .get("Upload-Offset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if let Some(received) = offset
            && received < ticket.size
        {
            return Err(ProviderError::retryable(
                PROVIDER,
                format!("upload incomplete: {} of {} bytes accepted", received, ticket.size),
            ));
        }

        tracing::info!("🎬 Uploaded {} bytes to Vimeo video {}", ticket.size, ticket.video_id);
        Ok(())
    }

    async fn fetch(&self, video_id: u64) -> Result<VideoMetadata, ProviderError> {
        let res = self
            .authorized(
                self.http
                    .get(format!("{}/videos/{}", self.api_base, video_id)),
            )
            .query(&[("fields", "uri,link,pictures.sizes")])
            .send()
            .await;
        let video: VideoResource = check_response(PROVIDER, res)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER, e))?;

        // Sizes are ordered smallest first.
        let thumbnail_url = video
            .pictures
            .and_then(|p| p.sizes.into_iter().last())
            .map(|s| s.link);

        Ok(VideoMetadata {
            link: video.link,
            thumbnail_url,
        })
    }

    async fn delete(&self, video_id: u64) -> Result<(), ProviderError> {
        let res = self
            .authorized(
                self.http
                    .delete(format!("{}/videos/{}", self.api_base, video_id)),
            )
            .send()
            .await;
        check_response(PROVIDER, res).await?;
        tracing::info!("🗑️ Deleted Vimeo video {}", video_id);
        Ok(())
    }
}
