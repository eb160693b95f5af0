use super::credentials::TokenProvider;
use super::{FOLDER_MIME_TYPE, ImageStore, RemoteObject};
use crate::services::remote::{ProviderError, check_response};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const PROVIDER: &str = "google_drive";
const FILE_FIELDS: &str = "id,name,mimeType,webContentLink,webViewLink,parents";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    web_content_link: Option<String>,
    web_view_link: Option<String>,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(default)]
    trashed: bool,
}

impl From<DriveFile> for RemoteObject {
    fn from(f: DriveFile) -> Self {
        RemoteObject {
            id: f.id,
            name: f.name,
            mime_type: f.mime_type,
            web_content_link: f.web_content_link,
            web_view_link: f.web_view_link,
            parent_id: f.parents.into_iter().next(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

/// Google Drive v3 over plain HTTPS.
pub struct GoogleDriveStore {
    http: reqwest::Client,
    auth: Arc<dyn TokenProvider>,
    api_base: String,
    upload_base: String,
}

impl GoogleDriveStore {
    pub fn new(
        http: reqwest::Client,
        auth: Arc<dyn TokenProvider>,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            auth,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            upload_base: upload_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base)
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}/drive/v3/files/{}", self.api_base, id)
    }

    async fn search(&self, query: &str, fields: &str) -> Result<Vec<DriveFile>, ProviderError> {
        let token = self.auth.access_token().await?;
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query.to_string()),
                ("spaces", "drive".to_string()),
                ("fields", format!("nextPageToken,files({})", fields)),
            ];
            if let Some(t) = &page_token {
                params.push(("pageToken", t.clone()));
            }

            let res = self
                .http
                .get(self.files_url())
                .bearer_auth(&token)
                .query(&params)
                .send()
                .await;
            let page: FileList = check_response(PROVIDER, res)
                .await?
                .json()
                .await
                .map_err(|e| ProviderError::from_transport(PROVIDER, e))?;

            out.extend(page.files);
            match page.next_page_token {
                Some(t) => page_token = Some(t),
                None => break,
            }
        }
        Ok(out)
    }
}

/// Drive query literals are single-quoted; quotes and backslashes in names need escaping.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[async_trait]
impl ImageStore for GoogleDriveStore {
    fn provider_id(&self) -> &'static str {
        PROVIDER
    }

    async fn find_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Option<String>, ProviderError> {
        let mut query = format!(
            "name = {} and mimeType = '{}' and trashed = false",
            quote(name),
            FOLDER_MIME_TYPE
        );
        if let Some(parent) = parent_id {
            query.push_str(&format!(" and {} in parents", quote(parent)));
        }
        let found = self.search(&query, "id,name").await?;
        Ok(found.into_iter().next().map(|f| f.id))
    }

    async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<RemoteObject, ProviderError> {
        let token = self.auth.access_token().await?;
        let mut metadata = json!({ "name": name, "mimeType": FOLDER_MIME_TYPE });
        if let Some(parent) = parent_id {
            metadata["parents"] = json!([parent]);
        }

        let res = self
            .http
            .post(self.files_url())
            .bearer_auth(&token)
            .query(&[("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await;
        let file: DriveFile = check_response(PROVIDER, res)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER, e))?;

        tracing::info!("📁 Created Drive folder '{}' ({})", name, file.id);
        Ok(file.into())
    }

    async fn upload_object(
        &self,
        name: &str,
        parent_id: &str,
        data: Bytes,
        mime_type: &str,
    ) -> Result<RemoteObject, ProviderError> {
        let token = self.auth.access_token().await?;

        // Resumable upload: open a session, then send the bytes to the session URI.
        let res = self
            .http
            .post(format!("{}/upload/drive/v3/files", self.upload_base))
            .bearer_auth(&token)
            .query(&[("uploadType", "resumable"), ("fields", FILE_FIELDS)])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", data.len().to_string())
            .json(&json!({ "name": name, "parents": [parent_id] }))
            .send()
            .await;
        let session = check_response(PROVIDER, res).await?;
        let location = session
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::permanent(PROVIDER, "resumable session returned no Location")
            })?;

        let size = data.len();
        let res = self
            .http
            .put(location)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, mime_type)
            .body(data)
            .send()
            .await;
        let file: DriveFile = check_response(PROVIDER, res)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER, e))?;

        tracing::info!("📤 Uploaded '{}' to Drive ({} bytes, id {})", name, size, file.id);
        Ok(file.into())
    }

    async fn make_public(&self, object_id: &str) -> Result<(), ProviderError> {
        let token = self.auth.access_token().await?;
        let res = self
            .http
            .post(format!("{}/permissions", self.file_url(object_id)))
            .bearer_auth(&token)
            .query(&[("fields", "id")])
            .json(&json!({ "type": "anyone", "role": "reader" }))
            .send()
            .await;
        check_response(PROVIDER, res).await?;
        Ok(())
    }

    async fn delete_object(&self, object_id: &str) -> Result<(), ProviderError> {
        let token = self.auth.access_token().await?;
        let res = self
            .http
            .delete(self.file_url(object_id))
            .bearer_auth(&token)
            .send()
            .await;
        check_response(PROVIDER, res).await?;
        tracing::info!("🗑️ Deleted Drive object {}", object_id);
        Ok(())
    }

    async fn object_exists(&self, object_id: &str) -> Result<bool, ProviderError> {
        let token = self.auth.access_token().await?;
        let res = self
            .http
            .get(self.file_url(object_id))
            .bearer_auth(&token)
            .query(&[("fields", "id,trashed")])
            .send()
            .await;
        match check_response(PROVIDER, res).await {
            Ok(res) => {
                let file: DriveFile = res
                    .json()
                    .await
                    .map_err(|e| ProviderError::from_transport(PROVIDER, e))?;
                Ok(!file.trashed)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteObject>, ProviderError> {
        let query = format!("{} in parents and trashed = false", quote(folder_id));
        let files = self.search(&query, FILE_FIELDS).await?;
        Ok(files.into_iter().map(RemoteObject::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_literals_are_escaped() {
        assert_eq!(quote("LMS Course Materials"), "'LMS Course Materials'");
        assert_eq!(quote("Bob's course"), r"'Bob\'s course'");
    }

    #[test]
    fn test_drive_file_maps_first_parent() {
        let file: DriveFile = serde_json::from_str(
            r#"{"id":"f1","name":"a.png","mimeType":"image/png","parents":["p1","p2"],
                "webContentLink":"https://drive.google.com/uc?id=f1&export=download"}"#,
        )
        .unwrap();
        let obj: RemoteObject = file.into();
        assert_eq!(obj.parent_id.as_deref(), Some("p1"));
        assert!(!obj.is_folder());
    }
}
