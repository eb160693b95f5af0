use crate::services::remote::ProviderError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub mod credentials;
pub mod google_drive;

pub use google_drive::GoogleDriveStore;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A file or folder as reported by the image backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub web_content_link: Option<String>,
    pub web_view_link: Option<String>,
    pub parent_id: Option<String>,
}

impl RemoteObject {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// Remote object storage used for course images and the per-course folders.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Provider identifier used in logs and error messages
    fn provider_id(&self) -> &'static str;

    /// Finds a non-trashed folder by exact name, optionally under a parent
    async fn find_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Option<String>, ProviderError>;

    async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<RemoteObject, ProviderError>;

    async fn upload_object(
        &self,
        name: &str,
        parent_id: &str,
        data: Bytes,
        mime_type: &str,
    ) -> Result<RemoteObject, ProviderError>;

    /// Grants anyone-with-the-link read access
    async fn make_public(&self, object_id: &str) -> Result<(), ProviderError>;

    /// Deletes a file, or a folder together with everything under it
    async fn delete_object(&self, object_id: &str) -> Result<(), ProviderError>;

    async fn object_exists(&self, object_id: &str) -> Result<bool, ProviderError>;

    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteObject>, ProviderError>;
}

/// Turns a Drive `webContentLink` (which forces a download) into a link the
/// browser renders inline.
pub fn direct_view_url(object: &RemoteObject) -> String {
    match object.web_content_link.as_deref() {
        Some(link) if !link.is_empty() => {
            format!("{}&export=view", link.replace("&export=download", ""))
        }
        _ => format!("https://drive.google.com/uc?id={}&export=view", object.id),
    }
}

pub fn browser_view_url(object: &RemoteObject) -> String {
    object
        .web_view_link
        .clone()
        .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", object.id))
}

pub fn folder_url(folder_id: &str) -> String {
    format!("https://drive.google.com/drive/folders/{}", folder_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(link: Option<&str>) -> RemoteObject {
        RemoteObject {
            id: "abc".to_string(),
            name: "course_image.png".to_string(),
            mime_type: "image/png".to_string(),
            web_content_link: link.map(str::to_string),
            web_view_link: None,
            parent_id: None,
        }
    }

    #[test]
    fn test_direct_view_url_rewrites_export_mode() {
        let obj = object(Some("https://drive.google.com/uc?id=abc&export=download"));
        assert_eq!(
            direct_view_url(&obj),
            "https://drive.google.com/uc?id=abc&export=view"
        );
    }

    #[test]
    fn test_direct_view_url_without_content_link() {
        assert_eq!(
            direct_view_url(&object(None)),
            "https://drive.google.com/uc?id=abc&export=view"
        );
        assert_eq!(
            browser_view_url(&object(None)),
            "https://drive.google.com/file/d/abc/view"
        );
    }
}
