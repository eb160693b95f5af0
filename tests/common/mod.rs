#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use lms_backend::config::AppConfig;
use lms_backend::entities::{courses, users};
use lms_backend::infrastructure::database;
use lms_backend::models::Role;
use lms_backend::services::image_store::{FOLDER_MIME_TYPE, ImageStore, RemoteObject};
use lms_backend::services::media::{MediaCoordinator, MediaError, SpooledVideo};
use lms_backend::services::remote::ProviderError;
use lms_backend::services::video_host::{UploadTicket, VideoHost, VideoMetadata};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

pub const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
];

pub const MP4: &[u8] = &[
    0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm', 0x00, 0x00, 0x02,
    0x00, b'i', b's', b'o', b'm', b'm', b'p', b'4', b'1',
];

/// In-memory image store that records every call.
#[derive(Default)]
pub struct FakeImageStore {
    pub calls: Mutex<Vec<String>>,
    objects: Mutex<HashMap<String, RemoteObject>>,
    next_id: Mutex<u32>,
    pub fail_upload: Mutex<Option<ProviderError>>,
    pub fail_make_public: Mutex<Option<ProviderError>>,
    pub fail_delete: Mutex<Option<ProviderError>>,
    /// When set, the next upload drops the intent table of this database,
    /// so the bookkeeping around the upload fails.
    pub break_intents_on_upload: Mutex<Option<DatabaseConnection>>,
}

impl FakeImageStore {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.objects.lock().unwrap().contains_key(id)
    }

    /// Drops an object without recording a call, as if removed out of band.
    pub fn forget(&self, id: &str) {
        self.objects.lock().unwrap().remove(id);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn store(&self, name: &str, mime_type: &str, parent_id: Option<&str>) -> RemoteObject {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let id = format!("obj-{}", *next);
        let object = RemoteObject {
            id: id.clone(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            web_content_link: Some(format!(
                "https://drive.google.com/uc?id={}&export=download",
                id
            )),
            web_view_link: Some(format!("https://drive.google.com/file/d/{}/view", id)),
            parent_id: parent_id.map(str::to_string),
        };
        self.objects.lock().unwrap().insert(id, object.clone());
        object
    }
}

#[async_trait]
impl ImageStore for FakeImageStore {
    fn provider_id(&self) -> &'static str {
        "fake-drive"
    }

    async fn find_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Option<String>, ProviderError> {
        self.record(format!("find_folder:{}", name));
        Ok(self
            .objects
            .lock()
            .unwrap()
            .values()
            .find(|o| o.is_folder() && o.name == name && o.parent_id.as_deref() == parent_id)
            .map(|o| o.id.clone()))
    }

    async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<RemoteObject, ProviderError> {
        self.record(format!("create_folder:{}", name));
        Ok(self.store(name, FOLDER_MIME_TYPE, parent_id))
    }

    async fn upload_object(
        &self,
        name: &str,
        parent_id: &str,
        _data: Bytes,
        mime_type: &str,
    ) -> Result<RemoteObject, ProviderError> {
        self.record(format!("upload:{}", name));
        let db = self.break_intents_on_upload.lock().unwrap().take();
        if let Some(db) = db {
            db.execute_unprepared("DROP TABLE media_intents")
                .await
                .unwrap();
        }
        if let Some(e) = self.fail_upload.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self.store(name, mime_type, Some(parent_id)))
    }

    async fn make_public(&self, object_id: &str) -> Result<(), ProviderError> {
        self.record(format!("make_public:{}", object_id));
        if let Some(e) = self.fail_make_public.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(())
    }

    async fn delete_object(&self, object_id: &str) -> Result<(), ProviderError> {
        self.record(format!("delete:{}", object_id));
        if let Some(e) = self.fail_delete.lock().unwrap().clone() {
            return Err(e);
        }
        let mut objects = self.objects.lock().unwrap();
        if objects.remove(object_id).is_none() {
            return Err(ProviderError::NotFound {
                provider: "fake-drive",
            });
        }
        objects.retain(|_, o| o.parent_id.as_deref() != Some(object_id));
        Ok(())
    }

    async fn object_exists(&self, object_id: &str) -> Result<bool, ProviderError> {
        Ok(self.exists(object_id))
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteObject>, ProviderError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.parent_id.as_deref() == Some(folder_id))
            .cloned()
            .collect())
    }
}

/// In-memory video host that records every call.
pub struct FakeVideoHost {
    pub calls: Mutex<Vec<String>>,
    videos: Mutex<HashSet<u64>>,
    next_id: Mutex<u64>,
    pub fail_upload: Mutex<Option<ProviderError>>,
    pub fail_transfer: Mutex<Option<ProviderError>>,
    pub fail_fetch: Mutex<Option<ProviderError>>,
    pub fail_delete: Mutex<Option<ProviderError>>,
}

impl Default for FakeVideoHost {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            videos: Mutex::new(HashSet::new()),
            next_id: Mutex::new(1000),
            fail_upload: Mutex::new(None),
            fail_transfer: Mutex::new(None),
            fail_fetch: Mutex::new(None),
            fail_delete: Mutex::new(None),
        }
    }
}

impl FakeVideoHost {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn live_videos(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.videos.lock().unwrap().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn insert(&self, id: u64) {
        self.videos.lock().unwrap().insert(id);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl VideoHost for FakeVideoHost {
    fn provider_id(&self) -> &'static str {
        "fake-vimeo"
    }

    async fn create_upload(
        &self,
        size: u64,
        name: &str,
        _description: &str,
    ) -> Result<UploadTicket, ProviderError> {
        self.record(format!("upload:{}", name));
        if let Some(e) = self.fail_upload.lock().unwrap().clone() {
            return Err(e);
        }
        let video_id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        };
        self.videos.lock().unwrap().insert(video_id);
        Ok(UploadTicket {
            video_id,
            upload_link: format!("https://upload.fake/{}", video_id),
            size,
        })
    }

    async fn transfer(&self, ticket: &UploadTicket, path: &Path) -> Result<(), ProviderError> {
        self.record(format!("transfer:{}", ticket.video_id));
        let spooled = std::fs::metadata(path).expect("scratch file must exist during transfer");
        assert_eq!(spooled.len(), ticket.size);
        if let Some(e) = self.fail_transfer.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(())
    }

    async fn fetch(&self, video_id: u64) -> Result<VideoMetadata, ProviderError> {
        self.record(format!("fetch:{}", video_id));
        if let Some(e) = self.fail_fetch.lock().unwrap().clone() {
            return Err(e);
        }
        if !self.videos.lock().unwrap().contains(&video_id) {
            return Err(ProviderError::NotFound {
                provider: "fake-vimeo",
            });
        }
        Ok(VideoMetadata {
            link: format!("https://vimeo.com/{}", video_id),
            thumbnail_url: Some(format!("https://i.vimeocdn.com/video/{}_1280x720", video_id)),
        })
    }

    async fn delete(&self, video_id: u64) -> Result<(), ProviderError> {
        self.record(format!("delete:{}", video_id));
        if let Some(e) = self.fail_delete.lock().unwrap().clone() {
            return Err(e);
        }
        if self.videos.lock().unwrap().remove(&video_id) {
            Ok(())
        } else {
            Err(ProviderError::NotFound {
                provider: "fake-vimeo",
            })
        }
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: "test-secret".to_string(),
        max_video_size: 1024 * 1024,
        reconcile_max_attempts: 3,
        ..AppConfig::default()
    }
}

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();
    database::seed_roles(&db).await.unwrap();
    db
}

pub struct Harness {
    pub db: DatabaseConnection,
    pub images: Arc<FakeImageStore>,
    pub videos: Arc<FakeVideoHost>,
    pub media: Arc<MediaCoordinator>,
    pub config: AppConfig,
}

pub async fn harness() -> Harness {
    let db = setup_db().await;
    let images = Arc::new(FakeImageStore::default());
    let videos = Arc::new(FakeVideoHost::default());
    let config = test_config();
    let media = Arc::new(MediaCoordinator::new(
        db.clone(),
        images.clone(),
        videos.clone(),
        config.clone(),
    ));
    Harness {
        db,
        images,
        videos,
        media,
        config,
    }
}

pub async fn insert_user(db: &DatabaseConnection, email: &str, role: Role) -> users::Model {
    let now = Utc::now();
    users::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        email: Set(email.to_string()),
        name: Set("Test User".to_string()),
        password_hash: Set(lms_backend::utils::auth::hash_password("password123").unwrap()),
        country: Set(None),
        city: Set(None),
        role_id: Set(Some(role.id())),
        profile_image: Set(None),
        bio: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn insert_course(db: &DatabaseConnection, title: &str) -> courses::Model {
    let now = Utc::now();
    courses::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        title: Set(title.to_string()),
        description: Set("An introduction".to_string()),
        level_info: Set("Beginner".to_string()),
        instructor_id: Set(None),
        image_url: Set(None),
        image_view_url: Set(None),
        video_url: Set(None),
        video_thumbnail_url: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

pub fn png_upload() -> lms_backend::services::media::MediaUpload {
    lms_backend::services::media::MediaUpload {
        filename: "cover.png".to_string(),
        content_type: Some("image/png".to_string()),
        data: Bytes::from_static(PNG),
    }
}

/// Feeds `data` through a video spool in small chunks, the way the course
/// form handler does.
pub async fn spool_video(
    media: &MediaCoordinator,
    filename: &str,
    content_type: Option<&str>,
    data: &[u8],
) -> Result<SpooledVideo, MediaError> {
    let mut spool = media.begin_video_spool(filename, content_type).await?;
    for chunk in data.chunks(7) {
        spool.write_chunk(chunk).await?;
    }
    spool.finish().await
}

pub async fn mp4_video(media: &MediaCoordinator) -> SpooledVideo {
    spool_video(media, "intro.mp4", Some("video/mp4"), MP4)
        .await
        .unwrap()
}
