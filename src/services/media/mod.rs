//! Course media lifecycle: images on the image store, videos on the video
//! host, with local metadata kept in step with what exists remotely.
//!
//! Ordering rules every operation here follows:
//! * local ids and URLs are written only after the remote object exists;
//! * local ids and URLs are cleared only after remote deletion is confirmed
//!   (not-found counts as confirmed);
//! * a replaced object is deleted after the new one is committed, through a
//!   `media_intents` row the reconciler retries if the delete fails.

use crate::config::AppConfig;
use crate::entities::{prelude::*, *};
use crate::services::image_store::{ImageStore, folder_url};
use crate::services::remote::ProviderError;
use crate::services::video_host::VideoHost;
use crate::utils::keyed_mutex::KeyedMutex;
use crate::utils::validation::ValidationError;
use bytes::Bytes;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

mod cleanup;
mod image;
pub mod intents;
mod spool;
pub mod verify;
mod video;

pub use cleanup::CleanupReport;
pub use spool::{SpooledVideo, VideoSpool};
pub use verify::{ReferenceCheck, StaleUpload};

const IMAGES_FOLDER_NAME: &str = "images";

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("{}", .0.message)]
    InvalidFile(ValidationError),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("scratch storage error: {0}")]
    Scratch(#[from] std::io::Error),
}

impl From<ValidationError> for MediaError {
    fn from(e: ValidationError) -> Self {
        MediaError::InvalidFile(e)
    }
}

/// An image received from a client, not yet validated.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

pub struct MediaCoordinator {
    db: DatabaseConnection,
    images: Arc<dyn ImageStore>,
    videos: Arc<dyn VideoHost>,
    config: AppConfig,
    course_locks: KeyedMutex,
    root_folder: Mutex<Option<String>>,
}

impl MediaCoordinator {
    pub fn new(
        db: DatabaseConnection,
        images: Arc<dyn ImageStore>,
        videos: Arc<dyn VideoHost>,
        config: AppConfig,
    ) -> Self {
        Self {
            db,
            images,
            videos,
            config,
            course_locks: KeyedMutex::new(),
            root_folder: Mutex::new(None),
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn images(&self) -> &dyn ImageStore {
        self.images.as_ref()
    }

    pub fn videos(&self) -> &dyn VideoHost {
        self.videos.as_ref()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn course_locks(&self) -> &KeyedMutex {
        &self.course_locks
    }

    async fn load_course(&self, course_id: &str) -> Result<courses::Model, MediaError> {
        Courses::find_by_id(course_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                MediaError::PreconditionFailed(format!("Course {} does not exist", course_id))
            })
    }

    async fn file_manager<C: ConnectionTrait>(
        db: &C,
        course_id: &str,
    ) -> Result<Option<course_file_managers::Model>, DbErr> {
        CourseFileManagers::find()
            .filter(course_file_managers::Column::CourseId.eq(course_id))
            .one(db)
            .await
    }

    /// Returns the course's file-manager row, creating it on first use.
    /// Callers hold the course lock.
    async fn ensure_file_manager(
        &self,
        course_id: &str,
    ) -> Result<course_file_managers::Model, MediaError> {
        if let Some(existing) = Self::file_manager(&self.db, course_id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let created = course_file_managers::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            course_id: Set(course_id.to_string()),
            drive_folder_id: Set(None),
            drive_folder_url: Set(None),
            drive_images_folder_id: Set(None),
            drive_images_folder_url: Set(None),
            image_file_id: Set(None),
            video_file_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;
        tracing::debug!("Created file manager for course {}", course_id);
        Ok(created)
    }

    /// Resolves the shared root folder once per process. The lookup and the
    /// create happen under one lock so concurrent first uploads agree on a
    /// single folder.
    async fn root_folder_id(&self) -> Result<String, MediaError> {
        let mut cached = self.root_folder.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let name = &self.config.drive_root_folder_name;
        let id = match self.images.find_folder(name, None).await? {
            Some(id) => id,
            None => {
                let folder = self.images.create_folder(name, None).await?;
                if let Err(e) = self.images.make_public(&folder.id).await {
                    tracing::warn!("⚠️ Could not share root folder {}: {}", folder.id, e);
                }
                folder.id
            }
        };

        tracing::info!("📁 Using Drive root folder '{}' ({})", name, id);
        *cached = Some(id.clone());
        Ok(id)
    }

    /// Makes sure the course folder and its images subfolder exist, persisting
    /// each folder id as soon as it is created. Returns the images folder id.
    async fn ensure_image_folder(
        &self,
        course: &courses::Model,
        manager: course_file_managers::Model,
    ) -> Result<(course_file_managers::Model, String), MediaError> {
        let mut manager = manager;

        let course_folder = match manager.drive_folder_id.clone() {
            Some(id) => id,
            None => {
                let root = self.root_folder_id().await?;
                let folder = self.images.create_folder(&course.title, Some(&root)).await?;
                if let Err(e) = self.images.make_public(&folder.id).await {
                    tracing::warn!("⚠️ Could not share course folder {}: {}", folder.id, e);
                }
                let mut active: course_file_managers::ActiveModel = manager.into();
                active.drive_folder_id = Set(Some(folder.id.clone()));
                active.drive_folder_url = Set(Some(folder_url(&folder.id)));
                active.updated_at = Set(Utc::now());
                manager = active.update(&self.db).await?;
                folder.id
            }
        };

        let images_folder = match manager.drive_images_folder_id.clone() {
            Some(id) => id,
            None => {
                let folder = self
                    .images
                    .create_folder(IMAGES_FOLDER_NAME, Some(&course_folder))
                    .await?;
                let mut active: course_file_managers::ActiveModel = manager.into();
                active.drive_images_folder_id = Set(Some(folder.id.clone()));
                active.drive_images_folder_url = Set(Some(folder_url(&folder.id)));
                active.updated_at = Set(Utc::now());
                manager = active.update(&self.db).await?;
                folder.id
            }
        };

        Ok((manager, images_folder))
    }
}
