use super::{MediaCoordinator, MediaError, intents};
use crate::entities::{prelude::*, *};
use crate::models::{IntentKind, IntentStatus};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};

/// What a reference check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceCheck {
    Present,
    Cleared,
    Skipped,
}

/// What happened to an abandoned upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleUpload {
    /// The object is the one the course points at; the intent was just never closed.
    Adopted,
    Removed,
    Retrying,
}

impl MediaCoordinator {
    /// Clears the course's image fields if the image store reports the
    /// referenced object missing.
    pub async fn verify_image_reference(
        &self,
        course_id: &str,
    ) -> Result<ReferenceCheck, MediaError> {
        let _lock = self.course_locks.lock(course_id).await;

        let Some(manager) = Self::file_manager(&self.db, course_id).await? else {
            return Ok(ReferenceCheck::Skipped);
        };
        let Some(image_id) = manager.image_file_id.clone() else {
            return Ok(ReferenceCheck::Skipped);
        };
        if self.images.object_exists(&image_id).await? {
            return Ok(ReferenceCheck::Present);
        }

        tracing::warn!(
            "⚠️ Image {} of course {} no longer exists remotely, clearing reference",
            image_id,
            course_id
        );
        let now = Utc::now();
        let txn = self.db.begin().await?;
        let mut fm: course_file_managers::ActiveModel = manager.into();
        fm.image_file_id = Set(None);
        fm.updated_at = Set(now);
        fm.update(&txn).await?;
        if let Some(course) = Courses::find_by_id(course_id).one(&txn).await? {
            let mut active: courses::ActiveModel = course.into();
            active.image_url = Set(None);
            active.image_view_url = Set(None);
            active.updated_at = Set(now);
            active.update(&txn).await?;
        }
        txn.commit().await?;
        Ok(ReferenceCheck::Cleared)
    }

    /// Clears the course's video fields if the video host reports the
    /// referenced video missing.
    pub async fn verify_video_reference(
        &self,
        course_id: &str,
    ) -> Result<ReferenceCheck, MediaError> {
        let _lock = self.course_locks.lock(course_id).await;

        let Some(manager) = Self::file_manager(&self.db, course_id).await? else {
            return Ok(ReferenceCheck::Skipped);
        };
        let Some(video_id) = manager.video_file_id.clone() else {
            return Ok(ReferenceCheck::Skipped);
        };
        let Ok(numeric) = video_id.parse::<u64>() else {
            tracing::warn!("⚠️ Course {} has a malformed video id '{}'", course_id, video_id);
            return Ok(ReferenceCheck::Skipped);
        };
        if self.videos.exists(numeric).await? {
            return Ok(ReferenceCheck::Present);
        }

        tracing::warn!(
            "⚠️ Video {} of course {} no longer exists remotely, clearing reference",
            video_id,
            course_id
        );
        let now = Utc::now();
        let txn = self.db.begin().await?;
        let mut fm: course_file_managers::ActiveModel = manager.into();
        fm.video_file_id = Set(None);
        fm.updated_at = Set(now);
        fm.update(&txn).await?;
        if let Some(course) = Courses::find_by_id(course_id).one(&txn).await? {
            let mut active: courses::ActiveModel = course.into();
            active.video_url = Set(None);
            active.video_thumbnail_url = Set(None);
            active.updated_at = Set(now);
            active.update(&txn).await?;
        }
        txn.commit().await?;
        Ok(ReferenceCheck::Cleared)
    }

    /// Settles an upload intent whose operation never finished: adopts the
    /// object if the course references it, otherwise deletes it.
    pub async fn settle_stale_upload(
        &self,
        intent: media_intents::Model,
    ) -> Result<StaleUpload, MediaError> {
        let _lock = self.course_locks.lock(&intent.course_id).await;

        // Re-read under the lock; the owning operation may have finished meanwhile.
        let Some(intent) = MediaIntents::find_by_id(&intent.id).one(&self.db).await? else {
            return Ok(StaleUpload::Adopted);
        };
        if intent.status != IntentStatus::Pending.as_str() {
            return Ok(StaleUpload::Adopted);
        }
        let kind: IntentKind = intent.kind.parse().map_err(MediaError::PreconditionFailed)?;

        let Some(remote_id) = intent.remote_id.clone() else {
            intents::mark(
                &self.db,
                intent,
                IntentStatus::Failed,
                Some("abandoned before the upload completed".to_string()),
            )
            .await?;
            return Ok(StaleUpload::Removed);
        };

        let manager = CourseFileManagers::find()
            .filter(course_file_managers::Column::CourseId.eq(intent.course_id.as_str()))
            .one(&self.db)
            .await?;
        let referenced = manager.is_some_and(|m| match kind {
            IntentKind::ImageUpload => m.image_file_id.as_deref() == Some(remote_id.as_str()),
            _ => m.video_file_id.as_deref() == Some(remote_id.as_str()),
        });
        if referenced {
            intents::mark(&self.db, intent, IntentStatus::Done, None).await?;
            return Ok(StaleUpload::Adopted);
        }

        match self.delete_remote(kind, &remote_id).await {
            Ok(()) => {
                tracing::info!("🧹 Removed abandoned upload {} of course {}", remote_id, intent.course_id);
                intents::mark(
                    &self.db,
                    intent,
                    IntentStatus::Done,
                    Some("abandoned upload removed".to_string()),
                )
                .await?;
                Ok(StaleUpload::Removed)
            }
            Err(e) => {
                self.record_failed_attempt(intent, &e).await?;
                Ok(StaleUpload::Retrying)
            }
        }
    }
}
