use super::{MediaCoordinator, MediaError, SpooledVideo, intents};
use crate::entities::*;
use crate::models::{IntentKind, IntentStatus};
use crate::services::video_host::{VideoMetadata, parse_video_id};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DbErr, Set, TransactionTrait};

/// The id of the video a course currently points at. Rows written before
/// ids were stored only have the link, so fall back to parsing it.
pub(super) fn recorded_video_id(
    course: &courses::Model,
    manager: Option<&course_file_managers::Model>,
) -> Result<Option<String>, MediaError> {
    if let Some(id) = manager.and_then(|m| m.video_file_id.clone()) {
        return Ok(Some(id));
    }
    match course.video_url.as_deref() {
        None | Some("") => Ok(None),
        Some(link) => parse_video_id(link)
            .map(|id| Some(id.to_string()))
            .map_err(|e| {
                MediaError::PreconditionFailed(format!(
                    "Stored video link cannot be resolved to a video: {}",
                    e
                ))
            }),
    }
}

impl MediaCoordinator {
    /// Uploads a spooled course video and makes it the course's current
    /// video. The video id is recorded before any bytes are sent, so a
    /// failed transfer always leaves something to roll back or reconcile.
    pub async fn attach_video(
        &self,
        course_id: &str,
        video: SpooledVideo,
    ) -> Result<courses::Model, MediaError> {
        let _lock = self.course_locks.lock(course_id).await;
        tracing::info!("🔒 Scoped lock acquired for video attach on course {}", course_id);

        let course = self.load_course(course_id).await?;
        let manager = self.ensure_file_manager(course_id).await?;
        let previous = match recorded_video_id(&course, Some(&manager)) {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!("⚠️ Course {} has an unresolvable video link: {}", course_id, e);
                None
            }
        };

        let intent = intents::record(&self.db, course_id, IntentKind::VideoUpload, None).await?;
        let ticket = match self
            .videos
            .create_upload(video.size, &course.title, &course.description)
            .await
        {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::error!("❌ Video upload for course {} failed: {}", course_id, e);
                self.fail_upload_intent(intent, &e).await;
                return Err(e.into());
            }
        };

        let remote_id = ticket.video_id.to_string();
        let intent = self
            .persist_remote_id(intent, IntentKind::VideoUpload, &remote_id)
            .await?;

        if let Err(e) = self.videos.transfer(&ticket, video.path()).await {
            self.roll_back_upload(intent, IntentKind::VideoUpload, &remote_id, &e)
                .await;
            return Err(e.into());
        }
        tracing::debug!("Sent '{}' ({}) as video {}", video.filename, video.mime, remote_id);
        drop(video);

        let metadata = match self.videos.fetch(ticket.video_id).await {
            Ok(metadata) => metadata,
            Err(e) => {
                self.roll_back_upload(intent, IntentKind::VideoUpload, &remote_id, &e)
                    .await;
                return Err(e.into());
            }
        };

        let committed = self
            .commit_video(course, manager, &remote_id, &metadata, intent.clone(), previous)
            .await;
        let (course, delete_intent) = match committed {
            Ok(result) => result,
            Err(e) => {
                self.roll_back_upload(intent, IntentKind::VideoUpload, &remote_id, &e)
                    .await;
                return Err(e.into());
            }
        };

        tracing::info!("🎬 Course {} video set to {}", course_id, remote_id);

        if let Some(pending) = delete_intent
            && let Err(e) = self.run_delete_intent(pending).await
        {
            tracing::error!("❌ Could not record old video cleanup for {}: {}", course_id, e);
        }

        Ok(course)
    }

    async fn commit_video(
        &self,
        course: courses::Model,
        manager: course_file_managers::Model,
        video_id: &str,
        metadata: &VideoMetadata,
        upload_intent: media_intents::Model,
        previous: Option<String>,
    ) -> Result<(courses::Model, Option<media_intents::Model>), DbErr> {
        let now = Utc::now();
        let course_id = course.id.clone();
        let txn = self.db.begin().await?;

        let mut fm: course_file_managers::ActiveModel = manager.into();
        fm.video_file_id = Set(Some(video_id.to_string()));
        fm.updated_at = Set(now);
        fm.update(&txn).await?;

        let mut active: courses::ActiveModel = course.into();
        active.video_url = Set(Some(metadata.link.clone()));
        active.video_thumbnail_url = Set(metadata.thumbnail_url.clone());
        active.updated_at = Set(now);
        let course = active.update(&txn).await?;

        let delete_intent = match previous.filter(|old| old != video_id) {
            Some(old) => {
                Some(intents::record(&txn, &course_id, IntentKind::DeleteVideo, Some(&old)).await?)
            }
            None => None,
        };
        intents::mark(&txn, upload_intent, IntentStatus::Done, None).await?;

        txn.commit().await?;
        Ok((course, delete_intent))
    }

    /// Deletes the course's current video; local fields are cleared only
    /// after the host confirms the deletion.
    pub async fn delete_video(&self, course_id: &str) -> Result<courses::Model, MediaError> {
        let _lock = self.course_locks.lock(course_id).await;
        tracing::info!("🔒 Scoped lock acquired for video delete on course {}", course_id);

        let course = self.load_course(course_id).await?;
        let manager = Self::file_manager(&self.db, course_id).await?;
        let Some(video_id) = recorded_video_id(&course, manager.as_ref())? else {
            return Ok(course);
        };

        self.delete_remote(IntentKind::DeleteVideo, &video_id).await?;

        let now = Utc::now();
        let txn = self.db.begin().await?;
        if let Some(manager) = manager {
            let mut fm: course_file_managers::ActiveModel = manager.into();
            fm.video_file_id = Set(None);
            fm.updated_at = Set(now);
            fm.update(&txn).await?;
        }

        let mut active: courses::ActiveModel = course.into();
        active.video_url = Set(None);
        active.video_thumbnail_url = Set(None);
        active.updated_at = Set(now);
        let course = active.update(&txn).await?;
        txn.commit().await?;

        tracing::info!("🗑️ Course {} video {} removed", course_id, video_id);
        Ok(course)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(video_url: Option<&str>) -> courses::Model {
        courses::Model {
            id: "c1".to_string(),
            title: "Rust".to_string(),
            description: String::new(),
            level_info: "Beginner".to_string(),
            instructor_id: None,
            image_url: None,
            image_view_url: None,
            video_url: video_url.map(str::to_string),
            video_thumbnail_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_recorded_id_falls_back_to_link() {
        let legacy = course(Some("https://vimeo.com/123/abcdef"));
        assert_eq!(recorded_video_id(&legacy, None).unwrap(), Some("123".to_string()));
        assert_eq!(recorded_video_id(&course(None), None).unwrap(), None);
        assert!(recorded_video_id(&course(Some("https://vimeo.com/about")), None).is_err());
    }
}
