use super::video::recorded_video_id;
use super::{MediaCoordinator, MediaError, intents};
use crate::entities::prelude::*;
use crate::models::{IntentKind, IntentStatus};
use sea_orm::{EntityTrait, TransactionTrait};
use serde::Serialize;
use utoipa::ToSchema;

/// Outcome of releasing a course's remote media. Ids in `pending` are
/// recorded as pending delete intents and retried by the reconciler; a video
/// link that resolves to no id is listed as is, behind a failed intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct CleanupReport {
    pub completed: Vec<String>,
    pub pending: Vec<String>,
}

impl CleanupReport {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

impl MediaCoordinator {
    /// Deletes the video, the image and the course folder of a course that is
    /// about to be removed.
    pub async fn delete_course_resources(
        &self,
        course_id: &str,
    ) -> Result<CleanupReport, MediaError> {
        let _lock = self.course_locks.lock(course_id).await;
        tracing::info!("🔒 Scoped lock acquired for resource cleanup of course {}", course_id);
        self.release_course_media(course_id).await
    }

    /// Same as `delete_course_resources`, for callers already holding the
    /// course lock.
    pub(crate) async fn release_course_media(
        &self,
        course_id: &str,
    ) -> Result<CleanupReport, MediaError> {
        let course = Courses::find_by_id(course_id).one(&self.db).await?;
        let manager = Self::file_manager(&self.db, course_id).await?;

        let mut targets: Vec<(IntentKind, String)> = Vec::new();
        let mut unresolved_link = None;
        if let Some(course) = course.as_ref() {
            match recorded_video_id(course, manager.as_ref()) {
                Ok(Some(id)) => targets.push((IntentKind::DeleteVideo, id)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("⚠️ Video of course {} needs manual cleanup: {}", course_id, e);
                    unresolved_link = course.video_url.clone();
                }
            }
        }
        if let Some(manager) = manager.as_ref() {
            if let Some(id) = manager.image_file_id.clone() {
                targets.push((IntentKind::DeleteImage, id));
            }
            if let Some(id) = manager.drive_folder_id.clone() {
                targets.push((IntentKind::DeleteFolder, id));
            }
        }

        if targets.is_empty() && unresolved_link.is_none() {
            return Ok(CleanupReport::default());
        }

        // Record every delete before attempting any, so nothing is lost if we stop midway.
        let txn = self.db.begin().await?;
        if let Some(link) = unresolved_link.as_deref() {
            // No id to retry with; the failed intent keeps the link for an operator.
            let intent = intents::record(&txn, course_id, IntentKind::DeleteVideo, None).await?;
            intents::mark(
                &txn,
                intent,
                IntentStatus::Failed,
                Some(format!("unresolvable video link: {}", link)),
            )
            .await?;
        }
        let mut recorded = Vec::with_capacity(targets.len());
        for (kind, remote_id) in &targets {
            recorded.push(intents::record(&txn, course_id, *kind, Some(remote_id)).await?);
        }
        txn.commit().await?;

        let mut report = CleanupReport::default();
        report.pending.extend(unresolved_link);
        for intent in recorded {
            let remote_id = intent.remote_id.clone().unwrap_or_default();
            if self.run_delete_intent(intent).await? {
                report.completed.push(remote_id);
            } else {
                report.pending.push(remote_id);
            }
        }

        if report.is_complete() {
            tracing::info!(
                "✅ Released {} remote objects of course {}",
                report.completed.len(),
                course_id
            );
        } else {
            tracing::warn!(
                "⚠️ Course {} cleanup incomplete, {} deletes left to the reconciler",
                course_id,
                report.pending.len()
            );
        }
        Ok(report)
    }
}
