use crate::entities::{prelude::*, *};
use crate::models::IntentKind;
use crate::services::media::{MediaCoordinator, ReferenceCheck, StaleUpload, intents};
use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{ColumnTrait, Condition, DbErr, EntityTrait, QueryFilter};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub deletes_completed: usize,
    pub deletes_pending: usize,
    pub uploads_adopted: usize,
    pub uploads_removed: usize,
    pub references_cleared: usize,
}

/// Background job that finishes what interrupted or failed media operations
/// left behind.
pub struct Reconciler {
    media: Arc<MediaCoordinator>,
    shutdown: watch::Receiver<bool>,
}

impl Reconciler {
    pub fn new(media: Arc<MediaCoordinator>, shutdown: watch::Receiver<bool>) -> Self {
        Self { media, shutdown }
    }

    pub async fn run(mut self) {
        let interval = Duration::from_secs(self.media.config().reconcile_interval_secs);
        tracing::info!("🚀 Media reconciler started (every {:?})", interval);

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Media reconciler shutting down");
                    break;
                }
                _ = sleep(interval) => {
                    match self.run_once().await {
                        Ok(stats) => tracing::info!("✅ Reconciliation pass completed: {:?}", stats),
                        Err(e) => tracing::error!("❌ Reconciliation pass failed: {}", e),
                    }
                }
            }
        }
    }

    /// One full pass: pending deletes, abandoned uploads, then reference checks.
    pub async fn run_once(&self) -> Result<ReconcileStats, DbErr> {
        tracing::debug!("🧹 Running media reconciliation");
        let mut stats = ReconcileStats::default();

        self.retry_pending_deletes(&mut stats).await?;
        self.settle_stale_uploads(&mut stats).await?;
        self.verify_references(&mut stats).await?;

        self.media.course_locks().cleanup();
        Ok(stats)
    }

    async fn retry_pending_deletes(&self, stats: &mut ReconcileStats) -> Result<(), DbErr> {
        let pending = intents::pending(
            self.media.db(),
            &[
                IntentKind::DeleteImage,
                IntentKind::DeleteVideo,
                IntentKind::DeleteFolder,
            ],
        )
        .await?;

        for intent in pending {
            if self.media.run_delete_intent(intent).await? {
                stats.deletes_completed += 1;
            } else {
                stats.deletes_pending += 1;
            }
        }
        Ok(())
    }

    async fn settle_stale_uploads(&self, stats: &mut ReconcileStats) -> Result<(), DbErr> {
        let grace = ChronoDuration::seconds(self.media.config().upload_intent_grace_secs);
        let stale = intents::stale_uploads(self.media.db(), Utc::now() - grace).await?;

        for intent in stale {
            let id = intent.id.clone();
            match self.media.settle_stale_upload(intent).await {
                Ok(StaleUpload::Adopted) => stats.uploads_adopted += 1,
                Ok(StaleUpload::Removed) => stats.uploads_removed += 1,
                Ok(StaleUpload::Retrying) => {}
                Err(e) => tracing::warn!("⚠️ Could not settle upload intent {}: {}", id, e),
            }
        }
        Ok(())
    }

    async fn verify_references(&self, stats: &mut ReconcileStats) -> Result<(), DbErr> {
        let managers = CourseFileManagers::find()
            .filter(
                Condition::any()
                    .add(course_file_managers::Column::ImageFileId.is_not_null())
                    .add(course_file_managers::Column::VideoFileId.is_not_null()),
            )
            .all(self.media.db())
            .await?;

        for manager in managers {
            let course_id = manager.course_id.as_str();
            if manager.image_file_id.is_some() {
                match self.media.verify_image_reference(course_id).await {
                    Ok(ReferenceCheck::Cleared) => stats.references_cleared += 1,
                    Ok(_) => {}
                    Err(e) => tracing::warn!("⚠️ Image check for course {} failed: {}", course_id, e),
                }
            }
            if manager.video_file_id.is_some() {
                match self.media.verify_video_reference(course_id).await {
                    Ok(ReferenceCheck::Cleared) => stats.references_cleared += 1,
                    Ok(_) => {}
                    Err(e) => tracing::warn!("⚠️ Video check for course {} failed: {}", course_id, e),
                }
            }
        }
        Ok(())
    }
}
