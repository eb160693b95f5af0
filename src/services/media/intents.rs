use super::MediaCoordinator;
use crate::entities::{prelude::*, *};
use crate::models::{IntentKind, IntentStatus};
use crate::services::remote::ProviderError;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

/// Appends a pending intent.
pub async fn record<C: ConnectionTrait>(
    db: &C,
    course_id: &str,
    kind: IntentKind,
    remote_id: Option<&str>,
) -> Result<media_intents::Model, DbErr> {
    let now = Utc::now();
    media_intents::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        course_id: Set(course_id.to_string()),
        kind: Set(kind.as_str().to_string()),
        remote_id: Set(remote_id.map(str::to_string)),
        status: Set(IntentStatus::Pending.as_str().to_string()),
        attempts: Set(0),
        last_error: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
}

pub async fn set_remote_id<C: ConnectionTrait>(
    db: &C,
    intent: media_intents::Model,
    remote_id: &str,
) -> Result<media_intents::Model, DbErr> {
    let mut active: media_intents::ActiveModel = intent.into();
    active.remote_id = Set(Some(remote_id.to_string()));
    active.updated_at = Set(Utc::now());
    active.update(db).await
}

pub async fn mark<C: ConnectionTrait>(
    db: &C,
    intent: media_intents::Model,
    status: IntentStatus,
    error: Option<String>,
) -> Result<media_intents::Model, DbErr> {
    let mut active: media_intents::ActiveModel = intent.into();
    active.status = Set(status.as_str().to_string());
    if error.is_some() {
        active.last_error = Set(error);
    }
    active.updated_at = Set(Utc::now());
    active.update(db).await
}

pub async fn pending<C: ConnectionTrait>(
    db: &C,
    kinds: &[IntentKind],
) -> Result<Vec<media_intents::Model>, DbErr> {
    MediaIntents::find()
        .filter(media_intents::Column::Status.eq(IntentStatus::Pending.as_str()))
        .filter(media_intents::Column::Kind.is_in(kinds.iter().map(|k| k.as_str())))
        .order_by_asc(media_intents::Column::CreatedAt)
        .all(db)
        .await
}

/// Pending upload intents last touched before `cutoff`.
pub async fn stale_uploads<C: ConnectionTrait>(
    db: &C,
    cutoff: DateTime<Utc>,
) -> Result<Vec<media_intents::Model>, DbErr> {
    MediaIntents::find()
        .filter(media_intents::Column::Status.eq(IntentStatus::Pending.as_str()))
        .filter(
            media_intents::Column::Kind
                .is_in([IntentKind::ImageUpload.as_str(), IntentKind::VideoUpload.as_str()]),
        )
        .filter(media_intents::Column::UpdatedAt.lt(cutoff))
        .all(db)
        .await
}

pub async fn for_course<C: ConnectionTrait>(
    db: &C,
    course_id: &str,
) -> Result<Vec<media_intents::Model>, DbErr> {
    MediaIntents::find()
        .filter(media_intents::Column::CourseId.eq(course_id))
        .order_by_asc(media_intents::Column::CreatedAt)
        .all(db)
        .await
}

fn video_id(remote_id: &str) -> Result<u64, ProviderError> {
    remote_id.parse().map_err(|_| {
        ProviderError::permanent("vimeo", format!("'{}' is not a video id", remote_id))
    })
}

impl MediaCoordinator {
    /// Deletes a remote object of the given kind. Not-found is success.
    pub(crate) async fn delete_remote(
        &self,
        kind: IntentKind,
        remote_id: &str,
    ) -> Result<(), ProviderError> {
        let result = match kind {
            IntentKind::DeleteImage | IntentKind::DeleteFolder | IntentKind::ImageUpload => {
                self.images.delete_object(remote_id).await
            }
            IntentKind::DeleteVideo | IntentKind::VideoUpload => {
                self.videos.delete(video_id(remote_id)?).await
            }
        };

        match result {
            Err(e) if e.is_not_found() => {
                tracing::debug!("Remote {} already gone: {}", kind.as_str(), remote_id);
                Ok(())
            }
            other => other,
        }
    }

    /// Attempts one delete intent and records the outcome on it. Returns
    /// whether the remote object is confirmed gone.
    pub async fn run_delete_intent(&self, intent: media_intents::Model) -> Result<bool, DbErr> {
        let kind: IntentKind = match intent.kind.parse() {
            Ok(kind) => kind,
            Err(e) => {
                mark(&self.db, intent, IntentStatus::Failed, Some(e)).await?;
                return Ok(false);
            }
        };

        let Some(remote_id) = intent.remote_id.clone() else {
            mark(&self.db, intent, IntentStatus::Done, None).await?;
            return Ok(true);
        };

        match self.delete_remote(kind, &remote_id).await {
            Ok(()) => {
                mark(&self.db, intent, IntentStatus::Done, None).await?;
                Ok(true)
            }
            Err(e) => {
                self.record_failed_attempt(intent, &e).await?;
                Ok(false)
            }
        }
    }

    /// Counts a failed remote delete against an intent. Retryable failures
    /// keep it pending until `reconcile_max_attempts`; permanent failures
    /// mark it failed straight away.
    pub(crate) async fn record_failed_attempt(
        &self,
        intent: media_intents::Model,
        error: &ProviderError,
    ) -> Result<IntentStatus, DbErr> {
        let attempts = intent.attempts + 1;
        let remote_id = intent.remote_id.clone().unwrap_or_default();
        let give_up = !error.is_retryable() || attempts >= self.config.reconcile_max_attempts;
        let status = if give_up {
            tracing::error!(
                "❌ Giving up on {} of {} after {} attempts: {}",
                intent.kind,
                remote_id,
                attempts,
                error
            );
            IntentStatus::Failed
        } else {
            tracing::warn!(
                "⚠️ {} of {} failed (attempt {}), will retry: {}",
                intent.kind,
                remote_id,
                attempts,
                error
            );
            IntentStatus::Pending
        };

        let mut active: media_intents::ActiveModel = intent.into();
        active.attempts = Set(attempts);
        active.status = Set(status.as_str().to_string());
        active.last_error = Set(Some(error.to_string()));
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await?;
        Ok(status)
    }
}
