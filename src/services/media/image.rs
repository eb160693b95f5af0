use super::{MediaCoordinator, MediaError, MediaUpload, intents};
use crate::entities::*;
use crate::models::{IntentKind, IntentStatus};
use crate::services::image_store::{RemoteObject, browser_view_url, direct_view_url};
use crate::services::remote::ProviderError;
use crate::utils::validation::{MediaRules, sanitize_filename, validate_upload};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DbErr, Set, TransactionTrait};
use std::path::Path;

fn file_extension(filename: &str, mime: &str) -> String {
    let sanitized = sanitize_filename(filename);
    Path::new(&sanitized)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .or_else(|| mime.split('/').nth(1).map(str::to_string))
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

impl MediaCoordinator {
    /// Uploads a new course image and makes it the course's current image.
    /// Any previous image is deleted after the new one is committed.
    pub async fn attach_image(
        &self,
        course_id: &str,
        upload: MediaUpload,
    ) -> Result<courses::Model, MediaError> {
        let rules = MediaRules::image(&self.config);
        let mime = validate_upload(&upload.data, upload.content_type.as_deref(), &rules)?;

        let _lock = self.course_locks.lock(course_id).await;
        tracing::info!("🔒 Scoped lock acquired for image attach on course {}", course_id);

        let course = self.load_course(course_id).await?;
        let manager = self.ensure_file_manager(course_id).await?;
        let (manager, folder_id) = self.ensure_image_folder(&course, manager).await?;

        let intent = intents::record(&self.db, course_id, IntentKind::ImageUpload, None).await?;
        let name = format!(
            "{}_image{}",
            course.title,
            file_extension(&upload.filename, &mime)
        );

        let object = match self
            .images
            .upload_object(&name, &folder_id, upload.data, &mime)
            .await
        {
            Ok(object) => object,
            Err(e) => {
                tracing::error!("❌ Image upload for course {} failed: {}", course_id, e);
                self.fail_upload_intent(intent, &e).await;
                return Err(e.into());
            }
        };
        let intent = self
            .persist_remote_id(intent, IntentKind::ImageUpload, &object.id)
            .await?;

        if let Err(e) = self.images.make_public(&object.id).await {
            self.roll_back_upload(intent, IntentKind::ImageUpload, &object.id, &e)
                .await;
            return Err(e.into());
        }

        let previous = manager.image_file_id.clone();
        let committed = self
            .commit_image(course, manager, &object, intent.clone(), previous)
            .await;
        let (course, delete_intent) = match committed {
            Ok(result) => result,
            Err(e) => {
                self.roll_back_upload(intent, IntentKind::ImageUpload, &object.id, &e)
                    .await;
                return Err(e.into());
            }
        };

        tracing::info!("🖼️ Course {} image set to {}", course_id, object.id);

        if let Some(pending) = delete_intent
            && let Err(e) = self.run_delete_intent(pending).await
        {
            tracing::error!("❌ Could not record old image cleanup for {}: {}", course_id, e);
        }

        Ok(course)
    }

    async fn commit_image(
        &self,
        course: courses::Model,
        manager: course_file_managers::Model,
        object: &RemoteObject,
        upload_intent: media_intents::Model,
        previous: Option<String>,
    ) -> Result<(courses::Model, Option<media_intents::Model>), DbErr> {
        let now = Utc::now();
        let course_id = course.id.clone();
        let txn = self.db.begin().await?;

        let mut fm: course_file_managers::ActiveModel = manager.into();
        fm.image_file_id = Set(Some(object.id.clone()));
        fm.updated_at = Set(now);
        fm.update(&txn).await?;

        let mut active: courses::ActiveModel = course.into();
        active.image_url = Set(Some(direct_view_url(object)));
        active.image_view_url = Set(Some(browser_view_url(object)));
        active.updated_at = Set(now);
        let course = active.update(&txn).await?;

        let delete_intent = match previous.filter(|old| old != &object.id) {
            Some(old) => {
                Some(intents::record(&txn, &course_id, IntentKind::DeleteImage, Some(&old)).await?)
            }
            None => None,
        };
        intents::mark(&txn, upload_intent, IntentStatus::Done, None).await?;

        txn.commit().await?;
        Ok((course, delete_intent))
    }

    /// Marks an upload intent failed after the provider refused the upload.
    /// A bookkeeping error is only logged so the caller sees the provider's.
    pub(super) async fn fail_upload_intent(
        &self,
        intent: media_intents::Model,
        cause: &ProviderError,
    ) {
        let intent_id = intent.id.clone();
        let marked =
            intents::mark(&self.db, intent, IntentStatus::Failed, Some(cause.to_string())).await;
        if let Err(e) = marked {
            tracing::error!("❌ Could not mark upload intent {} failed: {}", intent_id, e);
        }
    }

    /// Records the id of a freshly created remote object on its upload
    /// intent. If that write fails, nothing durable points at the object, so
    /// it is deleted again before the error is returned.
    pub(super) async fn persist_remote_id(
        &self,
        intent: media_intents::Model,
        kind: IntentKind,
        remote_id: &str,
    ) -> Result<media_intents::Model, MediaError> {
        match intents::set_remote_id(&self.db, intent, remote_id).await {
            Ok(intent) => Ok(intent),
            Err(e) => {
                tracing::error!(
                    "❌ Could not record {} {}, removing it: {}",
                    kind.as_str(),
                    remote_id,
                    e
                );
                if let Err(cleanup) = self.delete_remote(kind, remote_id).await {
                    tracing::error!(
                        "❌ Unrecorded {} {} could not be removed: {}",
                        kind.as_str(),
                        remote_id,
                        cleanup
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Removes an object uploaded by an operation that then failed. If the
    /// removal fails too, the upload intent stays pending so the reconciler
    /// picks it up once it goes stale.
    pub(super) async fn roll_back_upload(
        &self,
        intent: media_intents::Model,
        kind: IntentKind,
        remote_id: &str,
        cause: &(dyn std::fmt::Display + Sync),
    ) {
        tracing::warn!(
            "↩️ Rolling back {} {} after failure: {}",
            kind.as_str(),
            remote_id,
            cause
        );
        let outcome = match self.delete_remote(kind, remote_id).await {
            Ok(()) => intents::mark(&self.db, intent, IntentStatus::Failed, Some(cause.to_string()))
                .await
                .map(|_| ()),
            Err(e) => {
                tracing::error!("❌ Rollback of {} failed, leaving for reconciler: {}", remote_id, e);
                let mut active: media_intents::ActiveModel = intent.into();
                active.last_error = Set(Some(format!("{}; rollback: {}", cause, e)));
                active.update(&self.db).await.map(|_| ())
            }
        };
        if let Err(e) = outcome {
            tracing::error!("❌ Could not update intent for {}: {}", remote_id, e);
        }
    }

    /// Deletes the course's current image. Local fields are cleared only once
    /// the image store confirms the object is gone.
    pub async fn delete_image(&self, course_id: &str) -> Result<courses::Model, MediaError> {
        let _lock = self.course_locks.lock(course_id).await;
        tracing::info!("🔒 Scoped lock acquired for image delete on course {}", course_id);

        let course = self.load_course(course_id).await?;
        let Some(manager) = Self::file_manager(&self.db, course_id).await? else {
            return Ok(course);
        };
        let Some(image_id) = manager.image_file_id.clone() else {
            return Ok(course);
        };

        self.delete_remote(IntentKind::DeleteImage, &image_id).await?;

        let now = Utc::now();
        let txn = self.db.begin().await?;
        let mut fm: course_file_managers::ActiveModel = manager.into();
        fm.image_file_id = Set(None);
        fm.updated_at = Set(now);
        fm.update(&txn).await?;

        let mut active: courses::ActiveModel = course.into();
        active.image_url = Set(None);
        active.image_view_url = Set(None);
        active.updated_at = Set(now);
        let course = active.update(&txn).await?;
        txn.commit().await?;

        tracing::info!("🗑️ Course {} image {} removed", course_id, image_id);
        Ok(course)
    }

    pub async fn current_image_id(&self, course_id: &str) -> Result<Option<String>, DbErr> {
        Ok(Self::file_manager(&self.db, course_id)
            .await?
            .and_then(|m| m.image_file_id))
    }
}
