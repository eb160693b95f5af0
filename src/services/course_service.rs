use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::models::{CourseLevel, Role};
use crate::services::media::{CleanupReport, MediaCoordinator, MediaUpload, SpooledVideo};
use crate::utils::auth::Claims;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

/// Fields of a course as submitted by a client.
#[derive(Debug, Clone, Default)]
pub struct CourseInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub level_info: Option<String>,
    pub category_ids: Option<Vec<String>>,
    pub subcategory_ids: Option<Vec<String>>,
}

/// Media changes requested alongside a course update.
#[derive(Debug, Default)]
pub struct MediaChanges {
    pub image: Option<MediaUpload>,
    pub video: Option<SpooledVideo>,
    pub should_update_image: bool,
    pub should_delete_image: bool,
    pub should_update_video: bool,
    pub should_delete_video: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CourseView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub level_info: String,
    pub instructor_id: Option<String>,
    pub instructor_name: Option<String>,
    pub image_url: Option<String>,
    pub image_view_url: Option<String>,
    pub video_url: Option<String>,
    pub video_thumbnail_url: Option<String>,
    pub category_ids: Vec<String>,
    pub subcategory_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CourseDeleted {
    pub detail: String,
    pub cleanup: CleanupReport,
}

pub struct CourseService {
    db: DatabaseConnection,
    media: Arc<MediaCoordinator>,
}

fn role_of(claims: &Claims) -> Option<Role> {
    claims.role.and_then(Role::from_id)
}

impl CourseService {
    pub fn new(db: DatabaseConnection, media: Arc<MediaCoordinator>) -> Self {
        Self { db, media }
    }

    pub async fn list(&self, instructor_id: Option<&str>) -> Result<Vec<CourseView>, AppError> {
        let mut query = Courses::find().order_by_desc(courses::Column::CreatedAt);
        if let Some(id) = instructor_id {
            query = query.filter(courses::Column::InstructorId.eq(id));
        }
        let rows = query.all(&self.db).await?;

        let mut out = Vec::with_capacity(rows.len());
        for course in rows {
            out.push(self.view(course).await?);
        }
        Ok(out)
    }

    pub async fn get(&self, course_id: &str) -> Result<CourseView, AppError> {
        let course = self.find(course_id).await?;
        self.view(course).await
    }

    async fn find(&self, course_id: &str) -> Result<courses::Model, AppError> {
        Courses::find_by_id(course_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))
    }

    /// Loads a course the caller may modify: its instructor or an administrator.
    pub async fn find_owned(
        &self,
        course_id: &str,
        claims: &Claims,
    ) -> Result<courses::Model, AppError> {
        let course = self.find(course_id).await?;
        let is_owner = course.instructor_id.as_deref() == Some(claims.sub.as_str());
        if !is_owner && role_of(claims) != Some(Role::Administration) {
            return Err(AppError::Forbidden(
                "You do not have permission to modify this course".to_string(),
            ));
        }
        Ok(course)
    }

    pub async fn view(&self, course: courses::Model) -> Result<CourseView, AppError> {
        let instructor_name = match course.instructor_id.as_deref() {
            Some(id) => Users::find_by_id(id).one(&self.db).await?.map(|u| u.name),
            None => None,
        };
        let category_ids = CourseCategories::find()
            .filter(course_categories::Column::CourseId.eq(course.id.as_str()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|c| c.category_id)
            .collect();
        let subcategory_ids = CourseSubcategories::find()
            .filter(course_subcategories::Column::CourseId.eq(course.id.as_str()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|c| c.subcategory_id)
            .collect();

        Ok(CourseView {
            id: course.id,
            title: course.title,
            description: course.description,
            level_info: course.level_info,
            instructor_id: course.instructor_id,
            instructor_name,
            image_url: course.image_url,
            image_view_url: course.image_view_url,
            video_url: course.video_url,
            video_thumbnail_url: course.video_thumbnail_url,
            category_ids,
            subcategory_ids,
            created_at: course.created_at,
            updated_at: course.updated_at,
        })
    }

    /// Creates a course and uploads its media. If an upload fails, whatever
    /// was created remotely is released and the course row is removed again.
    pub async fn create(
        &self,
        claims: &Claims,
        input: CourseInput,
        image: Option<MediaUpload>,
        video: Option<SpooledVideo>,
    ) -> Result<CourseView, AppError> {
        if !role_of(claims).is_some_and(Role::can_author_courses) {
            return Err(AppError::Forbidden(
                "Only instructors can create courses".to_string(),
            ));
        }

        let title = input
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::BadRequest("Title is required".to_string()))?
            .to_string();
        let level = input
            .level_info
            .as_deref()
            .unwrap_or("Beginner")
            .parse::<CourseLevel>()
            .map_err(AppError::BadRequest)?;

        let now = Utc::now();
        let course_id = uuid::Uuid::new_v4().to_string();
        let txn = self.db.begin().await?;
        courses::ActiveModel {
            id: Set(course_id.clone()),
            title: Set(title),
            description: Set(input.description.clone().unwrap_or_default()),
            level_info: Set(level.as_str().to_string()),
            instructor_id: Set(Some(claims.sub.clone())),
            image_url: Set(None),
            image_view_url: Set(None),
            video_url: Set(None),
            video_thumbnail_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        set_taxonomy(&txn, &course_id, &input).await?;
        txn.commit().await?;

        tracing::info!("📚 Course {} created by {}", course_id, claims.sub);

        if let Err(e) = self.attach_new_media(&course_id, image, video).await {
            tracing::warn!("↩️ Media upload failed for new course {}, removing it", course_id);
            self.compensate_create(&course_id).await;
            return Err(e);
        }

        self.get(&course_id).await
    }

    async fn attach_new_media(
        &self,
        course_id: &str,
        image: Option<MediaUpload>,
        video: Option<SpooledVideo>,
    ) -> Result<(), AppError> {
        if let Some(image) = image {
            self.media.attach_image(course_id, image).await?;
        }
        if let Some(video) = video {
            self.media.attach_video(course_id, video).await?;
        }
        Ok(())
    }

    async fn compensate_create(&self, course_id: &str) {
        let _lock = self.media.course_locks().lock(course_id).await;
        match self.media.release_course_media(course_id).await {
            Ok(report) if !report.is_complete() => tracing::warn!(
                "⚠️ Compensation for course {} left {} deletes pending",
                course_id,
                report.pending.len()
            ),
            Ok(_) => {}
            Err(e) => tracing::error!("❌ Compensation for course {} failed: {}", course_id, e),
        }
        if let Err(e) = Courses::delete_by_id(course_id).exec(&self.db).await {
            tracing::error!("❌ Could not remove partially created course {}: {}", course_id, e);
        }
    }

    pub async fn update(
        &self,
        course_id: &str,
        claims: &Claims,
        input: CourseInput,
        media: MediaChanges,
    ) -> Result<CourseView, AppError> {
        let course = self.find_owned(course_id, claims).await?;

        let level = match input.level_info.as_deref() {
            Some(level) => Some(level.parse::<CourseLevel>().map_err(AppError::BadRequest)?),
            None => None,
        };
        let title = match input.title.as_deref().map(str::trim) {
            Some("") => return Err(AppError::BadRequest("Title cannot be empty".to_string())),
            other => other.map(str::to_string),
        };

        let txn = self.db.begin().await?;
        let mut active: courses::ActiveModel = course.into();
        if let Some(title) = title {
            active.title = Set(title);
        }
        if let Some(description) = input.description.clone() {
            active.description = Set(description);
        }
        if let Some(level) = level {
            active.level_info = Set(level.as_str().to_string());
        }
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;
        set_taxonomy(&txn, course_id, &input).await?;
        txn.commit().await?;

        if media.should_delete_image {
            self.media.delete_image(course_id).await?;
        }
        if media.should_update_image
            && let Some(image) = media.image
        {
            self.media.attach_image(course_id, image).await?;
        }
        if media.should_delete_video {
            self.media.delete_video(course_id).await?;
        }
        if media.should_update_video
            && let Some(video) = media.video
        {
            self.media.attach_video(course_id, video).await?;
        }

        self.get(course_id).await
    }

    /// Releases the course's remote media, then deletes the course. The course
    /// lock is held across both so no upload can slip in between.
    pub async fn delete(&self, course_id: &str, claims: &Claims) -> Result<CourseDeleted, AppError> {
        self.find_owned(course_id, claims).await?;

        let _lock = self.media.course_locks().lock(course_id).await;
        tracing::info!("🔒 Scoped lock acquired for course delete: {}", course_id);

        let cleanup = self.media.release_course_media(course_id).await?;
        Courses::delete_by_id(course_id).exec(&self.db).await?;

        tracing::info!("🗑️ Course {} deleted", course_id);
        Ok(CourseDeleted {
            detail: "Course and associated resources deleted successfully".to_string(),
            cleanup,
        })
    }
}

/// Replaces the course's category and subcategory links when the input names them.
async fn set_taxonomy<C: ConnectionTrait>(
    db: &C,
    course_id: &str,
    input: &CourseInput,
) -> Result<(), AppError> {
    let now = Utc::now();

    if let Some(ids) = &input.category_ids {
        for id in ids {
            if Categories::find_by_id(id).one(db).await?.is_none() {
                return Err(AppError::BadRequest(format!("Invalid category: {}", id)));
            }
        }
        CourseCategories::delete_many()
            .filter(course_categories::Column::CourseId.eq(course_id))
            .exec(db)
            .await?;
        for id in dedup(ids) {
            course_categories::ActiveModel {
                id: Set(uuid::Uuid::new_v4().to_string()),
                course_id: Set(course_id.to_string()),
                category_id: Set(id),
                created_at: Set(now),
            }
            .insert(db)
            .await?;
        }
    }

    if let Some(ids) = &input.subcategory_ids {
        for id in ids {
            if Subcategories::find_by_id(id).one(db).await?.is_none() {
                return Err(AppError::BadRequest(format!("Invalid subcategory: {}", id)));
            }
        }
        CourseSubcategories::delete_many()
            .filter(course_subcategories::Column::CourseId.eq(course_id))
            .exec(db)
            .await?;
        for id in dedup(ids) {
            course_subcategories::ActiveModel {
                id: Set(uuid::Uuid::new_v4().to_string()),
                course_id: Set(course_id.to_string()),
                subcategory_id: Set(id),
                created_at: Set(now),
            }
            .insert(db)
            .await?;
        }
    }
    Ok(())
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    out
}
