use crate::AppState;
use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::services::course_service::{CourseDeleted, CourseInput, CourseView, MediaChanges};
use crate::services::media::{MediaCoordinator, MediaUpload};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use utoipa::ToSchema;

/// Multipart fields accepted by course create and update.
#[derive(ToSchema)]
pub struct CourseForm {
    pub title: Option<String>,
    pub description: Option<String>,
    #[schema(example = "Beginner")]
    pub level_info: Option<String>,
    /// Repeated or comma-separated category ids.
    pub categories: Option<String>,
    /// Repeated or comma-separated subcategory ids.
    pub subcategories: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<Vec<u8>>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub video: Option<Vec<u8>>,
    pub should_update_image: Option<bool>,
    pub should_delete_image: Option<bool>,
    pub should_update_video: Option<bool>,
    pub should_delete_video: Option<bool>,
}

/// What a parsed course form carries.
#[derive(Default)]
struct ParsedCourseForm {
    input: CourseInput,
    media: MediaChanges,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Upload exceeds the maximum request size".to_string())
    } else {
        AppError::BadRequest(format!("Invalid multipart data: {}", e.body_text()))
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Appends ids from a repeated or comma-separated form field.
fn push_ids(target: &mut Option<Vec<String>>, value: &str) {
    let ids = target.get_or_insert_with(Vec::new);
    ids.extend(
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    );
}

async fn read_course_form(
    media: &MediaCoordinator,
    mut multipart: Multipart,
) -> Result<ParsedCourseForm, AppError> {
    let mut form = ParsedCourseForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "image" {
            let filename = field.file_name().unwrap_or("unnamed").to_string();
            let content_type = field.content_type().map(|s| s.to_string());
            let data = field.bytes().await.map_err(multipart_error)?;
            // Browsers send an empty part when no file was picked.
            if !data.is_empty() {
                form.media.image = Some(MediaUpload {
                    filename,
                    content_type,
                    data,
                });
            }
            continue;
        }

        if name == "video" {
            let filename = field.file_name().unwrap_or("unnamed").to_string();
            let content_type = field.content_type().map(|s| s.to_string());
            let mut spool = media
                .begin_video_spool(&filename, content_type.as_deref())
                .await?;
            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                spool.write_chunk(&chunk).await?;
            }
            if !spool.is_empty() {
                form.media.video = Some(spool.finish().await?);
            }
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "title" => form.input.title = Some(value),
            "description" => form.input.description = Some(value),
            "level_info" => form.input.level_info = Some(value),
            "categories" | "category_ids" => push_ids(&mut form.input.category_ids, &value),
            "subcategories" | "subcategory_ids" => {
                push_ids(&mut form.input.subcategory_ids, &value)
            }
            "should_update_image" => form.media.should_update_image = parse_flag(&value),
            "should_delete_image" => form.media.should_delete_image = parse_flag(&value),
            "should_update_video" => form.media.should_update_video = parse_flag(&value),
            "should_delete_video" => form.media.should_delete_video = parse_flag(&value),
            other => tracing::debug!("Ignoring unknown course form field '{}'", other),
        }
    }

    Ok(form)
}

#[utoipa::path(
    get,
    path = "/courses",
    responses(
        (status = 200, description = "All courses", body = Vec<CourseView>)
    ),
    security(
        ("jwt" = [])
    ),
    tag = "courses"
)]
pub async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<CourseView>>, AppError> {
    Ok(Json(state.courses.list(None).await?))
}

#[utoipa::path(
    get,
    path = "/instructor/courses",
    responses(
        (status = 200, description = "Courses taught by the caller", body = Vec<CourseView>)
    ),
    security(
        ("jwt" = [])
    ),
    tag = "courses"
)]
pub async fn list_instructor_courses(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<CourseView>>, AppError> {
    Ok(Json(state.courses.list(Some(&claims.sub)).await?))
}

#[utoipa::path(
    post,
    path = "/courses",
    request_body(content = CourseForm, content_type = "multipart/form-data", description = "Course fields plus optional `image` and `video` files"),
    responses(
        (status = 201, description = "Course created", body = CourseView),
        (status = 400, description = "Invalid course data or media file"),
        (status = 403, description = "Caller may not author courses"),
        (status = 413, description = "File too large"),
        (status = 502, description = "Media provider rejected the upload"),
        (status = 503, description = "Media provider unavailable")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "courses"
)]
pub async fn create_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CourseView>), AppError> {
    let form = read_course_form(&state.media, multipart).await?;
    let course = state
        .courses
        .create(&claims, form.input, form.media.image, form.media.video)
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

#[utoipa::path(
    get,
    path = "/courses/{id}",
    params(
        ("id" = String, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Course", body = CourseView),
        (status = 404, description = "Course not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "courses"
)]
pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourseView>, AppError> {
    Ok(Json(state.courses.get(&id).await?))
}

#[utoipa::path(
    put,
    path = "/courses/{id}",
    params(
        ("id" = String, Path, description = "Course ID")
    ),
    request_body(content = CourseForm, content_type = "multipart/form-data", description = "Changed fields, media files and should_update/should_delete flags"),
    responses(
        (status = 200, description = "Course updated", body = CourseView),
        (status = 403, description = "Not the course owner"),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Course changed while media was being processed")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "courses"
)]
pub async fn update_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<CourseView>, AppError> {
    let form = read_course_form(&state.media, multipart).await?;
    let course = state
        .courses
        .update(&id, &claims, form.input, form.media)
        .await?;
    Ok(Json(course))
}

#[utoipa::path(
    delete,
    path = "/courses/{id}",
    params(
        ("id" = String, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Course deleted; pending remote deletes are retried in the background", body = CourseDeleted),
        (status = 403, description = "Not the course owner"),
        (status = 404, description = "Course not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "courses"
)]
pub async fn delete_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<CourseDeleted>, AppError> {
    Ok(Json(state.courses.delete(&id, &claims).await?))
}

#[utoipa::path(
    get,
    path = "/courses/{id}/curriculum",
    params(
        ("id" = String, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Curriculum items in order", body = Vec<crate::api::handlers::curriculum::CurriculumItemResponse>)
    ),
    security(
        ("jwt" = [])
    ),
    tag = "courses"
)]
pub async fn course_curriculum(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<super::curriculum::CurriculumItemResponse>>, AppError> {
    state.courses.get(&id).await?;
    let items = CurriculumItems::find()
        .filter(curriculum_items::Column::CourseId.eq(id.as_str()))
        .order_by_asc(curriculum_items::Column::Position)
        .all(&state.db)
        .await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/courses/{id}/code-questions",
    params(
        ("id" = String, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Code questions of the course", body = Vec<crate::api::handlers::code_questions::CodeQuestionResponse>)
    ),
    security(
        ("jwt" = [])
    ),
    tag = "courses"
)]
pub async fn course_code_questions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<super::code_questions::CodeQuestionResponse>>, AppError> {
    state.courses.get(&id).await?;
    let rows = CodeQuestions::find()
        .filter(code_questions::Column::CourseId.eq(id.as_str()))
        .order_by_asc(code_questions::Column::CreatedAt)
        .all(&state.db)
        .await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/courses/{id}/assignments",
    params(
        ("id" = String, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Assignments of the course", body = Vec<crate::api::handlers::assignments::AssignmentResponse>)
    ),
    security(
        ("jwt" = [])
    ),
    tag = "courses"
)]
pub async fn course_assignments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<super::assignments::AssignmentResponse>>, AppError> {
    state.courses.get(&id).await?;
    let rows = Assignments::find()
        .filter(assignments::Column::CourseId.eq(id.as_str()))
        .order_by_asc(assignments::Column::CreatedAt)
        .all(&state.db)
        .await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_accept_form_spellings() {
        assert!(parse_flag("true"));
        assert!(parse_flag("True"));
        assert!(parse_flag("1"));
        assert!(parse_flag("on"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_ids_accept_repeated_and_comma_separated_values() {
        let mut ids = None;
        push_ids(&mut ids, "a, b");
        push_ids(&mut ids, "c");
        push_ids(&mut ids, " , ");
        assert_eq!(
            ids,
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }
}
