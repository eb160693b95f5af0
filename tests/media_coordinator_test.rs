mod common;

use bytes::Bytes;
use common::*;
use lms_backend::entities::{media_intents, prelude::Courses};
use lms_backend::models::{IntentKind, IntentStatus};
use lms_backend::services::image_store::ImageStore;
use lms_backend::services::media::{MediaError, MediaUpload, StaleUpload, intents};
use lms_backend::services::reconciler::Reconciler;
use lms_backend::services::remote::ProviderError;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};

async fn intents_of(
    h: &Harness,
    course_id: &str,
    kind: IntentKind,
) -> Vec<media_intents::Model> {
    intents::for_course(&h.db, course_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|i| i.kind == kind.as_str())
        .collect()
}

fn reconciler(h: &Harness) -> Reconciler {
    let (_tx, rx) = tokio::sync::watch::channel(false);
    Reconciler::new(h.media.clone(), rx)
}

#[tokio::test]
async fn test_attach_image_creates_folders_and_publishes() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;

    let updated = h.media.attach_image(&course.id, png_upload()).await.unwrap();

    assert_eq!(
        h.images.calls(),
        vec![
            "find_folder:LMS Course Materials",
            "create_folder:LMS Course Materials",
            "make_public:obj-1",
            "create_folder:Rust Basics",
            "make_public:obj-2",
            "create_folder:images",
            "upload:Rust Basics_image.png",
            "make_public:obj-4",
        ]
    );
    assert_eq!(
        updated.image_url.as_deref(),
        Some("https://drive.google.com/uc?id=obj-4&export=view")
    );
    assert_eq!(
        h.media.current_image_id(&course.id).await.unwrap().as_deref(),
        Some("obj-4")
    );

    let uploads = intents_of(&h, &course.id, IntentKind::ImageUpload).await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].status, IntentStatus::Done.as_str());
    assert_eq!(uploads[0].remote_id.as_deref(), Some("obj-4"));
}

#[tokio::test]
async fn test_replacing_image_deletes_previous_after_commit() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;

    h.media.attach_image(&course.id, png_upload()).await.unwrap();
    let first = h.media.current_image_id(&course.id).await.unwrap().unwrap();
    h.media.attach_image(&course.id, png_upload()).await.unwrap();
    let second = h.media.current_image_id(&course.id).await.unwrap().unwrap();

    assert_ne!(first, second);
    assert!(!h.images.exists(&first));
    assert!(h.images.exists(&second));
    assert_eq!(h.images.calls_starting_with("create_folder:").len(), 3);
    assert_eq!(h.images.calls_starting_with("delete:"), vec![format!("delete:{}", first)]);

    let deletes = intents_of(&h, &course.id, IntentKind::DeleteImage).await;
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].status, IntentStatus::Done.as_str());
}

#[tokio::test]
async fn test_failed_publish_rolls_back_upload() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    *h.images.fail_make_public.lock().unwrap() =
        Some(ProviderError::permanent("fake-drive", "sharing disabled"));

    let err = h.media.attach_image(&course.id, png_upload()).await.unwrap_err();
    assert!(matches!(err, MediaError::Provider(ProviderError::Permanent { .. })));

    assert!(!h.images.exists("obj-4"));
    assert_eq!(h.images.calls_starting_with("delete:"), vec!["delete:obj-4"]);

    let course = Courses::find_by_id(&course.id).one(&h.db).await.unwrap().unwrap();
    assert!(course.image_url.is_none());
    assert!(h.media.current_image_id(&course.id).await.unwrap().is_none());

    let uploads = intents_of(&h, &course.id, IntentKind::ImageUpload).await;
    assert_eq!(uploads[0].status, IntentStatus::Failed.as_str());
}

#[tokio::test]
async fn test_failed_upload_leaves_existing_image() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    h.media.attach_image(&course.id, png_upload()).await.unwrap();
    *h.images.fail_upload.lock().unwrap() =
        Some(ProviderError::retryable("fake-drive", "HTTP 503"));

    let err = h.media.attach_image(&course.id, png_upload()).await.unwrap_err();
    assert!(matches!(err, MediaError::Provider(ProviderError::Retryable { .. })));
    assert_eq!(
        h.media.current_image_id(&course.id).await.unwrap().as_deref(),
        Some("obj-4")
    );
    assert!(h.images.exists("obj-4"));
}

#[tokio::test]
async fn test_delete_image_keeps_fields_when_remote_delete_fails() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    h.media.attach_image(&course.id, png_upload()).await.unwrap();
    *h.images.fail_delete.lock().unwrap() =
        Some(ProviderError::retryable("fake-drive", "HTTP 500"));

    assert!(h.media.delete_image(&course.id).await.is_err());

    let stored = Courses::find_by_id(&course.id).one(&h.db).await.unwrap().unwrap();
    assert!(stored.image_url.is_some());
    assert_eq!(
        h.media.current_image_id(&course.id).await.unwrap().as_deref(),
        Some("obj-4")
    );
}

#[tokio::test]
async fn test_delete_image_treats_missing_object_as_deleted() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    h.media.attach_image(&course.id, png_upload()).await.unwrap();
    h.images.forget("obj-4");

    let updated = h.media.delete_image(&course.id).await.unwrap();

    assert!(updated.image_url.is_none());
    assert!(updated.image_view_url.is_none());
    assert!(h.media.current_image_id(&course.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_pending_delete_is_completed_by_reconciler() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    h.media.attach_image(&course.id, png_upload()).await.unwrap();

    *h.images.fail_delete.lock().unwrap() =
        Some(ProviderError::retryable("fake-drive", "HTTP 503"));
    h.media.attach_image(&course.id, png_upload()).await.unwrap();

    assert!(h.images.exists("obj-4"));
    let deletes = intents_of(&h, &course.id, IntentKind::DeleteImage).await;
    assert_eq!(deletes[0].status, IntentStatus::Pending.as_str());
    assert_eq!(deletes[0].attempts, 1);

    *h.images.fail_delete.lock().unwrap() = None;
    let stats = reconciler(&h).run_once().await.unwrap();

    assert_eq!(stats.deletes_completed, 1);
    assert_eq!(stats.deletes_pending, 0);
    assert!(!h.images.exists("obj-4"));
    let deletes = intents_of(&h, &course.id, IntentKind::DeleteImage).await;
    assert_eq!(deletes[0].status, IntentStatus::Done.as_str());
}

#[tokio::test]
async fn test_delete_intent_gives_up_after_max_attempts() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    h.media.attach_image(&course.id, png_upload()).await.unwrap();
    *h.images.fail_delete.lock().unwrap() =
        Some(ProviderError::retryable("fake-drive", "HTTP 503"));
    h.media.attach_image(&course.id, png_upload()).await.unwrap();

    let reconciler = reconciler(&h);
    for _ in 0..h.config.reconcile_max_attempts {
        reconciler.run_once().await.unwrap();
    }

    let deletes = intents_of(&h, &course.id, IntentKind::DeleteImage).await;
    assert_eq!(deletes[0].status, IntentStatus::Failed.as_str());
    assert_eq!(deletes[0].attempts, h.config.reconcile_max_attempts);

    let stats = reconciler.run_once().await.unwrap();
    assert_eq!(stats.deletes_pending, 0);
}

#[tokio::test]
async fn test_reconciler_clears_dangling_image_reference() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    h.media.attach_image(&course.id, png_upload()).await.unwrap();
    h.images.forget("obj-4");

    let stats = reconciler(&h).run_once().await.unwrap();

    assert_eq!(stats.references_cleared, 1);
    let stored = Courses::find_by_id(&course.id).one(&h.db).await.unwrap().unwrap();
    assert!(stored.image_url.is_none());
    assert!(h.media.current_image_id(&course.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_image_replacements_converge() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;

    let (a, b) = tokio::join!(
        h.media.attach_image(&course.id, png_upload()),
        h.media.attach_image(&course.id, png_upload()),
    );
    a.unwrap();
    b.unwrap();

    let current = h.media.current_image_id(&course.id).await.unwrap().unwrap();
    assert!(h.images.exists(&current));

    let uploads = h.images.calls_starting_with("upload:");
    let deletes = h.images.calls_starting_with("delete:");
    assert_eq!(uploads.len(), 2);
    assert_eq!(deletes.len(), 1);
    assert_ne!(deletes[0], format!("delete:{}", current));

    // Only one course folder and one images folder were created.
    assert_eq!(h.images.calls_starting_with("create_folder:").len(), 3);
}

#[tokio::test]
async fn test_attach_video_stores_id_and_thumbnail() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;

    let updated = h.media.attach_video(&course.id, mp4_video(&h.media).await).await.unwrap();

    assert_eq!(updated.video_url.as_deref(), Some("https://vimeo.com/1001"));
    assert_eq!(
        updated.video_thumbnail_url.as_deref(),
        Some("https://i.vimeocdn.com/video/1001_1280x720")
    );
    assert_eq!(
        h.videos.calls(),
        vec!["upload:Rust Basics", "transfer:1001", "fetch:1001"]
    );
    assert_eq!(h.videos.live_videos(), vec![1001]);
}

#[tokio::test]
async fn test_video_replacement_failure_keeps_single_live_video() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    h.media.attach_video(&course.id, mp4_video(&h.media).await).await.unwrap();

    *h.videos.fail_fetch.lock().unwrap() =
        Some(ProviderError::retryable("fake-vimeo", "HTTP 502"));
    let err = h.media.attach_video(&course.id, mp4_video(&h.media).await).await.unwrap_err();
    assert!(matches!(err, MediaError::Provider(_)));

    assert_eq!(h.videos.live_videos(), vec![1001]);
    let stored = Courses::find_by_id(&course.id).one(&h.db).await.unwrap().unwrap();
    assert_eq!(stored.video_url.as_deref(), Some("https://vimeo.com/1001"));

    *h.videos.fail_fetch.lock().unwrap() = None;
    h.media.attach_video(&course.id, mp4_video(&h.media).await).await.unwrap();
    assert_eq!(h.videos.live_videos(), vec![1003]);
}

#[tokio::test]
async fn test_legacy_video_link_is_deleted_by_parsed_id() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    h.videos.insert(555);
    let mut active: lms_backend::entities::courses::ActiveModel = course.clone().into();
    active.video_url = Set(Some("https://vimeo.com/555/abcdef".to_string()));
    active.update(&h.db).await.unwrap();

    let updated = h.media.delete_video(&course.id).await.unwrap();

    assert!(updated.video_url.is_none());
    assert_eq!(h.videos.calls(), vec!["delete:555"]);
    assert!(h.videos.live_videos().is_empty());
}

#[tokio::test]
async fn test_course_resources_deleted_exactly_once() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    h.media.attach_image(&course.id, png_upload()).await.unwrap();
    h.media.attach_video(&course.id, mp4_video(&h.media).await).await.unwrap();

    let report = h.media.delete_course_resources(&course.id).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.completed, vec!["1001", "obj-4", "obj-2"]);
    assert_eq!(h.images.calls_starting_with("delete:obj-4").len(), 1);
    assert!(!h.images.exists("obj-2"));
    assert!(h.videos.live_videos().is_empty());
}

#[tokio::test]
async fn test_failed_course_cleanup_leaves_pending_markers() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    h.media.attach_image(&course.id, png_upload()).await.unwrap();
    *h.images.fail_delete.lock().unwrap() =
        Some(ProviderError::retryable("fake-drive", "HTTP 503"));

    let report = h.media.delete_course_resources(&course.id).await.unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.pending, vec!["obj-4", "obj-2"]);
    let pending = intents::pending(&h.db, &[IntentKind::DeleteImage, IntentKind::DeleteFolder])
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);

    *h.images.fail_delete.lock().unwrap() = None;
    let stats = reconciler(&h).run_once().await.unwrap();
    assert_eq!(stats.deletes_completed, 2);
    assert!(!h.images.exists("obj-4"));
    assert!(!h.images.exists("obj-2"));
}

#[tokio::test]
async fn test_stale_upload_removed_or_adopted() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    h.media.attach_image(&course.id, png_upload()).await.unwrap();

    let orphan = h
        .images
        .upload_object("orphan.png", "obj-3", Bytes::from_static(PNG), "image/png")
        .await
        .unwrap();
    let intent = intents::record(&h.db, &course.id, IntentKind::ImageUpload, None)
        .await
        .unwrap();
    let intent = intents::set_remote_id(&h.db, intent, &orphan.id).await.unwrap();
    assert_eq!(
        h.media.settle_stale_upload(intent).await.unwrap(),
        StaleUpload::Removed
    );
    assert!(!h.images.exists(&orphan.id));

    let intent = intents::record(&h.db, &course.id, IntentKind::ImageUpload, Some("obj-4"))
        .await
        .unwrap();
    assert_eq!(
        h.media.settle_stale_upload(intent).await.unwrap(),
        StaleUpload::Adopted
    );
    assert!(h.images.exists("obj-4"));
}

#[tokio::test]
async fn test_attach_to_missing_course_is_precondition_failure() {
    let h = harness().await;

    let err = h.media.attach_image("no-such-course", png_upload()).await.unwrap_err();

    assert!(matches!(err, MediaError::PreconditionFailed(_)));
    assert!(h.images.calls().is_empty());
}

#[tokio::test]
async fn test_disguised_upload_is_rejected_before_any_remote_call() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    let upload = MediaUpload {
        filename: "cover.png".to_string(),
        content_type: Some("image/png".to_string()),
        data: Bytes::from_static(b"%PDF-1.4 not really a picture"),
    };

    let err = h.media.attach_image(&course.id, upload).await.unwrap_err();

    match err {
        MediaError::InvalidFile(e) => assert_eq!(e.code, "CONTENT_MISMATCH"),
        other => panic!("unexpected error: {}", other),
    }
    assert!(h.images.calls().is_empty());

    let err = spool_video(&h.media, "cover.png", Some("image/png"), PNG)
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::InvalidFile(_)));
    assert!(h.videos.calls().is_empty());
}

#[tokio::test]
async fn test_video_spool_keeps_bytes_until_dropped() {
    let h = harness().await;

    let video = mp4_video(&h.media).await;

    assert_eq!(video.mime, "video/mp4");
    assert_eq!(video.size, MP4.len() as u64);
    assert_eq!(std::fs::read(video.path()).unwrap(), MP4);
    let path = video.path().to_path_buf();
    drop(video);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_video_spool_refuses_oversized_stream_early() {
    let h = harness().await;
    let mut spool = h
        .media
        .begin_video_spool("long.mp4", Some("video/mp4"))
        .await
        .unwrap();
    spool.write_chunk(MP4).await.unwrap();

    let err = spool
        .write_chunk(&vec![0u8; h.config.max_video_size])
        .await
        .unwrap_err();

    match err {
        MediaError::InvalidFile(e) => assert_eq!(e.code, "FILE_TOO_LARGE"),
        other => panic!("unexpected error: {}", other),
    }

    let empty = h.media.begin_video_spool("none.mp4", None).await.unwrap();
    assert!(empty.is_empty());
    match empty.finish().await.unwrap_err() {
        MediaError::InvalidFile(e) => assert_eq!(e.code, "EMPTY_FILE"),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_failed_video_transfer_removes_created_video() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    *h.videos.fail_transfer.lock().unwrap() =
        Some(ProviderError::retryable("fake-vimeo", "HTTP 500"));

    let err = h
        .media
        .attach_video(&course.id, mp4_video(&h.media).await)
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::Provider(ProviderError::Retryable { .. })));
    assert_eq!(
        h.videos.calls(),
        vec!["upload:Rust Basics", "transfer:1001", "delete:1001"]
    );
    assert!(h.videos.live_videos().is_empty());
    let uploads = intents_of(&h, &course.id, IntentKind::VideoUpload).await;
    assert_eq!(uploads[0].remote_id.as_deref(), Some("1001"));
    assert_eq!(uploads[0].status, IntentStatus::Failed.as_str());
}

#[tokio::test]
async fn test_media_operations_run_on_spawned_tasks() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    let video = mp4_video(&h.media).await;

    let media = h.media.clone();
    let course_id = course.id.clone();
    let updated = tokio::spawn(async move {
        media.attach_image(&course_id, png_upload()).await?;
        media.attach_video(&course_id, video).await
    })
    .await
    .unwrap()
    .unwrap();

    assert!(updated.image_url.is_some());
    assert_eq!(updated.video_url.as_deref(), Some("https://vimeo.com/1001"));
}

#[tokio::test]
async fn test_unrecorded_upload_is_deleted_again() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    *h.images.break_intents_on_upload.lock().unwrap() = Some(h.db.clone());

    let err = h.media.attach_image(&course.id, png_upload()).await.unwrap_err();

    assert!(matches!(err, MediaError::Database(_)));
    assert_eq!(h.images.calls_starting_with("delete:"), vec!["delete:obj-4"]);
    assert!(!h.images.exists("obj-4"));
    assert!(h.media.current_image_id(&course.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_upload_error_survives_failed_bookkeeping() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    *h.images.break_intents_on_upload.lock().unwrap() = Some(h.db.clone());
    *h.images.fail_upload.lock().unwrap() =
        Some(ProviderError::retryable("fake-drive", "HTTP 503"));

    let err = h.media.attach_image(&course.id, png_upload()).await.unwrap_err();

    assert!(matches!(err, MediaError::Provider(ProviderError::Retryable { .. })));
}

#[tokio::test]
async fn test_unresolvable_video_link_is_reported_on_cleanup() {
    let h = harness().await;
    let course = insert_course(&h.db, "Rust Basics").await;
    h.media.attach_image(&course.id, png_upload()).await.unwrap();
    let mut active: lms_backend::entities::courses::ActiveModel = course.clone().into();
    active.video_url = Set(Some("https://vimeo.com/channels/staff".to_string()));
    active.update(&h.db).await.unwrap();

    let report = h.media.delete_course_resources(&course.id).await.unwrap();

    assert_eq!(report.completed, vec!["obj-4", "obj-2"]);
    assert_eq!(report.pending, vec!["https://vimeo.com/channels/staff"]);
    assert!(h.videos.calls().is_empty());

    let videos = intents_of(&h, &course.id, IntentKind::DeleteVideo).await;
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].status, IntentStatus::Failed.as_str());
    assert!(videos[0].remote_id.is_none());
    assert!(
        videos[0]
            .last_error
            .as_deref()
            .unwrap()
            .contains("https://vimeo.com/channels/staff")
    );
}
