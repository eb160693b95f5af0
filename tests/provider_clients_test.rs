mod common;

use bytes::Bytes;
use common::*;
use lms_backend::models::{IntentKind, IntentStatus};
use lms_backend::services::image_store::credentials::StaticToken;
use lms_backend::services::image_store::{GoogleDriveStore, ImageStore, direct_view_url};
use lms_backend::services::media::{MediaCoordinator, MediaError, StaleUpload, intents};
use lms_backend::services::remote::ProviderError;
use lms_backend::services::video_host::{VideoHost, VimeoHost};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn drive(server: &MockServer) -> GoogleDriveStore {
    GoogleDriveStore::new(
        reqwest::Client::new(),
        Arc::new(StaticToken("drive-token".to_string())),
        server.uri(),
        server.uri(),
    )
}

fn vimeo(server: &MockServer) -> VimeoHost {
    VimeoHost::new(reqwest::Client::new(), "vimeo-token", server.uri())
}

#[tokio::test]
async fn test_drive_find_folder_by_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(header("authorization", "Bearer drive-token"))
        .and(query_param(
            "q",
            "name = 'LMS Course Materials' and mimeType = 'application/vnd.google-apps.folder' and trashed = false",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": "root-1", "name": "LMS Course Materials" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let found = drive(&server)
        .find_folder("LMS Course Materials", None)
        .await
        .unwrap();

    assert_eq!(found.as_deref(), Some("root-1"));
}

#[tokio::test]
async fn test_drive_list_children_follows_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": "b", "name": "b.png", "mimeType": "image/png", "parents": ["folder"] }]
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": "a", "name": "a.png", "mimeType": "image/png", "parents": ["folder"] }],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;

    let children = drive(&server).list_children("folder").await.unwrap();

    let ids: Vec<&str> = children.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(children[0].parent_id.as_deref(), Some("folder"));
}

#[tokio::test]
async fn test_drive_resumable_upload() {
    let server = MockServer::start().await;
    let session = format!("{}/upload-session/abc", server.uri());
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "resumable"))
        .and(header("x-upload-content-type", "image/png"))
        .and(body_partial_json(json!({ "name": "Rust_image.png", "parents": ["images-1"] })))
        .respond_with(ResponseTemplate::new(200).insert_header("Location", session.as_str()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload-session/abc"))
        .and(header("content-type", "image/png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file-9",
            "name": "Rust_image.png",
            "mimeType": "image/png",
            "webContentLink": "https://drive.google.com/uc?id=file-9&export=download",
            "parents": ["images-1"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let object = drive(&server)
        .upload_object(
            "Rust_image.png",
            "images-1",
            Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
            "image/png",
        )
        .await
        .unwrap();

    assert_eq!(object.id, "file-9");
    assert_eq!(
        direct_view_url(&object),
        "https://drive.google.com/uc?id=file-9&export=view"
    );
}

#[tokio::test]
async fn test_drive_make_public_grants_anyone_reader() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files/file-9/permissions"))
        .and(body_partial_json(json!({ "type": "anyone", "role": "reader" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "perm-1" })))
        .expect(1)
        .mount(&server)
        .await;

    drive(&server).make_public("file-9").await.unwrap();
}

#[tokio::test]
async fn test_drive_delete_errors_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/busy"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend error"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/locked"))
        .respond_with(ResponseTemplate::new(403).set_body_string("insufficient permissions"))
        .mount(&server)
        .await;

    let store = drive(&server);
    assert!(store.delete_object("gone").await.unwrap_err().is_not_found());
    assert!(store.delete_object("busy").await.unwrap_err().is_retryable());
    assert!(matches!(
        store.delete_object("locked").await.unwrap_err(),
        ProviderError::Permanent { .. }
    ));
}

#[tokio::test]
async fn test_drive_object_exists() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "live", "trashed": false })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/trashed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "trashed", "trashed": true })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = drive(&server);
    assert!(store.object_exists("live").await.unwrap());
    assert!(!store.object_exists("trashed").await.unwrap());
    assert!(!store.object_exists("missing").await.unwrap());
}

fn scratch_video(contents: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_vimeo_tus_upload() {
    let server = MockServer::start().await;
    let contents = b"not really a video but long enough";
    Mock::given(method("POST"))
        .and(path("/me/videos"))
        .and(header("authorization", "bearer vimeo-token"))
        .and(body_partial_json(json!({
            "upload": { "approach": "tus", "size": contents.len() },
            "name": "Rust Basics",
            "description": "An introduction"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "uri": "/videos/76979871",
            "upload": { "upload_link": format!("{}/tus/abc", server.uri()) }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/tus/abc"))
        .and(header("tus-resumable", "1.0.0"))
        .and(header("upload-offset", "0"))
        .respond_with(
            ResponseTemplate::new(204).insert_header("Upload-Offset", contents.len().to_string()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let host = vimeo(&server);
    let file = scratch_video(contents);
    let ticket = host
        .create_upload(contents.len() as u64, "Rust Basics", "An introduction")
        .await
        .unwrap();
    assert_eq!(ticket.video_id, 76979871);

    host.transfer(&ticket, file.path()).await.unwrap();
}

#[tokio::test]
async fn test_vimeo_short_transfer_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/videos"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "uri": "/videos/555",
            "upload": { "upload_link": format!("{}/tus/short", server.uri()) }
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/tus/short"))
        .respond_with(ResponseTemplate::new(204).insert_header("Upload-Offset", "3"))
        .mount(&server)
        .await;

    let host = vimeo(&server);
    let file = scratch_video(b"partial");
    let ticket = host.create_upload(7, "Rust Basics", "").await.unwrap();
    let err = host.transfer(&ticket, file.path()).await.unwrap_err();

    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_failed_vimeo_transfer_leaves_video_id_on_intent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/videos"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "uri": "/videos/555",
            "upload": { "upload_link": format!("{}/tus/broken", server.uri()) }
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/tus/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/videos/555"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/videos/555"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let db = setup_db().await;
    let media = MediaCoordinator::new(
        db.clone(),
        Arc::new(FakeImageStore::default()),
        Arc::new(vimeo(&server)),
        test_config(),
    );
    let course = insert_course(&db, "Rust Basics").await;

    let video = mp4_video(&media).await;
    let err = media.attach_video(&course.id, video).await.unwrap_err();
    assert!(matches!(err, MediaError::Provider(ProviderError::Retryable { .. })));

    // The placeholder survived the rollback, so its id must stay reachable.
    let recorded = intents::for_course(&db, &course.id).await.unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].kind, IntentKind::VideoUpload.as_str());
    assert_eq!(recorded[0].status, IntentStatus::Pending.as_str());
    assert_eq!(recorded[0].remote_id.as_deref(), Some("555"));

    let outcome = media.settle_stale_upload(recorded[0].clone()).await.unwrap();
    assert_eq!(outcome, StaleUpload::Removed);
}

#[tokio::test]
async fn test_vimeo_fetch_picks_largest_thumbnail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uri": "/videos/42",
            "link": "https://vimeo.com/42",
            "pictures": { "sizes": [
                { "width": 100, "link": "https://i.vimeocdn.com/video/42_100x75" },
                { "width": 1920, "link": "https://i.vimeocdn.com/video/42_1920x1080" }
            ] }
        })))
        .mount(&server)
        .await;

    let metadata = vimeo(&server).fetch(42).await.unwrap();

    assert_eq!(metadata.link, "https://vimeo.com/42");
    assert_eq!(
        metadata.thumbnail_url.as_deref(),
        Some("https://i.vimeocdn.com/video/42_1920x1080")
    );
}

#[tokio::test]
async fn test_vimeo_missing_video() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos/7"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/videos/7"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let host = vimeo(&server);
    assert!(!host.exists(7).await.unwrap());
    assert!(host.delete(7).await.unwrap_err().is_not_found());
}
