pub mod course_service;
pub mod image_store;
pub mod media;
pub mod password_reset;
pub mod reconciler;
pub mod remote;
pub mod video_host;
