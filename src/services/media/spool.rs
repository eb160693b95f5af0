use super::{MediaCoordinator, MediaError};
use crate::utils::validation::{MediaRules, validate_content, validate_file_size};
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

/// Leading bytes kept for content sniffing.
const SNIFF_LEN: usize = 8192;

/// A course video being received straight into a scratch file.
///
/// The type is checked as soon as enough leading bytes have arrived and the
/// size on every chunk, so an oversized or disguised upload is refused
/// without reading the rest of it. Dropping the spool removes the file.
pub struct VideoSpool {
    rules: MediaRules,
    filename: String,
    content_type: Option<String>,
    scratch: NamedTempFile,
    writer: tokio::fs::File,
    header: Vec<u8>,
    mime: Option<String>,
    size: u64,
}

/// A fully received and validated course video.
#[derive(Debug)]
pub struct SpooledVideo {
    pub filename: String,
    pub mime: String,
    pub size: u64,
    scratch: NamedTempFile,
}

impl SpooledVideo {
    pub fn path(&self) -> &Path {
        self.scratch.path()
    }
}

impl MediaCoordinator {
    /// Opens a scratch file under `media_scratch_dir` for an incoming video.
    pub async fn begin_video_spool(
        &self,
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<VideoSpool, MediaError> {
        tokio::fs::create_dir_all(&self.config.media_scratch_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("course-video-")
            .tempfile_in(&self.config.media_scratch_dir)?;
        let writer = tokio::fs::File::from_std(scratch.reopen()?);

        Ok(VideoSpool {
            rules: MediaRules::video(&self.config),
            filename: filename.to_string(),
            content_type: content_type.map(str::to_string),
            scratch,
            writer,
            header: Vec::new(),
            mime: None,
            size: 0,
        })
    }
}

impl VideoSpool {
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), MediaError> {
        if chunk.is_empty() {
            return Ok(());
        }

        self.size += chunk.len() as u64;
        validate_file_size(
            usize::try_from(self.size).unwrap_or(usize::MAX),
            self.rules.max_file_size,
        )?;

        if self.mime.is_none() {
            let wanted = SNIFF_LEN - self.header.len();
            self.header
                .extend_from_slice(&chunk[..chunk.len().min(wanted)]);
            if self.header.len() >= SNIFF_LEN {
                self.mime = Some(self.check_type()?);
            }
        }

        self.writer.write_all(chunk).await?;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<SpooledVideo, MediaError> {
        validate_file_size(
            usize::try_from(self.size).unwrap_or(usize::MAX),
            self.rules.max_file_size,
        )?;
        let mime = match self.mime.take() {
            Some(mime) => mime,
            None => self.check_type()?,
        };
        self.writer.flush().await?;

        tracing::debug!(
            "Spooled video '{}' ({} bytes, {}) to {}",
            self.filename,
            self.size,
            mime,
            self.scratch.path().display()
        );
        Ok(SpooledVideo {
            filename: self.filename,
            mime,
            size: self.size,
            scratch: self.scratch,
        })
    }

    fn check_type(&self) -> Result<String, MediaError> {
        Ok(validate_content(
            &self.header,
            self.content_type.as_deref(),
            &self.rules,
        )?)
    }
}
