use crate::config::AppConfig;
use std::path::Path;

/// Upload rules for one media kind.
#[derive(Debug, Clone)]
pub struct MediaRules {
    pub kind: &'static str,
    pub allowed_mimes: Vec<String>,
    pub max_file_size: usize,
}

impl MediaRules {
    pub fn image(config: &AppConfig) -> Self {
        Self {
            kind: "image",
            allowed_mimes: config.allowed_image_types.clone(),
            max_file_size: config.max_image_size,
        }
    }

    pub fn video(config: &AppConfig) -> Self {
        Self {
            kind: "video",
            allowed_mimes: config.allowed_video_types.clone(),
            max_file_size: config.max_video_size,
        }
    }

    fn allows(&self, mime: &str) -> bool {
        self.allowed_mimes.iter().any(|allowed| allowed == mime)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError {
            code: "EMPTY_FILE",
            message: "Uploaded file is empty".to_string(),
        });
    }
    if size > max_size {
        return Err(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
                size,
                max_size,
                max_size / 1024 / 1024
            ),
        });
    }
    Ok(())
}

/// Lowercases, strips parameters and maps common browser aliases.
pub fn normalize_mime(content_type: &str) -> String {
    let normalized = match content_type.trim().parse::<mime::Mime>() {
        Ok(m) => m.essence_str().to_lowercase(),
        Err(_) => content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase(),
    };

    match normalized.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "video/mov" => "video/quicktime".to_string(),
        "video/m4v" | "video/x-m4v" => "video/mp4".to_string(),
        "video/avi" | "video/msvideo" => "video/x-msvideo".to_string(),
        _ => normalized,
    }
}

/// Validates MIME type against allowlist
pub fn validate_mime_type(content_type: &str, rules: &MediaRules) -> Result<String, ValidationError> {
    let normalized = normalize_mime(content_type);
    if rules.allows(&normalized) {
        return Ok(normalized);
    }

    Err(ValidationError {
        code: "INVALID_MIME_TYPE",
        message: format!(
            "File type '{}' is not allowed for a course {}. Allowed: {}",
            content_type,
            rules.kind,
            rules.allowed_mimes.join(", ")
        ),
    })
}

/// Checks the declared type and the sniffed content of an upload and returns
/// the MIME type to store it under.
///
/// The sniffed type wins when it is recognized; a declared type alone is only
/// trusted when the content has no known signature.
pub fn validate_upload(
    data: &[u8],
    declared: Option<&str>,
    rules: &MediaRules,
) -> Result<String, ValidationError> {
    validate_file_size(data.len(), rules.max_file_size)?;
    validate_content(data, declared, rules)
}

/// Type check of `validate_upload` on the leading bytes of a file, for
/// uploads whose size is enforced while they stream.
pub fn validate_content(
    header: &[u8],
    declared: Option<&str>,
    rules: &MediaRules,
) -> Result<String, ValidationError> {
    let sniffed = infer::get(header).map(|t| normalize_mime(t.mime_type()));
    if let Some(declared) = declared {
        validate_mime_type(declared, rules)?;
    }

    match (sniffed, declared) {
        (Some(actual), _) => validate_mime_type(&actual, rules).map_err(|_| ValidationError {
            code: "CONTENT_MISMATCH",
            message: format!(
                "File content is {} which is not an allowed course {} type",
                actual, rules.kind
            ),
        }),
        (None, Some(declared)) => validate_mime_type(declared, rules),
        (None, None) => Err(ValidationError {
            code: "UNKNOWN_TYPE",
            message: format!("Could not determine the type of the course {}", rules.kind),
        }),
    }
}

/// Sanitizes filename to prevent path traversal and injection attacks
pub fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';')
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = sanitized.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    fn rules() -> MediaRules {
        MediaRules::image(&AppConfig::default())
    }

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(100, 200).is_ok());
        assert_eq!(validate_file_size(300, 200).unwrap_err().code, "FILE_TOO_LARGE");
        assert_eq!(validate_file_size(0, 200).unwrap_err().code, "EMPTY_FILE");
    }

    #[test]
    fn test_mime_normalization() {
        assert_eq!(normalize_mime("IMAGE/JPG; charset=binary"), "image/jpeg");
        assert_eq!(normalize_mime("video/mov"), "video/quicktime");
    }

    #[test]
    fn test_png_upload_accepted() {
        assert_eq!(validate_upload(PNG, Some("image/png"), &rules()).unwrap(), "image/png");
        assert_eq!(validate_upload(PNG, None, &rules()).unwrap(), "image/png");
    }

    #[test]
    fn test_disguised_content_rejected() {
        let pdf = b"%PDF-1.4 pretending to be an image";
        let err = validate_upload(pdf, Some("image/png"), &rules()).unwrap_err();
        assert_eq!(err.code, "CONTENT_MISMATCH");
    }

    #[test]
    fn test_disallowed_declared_type_rejected() {
        let err = validate_upload(PNG, Some("application/zip"), &rules()).unwrap_err();
        assert_eq!(err.code, "INVALID_MIME_TYPE");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("my:cover?.png"), "my_cover_.png");
        assert_eq!(sanitize_filename(".."), "upload");
    }
}
