use std::env;
use std::path::PathBuf;

/// Runtime configuration for the LMS backend
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// JWT Secret Key (Required in production)
    pub jwt_secret: String,

    /// Access token lifetime in hours (default: 24)
    pub jwt_ttl_hours: i64,

    /// Password reset token lifetime in minutes (default: 60)
    pub reset_token_ttl_minutes: i64,

    /// Domain used when building password reset links
    pub frontend_domain: String,

    /// Google service account credentials file
    pub google_credentials_file: PathBuf,

    /// OAuth scopes requested for the Drive service account
    pub google_drive_scopes: Vec<String>,

    /// Shared Drive folder holding one subfolder per course
    pub drive_root_folder_name: String,

    /// Drive metadata API base (overridable for tests)
    pub drive_api_base: String,

    /// Drive upload API base (overridable for tests)
    pub drive_upload_base: String,

    /// Vimeo personal access token
    pub vimeo_access_token: Option<String>,

    /// Vimeo API base (overridable for tests)
    pub vimeo_api_base: String,

    /// Accepted course image MIME types
    pub allowed_image_types: Vec<String>,

    /// Accepted course video MIME types
    pub allowed_video_types: Vec<String>,

    /// Maximum course image size in bytes (default: 10 MB)
    pub max_image_size: usize,

    /// Maximum course video size in bytes (default: 500 MB)
    pub max_video_size: usize,

    /// Where video uploads are spooled before transfer (default: system temp dir)
    pub media_scratch_dir: PathBuf,

    /// Seconds between reconciliation passes (default: 300)
    pub reconcile_interval_secs: u64,

    /// Delete attempts before an intent is marked failed (default: 10)
    pub reconcile_max_attempts: i32,

    /// Age after which an unfinished upload intent is considered abandoned (default: 1 hour)
    pub upload_intent_grace_secs: i64,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "secret".to_string(),
            jwt_ttl_hours: 24,
            reset_token_ttl_minutes: 60,
            frontend_domain: "localhost:5173".to_string(),
            google_credentials_file: PathBuf::from("credentials.json"),
            google_drive_scopes: vec![
                "https://www.googleapis.com/auth/drive.file".to_string(),
                "https://www.googleapis.com/auth/drive.metadata.readonly".to_string(),
            ],
            drive_root_folder_name: "LMS Course Materials".to_string(),
            drive_api_base: "https://www.googleapis.com".to_string(),
            drive_upload_base: "https://www.googleapis.com".to_string(),
            vimeo_access_token: None,
            vimeo_api_base: "https://api.vimeo.com".to_string(),
            allowed_image_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/gif".to_string(),
                "image/webp".to_string(),
            ],
            allowed_video_types: vec![
                "video/mp4".to_string(),
                "video/quicktime".to_string(),
                "video/x-msvideo".to_string(),
                "video/webm".to_string(),
            ],
            max_image_size: 10 * 1024 * 1024,  // 10 MB
            max_video_size: 500 * 1024 * 1024, // 500 MB
            media_scratch_dir: env::temp_dir(),
            reconcile_interval_secs: 300,
            reconcile_max_attempts: 10,
            upload_intent_grace_secs: 3600,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

fn list_var(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret), // Fallback for dev convenience, strictly enforced in production method
            jwt_ttl_hours: parsed_var("JWT_TTL_HOURS").unwrap_or(default.jwt_ttl_hours),
            reset_token_ttl_minutes: parsed_var("RESET_TOKEN_TTL_MINUTES")
                .unwrap_or(default.reset_token_ttl_minutes),
            frontend_domain: env::var("FRONTEND_DOMAIN").unwrap_or(default.frontend_domain),
            google_credentials_file: env::var("GOOGLE_CREDENTIALS_FILE")
                .map(PathBuf::from)
                .unwrap_or(default.google_credentials_file),
            google_drive_scopes: env::var("GOOGLE_DRIVE_SCOPES")
                .ok()
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or(default.google_drive_scopes),
            drive_root_folder_name: env::var("DRIVE_ROOT_FOLDER_NAME")
                .unwrap_or(default.drive_root_folder_name),
            drive_api_base: env::var("DRIVE_API_BASE").unwrap_or(default.drive_api_base),
            drive_upload_base: env::var("DRIVE_UPLOAD_BASE").unwrap_or(default.drive_upload_base),
            vimeo_access_token: env::var("VIMEO_ACCESS_TOKEN").ok(),
            vimeo_api_base: env::var("VIMEO_API_BASE").unwrap_or(default.vimeo_api_base),
            allowed_image_types: list_var("ALLOWED_IMAGE_TYPES")
                .unwrap_or(default.allowed_image_types),
            allowed_video_types: list_var("ALLOWED_VIDEO_TYPES")
                .unwrap_or(default.allowed_video_types),
            max_image_size: parsed_var("MAX_IMAGE_SIZE").unwrap_or(default.max_image_size),
            max_video_size: parsed_var("MAX_VIDEO_SIZE").unwrap_or(default.max_video_size),
            media_scratch_dir: env::var("MEDIA_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.media_scratch_dir),
            reconcile_interval_secs: parsed_var("RECONCILE_INTERVAL_SECS")
                .unwrap_or(default.reconcile_interval_secs),
            reconcile_max_attempts: parsed_var("RECONCILE_MAX_ATTEMPTS")
                .unwrap_or(default.reconcile_max_attempts),
            upload_intent_grace_secs: parsed_var("UPLOAD_INTENT_GRACE_SECS")
                .unwrap_or(default.upload_intent_grace_secs),
            allowed_origins: list_var("ALLOWED_ORIGINS").unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (small limits, fast reconciliation)
    pub fn development() -> Self {
        Self {
            max_video_size: 50 * 1024 * 1024,
            reconcile_interval_secs: 10,
            upload_intent_grace_secs: 60,
            ..Self::default()
        }
    }

    /// Create config for production (strict security)
    pub fn production() -> anyhow::Result<Self> {
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("CRITICAL: JWT_SECRET must be set"))?;
        let config = Self {
            jwt_secret,
            ..Self::from_env()
        };
        if config.vimeo_access_token.is_none() {
            anyhow::bail!("CRITICAL: VIMEO_ACCESS_TOKEN must be set");
        }
        Ok(config)
    }
}
