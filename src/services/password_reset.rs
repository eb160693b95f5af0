use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::entities::{prelude::*, *};
use crate::utils::auth::{
    ResetTokenError, create_reset_token, hash_password, validate_reset_token,
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;

/// Delivers password reset links to users.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_reset_link(&self, user: &users::Model, link: &str) -> anyhow::Result<()>;
}

/// Writes the link to the log; used until a mail transport is configured.
pub struct LogNotifier;

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_reset_link(&self, user: &users::Model, link: &str) -> anyhow::Result<()> {
        tracing::info!("✉️ Password reset link for {}: {}", user.email, link);
        Ok(())
    }
}

pub fn reset_link(frontend_domain: &str, token: &str) -> String {
    let domain = frontend_domain.trim_end_matches('/');
    if domain.starts_with("http://") || domain.starts_with("https://") {
        format!("{}/reset-password/{}", domain, token)
    } else {
        format!("http://{}/reset-password/{}", domain, token)
    }
}

pub struct PasswordResetService {
    db: DatabaseConnection,
    config: AppConfig,
    notifier: Arc<dyn ResetNotifier>,
}

impl PasswordResetService {
    pub fn new(db: DatabaseConnection, config: AppConfig, notifier: Arc<dyn ResetNotifier>) -> Self {
        Self {
            db,
            config,
            notifier,
        }
    }

    /// Issues a reset token for the account and hands the link to the notifier.
    pub async fn request(&self, email: &str) -> Result<(), AppError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::BadRequest("Email is required".to_string()));
        }

        let user = Users::find()
            .filter(users::Column::Email.eq(email.to_lowercase()))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User with this email does not exist".to_string()))?;

        let token = create_reset_token(
            &user.id,
            &self.config.jwt_secret,
            self.config.reset_token_ttl_minutes,
        )?;
        let link = reset_link(&self.config.frontend_domain, &token);
        self.notifier
            .send_reset_link(&user, &link)
            .await
            .map_err(|e| AppError::Internal(format!("reset notification failed: {}", e)))?;

        tracing::info!("🔑 Password reset requested for user {}", user.id);
        Ok(())
    }

    pub async fn confirm(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        if token.trim().is_empty() || new_password.is_empty() {
            return Err(AppError::BadRequest("Missing required fields".to_string()));
        }

        let user_id = validate_reset_token(token, &self.config.jwt_secret).map_err(|e| match e {
            ResetTokenError::Expired => AppError::BadRequest("Reset link has expired".to_string()),
            ResetTokenError::Invalid => AppError::BadRequest("Invalid reset link".to_string()),
        })?;

        let user = Users::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::BadRequest("Invalid reset link".to_string()))?;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(hash_password(new_password)?);
        active.updated_at = Set(Utc::now());
        let user = active.update(&self.db).await?;

        tracing::info!("🔑 Password reset completed for user {}", user.id);
        Ok(())
    }
}
