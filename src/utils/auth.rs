use anyhow::{Result, anyhow};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

const RESET_PURPOSE: &str = "password_reset";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user_id
    pub role: Option<i32>,
    pub exp: usize,
    pub jti: String,
}

pub fn create_jwt(user_id: &str, role: Option<i32>, secret: &str, ttl_hours: i64) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or_else(|| anyhow!("token expiry out of range"))?
        .timestamp();

    let claims = Claims {
        sub: user_id.to_owned(),
        role,
        exp: expiration as usize,
        jti: uuid::Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok(token)
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    sub: String,
    purpose: String,
    exp: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTokenError {
    Expired,
    Invalid,
}

pub fn create_reset_token(user_id: &str, secret: &str, ttl_minutes: i64) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::minutes(ttl_minutes))
        .ok_or_else(|| anyhow!("token expiry out of range"))?
        .timestamp();

    let claims = ResetClaims {
        sub: user_id.to_owned(),
        purpose: RESET_PURPOSE.to_string(),
        exp: expiration as usize,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

/// Returns the user id a reset token was issued for.
pub fn validate_reset_token(token: &str, secret: &str) -> Result<String, ResetTokenError> {
    let mut validation = Validation::default();
    validation.leeway = 0;
    let data = decode::<ResetClaims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => ResetTokenError::Expired,
        _ => ResetTokenError::Invalid,
    })?;

    if data.claims.purpose != RESET_PURPOSE {
        return Err(ResetTokenError::Invalid);
    }
    Ok(data.claims.sub)
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow!("password hashing failed: {}", e))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_cycle() {
        let secret = "test_secret";
        let user_id = "user_123";
        let token = create_jwt(user_id, Some(2), secret, 24).unwrap();
        let claims = validate_jwt(&token, secret).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Some(2));
        assert!(validate_jwt(&token, "other_secret").is_err());
    }

    #[test]
    fn test_reset_token_cycle() {
        let token = create_reset_token("user_1", "s", 60).unwrap();
        assert_eq!(validate_reset_token(&token, "s"), Ok("user_1".to_string()));
        assert_eq!(validate_reset_token("garbage", "s"), Err(ResetTokenError::Invalid));
    }

    #[test]
    fn test_expired_reset_token() {
        let token = create_reset_token("user_1", "s", -5).unwrap();
        assert_eq!(validate_reset_token(&token, "s"), Err(ResetTokenError::Expired));
    }

    #[test]
    fn test_access_token_is_not_a_reset_token() {
        let token = create_jwt("user_1", None, "s", 1).unwrap();
        assert_eq!(validate_reset_token(&token, "s"), Err(ResetTokenError::Invalid));
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-hash"));
    }
}
