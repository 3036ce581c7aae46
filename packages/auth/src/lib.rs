// ABOUTME: Token and credential primitives: JWT access tokens and Argon2 hashing
// ABOUTME: The HTTP layer owns extraction; this package owns the cryptography

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
pub use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const DEFAULT_SECRET: &str = "change-me-in-production";
const DEFAULT_EXPIRE_MINUTES: i64 = 1440;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Token encoding failed: {0}")]
    Encode(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// JWT claims carried by an access token. `sub` is the user ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

impl Claims {
    /// The user ID the token was issued for, when well-formed
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Signing configuration, sourced from the environment
#[derive(Clone)]
pub struct AuthConfig {
    secret: String,
    algorithm: Algorithm,
    expire_minutes: i64,
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>, algorithm: Algorithm, expire_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            algorithm,
            expire_minutes,
        }
    }

    /// Read `JWT_SECRET_KEY`, `JWT_ALGORITHM` (default HS256), and
    /// `JWT_ACCESS_TOKEN_EXPIRE_MINUTES` (default 1440)
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET_KEY").unwrap_or_else(|_| {
            warn!("JWT_SECRET_KEY not set; using the insecure default");
            DEFAULT_SECRET.to_string()
        });

        let algorithm = std::env::var("JWT_ALGORITHM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Algorithm::HS256);

        let expire_minutes = std::env::var("JWT_ACCESS_TOKEN_EXPIRE_MINUTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EXPIRE_MINUTES);

        Self::new(secret, algorithm, expire_minutes)
    }

    /// Issue an access token for a user
    pub fn create_access_token(&self, user_id: i64) -> Result<String> {
        let exp = Utc::now() + Duration::minutes(self.expire_minutes);
        let claims = Claims {
            sub: user_id.to_string(),
            exp: exp.timestamp() as usize,
        };

        encode(
            &Header::new(self.algorithm),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Encode(e.to_string()))
    }

    /// Validate a token's signature and expiry, returning its claims
    pub fn decode_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(self.algorithm),
        )
        .map(|data| data.claims)
        .map_err(|_| AuthError::InvalidToken)
    }
}

/// Hash a password with Argon2 and a fresh salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Constant-time verification of a password against a stored hash
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
