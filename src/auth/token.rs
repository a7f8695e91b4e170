use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Claims encoded within an access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject of the token: the owning user's username.
    pub sub: String,
    /// Expiration timestamp (seconds since epoch).
    pub exp: usize,
}

/// Issues and verifies HS256-signed, time-limited access tokens.
///
/// Constructed once from [`crate::config::Config`] and shared between the
/// login routes and `AuthMiddleware`. The signing secret lives inside the
/// service; call sites never touch process environment. Expiry is the only
/// invalidation mechanism: there is no revocation list and no refresh tokens.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_minutes: i64,
}

impl TokenService {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_minutes,
        }
    }

    /// Signs a new token for `username`, expiring after the configured TTL.
    pub fn issue(&self, username: &str) -> Result<String, AppError> {
        let expiration = Utc::now()
            .checked_add_signed(chrono::Duration::minutes(self.ttl_minutes))
            .expect("valid timestamp")
            .timestamp() as usize;

        let claims = Claims {
            sub: username.to_string(),
            exp: expiration,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Verifies a token string and decodes its claims.
    ///
    /// Fails with `AppError::Forbidden` if the token is malformed, its
    /// signature does not match, or it has expired.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::Forbidden("Could not validate credentials".into()))
    }
}
