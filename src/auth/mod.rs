pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;

// Re-export necessary items
pub use extractors::CurrentUser;
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenService};

lazy_static! {
    // Usernames are letters and digits only; normalized to lowercase on
    // registration before any lookup or insert.
    static ref USERNAME_RE: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9]+$").unwrap();
}

/// Payload for both login endpoints (JSON body or form fields).
///
/// Carries no schema constraints: a credential that does not match simply
/// fails authentication.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Payload for a new user registration request.
///
/// Lengths and email syntax are enforced by the `Validate` derive (HTTP 422);
/// the username charset and password character-class rules are business
/// checks applied separately (HTTP 400).
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 100))]
    pub password: String,
    #[validate(length(max = 100))]
    pub full_name: Option<String>,
}

/// Response body for a successful login.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Rejects usernames containing anything other than letters and digits.
pub fn validate_username(username: &str) -> Result<(), AppError> {
    if !USERNAME_RE.is_match(username) {
        return Err(AppError::BadRequest(
            "Username must contain only letters and numbers".into(),
        ));
    }
    Ok(())
}

/// Password policy: at least one uppercase letter, one lowercase letter, and
/// one digit. Length bounds live on the request schema.
pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(AppError::BadRequest(
            "Password must contain at least one uppercase letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(AppError::BadRequest(
            "Password must contain at least one lowercase letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest(
            "Password must contain at least one digit".into(),
        ));
    }
    Ok(())
}
