use crate::{
    auth::{
        hash_password, validate_password_strength, validate_username, verify_password,
        CurrentUser, LoginRequest, RegisterRequest, TokenResponse, TokenService,
    },
    error::AppError,
    models::User,
};
use actix_web::{get, post, web, HttpResponse, Responder};
use sqlx::PgPool;
use validator::Validate;

/// Register a new user
///
/// Validates the payload, normalizes the username to lowercase, rejects
/// duplicate email or username (email checked first), and stores the
/// bcrypt-hashed password. New accounts start active.
///
/// ## Responses:
/// - `201 Created`: the new user record (the password hash is never serialized).
/// - `400 Bad Request`: duplicate email/username, or a business-rule violation
///   (non-alphanumeric username, weak password).
/// - `422 Unprocessable Entity`: schema constraint violation (lengths, email syntax).
#[post("/register")]
pub async fn register(
    pool: web::Data<PgPool>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;
    validate_username(&register_data.username)?;
    validate_password_strength(&register_data.password)?;

    let username = register_data.username.to_lowercase();

    // Uniqueness checks, email first.
    let existing = sqlx::query_as::<_, (i32,)>("SELECT id FROM users WHERE email = $1")
        .bind(&register_data.email)
        .fetch_optional(&**pool)
        .await?;
    if existing.is_some() {
        return Err(AppError::Duplicate(
            "The user with this email already exists in the system".into(),
        ));
    }

    let existing = sqlx::query_as::<_, (i32,)>("SELECT id FROM users WHERE username = $1")
        .bind(&username)
        .fetch_optional(&**pool)
        .await?;
    if existing.is_some() {
        return Err(AppError::Duplicate(
            "The user with this username already exists in the system".into(),
        ));
    }

    let password_hash = hash_password(&register_data.password)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, email, full_name, password_hash) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, username, email, full_name, password_hash, is_active, created_at",
    )
    .bind(&username)
    .bind(&register_data.email)
    .bind(&register_data.full_name)
    .bind(&password_hash)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Created().json(user))
}

/// Login with a JSON body
///
/// Authenticates a user and returns a bearer access token.
///
/// ## Responses:
/// - `200 OK`: `{access_token, token_type: "bearer"}`.
/// - `401 Unauthorized`: unknown username or wrong password.
/// - `400 Bad Request`: the account is deactivated.
#[post("/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    tokens: web::Data<TokenService>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    issue_token(&pool, &tokens, &login_data).await
}

/// OAuth2-compatible form login
///
/// Same contract as `/login`, but accepts
/// `application/x-www-form-urlencoded` credentials for clients that speak the
/// OAuth2 password flow.
#[post("/login/access-token")]
pub async fn login_access_token(
    pool: web::Data<PgPool>,
    tokens: web::Data<TokenService>,
    login_data: web::Form<LoginRequest>,
) -> Result<impl Responder, AppError> {
    issue_token(&pool, &tokens, &login_data).await
}

/// Get current user
///
/// Returns the record of the authenticated, active user.
#[get("/me")]
pub async fn me(user: CurrentUser) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(user.0))
}

/// Looks up a user by (lowercased) username and checks the password.
///
/// An unknown username and a wrong password are indistinguishable to the
/// caller. There is no lockout or rate limiting on repeated failures.
async fn authenticate(
    pool: &PgPool,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, email, full_name, password_hash, is_active, created_at \
         FROM users WHERE username = $1",
    )
    .bind(username.to_lowercase())
    .fetch_optional(pool)
    .await?;

    match user {
        Some(user) => {
            if verify_password(password, &user.password_hash)? {
                Ok(Some(user))
            } else {
                Ok(None)
            }
        }
        None => Ok(None),
    }
}

async fn issue_token(
    pool: &PgPool,
    tokens: &TokenService,
    credentials: &LoginRequest,
) -> Result<HttpResponse, AppError> {
    let user = authenticate(pool, &credentials.username, &credentials.password)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Incorrect username or password".to_string()))?;

    if !user.is_active {
        return Err(AppError::BadRequest("Inactive user".to_string()));
    }

    let token = tokens.issue(&user.username)?;
    Ok(HttpResponse::Ok().json(TokenResponse::bearer(token)))
}
