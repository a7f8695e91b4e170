use actix_web::dev::Payload;
use actix_web::{web, Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use sqlx::PgPool;

use crate::auth::token::Claims;
use crate::error::AppError;
use crate::models::User;

/// The authenticated, active user behind the current request.
///
/// Intended for routes protected by `AuthMiddleware`, which verifies the
/// bearer token and stores its claims in request extensions. This extractor
/// resolves the claim subject against the `users` table, so it fails with:
///
/// - `Forbidden` (403) if the claims are absent or the subject is empty,
/// - `NotFound` (404) if no user row matches the subject,
/// - `BadRequest` (400) if the matched account is deactivated.
#[derive(Debug)]
pub struct CurrentUser(pub User);

impl FromRequest for CurrentUser {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let claims = req
                .extensions()
                .get::<Claims>()
                .cloned()
                .ok_or_else(|| AppError::Forbidden("Not authenticated".to_string()))?;

            if claims.sub.is_empty() {
                return Err(AppError::Forbidden("Could not validate credentials".to_string()).into());
            }

            let pool = req.app_data::<web::Data<PgPool>>().ok_or_else(|| {
                AppError::InternalServerError("Database pool is not configured".to_string())
            })?;

            let user = sqlx::query_as::<_, User>(
                "SELECT id, username, email, full_name, password_hash, is_active, created_at \
                 FROM users WHERE username = $1",
            )
            .bind(&claims.sub)
            .fetch_optional(pool.get_ref())
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

            if !user.is_active {
                return Err(AppError::BadRequest("Inactive user".to_string()).into());
            }

            Ok(CurrentUser(user))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::dev::Payload;
    use actix_web::http::StatusCode;
    use actix_web::test;

    #[actix_rt::test]
    async fn test_missing_claims_is_403() {
        let req = test::TestRequest::default().to_http_request();

        let mut payload = Payload::None;
        let result = CurrentUser::from_request(&req, &mut payload).await;
        assert!(result.is_err());

        let response = result.unwrap_err().error_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[actix_rt::test]
    async fn test_empty_subject_is_403() {
        let req = test::TestRequest::default().to_http_request();
        req.extensions_mut().insert(Claims {
            sub: String::new(),
            exp: 0,
        });

        let mut payload = Payload::None;
        let result = CurrentUser::from_request(&req, &mut payload).await;
        assert!(result.is_err());

        let response = result.unwrap_err().error_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[actix_rt::test]
    async fn test_missing_pool_is_500() {
        // Claims are present but the app has no PgPool registered.
        let req = test::TestRequest::default().to_http_request();
        req.extensions_mut().insert(Claims {
            sub: "alice".to_string(),
            exp: 0,
        });

        let mut payload = Payload::None;
        let result = CurrentUser::from_request(&req, &mut payload).await;
        assert!(result.is_err());

        let response = result.unwrap_err().error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
