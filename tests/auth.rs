use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::{Logger, NormalizePath};
use actix_web::{test, web, App};
use dotenv::dotenv;
use serde_json::json;
use sqlx::PgPool;

use taskvault::auth::{AuthMiddleware, TokenService};
use taskvault::routes;

async fn connect() -> PgPool {
    dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test DB");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

async fn delete_users(pool: &PgPool, usernames: &[&str]) {
    for username in usernames {
        let _ = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(pool)
            .await;
    }
}

// Requires a running Postgres; set DATABASE_URL and run with `--ignored`.
#[ignore]
#[actix_rt::test]
async fn test_register_login_me_flow() {
    let pool = connect().await;
    delete_users(&pool, &["integrationalice"]).await;

    let tokens = Arc::new(TokenService::new("integration-test-secret", 60));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::from(Arc::clone(&tokens)))
            .wrap(AuthMiddleware::new(Arc::clone(&tokens)))
            .wrap(NormalizePath::trim())
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .configure(routes::config),
    )
    .await;

    // Register; the mixed-case username must come back lowercased.
    let register_payload = json!({
        "username": "IntegrationAlice",
        "email": "integrationalice@example.com",
        "password": "Password123",
        "full_name": "Integration Alice"
    });
    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(&register_payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let status = resp.status();
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(status, 201, "Registration failed. Body: {:?}", body);
    assert_eq!(body["username"], "integrationalice");
    assert_eq!(body["email"], "integrationalice@example.com");
    assert_eq!(body["is_active"], true);
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());

    // Duplicate registration fails with 400, email checked first.
    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(&register_payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    // Same email under a fresh username is still a duplicate.
    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(&json!({
            "username": "integrationalice2",
            "email": "integrationalice@example.com",
            "password": "Password123"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    // Login with the original (mixed-case) spelling also works.
    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(&json!({
            "username": "IntegrationAlice",
            "password": "Password123"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let status = resp.status();
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(status, 200, "Login failed. Body: {:?}", body);
    assert_eq!(body["token_type"], "bearer");
    let token = body["access_token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());

    // The token resolves back to the registered user.
    let req = test::TestRequest::get()
        .uri("/auth/me")
        .append_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["username"], "integrationalice");
    assert!(body.get("password_hash").is_none());

    // Missing and malformed tokens are both 403.
    let req = test::TestRequest::get().uri("/auth/me").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let req = test::TestRequest::get()
        .uri("/auth/me")
        .append_header(("Authorization", "Bearer garbage"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    delete_users(&pool, &["integrationalice"]).await;
}

// Requires a running Postgres; set DATABASE_URL and run with `--ignored`.
#[ignore]
#[actix_rt::test]
async fn test_register_input_validation() {
    let pool = connect().await;

    let tokens = Arc::new(TokenService::new("integration-test-secret", 60));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::from(Arc::clone(&tokens)))
            .wrap(AuthMiddleware::new(Arc::clone(&tokens)))
            .wrap(NormalizePath::trim())
            .configure(routes::config),
    )
    .await;

    let test_cases = vec![
        // Deserialization errors: missing required fields.
        (
            json!({ "email": "v@example.com", "password": "Password123" }),
            400,
            "missing username",
        ),
        // Schema violations caught by the validator derive.
        (
            json!({ "username": "validuser", "email": "not-an-email", "password": "Password123" }),
            422,
            "invalid email format",
        ),
        (
            json!({ "username": "ab", "email": "v@example.com", "password": "Password123" }),
            422,
            "username too short",
        ),
        (
            json!({ "username": "validuser", "email": "v@example.com", "password": "Passwd1" }),
            422,
            "seven-character password",
        ),
        // Business-rule violations.
        (
            json!({ "username": "invalid_user", "email": "v@example.com", "password": "Password123" }),
            400,
            "username with underscore",
        ),
        (
            json!({ "username": "validuser", "email": "v@example.com", "password": "password123" }),
            400,
            "password without uppercase",
        ),
        (
            json!({ "username": "validuser", "email": "v@example.com", "password": "PASSWORD123" }),
            400,
            "password without lowercase",
        ),
        (
            json!({ "username": "validuser", "email": "v@example.com", "password": "Passwordabc" }),
            400,
            "password without digit",
        ),
    ];

    for (payload, expected_status, description) in test_cases {
        let req = test::TestRequest::post()
            .uri("/auth/register")
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let body = test::read_body(resp).await;

        assert_eq!(
            status,
            expected_status,
            "Test case failed: {}. Body: {:?}",
            description,
            String::from_utf8_lossy(&body)
        );
    }
}

// Requires a running Postgres; set DATABASE_URL and run with `--ignored`.
#[ignore]
#[actix_rt::test]
async fn test_login_failures_and_form_endpoint() {
    let pool = connect().await;
    delete_users(&pool, &["integrationbob"]).await;

    let tokens = Arc::new(TokenService::new("integration-test-secret", 60));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::from(Arc::clone(&tokens)))
            .wrap(AuthMiddleware::new(Arc::clone(&tokens)))
            .wrap(NormalizePath::trim())
            .configure(routes::config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(&json!({
            "username": "integrationbob",
            "email": "integrationbob@example.com",
            "password": "Password123"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201, "Setup: failed to register test user");

    // Wrong password and unknown user are indistinguishable 401s.
    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(&json!({ "username": "integrationbob", "password": "WrongPassword1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(&json!({ "username": "nosuchuser", "password": "Password123" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    // The OAuth2-style form endpoint issues the same kind of token.
    let req = test::TestRequest::post()
        .uri("/auth/login/access-token")
        .set_form(&[("username", "integrationbob"), ("password", "Password123")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    let status = resp.status();
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(status, 200, "Form login failed. Body: {:?}", body);
    assert_eq!(body["token_type"], "bearer");
    assert!(body["access_token"].as_str().is_some());

    delete_users(&pool, &["integrationbob"]).await;
}

// Requires a running Postgres; set DATABASE_URL and run with `--ignored`.
#[ignore]
#[actix_rt::test]
async fn test_inactive_user_cannot_login_or_authenticate() {
    let pool = connect().await;
    delete_users(&pool, &["integrationcarol"]).await;

    let tokens = Arc::new(TokenService::new("integration-test-secret", 60));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::from(Arc::clone(&tokens)))
            .wrap(AuthMiddleware::new(Arc::clone(&tokens)))
            .wrap(NormalizePath::trim())
            .configure(routes::config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(&json!({
            "username": "integrationcarol",
            "email": "integrationcarol@example.com",
            "password": "Password123"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    // Grab a token while the account is still active.
    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(&json!({ "username": "integrationcarol", "password": "Password123" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let token = body["access_token"].as_str().unwrap().to_string();

    sqlx::query("UPDATE users SET is_active = FALSE WHERE username = $1")
        .bind("integrationcarol")
        .execute(&pool)
        .await
        .unwrap();

    // Deactivated: login is 400, and the previously issued token is
    // rejected with 400 at resolution time.
    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(&json!({ "username": "integrationcarol", "password": "Password123" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::get()
        .uri("/auth/me")
        .append_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    delete_users(&pool, &["integrationcarol"]).await;
}
