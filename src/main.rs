use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::{Logger, NormalizePath};
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;

use taskvault::auth::{AuthMiddleware, TokenService};
use taskvault::config::Config;
use taskvault::routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let tokens = Arc::new(TokenService::new(
        &config.jwt_secret,
        config.access_token_expire_minutes,
    ));

    log::info!("Starting server at {}", config.server_url());

    let bind_addr = (config.server_host.clone(), config.server_port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::from(Arc::clone(&tokens)))
            // Wraps run outermost-last: CORS and logging first, then path
            // normalization, then the bearer-token gate.
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
            .service(routes::health::index)
            .service(routes::health::health)
            .configure(routes::config)
    })
    .bind(bind_addr)?
    .run()
    .await
}
