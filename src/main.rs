use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use pomodoroplus::auth::{Authenticator, InMemoryRevocationStore};
use pomodoroplus::{routes, Config};
use sqlx::PgPool;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    let pool = PgPool::connect(&config.database_url)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Failed to connect to database: {}", e)))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Failed to run migrations: {}", e)))?;

    let authenticator = Authenticator::from_config(&config, Arc::new(InMemoryRevocationStore::new()))
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Failed to build JWKS client: {}", e)))?;
    let authenticator = web::Data::new(authenticator);
    log::info!("Verifying tokens against {}", authenticator.jwks_url());

    log::info!("Starting PomodoroPlus server at {}", config.server_url());
    let pool = web::Data::new(pool);
    HttpServer::new(move || {
        App::new()
            .app_data(pool.clone())
            .app_data(authenticator.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .configure(routes::config)
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
