use actix_cors::Cors;
use actix_web::{
    middleware::{from_fn, Logger},
    web, App, HttpServer,
};
use std::sync::Arc;

use trusthub::config::{AppConfig, StoreBackend};
use trusthub::database::Database;
use trusthub::memory::MemoryStore;
use trusthub::session::{self, SessionSettings};
use trusthub::store::Store;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|err| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
    })?;
    let bind_address = config.bind_address();

    let store: Arc<dyn Store> = match config.backend {
        StoreBackend::Postgres => {
            let database_url = config.database_url.as_deref().unwrap_or_default();
            let db = Database::connect(database_url).await.map_err(|err| {
                log::error!("Failed to initialize database: {err:?}");
                std::io::Error::new(std::io::ErrorKind::Other, err)
            })?;
            Arc::new(db)
        }
        StoreBackend::Memory => {
            log::warn!("Using the in-memory store; data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    let store_data: web::Data<dyn Store> = web::Data::from(store);
    let session_settings = web::Data::new(SessionSettings {
        ttl: config.session_ttl,
        cookie_secure: config.cookie_secure,
    });
    let allowed_origin = config.allowed_origin.clone();

    log::info!("Starting TrustHub directory service on {}", bind_address);

    HttpServer::new(move || {
        let cors = match &allowed_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .supports_credentials(),
            None => Cors::default().allow_any_origin(),
        }
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

        App::new()
            .app_data(store_data.clone())
            .app_data(session_settings.clone())
            .wrap(from_fn(session::gate))
            .wrap(cors)
            .wrap(Logger::default())
            .configure(trusthub::configure)
    })
    .bind(&bind_address)?
    .run()
    .await
}
