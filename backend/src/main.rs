use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::env;
use std::sync::Arc;

use visionroute::cache::{
    CacheStore, DynamoCacheStore, MemoryCacheStore, ResultCache, spawn_purger,
};
use visionroute::catalog;
use visionroute::classifier::Classifier;
use visionroute::config::{CacheStoreKind, ServiceConfig};
use visionroute::preprocess::Preprocessor;
use visionroute::routes::{AppState, configure_routes};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = ServiceConfig::load().map_err(|e| {
        log::error!("Failed to load configuration: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    let (registry, catalog) = catalog::build(&config.backends);
    log::info!(
        "{} of {} configured backends available: {:?}",
        catalog.available_count(),
        config.backends.len(),
        registry.names()
    );

    let allowed_formats = config.upload.image_formats().map_err(|e| {
        log::error!("Invalid upload formats: {}", e);
        std::io::Error::other(e.to_string())
    })?;
    let mut classifier = Classifier::new(registry).with_preprocessor(
        Preprocessor::new(config.upload.max_image_bytes, config.upload.max_dimension)
            .with_allowed_formats(allowed_formats),
    );

    if config.cache.enabled {
        let store: Arc<dyn CacheStore> = match config.cache.store {
            CacheStoreKind::Memory => {
                let memory = Arc::new(MemoryCacheStore::new());
                spawn_purger(memory.clone(), config.cache.ttl());
                memory
            }
            CacheStoreKind::Dynamodb => {
                let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
                let table = env::var("DYNAMODB_CACHE_TABLE")
                    .unwrap_or_else(|_| config.cache.table.clone());
                Arc::new(DynamoCacheStore::new(DynamoDbClient::new(&aws_config), table))
            }
        };
        log::info!(
            "Result cache enabled on {} store, ttl {}s",
            store.name(),
            config.cache.ttl_secs
        );
        classifier = classifier.with_cache(ResultCache::new(
            store,
            config.cache.ttl(),
            config.cache.timeout(),
        ));
    } else {
        log::info!("Result cache disabled");
    }

    let upload = config.upload.clone();
    let state = web::Data::new(AppState::new(
        classifier,
        Arc::new(catalog),
        config.defaults,
        config.upload,
    ));

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(config.server.port);
    let bind_address = format!("0.0.0.0:{}", port);

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(state.clone())
            .configure(|cfg| configure_routes(cfg, &upload))
    })
    .bind(&bind_address)?
    .run()
    .await
}
