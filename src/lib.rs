//! Care Home Backend - library for app logic and testing

pub mod auth;
pub mod config;
pub mod content_cache;
pub mod db;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use config::AppConfig;
use db::{MemoryStore, PgStore, Store};
use state::AppState;

/// Cap for JSON request bodies
const JSON_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Room for multipart boundaries and headers on top of the file ceiling.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// CORS for the configured origins. Unparsable origins are skipped.
pub fn configure_cors(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors(&state.config.allowed_origins);
    let upload_dir = state.config.upload.dir.clone();
    let upload_limit = state
        .config
        .upload
        .image_max_bytes
        .max(state.config.upload.video_max_bytes)
        + MULTIPART_OVERHEAD;

    let json_api = Router::new()
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/create-admin", post(routes::auth::create_admin))
        .route(
            "/posts",
            get(routes::posts::list_posts).post(routes::posts::create_post),
        )
        .route(
            "/posts/{id}",
            get(routes::posts::get_post)
                .put(routes::posts::update_post)
                .delete(routes::posts::delete_post),
        )
        .route(
            "/categories",
            get(routes::categories::list_categories).post(routes::categories::create_category),
        )
        .route(
            "/categories/{id}",
            put(routes::categories::update_category).delete(routes::categories::delete_category),
        )
        .route("/content", get(routes::content::list_content))
        .route(
            "/content/{key}",
            get(routes::content::get_content).put(routes::content::update_content),
        )
        .route(
            "/analytics",
            get(routes::analytics::list_page_views).post(routes::analytics::track),
        )
        .route("/health", get(routes::health::health))
        .route("/health/ready", get(routes::health::health_ready))
        .layer(RequestBodyLimitLayer::new(JSON_BODY_LIMIT));

    // Uploads are streamed, so they get their own (larger) ceiling.
    let uploads = Router::new()
        .route("/upload", post(routes::upload::upload_image))
        .route("/upload/video", post(routes::upload::upload_video))
        .layer(DefaultBodyLimit::max(upload_limit as usize));

    let api = json_api
        .merge(uploads)
        .nest_service("/uploads", ServeDir::new(&upload_dir));

    Router::new()
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(&upload_dir))
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/// Run the server (used by main).
pub async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::from_env()?;

    // Dropping the guards stops the background writers and loses buffered lines.
    let _log_guards = logging::init(&config.log);

    routes::health::init_start_time();
    tracing::info!(environment = %config.environment, "starting care home backend");

    let store: Arc<dyn Store> = match &config.database {
        Some(db_config) => {
            let pool = db::init_pool(db_config).await?;
            db::ensure_schema(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store, data is not persisted");
            Arc::new(MemoryStore::new())
        }
    };

    if let Some(path) = &config.content_seed_file {
        db::seed_content_from_file(store.as_ref(), path).await?;
    }

    tokio::fs::create_dir_all(&config.upload.dir).await?;
    if config.auth.setup_key.is_none() {
        tracing::info!("SETUP_KEY not set; admin creation is disabled");
    }

    let addr = config.bind_addr()?;
    let app = create_app(AppState::new(store, config));

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}
