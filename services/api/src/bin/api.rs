//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, DocxAssembler, OpenAiTextAdapter},
    config::Config,
    error::ApiError,
    web::{api_router, ApiDoc, AppState},
    worker::{requeue_pending, spawn_pending_sweep, spawn_workers, TaskQueue, WorkerContext},
};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use docgen_core::ContentGenerator;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    if config.ai.api_key.is_none() {
        info!("No AI API key configured; documents will use fallback content");
    }
    let text_adapter = Arc::new(OpenAiTextAdapter::new(&config.ai));
    let generator = Arc::new(ContentGenerator::new(
        text_adapter,
        Arc::new(DocxAssembler::new()),
        config.media_root.clone(),
    ));
    tokio::fs::create_dir_all(&config.media_root).await?;

    // --- 4. Start the Generation Workers ---
    let shutdown = CancellationToken::new();
    let (queue, receiver) = TaskQueue::bounded(config.queue_capacity);
    let worker_ctx = Arc::new(WorkerContext {
        db: db_adapter.clone(),
        generator,
        media_root: config.media_root.clone(),
    });
    let workers = spawn_workers(config.worker_count, receiver, worker_ctx, shutdown.clone());
    info!("Started {} generation worker(s)", config.worker_count);

    // Workers are already consuming, so a backlog larger than the queue cannot stall startup.
    let requeue_db = db_adapter.clone();
    let requeue_queue = queue.clone();
    tokio::spawn(async move {
        if let Err(e) = requeue_pending(requeue_db.as_ref(), &requeue_queue).await {
            error!("Failed to re-enqueue pending tasks: {}", e);
        }
    });

    let sweeper = spawn_pending_sweep(
        db_adapter.clone(),
        queue.clone(),
        config.sweep_interval,
        shutdown.clone(),
    );

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        queue,
    });

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await?;

    // Let in-flight tasks finish before exiting.
    shutdown.cancel();
    for worker in workers.into_iter().chain(std::iter::once(sweeper)) {
        if let Err(e) = worker.await {
            error!("Background task exited abnormally: {}", e);
        }
    }
    info!("Server stopped");

    Ok(())
}
