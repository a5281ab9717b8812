use std::path::PathBuf;
use std::time::Duration;

use axum::Router;
use clap::Parser;
use course_server::api::instructor::{InstructorApiDoc, get_instructor_router};
use course_server::api::public::{PublicApiDoc, get_public_router};
use course_server::api::user::{UserApiDoc, get_user_router};
use course_server::config::Config;
use course_server::utils::init_log;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to database file, overrides the config file
    #[arg(short, long)]
    database: Option<PathBuf>,

    #[arg(short = 'H', long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(database) = args.database {
        config.database = database;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    let _guard = init_log(config.log_dir.clone());

    let options = SqliteConnectOptions::new()
        .filename(&config.database)
        .create_if_missing(true);
    let database = SqlitePool::connect_with(options).await?;
    // Ensure foreign keys are enabled
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&database)
        .await?;
    course_server::MIGRATOR.run(&database).await?;

    let session_store = SqliteStore::new(database.clone());
    session_store.migrate().await?;
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(5)));

    let app = Router::new()
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/public/openapi.json", PublicApiDoc::openapi())
                .url("/api-docs/user/openapi.json", UserApiDoc::openapi())
                .url(
                    "/api-docs/instructor/openapi.json",
                    InstructorApiDoc::openapi(),
                ),
        )
        .nest("/api/public", get_public_router())
        .nest("/api/user", get_user_router())
        .nest("/api/instructor", get_instructor_router())
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(database);

    info!("starting server at http://{}:{}", config.host, config.port);
    info!(
        "swagger ui available at http://{}:{}/swagger-ui/",
        config.host, config.port
    );
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
