use findtutor::{
    config::{validate_production_config, AppConfig},
    db, routes, services, AppState,
};

use std::{net::SocketAddr, time::Duration};
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TOKEN_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "findtutor=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database connection
    let pool = db::create_pool().await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    let config = AppConfig::from_env();
    if config.google_map_api_key.is_none() {
        tracing::warn!("GOOGLE_MAP_API_KEY is not set; the location map will not load");
    }

    let email_service = services::create_email_service();
    let app_state = AppState::new(pool.clone(), config, email_service);

    // Session store
    validate_production_config();
    let session_store = SqliteStore::new(pool.clone()).with_table_name("sessions")?;
    session_store.migrate().await?;

    let session_layer = app_state.config.session.create_layer(session_store);

    // Expired reset tokens are purged in the background
    let reset_service = app_state.password_reset_service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TOKEN_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match reset_service.cleanup_expired_tokens().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!("Removed {} expired reset tokens", removed),
                Err(e) => tracing::warn!("Reset token cleanup failed: {}", e),
            }
        }
    });

    let app = routes::build_router(app_state, session_layer);

    // Start server
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()?;

    let addr = SocketAddr::from((host.parse::<std::net::IpAddr>()?, port));

    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
