use std::sync::Arc;

use cdk_edge::oauth::HttpIdentityProvider;
use cdk_edge::session::RedisSessionStore;
use cdk_edge::{create_app, db, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    let config = AppConfig::from_env()?;
    init_tracing(config.app.default_log_filter());

    let pool = db::init(&config.database_url).await?;
    let store = RedisSessionStore::connect(&config.redis.url).await?;
    let provider = HttpIdentityProvider::new(config.oauth.clone())?;

    let state = AppState::new(&config, pool, Arc::new(store), Arc::new(provider));
    let app = create_app(state, &config.app.api_prefix);

    tracing::info!(
        app = %config.app.app_name,
        env = %config.app.env,
        prefix = %config.app.api_prefix,
        "listening on {}",
        config.app.addr
    );

    let listener = tokio::net::TcpListener::bind(config.app.addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing(default_filter: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
