use anyhow::{Context, Result};
use phrasebook_server::config::Config;
use phrasebook_server::db::Database;
use phrasebook_server::translation::DeeplClient;
use phrasebook_server::web::{router, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (absent in production)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("phrasebook_server=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    info!("Starting phrasebook server ({})", config.environment);
    if !config.is_production() {
        info!("Using DeepL endpoint {}", config.deepl_api_url);
    }

    let db = Database::new(&config.database_url).await?;
    let translator = DeeplClient::new(&config);
    let app = router(AppState { db, translator });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
