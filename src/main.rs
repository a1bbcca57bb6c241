use std::{env, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod auth;
mod config;
mod db;
mod error;
mod grading;
mod lifecycle;
mod llm;
mod models;
mod policy;
mod routes;
mod tutor;

use app::AppState;
use auth::AuthKeys;
use config::Config;
use db::postgres::PgStore;
use llm::OpenAiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "tutoring_api=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = db::connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let model = OpenAiClient::new(config.llm.clone())?;
    tracing::info!(model = %config.llm.model, base_url = %config.llm.base_url, "language model configured");

    let state = AppState {
        store: Arc::new(PgStore::new(pool)),
        model: Arc::new(model),
        auth: Arc::new(AuthKeys::new(&config.jwt_secret, &config.jwt_audience)),
        assessment_exempt_pattern: Arc::from(config.assessment_exempt_pattern.as_str()),
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app::app(state)).await?;
    Ok(())
}
