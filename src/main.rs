use std::time::Duration;

use anyhow::Context;

mod app;
mod auth;
mod campaigns;
mod checkout;
mod config;
mod error;
mod notifications;
mod otp;
mod payments;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "billboard=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    sqlx::migrate!("./migrations")
        .run(&app_state.db)
        .await
        .context("run migrations")?;

    otp::services::spawn_cleanup(
        app_state.otp.clone(),
        Duration::from_secs(app_state.config.otp.cleanup_secs.max(1)),
    );

    app::serve(app::build_app(app_state)).await
}
