mod app;
mod auth;
mod config;
#[cfg(feature = "demo-inbox")]
mod demo;
mod error;
mod events;
mod info;
mod mailer;
mod requests;
mod rooms;
mod seed;
mod settings;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "unihousing=debug,axum=info,tower_http=info".to_string());
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

    let state = state::AppState::init().await?;

    sqlx::migrate!("./migrations").run(&state.db).await?;
    seed::seed_if_empty(&state.db, &state.config).await?;

    let app = app::build_app(state);
    app::serve(app).await
}
