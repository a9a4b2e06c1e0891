use std::net::SocketAddr;
use std::time::Duration;

mod admin;
mod app;
mod auth;
mod config;
mod error;
mod policy;
mod projects;
mod rate_limit;
mod state;
mod store;

const SESSION_SWEEP_PERIOD: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "spvisual=debug,axum=info,tower_http=info".to_string());
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

    let app_state = state::AppState::init()?;
    let addr: SocketAddr = format!("{}:{}", app_state.config.host, app_state.config.port).parse()?;

    let flusher = app_state
        .persistence
        .spawn_timer(app_state.config.flush_interval);
    let sweeper = app_state.sessions.spawn_sweeper(SESSION_SWEEP_PERIOD);

    let result = app::serve(app::build_app(app_state.clone()), addr).await;

    flusher.abort();
    sweeper.abort();
    app_state.persistence.flush().await;
    tracing::info!("final flush done");

    result
}
