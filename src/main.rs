use option_lens::config::AppConfig;
use option_lens::engine::task::run_engine;
use option_lens::engine::OptionEngine;
use option_lens::errors::EngineResult;
use option_lens::server;
use option_lens::state::{AppState, EngineCommand};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("option_lens starting");

    // Load config
    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cfg).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: AppConfig) -> EngineResult<()> {
    // Bounded command channel into the engine
    let (command_tx, command_rx) = mpsc::channel::<EngineCommand>(cfg.command_buffer);

    let engine = OptionEngine::new();
    let initial = engine.snapshot();
    tracing::info!(
        price = initial.result.price,
        delta = initial.result.delta,
        "priced default contract"
    );

    let app_state = AppState::new(initial, cfg.broadcast_buffer, command_tx.clone());

    // Engine task (single owner of all pricing state)
    let engine_state = app_state.clone();
    let engine_task = tokio::spawn(async move {
        run_engine(engine, engine_state, command_rx).await;
    });

    // Axum HTTP + WS server
    let index = cfg.static_dir.join("index.html");
    let app = server::api_router(app_state)
        .fallback_service(
            tower_http::services::ServeDir::new(&cfg.static_dir)
                .fallback(tower_http::services::ServeFile::new(index)),
        )
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        );

    let addr = cfg.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = command_tx.send(EngineCommand::Shutdown).await;
    let _ = engine_task.await;
    tracing::info!("option_lens stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
