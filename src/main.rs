mod config;
mod errors;
mod handlers;
mod inference;
mod media;
mod metrics;
mod models;
mod pipeline;
mod rate_limit;
mod state;

use anyhow::{Context, Result};
use axum::{Router, extract::DefaultBodyLimit, routing::{get, post}};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Args, Command};
use crate::handlers::{extract_handler, favicon_handler, health_handler, index_handler, metrics_handler};
use crate::inference::InferenceClient;
use crate::pipeline::RequestHandler;
use crate::rate_limit::RateLimiter;
use crate::state::{AppState, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // parse cli arguments
    let args = Args::parse();
    let client_config = args.client_config()?;
    let window = args.rate_window()?;

    // one client and one limiter for the whole process
    let client = InferenceClient::new(client_config).context("failed to build HTTP client")?;
    let model = client.model().to_string();
    let limiter = Arc::new(RateLimiter::new(args.rate_limit, window));
    let handler = RequestHandler::new(Arc::new(client), limiter);

    match args.command.clone().unwrap_or(Command::Serve) {
        Command::Extract { path } => {
            println!("{}", handler.handle(&path).await);
            Ok(())
        }
        Command::Serve => {
            let state = Arc::new(AppState { handler });
            let addr = format!("{}:{}", args.host, args.port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;

            info!("Image2Text running on http://{}", addr);
            info!("Transcribing with {}", model);
            info!("Rate limit: {} calls per {} seconds", args.rate_limit, window.as_secs());

            axum::serve(listener, app(state, args.max_upload_bytes())).await?;
            Ok(())
        }
    }
}

fn app(state: SharedState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/favicon.png", get(favicon_handler))
        .route("/favicon.ico", get(favicon_handler))
        .route("/api/extract", post(extract_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
