mod config;
mod errors;
mod gate;
mod llm_client;
mod models;
mod render;
mod routes;
mod state;
mod tailoring;

#[cfg(test)]
mod test_support;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::gate::JobGate;
use crate::llm_client::LlmClient;
use crate::render::{CompilerCommand, DocumentCompiler};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http=info",
                env!("CARGO_PKG_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tailor v{}", env!("CARGO_PKG_VERSION"));

    // The profile is re-read per job; this only reports its state at boot.
    match models::load_profile(&config.profile_path).await {
        Ok(profile) => info!(
            "Profile found at {} ({} projects)",
            config.profile_path.display(),
            profile.projects.len()
        ),
        Err(e) => warn!("Profile not usable yet, jobs will fail until it is: {e}"),
    }

    // Initialize inference client
    let llm = LlmClient::new(
        config.inference_url.clone(),
        config.inference_api_key.clone(),
        config.inference_timeout,
    );
    info!("Inference client initialized (endpoint: {}, model: {})", llm.url(), config.inference_model);

    // Initialize document compiler
    let compiler = DocumentCompiler::new(
        config.work_dir.clone(),
        CompilerCommand::docker_pdflatex(&config.compiler_image),
        config.compile_timeout,
    );
    info!(
        "Document compiler: {} in {}",
        config.compiler_image,
        config.work_dir.display()
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        llm: Arc::new(llm),
        gate: JobGate::new(),
        compiler,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
