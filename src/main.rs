//! Roundtable - turn-based multi-participant conversation server
//!
//! Several LLM-backed participants take turns on a topic while a human can
//! interject, pause or stop. Every state change is streamed to observers over
//! SSE.

mod api;
mod config;
mod db;
mod llm;
mod participants;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use config::{CorsOrigins, ServerConfig};
use db::Database;
use llm::{LlmConfig, ModelRegistry};
use participants::ParticipantRegistry;
use runtime::{DatabaseTranscripts, EventHub, RegistryGenerator, SessionManager};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roundtable=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ServerConfig::from_env();

    tracing::info!(path = %config.db_path.display(), "Opening transcript database");
    let db = Database::open(&config.db_path)?;

    let participants = Arc::new(match &config.participants_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading participants");
            ParticipantRegistry::from_file(path)?
        }
        None => ParticipantRegistry::default(),
    });

    let llm_config = LlmConfig::from_env();
    let configured = llm_config.configured_providers();
    for participant in participants.all() {
        if !configured.contains(&participant.provider) {
            tracing::warn!(
                participant = %participant.name,
                provider = participant.provider.display_name(),
                env_var = participant.provider.api_key_env_var(),
                "No API key configured; this participant's turns will fail"
            );
        }
    }
    let models = Arc::new(ModelRegistry::new(llm_config));

    let manager = Arc::new(SessionManager::new(
        Arc::new(RegistryGenerator::new(participants.clone(), models)),
        Arc::new(DatabaseTranscripts::new(db.clone())),
        participants.names(),
        config.limits,
        EventHub::new(config.subscriber_buffer),
    ));
    tracing::info!(
        participants = ?participants.names(),
        max_turns = config.limits.max_turns,
        pause_timeout_secs = config.limits.pause_timeout.as_secs(),
        "Session manager ready"
    );

    let state = AppState::new(manager.clone(), participants, db);
    let app = create_router(state.clone())
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Roundtable server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(api::shutdown_on(ctrl_c(), state))
        .await?;

    manager.join_driver().await;

    Ok(())
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let allow_origin = match origins {
        CorsOrigins::Any => AllowOrigin::from(Any),
        CorsOrigins::List(list) => AllowOrigin::list(list.iter().filter_map(|origin| {
            origin
                .parse()
                .map_err(|_| tracing::warn!(origin = %origin, "Ignoring invalid CORS origin"))
                .ok()
        })),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
